use jsh_types::LaunchError;

/// Prints a launch failure the way the shell reports it and returns the
/// status to record for the command.
pub fn display_launch_error(err: &LaunchError) -> i32 {
    eprintln!("jsh: {err}");
    err.exit_code()
}

/// Prints any other error as a one-line `jsh:` diagnostic.
pub fn display_user_error(err: &anyhow::Error) {
    match err.downcast_ref::<LaunchError>() {
        Some(launch) => {
            display_launch_error(launch);
        }
        None => eprintln!("jsh: {err:#}"),
    }
}
