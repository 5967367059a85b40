use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

pub fn command(ctx: &Context, _argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    match std::env::current_dir() {
        Ok(dir) => {
            ctx.write_stdout(&dir.to_string_lossy()).ok();
            ExitStatus::ExitedWith(0)
        }
        Err(err) => {
            ctx.write_stderr(&format!("pwd: {err}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
