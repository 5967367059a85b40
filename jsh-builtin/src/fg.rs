use super::{parse_target, ShellProxy};
use jsh_types::{Context, ExitStatus};

pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    let target = match parse_target(&argv) {
        Ok(target) => target,
        Err(e) => {
            ctx.write_stderr(&format!("fg: {e}")).ok();
            return ExitStatus::ExitedWith(1);
        }
    };

    match proxy.bring_to_foreground(target) {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(e) => {
            ctx.write_stderr(&format!("fg: {e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
