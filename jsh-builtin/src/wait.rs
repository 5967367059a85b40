use super::ShellProxy;
use jsh_types::{Context, ExitStatus};

pub fn command(ctx: &Context, _argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    let status = match proxy.wait_for_background_jobs() {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(e) => {
            ctx.write_stderr(&format!("wait: {e}")).ok();
            ExitStatus::ExitedWith(1)
        }
    };
    for report in proxy.take_job_reports() {
        ctx.write_stdout(&report).ok();
    }
    status
}
