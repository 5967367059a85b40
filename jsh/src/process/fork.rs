use super::pipeline::{FdPlan, Pipeline};
use super::registry::{ProcessRegistry, report_misuse};
use super::signal::send_signal;
use super::wait::wait_terminal;
use jsh_types::LaunchError;
use nix::sys::signal::Signal;
use nix::unistd::{ForkResult, Pid, fork};
use tracing::{debug, error, warn};

/// Forks one self-stopped child per pipeline stage.
pub struct ProcessLauncher<'a> {
    registry: &'a mut ProcessRegistry,
}

impl<'a> ProcessLauncher<'a> {
    pub fn new(registry: &'a mut ProcessRegistry) -> Self {
        ProcessLauncher { registry }
    }

    /// Returns the pids in stage order, each registered as `Spawned`.
    ///
    /// On a fork failure the children already forked are killed and reaped and
    /// every pipe is closed before the error is returned.
    pub fn spawn(&mut self, pipeline: &Pipeline) -> Result<Vec<Pid>, LaunchError> {
        let mut plan = FdPlan::open(pipeline)?;
        let mut pids = Vec::with_capacity(pipeline.len());

        for (i, image) in pipeline.images.iter().enumerate() {
            let (stdin, stdout) = plan.stage_fds(i);
            let inherited = plan.raw_fds();
            debug!(
                "FORK_STAGE: {} '{}' stdin: {:?} stdout: {:?}",
                i, image.command, stdin, stdout
            );

            match unsafe { fork() } {
                Ok(ForkResult::Child) => image.exec_stopped(stdin, stdout, &inherited),
                Ok(ForkResult::Parent { child }) => {
                    plan.release_after_fork(i);
                    if let Err(err) = self.registry.register(child, &image.command) {
                        report_misuse(err);
                    }
                    debug!("FORK_CHILD: stage {} pid {}", i, child);
                    pids.push(child);
                }
                Err(source) => {
                    error!(
                        "FORK_FAILED: stage {} of '{}': {}, rolling back {} children",
                        i,
                        pipeline.cmd,
                        source,
                        pids.len()
                    );
                    drop(plan);
                    rollback(self.registry, &pids);
                    return Err(LaunchError::LaunchFailed {
                        command: pipeline.cmd.clone(),
                        source,
                    });
                }
            }
        }
        Ok(pids)
    }
}

/// Kills, reaps and unregisters `pids`.
pub fn rollback(registry: &mut ProcessRegistry, pids: &[Pid]) {
    for &pid in pids {
        if let Err(err) = send_signal(pid, Signal::SIGKILL) {
            warn!("ROLLBACK_KILL_FAILED: {}", err);
        }
        let state = wait_terminal(pid);
        debug!("ROLLBACK_REAPED: pid {} {}", pid, state);
        if let Err(err) = registry.set_state(pid, state) {
            report_misuse(err);
        }
        if let Err(err) = registry.remove(pid) {
            report_misuse(err);
        }
    }
}
