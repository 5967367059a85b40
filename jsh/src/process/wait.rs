use super::state::ProcessState;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, error};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WaitMode {
    /// Block until the child exits, is killed or stops.
    Blocking,
    /// Report any pending change, including a resume, without blocking.
    Poll,
}

/// Waits on exactly one child. `None` means nothing new (only in `Poll`).
///
/// A child that can no longer be waited for is reported as `Exited(1)` so
/// callers never spin on it.
pub fn wait_process(pid: Pid, mode: WaitMode) -> Option<ProcessState> {
    let options = match mode {
        WaitMode::Blocking => WaitPidFlag::WUNTRACED,
        WaitMode::Poll => WaitPidFlag::WUNTRACED | WaitPidFlag::WNOHANG | WaitPidFlag::WCONTINUED,
    };

    loop {
        let state = match waitpid(pid, Some(options)) {
            Ok(WaitStatus::Exited(_, status)) => {
                debug!("WAIT_PID_EXITED: pid {} status {}", pid, status);
                ProcessState::Exited(status)
            }
            Ok(WaitStatus::Signaled(_, signal, core_dumped)) => {
                debug!(
                    "WAIT_PID_SIGNALED: pid {} signal {:?} core_dumped {}",
                    pid, signal, core_dumped
                );
                ProcessState::Signaled(signal)
            }
            Ok(WaitStatus::Stopped(_, signal)) => {
                debug!("WAIT_PID_STOPPED: pid {} signal {:?}", pid, signal);
                ProcessState::Stopped
            }
            Ok(WaitStatus::Continued(_)) => {
                debug!("WAIT_PID_CONTINUED: pid {}", pid);
                ProcessState::Running
            }
            Ok(WaitStatus::StillAlive) => return None,
            Ok(other) => {
                debug!("WAIT_PID_OTHER: pid {} {:?}", pid, other);
                return None;
            }
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                debug!("WAIT_PID_ECHILD: pid {} already reaped", pid);
                ProcessState::Exited(1)
            }
            Err(err) => {
                error!("WAIT_PID_ERROR: pid {} {}", pid, err);
                ProcessState::Exited(1)
            }
        };
        return Some(state);
    }
}

/// Blocks until `pid` reaches a terminal state and returns it.
pub fn wait_terminal(pid: Pid) -> ProcessState {
    loop {
        if let Some(state) = wait_process(pid, WaitMode::Blocking)
            && state.is_terminal()
        {
            return state;
        }
    }
}
