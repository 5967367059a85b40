use nix::sys::signal::Signal;
use std::fmt;

/// Lifecycle of one tracked child process.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessState {
    /// Forked; has not yet been observed after its self-stop.
    Spawned,
    Stopped,
    Running,
    Exited(i32),
    Signaled(Signal),
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Exited(_) | ProcessState::Signaled(_))
    }

    /// Shell exit status for a terminal state.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessState::Exited(code) => Some(*code),
            ProcessState::Signaled(signal) => Some(128 + *signal as i32),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessState::Spawned => formatter.write_str("spawned"),
            ProcessState::Stopped => formatter.write_str("stopped"),
            ProcessState::Running => formatter.write_str("running"),
            ProcessState::Exited(_) => formatter.write_str("done"),
            ProcessState::Signaled(Signal::SIGKILL) => formatter.write_str("killed"),
            ProcessState::Signaled(Signal::SIGTERM) => formatter.write_str("terminated"),
            ProcessState::Signaled(_) => formatter.write_str("signaled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_carry_exit_codes() {
        assert_eq!(ProcessState::Exited(3).exit_code(), Some(3));
        assert_eq!(ProcessState::Signaled(Signal::SIGINT).exit_code(), Some(130));
        assert_eq!(ProcessState::Stopped.exit_code(), None);
        assert!(ProcessState::Signaled(Signal::SIGKILL).is_terminal());
        assert!(!ProcessState::Running.is_terminal());
        assert!(!ProcessState::Spawned.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(ProcessState::Stopped.to_string(), "stopped");
        assert_eq!(ProcessState::Signaled(Signal::SIGKILL).to_string(), "killed");
    }
}
