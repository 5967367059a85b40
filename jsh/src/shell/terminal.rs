//! Ownership of the controlling terminal's foreground process group.

use crate::process::signal::{TtouGuard, signal_group};
use jsh_types::SignalError;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::{Pid, getpgrp, getpid, isatty, setpgid, tcgetpgrp, tcsetpgrp};
use std::os::unix::io::RawFd;
use tracing::{debug, info, warn};

/// Which group owns the terminal, and the only code allowed to change that.
///
/// Without a terminal (`-c`, stdin not a tty, job control off) every transfer
/// is a no-op and the shell's group stays the owner.
#[derive(Debug)]
pub struct TerminalOwnership {
    fd: Option<RawFd>,
    shell_pgid: Pid,
    owner: Pid,
}

impl TerminalOwnership {
    pub fn detect(fd: RawFd, job_control: bool) -> Self {
        if job_control && isatty(fd).unwrap_or(false) {
            let shell_pgid = getpgrp();
            TerminalOwnership {
                fd: Some(fd),
                shell_pgid,
                owner: tcgetpgrp(fd).unwrap_or(shell_pgid),
            }
        } else {
            Self::disabled()
        }
    }

    pub fn disabled() -> Self {
        let shell_pgid = getpgrp();
        TerminalOwnership {
            fd: None,
            shell_pgid,
            owner: shell_pgid,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.fd.is_some()
    }

    pub fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    pub fn owner(&self) -> Pid {
        self.owner
    }

    /// Waits to be in the foreground, moves the shell into its own group and
    /// takes the terminal.
    pub fn acquire(&mut self) -> Result<(), SignalError> {
        let Some(fd) = self.fd else {
            return Ok(());
        };

        loop {
            let foreground = tcgetpgrp(fd).map_err(|source| SignalError::Tcsetpgrp {
                pgid: getpgrp(),
                source,
            })?;
            if foreground == getpgrp() {
                break;
            }
            debug!(
                "TERMINAL_WAIT_FOREGROUND: terminal owned by {}, stopping {}",
                foreground,
                getpgrp()
            );
            signal_group(getpgrp(), Signal::SIGTTIN)?;
        }

        let pid = getpid();
        match setpgid(pid, pid) {
            Ok(()) => {}
            // session leaders already lead their group
            Err(Errno::EPERM) => debug!("TERMINAL_SETPGID_EPERM: pid {}", pid),
            Err(err) => warn!("TERMINAL_SETPGID_FAILED: {}", err),
        }
        self.shell_pgid = getpgrp();
        self.give_to(self.shell_pgid)?;
        info!("TERMINAL_ACQUIRED: shell pgid {}", self.shell_pgid);
        Ok(())
    }

    /// Makes `pgid` the terminal's foreground group.
    pub fn give_to(&mut self, pgid: Pid) -> Result<(), SignalError> {
        let Some(fd) = self.fd else {
            return Ok(());
        };
        let _guard = TtouGuard::new()?;
        tcsetpgrp(fd, pgid).map_err(|source| SignalError::Tcsetpgrp { pgid, source })?;
        debug!("TERMINAL_OWNER: {} -> {}", self.owner, pgid);
        self.owner = pgid;
        Ok(())
    }

    /// Hands the terminal back to the shell's own group.
    pub fn reclaim(&mut self) -> Result<(), SignalError> {
        self.give_to(self.shell_pgid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_transfers_are_noops() {
        let mut terminal = TerminalOwnership::disabled();
        assert!(!terminal.is_interactive());
        assert_eq!(terminal.shell_pgid(), getpgrp());

        terminal.give_to(Pid::from_raw(1)).unwrap();
        assert_eq!(terminal.owner(), getpgrp());
        terminal.acquire().unwrap();
        terminal.reclaim().unwrap();
        assert_eq!(terminal.owner(), terminal.shell_pgid());
    }

    #[test]
    fn non_tty_fd_disables_job_control() {
        let file = tempfile::tempfile().unwrap();
        let terminal = TerminalOwnership::detect(std::os::fd::AsRawFd::as_raw_fd(&file), true);
        assert!(!terminal.is_interactive());
    }
}
