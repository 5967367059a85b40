use jsh_types::SignalError;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, kill, killpg, sigaction};
use nix::unistd::Pid;
use tracing::{debug, error};

/// Signals the shell survives by catching them; the terminal delivers them to
/// the foreground job instead.
const SHELL_CAUGHT: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGPIPE,
];

/// Everything a child resets before exec.
const CHILD_DEFAULTS: [Signal; 6] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGPIPE,
    Signal::SIGTTOU,
    Signal::SIGTTIN,
];

extern "C" fn interrupt_only(_: libc::c_int) {}

pub struct SignalPolicy;

impl SignalPolicy {
    /// Catches the keyboard signals with a handler that does nothing.
    ///
    /// A caught disposition resets to default across exec, where `SIG_IGN`
    /// would be inherited by every program the shell starts. No `SA_RESTART`,
    /// so a blocked `read(2)` returns `EINTR`.
    pub fn install_shell_policy() -> Result<(), SignalError> {
        let action = SigAction::new(
            SigHandler::Handler(interrupt_only),
            SaFlags::empty(),
            SigSet::empty(),
        );
        for signal in SHELL_CAUGHT {
            unsafe { sigaction(signal, &action) }
                .map_err(|source| SignalError::Sigaction { signal, source })?;
        }
        debug!("SIGNAL_POLICY_INSTALLED: {:?}", SHELL_CAUGHT);
        Ok(())
    }

    /// Resets child dispositions to default.
    ///
    /// Runs between fork and exec: must not allocate or log.
    pub fn restore_default_policy() -> Result<(), SignalError> {
        let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        for signal in CHILD_DEFAULTS {
            unsafe { sigaction(signal, &action) }
                .map_err(|source| SignalError::Sigaction { signal, source })?;
        }
        Ok(())
    }
}

/// Ignores `SIGTTOU` until dropped, then puts the previous action back.
///
/// `tcsetpgrp` from a background group raises `SIGTTOU`; only an ignored (or
/// blocked) `SIGTTOU` lets the call go through, a caught one fails it with
/// `EINTR`.
pub struct TtouGuard {
    previous: Option<SigAction>,
}

impl TtouGuard {
    pub fn new() -> Result<Self, SignalError> {
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        let previous = unsafe { sigaction(Signal::SIGTTOU, &ignore) }.map_err(|source| {
            SignalError::Sigaction {
                signal: Signal::SIGTTOU,
                source,
            }
        })?;
        Ok(TtouGuard {
            previous: Some(previous),
        })
    }
}

impl Drop for TtouGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = unsafe { sigaction(Signal::SIGTTOU, &previous) } {
                error!("SIGNAL_TTOU_RESTORE_FAILED: {}", e);
            }
        }
    }
}

pub(crate) fn send_signal(pid: Pid, signal: Signal) -> Result<(), SignalError> {
    debug!("SIGNAL_SEND: {:?} to pid {}", signal, pid);
    kill(pid, signal).map_err(|source| SignalError::Kill {
        target: pid,
        signal,
        source,
    })
}

pub(crate) fn signal_group(pgid: Pid, signal: Signal) -> Result<(), SignalError> {
    debug!("SIGNAL_SEND_GROUP: {:?} to pgid {}", signal, pgid);
    killpg(pgid, signal).map_err(|source| SignalError::Kill {
        target: pgid,
        signal,
        source,
    })
}
