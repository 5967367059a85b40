use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use thiserror::Error;

/// Failures while turning a command line into running processes.
///
/// Reported to the user; the shell itself keeps running.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("syntax error: {0}")]
    InvalidSyntax(String),

    #[error("{0}: command not found")]
    Resolution(String),

    #[error("failed to open redirect file '{path}': {source}")]
    Redirect { path: String, source: Errno },

    #[error("failed to create pipe: {0}")]
    Pipe(Errno),

    #[error("failed to launch '{command}': {source}")]
    LaunchFailed { command: String, source: Errno },

    #[error(transparent)]
    Signal(#[from] SignalError),
}

impl LaunchError {
    /// Exit status the shell reports for a launch that never ran.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Resolution(_) => 127,
            _ => 1,
        }
    }
}

/// Failures of the job-state built-ins (`fg`, `bg`, `wait`).
///
/// No job state changes when one of these is returned.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("no current job")]
    NoCurrentJob,

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("{0}: argument must be a process ID or %job")]
    InvalidArgument(String),

    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Misuse of the process registry. These are programming errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("process {0} is already registered")]
    DuplicateProcess(Pid),

    #[error("process {0} is not registered")]
    UnknownProcess(Pid),
}

/// Failures of signal disposition or terminal ownership changes.
///
/// Only `Copy` data is carried so the value can be built in a forked child.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    #[error("sigaction({signal}) failed: {source}")]
    Sigaction { signal: Signal, source: Errno },

    #[error("tcsetpgrp({pgid}) failed: {source}")]
    Tcsetpgrp { pgid: Pid, source: Errno },

    #[error("failed to send {signal} to {target}: {source}")]
    Kill {
        target: Pid,
        signal: Signal,
        source: Errno,
    },
}
