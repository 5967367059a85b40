use anyhow::Result;
use libc::{STDERR_FILENO, STDOUT_FILENO};
use nix::unistd::Pid;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::mem;
use std::os::unix::io::{FromRawFd, RawFd};

pub mod error;
pub use error::{JobError, LaunchError, RegistryError, SignalError};

/// Per-invocation view of the shell handed to built-in commands.
#[derive(Clone)]
pub struct Context {
    pub shell_pid: Pid,
    pub shell_pgid: Pid,
    pub interactive: bool,
    pub outfile: RawFd,
    pub errfile: RawFd,
}

impl Context {
    pub fn new(shell_pid: Pid, shell_pgid: Pid, interactive: bool) -> Self {
        Context {
            shell_pid,
            shell_pgid,
            interactive,
            outfile: STDOUT_FILENO,
            errfile: STDERR_FILENO,
        }
    }

    pub fn write_stdout(&self, msg: &str) -> Result<()> {
        let mut file = unsafe { File::from_raw_fd(self.outfile) };
        let res = writeln!(&mut file, "{msg}");
        mem::forget(file);
        res?;
        Ok(())
    }

    pub fn write_stderr(&self, msg: &str) -> Result<()> {
        let mut file = unsafe { File::from_raw_fd(self.errfile) };
        let res = writeln!(&mut file, "{msg}");
        mem::forget(file);
        res?;
        Ok(())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("shell_pid", &self.shell_pid)
            .field("shell_pgid", &self.shell_pgid)
            .field("interactive", &self.interactive)
            .field("outfile", &self.outfile)
            .field("errfile", &self.errfile)
            .finish()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitStatus {
    /// Finished; signal deaths are folded in as `128 + signo`.
    ExitedWith(i32),
    /// Job stopped while in the foreground; carries its pgid.
    Stopped(Pid),
    /// Job left running in the background; carries its pgid.
    Running(Pid),
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::ExitedWith(code) => *code,
            // 128 + SIGTSTP, as in $? of other shells.
            ExitStatus::Stopped(_) => 128 + libc::SIGTSTP,
            ExitStatus::Running(_) => 0,
        }
    }
}

/// Argument of `fg`/`bg`: a process id or a `%n` job number.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JobTarget {
    Pid(Pid),
    Job(usize),
}

impl JobTarget {
    pub fn parse(arg: &str) -> Result<Self, JobError> {
        let arg = arg.trim();
        if let Some(num) = arg.strip_prefix('%') {
            return match num.parse::<usize>() {
                Ok(id) if id > 0 => Ok(JobTarget::Job(id)),
                _ => Err(JobError::InvalidArgument(arg.to_string())),
            };
        }
        if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
            return Err(JobError::InvalidArgument(arg.to_string()));
        }
        match arg.parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(JobTarget::Pid(Pid::from_raw(pid))),
            _ => Err(JobError::InvalidArgument(arg.to_string())),
        }
    }
}

/// One row of the `jobs` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: usize,
    pub pgid: Pid,
    pub state: String,
    pub command: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_target_parses_pids_and_job_numbers() {
        assert_eq!(
            JobTarget::parse("1234").unwrap(),
            JobTarget::Pid(Pid::from_raw(1234))
        );
        assert_eq!(JobTarget::parse("%2").unwrap(), JobTarget::Job(2));
    }

    #[test]
    fn job_target_rejects_garbage() {
        for arg in ["", "abc", "-5", "12a", "%", "%x", "%0", "0"] {
            assert!(
                matches!(JobTarget::parse(arg), Err(JobError::InvalidArgument(_))),
                "accepted {arg:?}"
            );
        }
    }

    #[test]
    fn exit_status_codes() {
        assert_eq!(ExitStatus::ExitedWith(3).code(), 3);
        assert_eq!(ExitStatus::Running(Pid::from_raw(10)).code(), 0);
        assert_eq!(
            ExitStatus::Stopped(Pid::from_raw(10)).code(),
            128 + libc::SIGTSTP
        );
    }
}
