//! The program image a child turns into, prepared before `fork`.
//!
//! Everything the child touches between `fork` and `exec` is built here in the
//! parent, so the child side needs no allocation and no locks.

use super::signal::SignalPolicy;
use jsh_types::LaunchError;
use libc::c_char;
use std::ffi::CString;
use std::os::unix::io::RawFd;

/// Child status when fd or signal setup fails before exec.
pub const SETUP_FAILED: i32 = 126;
/// Child status when exec itself fails.
pub const EXEC_FAILED: i32 = 127;

#[derive(Debug)]
pub struct ExecImage {
    path: CString,
    // keeps the pointers in `argv_ptrs` valid
    _argv: Vec<CString>,
    argv_ptrs: Vec<*const c_char>,
    setup_failure: Vec<u8>,
    exec_failure: Vec<u8>,
    pub(crate) command: String,
}

impl ExecImage {
    pub fn new(path: &str, argv: &[String]) -> Result<Self, LaunchError> {
        let nul = |_| LaunchError::InvalidSyntax(format!("{path}: argument contains a NUL byte"));
        let c_path = CString::new(path).map_err(nul)?;
        let c_argv = argv
            .iter()
            .map(|arg| CString::new(arg.as_str()).map_err(nul))
            .collect::<Result<Vec<_>, _>>()?;
        let mut argv_ptrs: Vec<*const c_char> = c_argv.iter().map(|arg| arg.as_ptr()).collect();
        argv_ptrs.push(std::ptr::null());

        Ok(ExecImage {
            path: c_path,
            _argv: c_argv,
            argv_ptrs,
            setup_failure: format!("jsh: {path}: failed to set up process\n").into_bytes(),
            exec_failure: format!("jsh: {path}: exec failed\n").into_bytes(),
            command: argv.join(" "),
        })
    }

    pub fn path(&self) -> &str {
        self.path.to_str().unwrap_or_default()
    }

    /// Child side of the launch protocol. Never returns.
    ///
    /// Installs `stdin`/`stdout` (`None` keeps the inherited terminal), closes
    /// every descriptor in `inherited` above stderr, resets signals, stops
    /// itself with `SIGSTOP` and execs once the parent resumes it.
    pub(crate) fn exec_stopped(
        &self,
        stdin: Option<RawFd>,
        stdout: Option<RawFd>,
        inherited: &[RawFd],
    ) -> ! {
        unsafe {
            if let Some(fd) = stdin
                && libc::dup2(fd, libc::STDIN_FILENO) < 0
            {
                bail(&self.setup_failure, SETUP_FAILED);
            }
            if let Some(fd) = stdout
                && libc::dup2(fd, libc::STDOUT_FILENO) < 0
            {
                bail(&self.setup_failure, SETUP_FAILED);
            }
            for &fd in inherited {
                if fd > libc::STDERR_FILENO {
                    libc::close(fd);
                }
            }
            if SignalPolicy::restore_default_policy().is_err() {
                bail(&self.setup_failure, SETUP_FAILED);
            }

            libc::raise(libc::SIGSTOP);

            libc::execv(self.path.as_ptr(), self.argv_ptrs.as_ptr());
            bail(&self.exec_failure, EXEC_FAILED)
        }
    }
}

fn bail(msg: &[u8], code: i32) -> ! {
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
        libc::_exit(code)
    }
}
