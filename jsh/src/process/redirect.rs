use jsh_types::LaunchError;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use std::fmt;
use std::os::fd::{FromRawFd, OwnedFd};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// `< path`: the first stage reads the file.
    Input(String),
    /// `> path`: the last stage writes the file, created `0644` and truncated.
    StdoutOutput(String),
}

impl Redirect {
    pub fn path(&self) -> &str {
        match self {
            Redirect::Input(path) | Redirect::StdoutOutput(path) => path,
        }
    }

    /// Opens the target close-on-exec; the child's `dup2` copy survives exec.
    pub(crate) fn open(&self) -> Result<OwnedFd, LaunchError> {
        let (flags, mode) = match self {
            Redirect::Input(_) => (OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty()),
            Redirect::StdoutOutput(_) => (
                OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_CLOEXEC,
                Mode::from_bits_truncate(0o644),
            ),
        };
        let fd = open(self.path(), flags, mode).map_err(|source| LaunchError::Redirect {
            path: self.path().to_string(),
            source,
        })?;
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirect::Input(path) => write!(f, "< {path}"),
            Redirect::StdoutOutput(path) => write!(f, "> {path}"),
        }
    }
}
