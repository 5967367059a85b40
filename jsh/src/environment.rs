use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_PATH: &str = "/bin:/usr/bin:/sbin:/usr/sbin";

/// Executable search path.
#[derive(Debug, Clone)]
pub struct Environment {
    pub paths: Vec<PathBuf>,
}

impl Environment {
    /// Search path from `PATH`, or the default when it is unset.
    pub fn new() -> Self {
        let path = std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        Self::with_paths(std::env::split_paths(&path).collect())
    }

    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Environment { paths }
    }

    /// Full path of `name`: a name containing `/` is taken as is, anything else
    /// is searched for in order.
    pub fn lookup(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        if name.contains('/') {
            return is_executable(Path::new(name)).then(|| name.to_string());
        }
        for dir in &self.paths {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                debug!("LOOKUP_FOUND: {} -> {}", name, candidate.display());
                return Some(candidate.to_string_lossy().into_owned());
            }
        }
        debug!("LOOKUP_MISS: {}", name);
        None
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}
