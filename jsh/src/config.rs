use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const APP_NAME: &str = "jsh";
const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub prompt: String,
    pub log_file: Option<PathBuf>,
    /// `tracing` filter directive; `JSH_LOG` takes precedence.
    pub log_filter: String,
    pub job_control: bool,
    /// Replaces `PATH` for executable lookup.
    pub path: Option<Vec<PathBuf>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: "jsh$ ".to_string(),
            log_file: None,
            log_filter: "warn".to_string(),
            job_control: true,
            path: None,
        }
    }
}

impl Config {
    /// Loads `path`, or `$XDG_CONFIG_HOME/jsh/config.toml` when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Config::default()),
            },
        };
        debug!("CONFIG_LOAD: {}", path.display());
        let display = path.display().to_string();
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn default_path() -> Option<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_NAME).ok()?;
        xdg_dirs.find_config_file(CONFIG_FILE)
    }
}
