//! User configuration
//!
//! Stored at `~/.config/branchwise/config.toml` (or the platform equivalent)
//! and never checked into a repository.
//!
//! ```toml
//! default-remote = "origin"
//! command-timeout = 60
//! workspace-root = "/home/me/src/project"
//! ```
//!
//! Sources, later overriding earlier:
//! 1. Defaults
//! 2. The config file (`--config`, else `BRANCHWISE_CONFIG_PATH`, else the platform path)
//! 3. `BRANCHWISE_DEFAULT_REMOTE`, `BRANCHWISE_COMMAND_TIMEOUT`, `BRANCHWISE_WORKSPACE_ROOT`

use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::{Deserialize, Serialize};

use crate::validate::validate_remote_name;

const ENV_CONFIG_PATH: &str = "BRANCHWISE_CONFIG_PATH";
const ENV_DEFAULT_REMOTE: &str = "BRANCHWISE_DEFAULT_REMOTE";
const ENV_COMMAND_TIMEOUT: &str = "BRANCHWISE_COMMAND_TIMEOUT";
const ENV_WORKSPACE_ROOT: &str = "BRANCHWISE_WORKSPACE_ROOT";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
    Message(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read {}: {source}", path.display())
            }
            ConfigError::Parse { path, message } => {
                write!(f, "Invalid config {}: {}", path.display(), message.trim())
            }
            ConfigError::Message(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Remote used when a caller doesn't name one.
    pub default_remote: String,
    /// Seconds allowed per git invocation.
    pub command_timeout: u64,
    /// Directory requests run against when they don't pass one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_remote: "origin".to_string(),
            command_timeout: crate::shell_exec::DEFAULT_TIMEOUT.as_secs(),
            workspace_root: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    ///
    /// `explicit_path` comes from `--config`. A missing file yields the
    /// defaults, but an explicit path that doesn't exist is an error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit_path, |key| std::env::var(key).ok())
    }

    fn load_with_env(
        explicit_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Message(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => config_path(&env),
        };

        let mut config = match path.as_deref().filter(|p| p.exists()) {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                let content = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::Read {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Self::from_toml(&content).map_err(|message| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message,
                })?
            }
            None => Self::default(),
        };

        config.apply_env(&env)?;
        config.validate()?;
        config.workspace_root = config.workspace_root.map(normalize_root);
        Ok(config)
    }

    fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(remote) = env(ENV_DEFAULT_REMOTE) {
            self.default_remote = remote;
        }
        if let Some(timeout) = env(ENV_COMMAND_TIMEOUT) {
            self.command_timeout = timeout.trim().parse().map_err(|_| {
                ConfigError::Message(format!(
                    "{ENV_COMMAND_TIMEOUT} must be a whole number of seconds, got {timeout:?}"
                ))
            })?;
        }
        if let Some(root) = env(ENV_WORKSPACE_ROOT).filter(|r| !r.is_empty()) {
            self.workspace_root = Some(PathBuf::from(root));
        }
        Ok(())
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.command_timeout == 0 {
            return Err(ConfigError::Message(
                "command-timeout must be greater than zero".into(),
            ));
        }
        validate_remote_name(&self.default_remote).map_err(|_| {
            ConfigError::Message(format!(
                "default-remote {:?} is not a valid remote name",
                self.default_remote
            ))
        })?;
        if self
            .workspace_root
            .as_ref()
            .is_some_and(|root| root.as_os_str().is_empty())
        {
            return Err(ConfigError::Message("workspace-root cannot be empty".into()));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }

    /// Working directory for a request: `override_dir`, else the workspace
    /// root, else the process directory.
    pub fn working_dir(&self, override_dir: Option<&Path>) -> PathBuf {
        override_dir
            .map(Path::to_path_buf)
            .or_else(|| self.workspace_root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Render as TOML, for `config show`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

/// Resolve the config file path: env override, else the platform default.
pub fn get_config_path() -> Option<PathBuf> {
    config_path(&|key| std::env::var(key).ok())
}

fn config_path(env: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = env(ENV_CONFIG_PATH).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    // choose_base_strategy uses:
    // - XDG on Linux (respects XDG_CONFIG_HOME, falls back to ~/.config)
    // - XDG on macOS (~/.config instead of ~/Library/Application Support)
    // - Windows conventions on Windows (%APPDATA%)
    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("branchwise").join("config.toml"))
}

/// Canonicalize the workspace root when it exists. Git can't handle Windows
/// verbatim paths, hence `dunce`.
fn normalize_root(root: PathBuf) -> PathBuf {
    dunce::canonicalize(&root).unwrap_or(root)
}
