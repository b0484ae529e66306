//! Console configuration
//!
//! Loads listener and server settings from a TOML file. Every field has a
//! default, so a missing file or a partial file is valid.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "ws-console.toml";

/// Directory holding the bundled page assets
pub const PUBLIC_DIR: &str = "public";

/// Default host the listener targets and the server binds
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9999;

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Listener settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListenConfig {
    /// Host (hostname plus optional port) whose `/ws` endpoint is opened
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
        }
    }
}

/// Development server settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServeConfig {
    /// Address to bind to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory static assets are served from
    #[serde(default)]
    pub public_dir: Option<PathBuf>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            public_dir: None,
        }
    }
}

impl ServeConfig {
    /// Public directory, falling back to `public/` next to the executable
    pub fn resolved_public_dir(&self) -> PathBuf {
        self.public_dir.clone().unwrap_or_else(bundled_public_dir)
    }
}

/// Root configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub serve: ServeConfig,
}

impl ConsoleConfig {
    /// Load configuration from `path`, returning defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: ConsoleConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

fn default_host() -> String {
    format!("{DEFAULT_BIND}:{DEFAULT_PORT}")
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// `public/` beside the running executable
fn bundled_public_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(PUBLIC_DIR)))
        .unwrap_or_else(|| PathBuf::from(PUBLIC_DIR))
}
