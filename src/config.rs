//! Configuration loading for meshrelay.
//!
//! Settings are layered: built-in defaults, then `<home>/config/receiver.json`,
//! then environment/CLI overrides (resolved by clap in `cli`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Get the default MESH home directory (~/.mesh).
pub fn default_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".mesh"))
}

/// Well-known locations under the MESH home directory.
#[derive(Debug, Clone)]
pub struct MeshPaths {
    home: PathBuf,
}

impl MeshPaths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Append-only audit trail shared with the dashboard.
    pub fn audit_log(&self) -> PathBuf {
        self.log_dir().join("mesh-audit.jsonl")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.home.join("state")
    }

    pub fn registry(&self) -> PathBuf {
        self.home.join("config").join("agent-registry.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.home.join("config").join("receiver.json")
    }
}

/// Receiver settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    /// Identifier of the local agent (reply `from`, default audit `to`).
    #[serde(default = "default_agent")]
    pub agent: String,

    /// Executable path or http(s) URL of the external handler.
    #[serde(default)]
    pub handler: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,

    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_handlers")]
    pub max_concurrent_handlers: usize,

    #[serde(default = "default_max_concurrent_replies")]
    pub max_concurrent_replies: usize,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_agent() -> String {
    "unknown".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8900
}

fn default_inbox_capacity() -> usize {
    100
}

fn default_handler_timeout_secs() -> u64 {
    30
}

fn default_reply_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_handlers() -> usize {
    8
}

fn default_max_concurrent_replies() -> usize {
    16
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent: default_agent(),
            handler: None,
            host: default_host(),
            port: default_port(),
            inbox_capacity: default_inbox_capacity(),
            handler_timeout_secs: default_handler_timeout_secs(),
            reply_timeout_secs: default_reply_timeout_secs(),
            max_concurrent_handlers: default_max_concurrent_handlers(),
            max_concurrent_replies: default_max_concurrent_replies(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Settings {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    /// Apply command-line / environment overrides on top of file settings.
    pub fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(agent) = overrides.agent {
            self.agent = agent;
        }
        if let Some(handler) = overrides.handler {
            self.handler = Some(handler).filter(|h| !h.trim().is_empty());
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.handler_timeout_secs == 0 || self.reply_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be at least one second".to_string()));
        }
        if self.inbox_capacity == 0 {
            return Err(Error::Config("inbox_capacity must be positive".to_string()));
        }
        if self.max_concurrent_handlers == 0 || self.max_concurrent_replies == 0 {
            return Err(Error::Config(
                "concurrency limits must be positive".to_string(),
            ));
        }
        if self.agent.trim().is_empty() {
            return Err(Error::Config("agent identifier must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Values supplied by CLI flags or environment variables.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub agent: Option<String>,
    pub handler: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Load settings from `<home>/config/receiver.json`, falling back to
/// defaults when the file does not exist.
pub fn load_settings(paths: &MeshPaths) -> Result<Settings> {
    let path = paths.settings_file();

    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load, override and validate settings in one step.
pub fn resolve_settings(paths: &MeshPaths, overrides: SettingsOverrides) -> Result<Settings> {
    let mut settings = load_settings(paths)?;
    settings.apply(overrides);
    settings.validate()?;
    Ok(settings)
}
