use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::debugger::{SessionOptions, VariableLookup};
use crate::error::{BridgeError, Result};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "mi-bridge.toml";

/// Overrides `server` from the environment.
pub const SERVER_ENV: &str = "MI_BRIDGE_SERVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Base URL of the debugger backend.
    pub server: String,
    pub request_timeout_secs: u64,
    pub close_timeout_ms: u64,
    /// Thread passed as `--thread` to stack and variable commands.
    pub thread: u32,
    /// Resolve address and size of every variable after listing frames.
    pub resolve_addresses: bool,
    pub variable_lookup: VariableLookup,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            close_timeout_ms: 500,
            thread: 1,
            resolve_addresses: true,
            variable_lookup: VariableLookup::Commands,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults, then the config file, then the environment.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup(SERVER_ENV).filter(|s| !s.trim().is_empty()) {
            tracing::debug!(server = %server, "backend url taken from environment");
            self.server = server;
        }
    }

    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(self.server.trim())
            .map_err(|e| BridgeError::Config(format!("server {:?}: {}", self.server, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(BridgeError::Config(format!(
                "server {:?}: unsupported scheme {}",
                self.server, other
            ))),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            thread: self.thread,
            resolve_addresses: self.resolve_addresses,
            variable_lookup: self.variable_lookup,
        }
    }
}
