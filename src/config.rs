//! Service configuration, loaded from a TOML file or defaulted.
//!
//! ```toml
//! bind_addr = "127.0.0.1:8080"
//! storage_timeout_ms = 500
//! log_filter = "info"
//! ```

use crate::booking::DEFAULT_STORAGE_TIMEOUT;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "COURSE_BOOKING_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// Upper bound for a single durable booking write.
    pub storage_timeout_ms: u64,
    /// Default `env_logger` filter; `RUST_LOG` takes precedence.
    pub log_filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            storage_timeout_ms: DEFAULT_STORAGE_TIMEOUT.as_millis() as u64,
            log_filter: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads the file named by [`CONFIG_ENV`], or falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|_| ConfigError::BindAddr(self.bind_addr.clone()))
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}
