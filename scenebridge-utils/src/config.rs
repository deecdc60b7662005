//! Configuration schema and loader
//!
//! One TOML file is shared by the host binary and the MCP front-end. Every
//! section and field is optional; missing values fall back to defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scenebridge_protocol::{DEFAULT_BACKEND_HOST, DEFAULT_BACKEND_PORT};

use crate::{config_file, BridgeError, Result};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub backend: BackendConfig,
    pub client: ClientConfig,
    pub sse: SseConfig,
    pub logging: LoggingConfig,
}

/// Socket backend settings (host side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Address the backend binds (default: 127.0.0.1)
    pub host: String,
    /// Port the backend binds (default: 9876)
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BACKEND_HOST.into(),
            port: DEFAULT_BACKEND_PORT,
        }
    }
}

impl BackendConfig {
    /// `host:port` string suitable for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bridge client settings (agent side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend host to connect to
    pub host: String,
    /// Backend port to connect to
    pub port: u16,
    /// Per-call response timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Connection attempts before giving up (default: 3)
    pub connect_retries: u32,
    /// Delay between connection attempts in milliseconds (default: 500)
    pub retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BACKEND_HOST.into(),
            port: DEFAULT_BACKEND_PORT,
            timeout_secs: 30,
            connect_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl ClientConfig {
    /// `host:port` string of the backend
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// HTTP+SSE front-end settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Address the SSE server binds (default: 127.0.0.1)
    pub host: String,
    /// Port the SSE server binds (default: 8000)
    pub port: u16,
    /// Seconds between keep-alive comments on open streams (default: 15)
    pub keepalive_secs: u64,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            keepalive_secs: 15,
        }
    }
}

impl SseConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive overriding the preset (e.g. "scenebridge_host=debug")
    pub filter: Option<String>,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<BridgeConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(BridgeConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<BridgeConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<BridgeConfig> {
        toml::from_str(content).map_err(|e| BridgeError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &BridgeConfig) -> Result<()> {
        for (section, host) in [
            ("backend", &config.backend.host),
            ("client", &config.client.host),
            ("sse", &config.sse.host),
        ] {
            if host.trim().is_empty() {
                return Err(BridgeError::config(format!("{}.host must not be empty", section)));
            }
        }

        if config.client.port == 0 {
            return Err(BridgeError::config("client.port must not be 0"));
        }

        if config.client.timeout_secs == 0 {
            return Err(BridgeError::config("client.timeout_secs must be at least 1"));
        }

        if config.client.connect_retries == 0 {
            return Err(BridgeError::config("client.connect_retries must be at least 1"));
        }

        if config.sse.keepalive_secs == 0 {
            return Err(BridgeError::config("sse.keepalive_secs must be at least 1"));
        }

        Ok(())
    }

    /// Load and validate
    pub fn load_and_validate() -> Result<BridgeConfig> {
        let config = Self::load()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load from an explicit path when given, otherwise the default location
    pub fn load_optional(path: Option<&Path>) -> Result<BridgeConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}
