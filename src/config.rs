//! Client Configuration
//!
//! Parses and validates the TOML client configuration. Every field has a
//! compiled-in default so a config file is optional; CLI flags override
//! whatever the file provides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dss_protocol::Framing;

use crate::policy::{FallbackMode, PlacementRule};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Simulator host
    #[serde(default = "default_host")]
    pub host: String,

    /// Simulator port (default: 50000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username sent during authentication
    #[serde(default = "default_user")]
    pub user: String,

    /// Line terminator for outbound messages ("lf" or "crlf")
    #[serde(default)]
    pub framing: Framing,

    /// Placement rule ("first-fit" or "largest-available")
    #[serde(default)]
    pub policy: PlacementRule,

    /// Behavior when the primary query yields no usable machine
    /// ("requery" or "none")
    #[serde(default)]
    pub fallback: FallbackMode,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-read socket timeout in seconds; absent means block indefinitely.
    /// A timed-out read is treated as end of stream, not an error.
    pub read_timeout_secs: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    dss_protocol::DEFAULT_PORT
}

fn default_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "client".to_string())
}

fn default_connect_timeout() -> u64 {
    10
}

/// Errors that can occur when loading or validating the client configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("user must not be empty")]
    EmptyUser,

    #[error("user must not contain whitespace: '{0}'")]
    UserWithWhitespace(String),

    #[error("port cannot be 0")]
    ZeroPort,

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            framing: Framing::default(),
            policy: PlacementRule::default(),
            fallback: FallbackMode::default(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a specific path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.is_empty() {
            return Err(ConfigError::EmptyUser);
        }

        if self.user.chars().any(|c| c.is_whitespace()) {
            return Err(ConfigError::UserWithWhitespace(self.user.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }

        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 300 {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout_secs".to_string(),
                reason: "must be between 1 and 300".to_string(),
            });
        }

        if let Some(secs) = self.read_timeout_secs {
            if secs == 0 || secs > 3600 {
                return Err(ConfigError::InvalidValue {
                    field: "read_timeout_secs".to_string(),
                    reason: "must be between 1 and 3600".to_string(),
                });
            }
        }

        Ok(())
    }

    /// The simulator address as host:port
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
