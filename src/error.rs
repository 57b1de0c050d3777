//! Top-level error type and exit code mapping.

use std::io;

use crate::bench::BenchError;
use crate::config::ConfigError;
use crate::session::SessionError;

/// Errors surfaced by the `dss` binary.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("bench error: {0}")]
    Bench(#[from] BenchError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::Config(_) => 1,
            ClientError::Connect { .. } => 20,
            ClientError::Session(e) => e.exit_code(),
            ClientError::Bench(_) => 50,
            ClientError::Io(_) => 1,
            ClientError::Serialization(_) => 1,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let connect = ClientError::Connect {
            addr: "localhost:50000".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(connect.exit_code(), 20);

        let config = ClientError::Config(ConfigError::EmptyUser);
        assert_eq!(config.exit_code(), 1);
    }
}
