//! Error types for the core crate.

use std::path::PathBuf;

use cmdlink_net::NetworkError;
use thiserror::Error;

/// Errors surfaced by command channel operations.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// The publish or subscribe input was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The channel could not be built from its configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The transport failed.
    #[error("network error: {0}")]
    Network(NetworkError),

    /// The backend rejected the operation.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The backend answered with a payload that does not describe a command.
    #[error("malformed command payload: {0}")]
    Decode(String),

    /// The subscription failed; no further events follow.
    #[error("subscription failed: {0}")]
    Subscription(String),
}

impl From<NetworkError> for ChannelError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::GraphQL(errors) if errors.is_empty() => {
                Self::Rejected("unknown error".into())
            }
            NetworkError::GraphQL(errors) => Self::Rejected(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            NetworkError::Json(msg) | NetworkError::InvalidBody(msg) => Self::Decode(msg),
            other => Self::Network(other),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {message}", path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error message.
        message: String,
    },

    /// TOML syntax or shape error.
    #[error("invalid TOML configuration: {0}")]
    Toml(String),

    /// JSON syntax or shape error.
    #[error("invalid JSON configuration: {0}")]
    Json(String),

    /// The GraphQL endpoint is not a usable URL.
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint {
        /// The configured URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required value is missing or empty.
    #[error("missing configuration value: {0}")]
    MissingField(&'static str),

    /// The authentication type is recognized but not supported.
    #[error("unsupported authentication type: {0}")]
    UnsupportedAuthentication(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Toml(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
