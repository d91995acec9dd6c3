//! Error types for the networking crate.

use thiserror::Error;

use crate::graphql::GraphQLError;

/// Failures of HTTP operations and of the real-time connection.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    /// The request could not be sent, or was misused.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// An endpoint is not a usable URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request or handshake timed out.
    #[error("Request timed out")]
    Timeout,

    /// The server could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A configured header is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A body or payload did not have the expected JSON shape.
    #[error("JSON error: {0}")]
    Json(String),

    /// A response lacked the data it should carry.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    /// Non-2xx answer to an HTTP operation.
    #[error("HTTP {status}{}", status_suffix(.message))]
    HttpStatus {
        status: u16,
        /// Response body, when there was one.
        message: Option<String>,
    },

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The server sent something the real-time protocol does not allow.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered with GraphQL errors.
    #[error("GraphQL error: {}", join_messages(.0))]
    GraphQL(Vec<GraphQLError>),

    /// The real-time connection is gone.
    #[error("Connection closed")]
    ConnectionClosed,
}

fn status_suffix(message: &Option<String>) -> String {
    match message {
        Some(msg) => format!(": {msg}"),
        None => String::new(),
    }
}

fn join_messages(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "unknown error".into();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::InvalidBody(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for NetworkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            WsError::Url(e) => Self::InvalidUrl(e.to_string()),
            WsError::Io(e) => Self::Connection(e.to_string()),
            other => Self::WebSocket(other.to_string()),
        }
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
