//! AppSync real-time protocol messages and endpoint helpers.
//!
//! The protocol runs over the `graphql-ws` WebSocket subprotocol:
//!
//! ```text
//! client                         server
//!   connection_init      ->
//!                        <-      connection_ack {connectionTimeoutMs}
//!                        <-      ka                    (periodic)
//!   start {id, payload}  ->
//!                        <-      start_ack {id}
//!                        <-      data {id, payload}    (per event)
//!   stop {id}            ->
//!                        <-      complete {id}
//! ```

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::response::{GraphQLError, GraphQLResponse};
use crate::error::{NetworkError, Result};

/// WebSocket subprotocol spoken by the real-time endpoint.
pub const SUBPROTOCOL: &str = "graphql-ws";

/// Keep-alive window assumed until the server announces its own.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Base64 of the empty JSON object, the fixed `payload` query parameter.
const EMPTY_PAYLOAD: &str = "e30=";

/// Client -> server messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientMessage {
    ConnectionInit,
    Start { id: String, payload: StartPayload },
    Stop { id: String },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StartPayload {
    /// The serialized `{query, variables}` request.
    pub data: String,
    pub extensions: StartExtensions,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StartExtensions {
    pub authorization: Value,
}

/// Server -> client messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerMessage {
    ConnectionAck {
        #[serde(default)]
        payload: Option<AckPayload>,
    },
    ConnectionError {
        #[serde(default)]
        payload: Option<ErrorsPayload>,
    },
    Ka,
    StartAck {
        id: String,
    },
    Data {
        id: String,
        payload: GraphQLResponse,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        payload: Option<ErrorsPayload>,
    },
    Complete {
        id: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AckPayload {
    #[serde(rename = "connectionTimeoutMs")]
    pub connection_timeout_ms: Option<u64>,
}

impl AckPayload {
    pub(crate) fn keep_alive_timeout(&self) -> Option<Duration> {
        self.connection_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorsPayload {
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

impl ErrorsPayload {
    pub(crate) fn into_errors(payload: Option<Self>) -> Vec<GraphQLError> {
        payload.map(|p| p.errors).unwrap_or_default()
    }
}

/// Derive the real-time endpoint from a GraphQL HTTP endpoint.
///
/// Hosted endpoints move from `appsync-api` to `appsync-realtime-api`; any
/// other URL only has its scheme switched to `ws`/`wss`.
pub fn realtime_url_for(http_url: &str) -> String {
    let switched = if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_url.to_string()
    };

    if switched.contains(".appsync-api.") {
        switched.replacen(".appsync-api.", ".appsync-realtime-api.", 1)
    } else {
        switched
    }
}

/// The `host[:port]` the authorization payload refers to.
pub(crate) fn authority_of(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| NetworkError::InvalidUrl(format!("{url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Build the URL used to open the real-time connection.
pub(crate) fn connect_url(realtime_url: &str, authorization: &Value) -> Result<Url> {
    let mut url = Url::parse(realtime_url)?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(NetworkError::InvalidUrl(format!(
            "real-time endpoint must use ws:// or wss://, got {realtime_url}"
        )));
    }
    let header = STANDARD.encode(serde_json::to_vec(authorization)?);
    url.query_pairs_mut()
        .append_pair("header", &header)
        .append_pair("payload", EMPTY_PAYLOAD);
    Ok(url)
}
