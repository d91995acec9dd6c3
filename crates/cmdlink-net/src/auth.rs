//! Request authorization for AppSync-style GraphQL endpoints.

use std::fmt;

use serde_json::{Map, Value};

/// Header carrying the API key on HTTP requests and real-time messages.
pub const API_KEY_HEADER: &str = "x-api-key";

/// How requests to the GraphQL endpoint are authorized.
///
/// Only static API keys are supported. Credential flows (IAM signing,
/// user pools, OIDC token refresh) are left to the caller.
#[derive(Clone, PartialEq, Eq)]
pub enum Authorization {
    /// A static API key sent as `x-api-key`.
    ApiKey(String),
}

impl Authorization {
    /// Create API key authorization.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(key.into())
    }

    /// Headers to attach to every HTTP operation.
    pub(crate) fn http_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::ApiKey(key) => vec![(API_KEY_HEADER, key.clone())],
        }
    }

    /// The authorization object used by the real-time protocol.
    ///
    /// It is sent base64-encoded in the connection URL and verbatim in the
    /// `extensions.authorization` of every `start` message.
    pub(crate) fn realtime_payload(&self, host: &str) -> Value {
        let mut map = Map::new();
        map.insert("host".into(), Value::String(host.to_string()));
        match self {
            Self::ApiKey(key) => {
                map.insert(API_KEY_HEADER.into(), Value::String(key.clone()));
            }
        }
        Value::Object(map)
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}
