//! Results returned by the API.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NetworkError;

/// An entry of the `errors` array.
///
/// AppSync adds `errorType` and `errorInfo` to the standard fields; other
/// members (`locations`, `data`) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    #[serde(default)]
    pub message: String,
    /// Classification such as `UnauthorizedException` or `MappingTemplate`.
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(rename = "errorInfo", default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<Value>,
    /// Response path of the failing field; names and list indices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            error_info: None,
            path: Vec::new(),
        }
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_type {
            Some(kind) => write!(f, "{kind}: {}", self.message)?,
            None => f.write_str(&self.message)?,
        }
        if !self.path.is_empty() {
            let path: Vec<String> = self
                .path
                .iter()
                .map(|segment| match segment {
                    Value::String(name) => name.clone(),
                    other => other.to_string(),
                })
                .collect();
            write!(f, " [{}]", path.join("/"))?;
        }
        Ok(())
    }
}

impl std::error::Error for GraphQLError {}

/// Body of an HTTP operation result, or the payload of a real-time `data`
/// message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl GraphQLResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Decode one top-level field of `data`.
    ///
    /// Any entry in `errors` fails the whole call with
    /// [`NetworkError::GraphQL`], even when partial data is present.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<T, NetworkError> {
        if self.has_errors() {
            return Err(NetworkError::GraphQL(self.errors.clone()));
        }
        let value = self
            .data
            .as_ref()
            .and_then(Value::as_object)
            .ok_or_else(|| NetworkError::InvalidBody("response has no data object".into()))?
            .get(name)
            .ok_or_else(|| NetworkError::InvalidBody(format!("response has no `{name}` field")))?;
        T::deserialize(value).map_err(|e| NetworkError::Json(format!("`{name}`: {e}")))
    }
}
