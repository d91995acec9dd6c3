//! Operations sent to the API.

use serde::Serialize;
use serde_json::{Map, Value};

/// Kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

/// One GraphQL operation with its variables.
///
/// Serializes to `{"query", "variables", "operationName"}`. The same body is
/// POSTed for queries and mutations and embedded as a string in real-time
/// `start` messages.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip)]
    kind: OperationType,
}

impl GraphQLRequest {
    fn of_kind(kind: OperationType, document: impl Into<String>) -> Self {
        Self {
            query: document.into(),
            variables: Map::new(),
            operation_name: None,
            kind,
        }
    }

    pub fn query(document: impl Into<String>) -> Self {
        Self::of_kind(OperationType::Query, document)
    }

    /// A mutation.
    ///
    /// ```ignore
    /// let request = GraphQLRequest::mutation(SEND_COMMAND)
    ///     .operation_name("SendCommand")
    ///     .variable("channelID", "abc123")
    ///     .variable("command", "FOOCOMMAND");
    /// ```
    pub fn mutation(document: impl Into<String>) -> Self {
        Self::of_kind(OperationType::Mutation, document)
    }

    pub fn subscription(document: impl Into<String>) -> Self {
        Self::of_kind(OperationType::Subscription, document)
    }

    /// Add or replace one variable. Values that cannot be represented as
    /// JSON are sent as `null` and left to the server to reject.
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.variables.insert(name.into(), value);
        self
    }

    /// Replace every variable with the fields of a serializable struct or map.
    ///
    /// Anything that does not serialize to a JSON object leaves no variables.
    pub fn variables(mut self, variables: impl Serialize) -> Self {
        self.variables = match serde_json::to_value(variables) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn operation_type(&self) -> OperationType {
        self.kind
    }

    pub fn is_subscription(&self) -> bool {
        self.kind == OperationType::Subscription
    }
}
