//! HTTP execution and subscription entry point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use super::realtime::{self, DEFAULT_KEEP_ALIVE_TIMEOUT};
use super::request::GraphQLRequest;
use super::response::GraphQLResponse;
use super::subscription::{SubscriptionConfig, SubscriptionConnection, SubscriptionStream};
use crate::auth::Authorization;
use crate::error::{NetworkError, Result};

const TARGET: &str = "cmdlink_net::graphql";

/// Configures a [`GraphQLClient`].
pub struct GraphQLClientBuilder {
    http_url: String,
    realtime_url: Option<String>,
    authorization: Option<Authorization>,
    default_headers: HashMap<String, String>,
    request_timeout: Option<Duration>,
    connection_timeout: Duration,
    keep_alive_timeout: Duration,
}

impl GraphQLClientBuilder {
    /// Start from the `http(s)` GraphQL endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http_url: url.into(),
            realtime_url: None,
            authorization: None,
            default_headers: HashMap::new(),
            request_timeout: None,
            connection_timeout: Duration::from_secs(30),
            keep_alive_timeout: DEFAULT_KEEP_ALIVE_TIMEOUT,
        }
    }

    /// Use an explicit real-time endpoint instead of deriving one with
    /// [`realtime_url_for`](super::realtime_url_for).
    pub fn realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_url = Some(url.into());
        self
    }

    /// Shorthand for `authorization(Authorization::api_key(key))`.
    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.authorization(Authorization::api_key(key))
    }

    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Extra header sent with every POST and with the WebSocket upgrade.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Bound each HTTP operation. Unbounded unless set.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Bound on the WebSocket connect and on waiting for `connection_ack` and
    /// `start_ack`. Defaults to 30 s.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Silence tolerated before the connection is declared dead, when the
    /// server's `connection_ack` does not announce one.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<GraphQLClient> {
        let parsed = Url::parse(&self.http_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidUrl(format!(
                "expected an http(s) endpoint, got {}",
                self.http_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let realtime_url = self
            .realtime_url
            .unwrap_or_else(|| realtime::realtime_url_for(&self.http_url));

        // The authorization payload names the HTTP host, not the real-time one.
        let host = realtime::authority_of(&parsed)?;
        let realtime_authorization = match &self.authorization {
            Some(auth) => auth.realtime_payload(&host),
            None => serde_json::json!({ "host": host }),
        };

        let mut headers = self.default_headers;
        if let Some(ref auth) = self.authorization {
            for (name, value) in auth.http_headers() {
                headers.insert(name.to_string(), value);
            }
        }

        Ok(GraphQLClient {
            inner: Arc::new(GraphQLClientInner {
                http_client,
                http_url: self.http_url,
                realtime_url,
                headers,
                realtime_authorization,
                connection_timeout: self.connection_timeout,
                keep_alive_timeout: self.keep_alive_timeout,
                subscription_connection: Mutex::new(None),
            }),
        })
    }
}

struct GraphQLClientInner {
    http_client: reqwest::Client,
    http_url: String,
    realtime_url: String,
    headers: HashMap<String, String>,
    realtime_authorization: Value,
    connection_timeout: Duration,
    keep_alive_timeout: Duration,
    subscription_connection: Mutex<Option<Arc<SubscriptionConnection>>>,
}

/// A GraphQL client for mutations and subscriptions against an AppSync-style API.
///
/// Cloning is cheap; clones share the HTTP pool and the real-time connection.
///
/// # Example
///
/// ```ignore
/// use cmdlink_net::graphql::{GraphQLClient, GraphQLRequest};
///
/// let client = GraphQLClient::builder("https://xxxx.appsync-api.us-east-1.amazonaws.com/graphql")
///     .api_key("da2-xxxx")
///     .build()?;
///
/// let mut stream = client
///     .subscribe(GraphQLRequest::subscription(DOCUMENT).variable("channelID", "abc123"))
///     .await?;
/// while let Some(message) = stream.next().await {
///     println!("{message:?}");
/// }
/// ```
#[derive(Clone)]
pub struct GraphQLClient {
    inner: Arc<GraphQLClientInner>,
}

impl GraphQLClient {
    pub fn builder(url: impl Into<String>) -> GraphQLClientBuilder {
        GraphQLClientBuilder::new(url)
    }

    pub fn url(&self) -> &str {
        &self.inner.http_url
    }

    /// Real-time endpoint, without the authorization query.
    pub fn realtime_url(&self) -> &str {
        &self.inner.realtime_url
    }

    /// POST a query or mutation.
    ///
    /// A 2xx body is returned as-is, `errors` included; decode it with
    /// [`GraphQLResponse::field`]. Non-2xx statuses are
    /// [`NetworkError::HttpStatus`].
    pub async fn execute(&self, request: GraphQLRequest) -> Result<GraphQLResponse> {
        if request.is_subscription() {
            return Err(NetworkError::Request(
                "subscriptions go through subscribe()".into(),
            ));
        }

        tracing::debug!(
            target: TARGET,
            operation = ?request.operation_type(),
            name = request.operation_name.as_deref().unwrap_or(""),
            "Executing GraphQL operation"
        );

        let mut req = self
            .inner
            .http_client
            .post(&self.inner.http_url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::ACCEPT, "application/json");

        for (name, value) in &self.inner.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.body(serde_json::to_vec(&request)?).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                message: (!body.is_empty()).then_some(body),
            });
        }

        let bytes = response.bytes().await?;
        let graphql_response: GraphQLResponse = serde_json::from_slice(&bytes)?;
        Ok(graphql_response)
    }

    /// Run a mutation and decode one field of its result.
    pub async fn mutate_field<T: DeserializeOwned>(
        &self,
        mutation: impl Into<String>,
        variables: impl Serialize,
        field: &str,
    ) -> Result<T> {
        let request = GraphQLRequest::mutation(mutation).variables(variables);
        let response = self.execute(request).await?;
        response.field(field)
    }

    /// Start a subscription on the shared real-time connection.
    ///
    /// The connection is opened on first use and reopened if the previous one
    /// died. Resolves once the server sends `start_ack`.
    pub async fn subscribe(&self, request: GraphQLRequest) -> Result<SubscriptionStream> {
        if !request.is_subscription() {
            return Err(NetworkError::Request(
                "subscribe() only accepts subscription operations".into(),
            ));
        }

        let connection = self.subscription_connection().await?;
        connection.subscribe(request).await
    }

    async fn subscription_connection(&self) -> Result<Arc<SubscriptionConnection>> {
        let mut guard = self.inner.subscription_connection.lock().await;
        if let Some(connection) = guard.as_ref()
            && !connection.is_closed()
        {
            return Ok(connection.clone());
        }

        let url = realtime::connect_url(
            &self.inner.realtime_url,
            &self.inner.realtime_authorization,
        )?;
        tracing::debug!(target: TARGET, url = %self.inner.realtime_url, "Opening real-time connection");

        let config = SubscriptionConfig {
            url: url.into(),
            authorization: self.inner.realtime_authorization.clone(),
            connection_timeout: self.inner.connection_timeout,
            keep_alive_timeout: self.inner.keep_alive_timeout,
            headers: self.inner.headers.clone(),
        };
        let connection = Arc::new(SubscriptionConnection::connect(config).await?);
        *guard = Some(connection.clone());
        Ok(connection)
    }
}

impl std::fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("http_url", &self.inner.http_url)
            .field("realtime_url", &self.inner.realtime_url)
            .finish()
    }
}
