//! Static endpoint and exchange configuration.
//!
//! Configuration is read once at startup and never changes afterwards.
//!
//! ```toml
//! [endpoint]
//! graphql_endpoint = "https://xxxxxx.appsync-api.us-east-1.amazonaws.com/graphql"
//! region = "us-east-1"
//! authentication_type = "API_KEY"
//! api_key = "da2-xxxxxxxxxxxxxxxxxxxxxxxxxx"
//!
//! [exchange]
//! channel_id = "abc123"
//! command = "FOOCOMMAND"
//! publish_delay_ms = 1000
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cmdlink_net::Authorization;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CMDLINK_CONFIG";

/// Environment variable overriding the configured API key.
pub const API_KEY_ENV: &str = "CMDLINK_API_KEY";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "cmdlink.toml";

/// How the hosted API authorizes callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationType {
    /// Static API key.
    ApiKey,
    /// SigV4-signed IAM credentials.
    AwsIam,
    /// Cognito user pool tokens.
    AmazonCognitoUserPools,
    /// OpenID Connect tokens.
    OpenidConnect,
    /// Lambda authorizer.
    AwsLambda,
}

impl fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ApiKey => "API_KEY",
            Self::AwsIam => "AWS_IAM",
            Self::AmazonCognitoUserPools => "AMAZON_COGNITO_USER_POOLS",
            Self::OpenidConnect => "OPENID_CONNECT",
            Self::AwsLambda => "AWS_LAMBDA",
        })
    }
}

/// Where the GraphQL API lives and how to authorize against it.
///
/// Accepts both the snake_case keys used in TOML files and the Amplify
/// `aws_appsync_*` keys.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// GraphQL HTTPS endpoint.
    #[serde(alias = "aws_appsync_graphqlEndpoint")]
    pub graphql_endpoint: String,
    /// Region the API is deployed in.
    #[serde(alias = "aws_appsync_region")]
    pub region: String,
    /// Authorization mode of the API.
    #[serde(alias = "aws_appsync_authenticationType")]
    pub authentication_type: AuthenticationType,
    /// API key, required for [`AuthenticationType::ApiKey`].
    #[serde(default, alias = "aws_appsync_apiKey")]
    pub api_key: Option<String>,
    /// Explicit real-time endpoint; derived from `graphql_endpoint` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime_endpoint: Option<String>,
}

impl EndpointConfig {
    /// Parse an Amplify-style JSON object.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a usable endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            url: self.graphql_endpoint.clone(),
            reason,
        };
        let url = Url::parse(&self.graphql_endpoint).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingField("region"));
        }
        self.authorization().map(|_| ())
    }

    /// Authorization derived from the configured mode.
    pub fn authorization(&self) -> Result<Authorization, ConfigError> {
        match self.authentication_type {
            AuthenticationType::ApiKey => match self.api_key.as_deref() {
                Some(key) if !key.trim().is_empty() => Ok(Authorization::api_key(key)),
                _ => Err(ConfigError::MissingField("api_key")),
            },
            other => Err(ConfigError::UnsupportedAuthentication(other.to_string())),
        }
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("graphql_endpoint", &self.graphql_endpoint)
            .field("region", &self.region)
            .field("authentication_type", &self.authentication_type)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("realtime_endpoint", &self.realtime_endpoint)
            .finish()
    }
}

/// The demo exchange the application performs at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Channel to subscribe to and publish on.
    pub channel_id: String,
    /// Command body to publish.
    pub command: String,
    /// Delay between startup and the publish, in milliseconds.
    pub publish_delay_ms: u64,
}

impl ExchangeConfig {
    /// Delay before the command is published.
    pub fn publish_delay(&self) -> Duration {
        Duration::from_millis(self.publish_delay_ms)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            channel_id: "abc123".into(),
            command: "FOOCOMMAND".into(),
            publish_delay_ms: 1000,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hosted API endpoint.
    pub endpoint: EndpointConfig,
    /// Startup exchange.
    #[serde(default)]
    pub exchange: ExchangeConfig,
}

impl AppConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, applying environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config: Self = toml::from_str(&text)?;
        config.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
        config.validate()?;
        tracing::debug!(
            target: "cmdlink_core::config",
            path = %path.display(),
            endpoint = %config.endpoint.graphql_endpoint,
            region = %config.endpoint.region,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load from the path in `CMDLINK_CONFIG`, or `cmdlink.toml`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(path)
    }

    /// Replace the API key when an override is present and non-empty.
    pub fn apply_api_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.endpoint.api_key = Some(key);
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint.validate()?;
        if self.exchange.channel_id.is_empty() {
            return Err(ConfigError::MissingField("exchange.channel_id"));
        }
        Ok(())
    }
}
