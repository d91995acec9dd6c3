//! GraphQL client for mutations and real-time subscriptions.
//!
//! This module provides a GraphQL client that supports:
//! - Query and mutation execution over HTTP
//! - Variables via JSON
//! - Subscriptions over the AppSync real-time WebSocket protocol
//!
//! # Example
//!
//! ```ignore
//! use cmdlink_net::graphql::{GraphQLClient, GraphQLRequest};
//!
//! let client = GraphQLClient::builder("https://xxxx.appsync-api.us-east-1.amazonaws.com/graphql")
//!     .api_key("da2-xxxx")
//!     .build()?;
//!
//! let mutation = GraphQLRequest::mutation(r#"
//!     mutation SendCommand($channelID: ID!, $command: String!) {
//!         sendCommand(channelID: $channelID, command: $command) {
//!             channelID
//!             command
//!             sentAt
//!         }
//!     }
//! "#)
//! .variable("channelID", "abc123")
//! .variable("command", "FOOCOMMAND");
//!
//! let response = client.execute(mutation).await?;
//! ```
//!
//! # Subscriptions
//!
//! All subscriptions of one client share a single WebSocket. `subscribe`
//! returns once the server has acknowledged the subscription, so events
//! published after it returns are delivered. Nothing is replayed and a
//! failed connection is not re-established for existing streams.
//!
//! ```ignore
//! let subscription = GraphQLRequest::subscription(r#"
//!     subscription SubscribeToChannelCommands($channelID: ID!) {
//!         receivedCommand(channelID: $channelID) { channelID command sentAt }
//!     }
//! "#)
//! .variable("channelID", "abc123");
//!
//! let mut stream = client.subscribe(subscription).await?;
//! while let Some(message) = stream.next().await {
//!     println!("{message:?}");
//! }
//! ```

mod client;
mod realtime;
mod request;
mod response;
mod subscription;

pub use client::{GraphQLClient, GraphQLClientBuilder};
pub use realtime::{DEFAULT_KEEP_ALIVE_TIMEOUT, SUBPROTOCOL, realtime_url_for};
pub use request::{GraphQLRequest, OperationType};
pub use response::{GraphQLError, GraphQLResponse};
pub use subscription::{SubscriptionMessage, SubscriptionStream};
