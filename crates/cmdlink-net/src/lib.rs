//! Networking for cmdlink.
//!
//! This crate talks to a hosted GraphQL pub/sub API (AWS AppSync or anything
//! speaking its protocols):
//!
//! - **HTTP operations**: queries and mutations POSTed as JSON
//! - **Real-time subscriptions**: the `graphql-ws` WebSocket dialect with
//!   `connection_init`/`start`/`stop` and server keep-alives
//! - **Authorization**: static API keys (`x-api-key`)
//!
//! Logging goes through `tracing` under the `cmdlink_net::graphql` and
//! `cmdlink_net::realtime` targets; install a subscriber in the application
//! to see it.

mod auth;
mod error;
pub mod graphql;

pub use auth::{API_KEY_HEADER, Authorization};
pub use error::{NetworkError, Result};

// Re-export commonly used types at the crate root
pub use graphql::{
    GraphQLClient, GraphQLClientBuilder, GraphQLError, GraphQLRequest, GraphQLResponse,
    SubscriptionMessage, SubscriptionStream,
};
