//! cmdlink - publish commands to channels on a hosted GraphQL API and listen
//! for the commands published on them.
//!
//! This is the umbrella crate that re-exports the public API of the workspace
//! and hosts the startup exchange run by the `cmdlink` binary.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cmdlink::{AppConfig, AppSyncChannel, app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env()?;
//!     let channel = Arc::new(AppSyncChannel::from_config(&config.endpoint)?);
//!
//!     let exchange = app::start(channel, &config.exchange);
//!     tokio::signal::ctrl_c().await?;
//!     exchange.shutdown().await;
//!     Ok(())
//! }
//! ```

pub use cmdlink_core::*;

/// GraphQL transport.
pub mod net {
    pub use cmdlink_net::*;
}

pub mod app;

pub use app::{ExchangeHandle, ExchangeReport};
