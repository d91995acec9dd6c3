//! Core of cmdlink: commands, channels and static configuration.
//!
//! A [`CommandChannel`] publishes [`Command`]s on a [`ChannelId`] and lets
//! callers subscribe to the commands later published on the same key.
//! Two implementations are provided:
//!
//! - [`AppSyncChannel`]: the hosted GraphQL API (`SendCommand` mutation,
//!   `SubscribeToChannelCommands` subscription)
//! - [`LocalHub`]: an in-process stand-in with the same delivery rules
//!
//! # Example
//!
//! ```ignore
//! use cmdlink_core::{AppConfig, AppSyncChannel, ChannelId, CommandChannel, CommandInput};
//!
//! let config = AppConfig::from_env()?;
//! let channel = AppSyncChannel::from_config(&config.endpoint)?;
//!
//! let mut subscription = channel.subscribe(&ChannelId::new("abc123")?).await?;
//! channel.publish(CommandInput::new("abc123", "FOOCOMMAND")?).await?;
//!
//! while let Some(event) = subscription.next().await {
//!     println!("{:?}", event?);
//! }
//! ```

pub mod appsync;
mod channel;
mod command;
pub mod config;
mod error;
mod local;

pub use appsync::AppSyncChannel;
pub use channel::{CommandChannel, CommandSubscription};
pub use command::{ChannelId, Command, CommandInput};
pub use config::{AppConfig, AuthenticationType, EndpointConfig, ExchangeConfig};
pub use error::{ChannelError, ConfigError, Result};
pub use local::LocalHub;
