//! Commands and the channels that carry them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};

/// Opaque key correlating publishers and subscribers.
///
/// Any non-empty string is a valid channel. Channels have no lifecycle of
/// their own: they exist only as a partition value on commands and
/// subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a channel id, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ChannelError::InvalidInput(
                "channelID must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    /// The channel key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ChannelError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A command as persisted and relayed by the backend.
///
/// Immutable once created; `sent_at` is assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Channel the command was published on.
    #[serde(rename = "channelID")]
    pub channel_id: ChannelId,
    /// Free-text command body.
    pub command: String,
    /// Server-assigned publish time.
    #[serde(rename = "sentAt")]
    pub sent_at: DateTime<Utc>,
}

/// Variables of the `SendCommand` mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandInput {
    /// Target channel.
    #[serde(rename = "channelID")]
    pub channel_id: ChannelId,
    /// Command body.
    pub command: String,
}

impl CommandInput {
    /// Build input from a channel key and a command body.
    pub fn new(channel_id: impl Into<String>, command: impl Into<String>) -> Result<Self> {
        Ok(Self {
            channel_id: ChannelId::new(channel_id)?,
            command: command.into(),
        })
    }

    /// Decode input from a raw GraphQL variables object.
    ///
    /// Missing, null or mistyped fields are rejected as
    /// [`ChannelError::InvalidInput`].
    pub fn from_variables(variables: Value) -> Result<Self> {
        serde_json::from_value(variables).map_err(|e| ChannelError::InvalidInput(e.to_string()))
    }

    /// The command this input becomes once the backend stamps it.
    pub fn into_command(self, sent_at: DateTime<Utc>) -> Command {
        Command {
            channel_id: self.channel_id,
            command: self.command,
            sent_at,
        }
    }
}
