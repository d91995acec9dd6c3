//! The command channel contract.

use std::future::Future;

use tokio::sync::mpsc;

use crate::command::{ChannelId, Command, CommandInput};
use crate::error::Result;

/// A publish/subscribe command channel.
///
/// Subscribers receive a command only when their channel key matches the
/// command's exactly at publish time. Nothing published before a subscription
/// is established is replayed.
pub trait CommandChannel: Send + Sync {
    /// Publish a command. The returned command echoes the input plus the
    /// server-assigned `sent_at`. Failures are returned, never retried.
    fn publish(&self, input: CommandInput) -> impl Future<Output = Result<Command>> + Send;

    /// Subscribe to a channel. Resolves once the subscription is established.
    fn subscribe(
        &self,
        channel_id: &ChannelId,
    ) -> impl Future<Output = Result<CommandSubscription>> + Send;
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// A live subscription to one channel.
///
/// Yields commands until it is unsubscribed or fails. A failure is delivered
/// once as `Some(Err(_))`; every call after that returns `None`. Dropping the
/// subscription unsubscribes it.
pub struct CommandSubscription {
    channel_id: ChannelId,
    events: mpsc::UnboundedReceiver<Result<Command>>,
    cancel: Option<CancelFn>,
    failed: bool,
}

impl CommandSubscription {
    /// Wrap an event receiver and the action that tears the subscription down.
    pub fn new(
        channel_id: ChannelId,
        events: mpsc::UnboundedReceiver<Result<Command>>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel_id,
            events,
            cancel: Some(Box::new(cancel)),
            failed: false,
        }
    }

    /// The channel this subscription listens on.
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Wait for the next command.
    pub async fn next(&mut self) -> Option<Result<Command>> {
        if self.failed {
            return None;
        }
        let event = self.events.recv().await;
        if matches!(event, Some(Err(_))) {
            self.failed = true;
            self.cancel();
        }
        event
    }

    /// Tear the subscription down and release its resources.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        self.events.close();
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for CommandSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for CommandSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSubscription")
            .field("channel_id", &self.channel_id)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
