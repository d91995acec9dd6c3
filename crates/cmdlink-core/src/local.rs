//! In-process command channel.
//!
//! [`LocalHub`] plays the role of the hosted backend inside one process: it
//! stamps `sent_at`, fans commands out to exact-match subscribers and never
//! replays. Useful for running the application without an endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::channel::{CommandChannel, CommandSubscription};
use crate::command::{ChannelId, Command, CommandInput};
use crate::error::Result;

const TARGET: &str = "cmdlink_core::local";

#[derive(Default)]
struct HubState {
    subscribers: HashMap<ChannelId, Vec<Subscriber>>,
    next_id: u64,
    last_sent_at: Option<DateTime<Utc>>,
}

struct Subscriber {
    id: u64,
    events: mpsc::UnboundedSender<Result<Command>>,
}

impl HubState {
    /// Millisecond timestamps, strictly increasing across the hub.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(3);
        let sent_at = match self.last_sent_at {
            Some(last) if now <= last => last + TimeDelta::milliseconds(1),
            _ => now,
        };
        self.last_sent_at = Some(sent_at);
        sent_at
    }

    fn remove(&mut self, channel_id: &ChannelId, id: u64) {
        if let Some(subscribers) = self.subscribers.get_mut(channel_id) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                self.subscribers.remove(channel_id);
            }
        }
    }
}

/// An in-process command channel.
///
/// Cloning is cheap; clones share subscribers.
#[derive(Clone, Default)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
}

impl LocalHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a channel.
    pub fn subscriber_count(&self, channel_id: &ChannelId) -> usize {
        self.state
            .lock()
            .subscribers
            .get(channel_id)
            .map_or(0, Vec::len)
    }
}

impl CommandChannel for LocalHub {
    async fn publish(&self, input: CommandInput) -> Result<Command> {
        let mut state = self.state.lock();
        let command = input.into_command(state.stamp());

        // Delivery happens under the lock so every subscriber of a channel
        // observes publishes in the same order.
        let mut delivered = 0;
        if let Some(subscribers) = state.subscribers.get_mut(&command.channel_id) {
            subscribers.retain(|s| !s.events.is_closed());
            for subscriber in subscribers.iter() {
                if subscriber.events.send(Ok(command.clone())).is_ok() {
                    delivered += 1;
                }
            }
        }

        tracing::debug!(
            target: TARGET,
            channel = %command.channel_id,
            sent_at = %command.sent_at,
            delivered,
            "Published command"
        );
        Ok(command)
    }

    async fn subscribe(&self, channel_id: &ChannelId) -> Result<CommandSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = state.next_id;
            state
                .subscribers
                .entry(channel_id.clone())
                .or_default()
                .push(Subscriber { id, events: tx });
            id
        };

        tracing::debug!(target: TARGET, channel = %channel_id, id, "Subscribed");

        let hub: Weak<Mutex<HubState>> = Arc::downgrade(&self.state);
        let channel = channel_id.clone();
        Ok(CommandSubscription::new(channel_id.clone(), rx, move || {
            if let Some(state) = hub.upgrade() {
                state.lock().remove(&channel, id);
                tracing::debug!(target: TARGET, channel = %channel, id, "Unsubscribed");
            }
        }))
    }
}

impl std::fmt::Debug for LocalHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LocalHub")
            .field("channels", &state.subscribers.len())
            .finish()
    }
}
