//! The startup exchange.
//!
//! On start the application subscribes to one channel and, after a fixed
//! delay, publishes one command on that same channel. Every outcome is logged
//! under the `cmdlink::app` target:
//!
//! | event                      | level | message              |
//! |----------------------------|-------|----------------------|
//! | command received           | info  | `Subscription`       |
//! | subscribe or stream failed | error | `Subscription error` |
//! | publish acknowledged       | info  | `Mutation`           |
//! | publish failed             | error | `Mutation error`     |
//!
//! Failures are never retried and never stop the other half of the exchange.

use std::sync::Arc;

use cmdlink_core::{
    ChannelId, Command, CommandChannel, CommandInput, CommandSubscription, ExchangeConfig, Result,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

const TARGET: &str = "cmdlink::app";

/// What happened during an exchange, collected at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeReport {
    /// The acknowledged command, if the publish succeeded before shutdown.
    pub published: Option<Command>,
    /// Commands received on the subscription, in arrival order.
    pub received: Vec<Command>,
    /// Why the subscription failed, if it did.
    pub subscription_error: Option<String>,
}

#[derive(Default)]
struct ListenOutcome {
    received: Vec<Command>,
    error: Option<String>,
}

struct Listener {
    stop: oneshot::Sender<()>,
    task: JoinHandle<ListenOutcome>,
}

/// A running exchange.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) cancels
/// the pending publish and stops the listener.
pub struct ExchangeHandle {
    channel_id: String,
    publisher: Option<JoinHandle<Option<Command>>>,
    listener: Option<Listener>,
}

/// Start the exchange on `channel`.
///
/// Returns at once. The subscription is opened in the background and the
/// publish fires `exchange.publish_delay()` after the call, however long the
/// subscription takes and whether or not it succeeds.
pub fn start<C>(channel: Arc<C>, exchange: &ExchangeConfig) -> ExchangeHandle
where
    C: CommandChannel + 'static,
{
    let deadline = Instant::now() + exchange.publish_delay();
    tracing::info!(
        target: TARGET,
        channel = %exchange.channel_id,
        delay_ms = exchange.publish_delay_ms,
        "Starting exchange"
    );

    let input = CommandInput::new(exchange.channel_id.clone(), exchange.command.clone());
    let publisher = {
        let channel = channel.clone();
        tokio::spawn(async move {
            sleep_until(deadline).await;
            publish(channel.as_ref(), input).await
        })
    };

    let (stop, stop_rx) = oneshot::channel();
    let task = tokio::spawn(listen(channel, exchange.channel_id.clone(), stop_rx));

    ExchangeHandle {
        channel_id: exchange.channel_id.clone(),
        publisher: Some(publisher),
        listener: Some(Listener { stop, task }),
    }
}

async fn subscribe<C: CommandChannel>(channel: &C, channel_id: &str) -> Result<CommandSubscription> {
    let channel_id = ChannelId::new(channel_id)?;
    channel.subscribe(&channel_id).await
}

async fn publish<C: CommandChannel>(channel: &C, input: Result<CommandInput>) -> Option<Command> {
    let result = match input {
        Ok(input) => channel.publish(input).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(command) => {
            tracing::info!(
                target: TARGET,
                channel = %command.channel_id,
                command = %command.command,
                sent_at = %command.sent_at,
                "Mutation"
            );
            Some(command)
        }
        Err(err) => {
            tracing::error!(target: TARGET, "Mutation error: {}", err);
            None
        }
    }
}

async fn listen<C: CommandChannel>(
    channel: Arc<C>,
    channel_id: String,
    mut stop: oneshot::Receiver<()>,
) -> ListenOutcome {
    let mut outcome = ListenOutcome::default();
    let subscribed = tokio::select! {
        biased;

        _ = &mut stop => return outcome,
        subscribed = subscribe(channel.as_ref(), &channel_id) => subscribed,
    };
    let mut subscription = match subscribed {
        Ok(subscription) => subscription,
        Err(err) => {
            tracing::error!(
                target: TARGET,
                channel = %channel_id,
                "Subscription error: {}",
                err
            );
            outcome.error = Some(err.to_string());
            return outcome;
        }
    };

    loop {
        tokio::select! {
            // Drain delivered events before honouring a stop request.
            biased;

            event = subscription.next() => match event {
                Some(Ok(command)) => {
                    tracing::info!(
                        target: TARGET,
                        channel = %command.channel_id,
                        command = %command.command,
                        sent_at = %command.sent_at,
                        "Subscription"
                    );
                    outcome.received.push(command);
                }
                Some(Err(err)) => {
                    tracing::error!(
                        target: TARGET,
                        channel = %subscription.channel_id(),
                        "Subscription error: {}",
                        err
                    );
                    outcome.error = Some(err.to_string());
                    break;
                }
                None => break,
            },
            _ = &mut stop => break,
        }
    }
    subscription.unsubscribe();
    outcome
}

impl ExchangeHandle {
    /// The channel the exchange runs on.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Whether the publish has finished, successfully or not.
    pub fn is_published(&self) -> bool {
        self.publisher.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the pending publish and a subscribe still in flight, unsubscribe
    /// and collect the report.
    pub async fn shutdown(mut self) -> ExchangeReport {
        let published = match self.publisher.take() {
            Some(publisher) => {
                if !publisher.is_finished() {
                    tracing::debug!(target: TARGET, "Cancelling pending publish");
                    publisher.abort();
                }
                publisher.await.ok().flatten()
            }
            None => None,
        };

        let (received, subscription_error) = match self.listener.take() {
            Some(Listener { stop, task }) => {
                let _ = stop.send(());
                match task.await {
                    Ok(outcome) => (outcome.received, outcome.error),
                    Err(err) => (Vec::new(), Some(err.to_string())),
                }
            }
            None => (Vec::new(), None),
        };

        tracing::info!(
            target: TARGET,
            channel = %self.channel_id,
            published = published.is_some(),
            received = received.len(),
            "Exchange shut down"
        );

        ExchangeReport {
            published,
            received,
            subscription_error,
        }
    }
}

impl Drop for ExchangeHandle {
    fn drop(&mut self) {
        if let Some(publisher) = self.publisher.take() {
            publisher.abort();
        }
        if let Some(listener) = self.listener.take() {
            let _ = listener.stop.send(());
        }
    }
}

impl std::fmt::Debug for ExchangeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeHandle")
            .field("channel_id", &self.channel_id)
            .field("published", &self.is_published())
            .field("listening", &self.listener.as_ref().is_some_and(|l| !l.task.is_finished()))
            .finish()
    }
}
