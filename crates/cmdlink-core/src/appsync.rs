//! Command channel backed by a hosted AppSync GraphQL API.

use cmdlink_net::{GraphQLClient, GraphQLRequest, GraphQLResponse, SubscriptionMessage};
use tokio::sync::{mpsc, oneshot};

use crate::channel::{CommandChannel, CommandSubscription};
use crate::command::{ChannelId, Command, CommandInput};
use crate::config::EndpointConfig;
use crate::error::{ChannelError, Result};

const TARGET: &str = "cmdlink_core::appsync";

/// Mutation creating a command.
pub const SEND_COMMAND: &str = "mutation SendCommand($channelID: ID!, $command: String!) {
  sendCommand(channelID: $channelID, command: $command) {
    channelID
    command
    sentAt
  }
}";

/// Subscription to commands on one channel.
pub const SUBSCRIBE_TO_CHANNEL_COMMANDS: &str = "subscription SubscribeToChannelCommands($channelID: ID!) {
  receivedCommand(channelID: $channelID) {
    channelID
    command
    sentAt
  }
}";

const SEND_COMMAND_FIELD: &str = "sendCommand";
const RECEIVED_COMMAND_FIELD: &str = "receivedCommand";

/// A [`CommandChannel`] talking to the hosted API.
#[derive(Debug, Clone)]
pub struct AppSyncChannel {
    client: GraphQLClient,
}

impl AppSyncChannel {
    /// Wrap an existing GraphQL client.
    pub fn new(client: GraphQLClient) -> Self {
        Self { client }
    }

    /// Build a client from static endpoint configuration.
    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        config.validate()?;
        let mut builder =
            GraphQLClient::builder(&config.graphql_endpoint).authorization(config.authorization()?);
        if let Some(ref realtime) = config.realtime_endpoint {
            builder = builder.realtime_url(realtime);
        }
        tracing::debug!(
            target: TARGET,
            endpoint = %config.graphql_endpoint,
            region = %config.region,
            "Configured AppSync channel"
        );
        Ok(Self::new(builder.build()?))
    }

    /// The underlying GraphQL client.
    pub fn client(&self) -> &GraphQLClient {
        &self.client
    }
}

fn decode_received(response: &GraphQLResponse) -> Result<Command> {
    Ok(response.field::<Command>(RECEIVED_COMMAND_FIELD)?)
}

impl CommandChannel for AppSyncChannel {
    async fn publish(&self, input: CommandInput) -> Result<Command> {
        let request = GraphQLRequest::mutation(SEND_COMMAND)
            .operation_name("SendCommand")
            .variables(&input);
        let response = self.client.execute(request).await?;
        let command: Command = response.field(SEND_COMMAND_FIELD)?;
        tracing::debug!(
            target: TARGET,
            channel = %command.channel_id,
            sent_at = %command.sent_at,
            "Command acknowledged"
        );
        Ok(command)
    }

    async fn subscribe(&self, channel_id: &ChannelId) -> Result<CommandSubscription> {
        let request = GraphQLRequest::subscription(SUBSCRIBE_TO_CHANNEL_COMMANDS)
            .operation_name("SubscribeToChannelCommands")
            .variable("channelID", channel_id);
        let mut stream = self.client.subscribe(request).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let channel = channel_id.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        stream.stop();
                        break;
                    }
                    message = stream.next() => match message {
                        Some(SubscriptionMessage::Data(response)) => match decode_received(&response) {
                            Ok(command) => {
                                if tx.send(Ok(command)).is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                tracing::warn!(
                                    target: TARGET,
                                    channel = %channel,
                                    "Skipping undecodable event: {}",
                                    err
                                );
                            }
                        },
                        Some(SubscriptionMessage::Error(reason)) => {
                            let _ = tx.send(Err(ChannelError::Subscription(reason)));
                            break;
                        }
                        Some(SubscriptionMessage::Complete) | None => break,
                    }
                }
            }
            tracing::debug!(target: TARGET, channel = %channel, "Subscription pump finished");
        });

        Ok(CommandSubscription::new(channel_id.clone(), rx, move || {
            let _ = cancel_tx.send(());
        }))
    }
}
