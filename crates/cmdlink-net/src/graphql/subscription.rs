//! GraphQL subscriptions over the AppSync real-time protocol.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use http::HeaderValue;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::realtime::{
    ClientMessage, DEFAULT_KEEP_ALIVE_TIMEOUT, ErrorsPayload, SUBPROTOCOL, ServerMessage,
    StartExtensions, StartPayload,
};
use super::request::GraphQLRequest;
use super::response::GraphQLResponse;
use crate::error::{NetworkError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TARGET: &str = "cmdlink_net::realtime";

/// What a subscription yields.
#[derive(Debug, Clone)]
pub enum SubscriptionMessage {
    /// Data pushed by the server.
    Data(GraphQLResponse),
    /// The server completed the subscription.
    Complete,
    /// The subscription or its connection failed. Nothing follows this.
    Error(String),
}

/// Messages of one subscription.
///
/// Stopping or dropping the stream sends `stop` to the server and releases
/// the subscription slot on the shared connection.
pub struct SubscriptionStream {
    receiver: mpsc::UnboundedReceiver<SubscriptionMessage>,
    subscription_id: String,
    stop_sender: Option<mpsc::UnboundedSender<String>>,
}

impl SubscriptionStream {
    /// Wait for the next message; `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<SubscriptionMessage> {
        self.receiver.recv().await
    }

    /// Stop the subscription. No further messages are delivered.
    pub fn stop(&mut self) {
        self.receiver.close();
        if let Some(sender) = self.stop_sender.take() {
            let _ = sender.send(self.subscription_id.clone());
        }
    }

    /// Protocol id of the subscription on its connection.
    pub fn id(&self) -> &str {
        &self.subscription_id
    }
}

impl Stream for SubscriptionStream {
    type Item = SubscriptionMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SubscriptionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionStream")
            .field("id", &self.subscription_id)
            .finish()
    }
}

/// Everything needed to open a real-time connection.
#[derive(Debug, Clone)]
pub(crate) struct SubscriptionConfig {
    /// Fully built connection URL, including the `header` and `payload` query.
    pub url: String,
    /// Authorization object repeated in every `start` message.
    pub authorization: Value,
    /// Bound on the connect, `connection_ack` and `start_ack` waits.
    pub connection_timeout: Duration,
    /// Keep-alive window used until the server announces one.
    pub keep_alive_timeout: Duration,
    /// Additional headers for the WebSocket handshake.
    pub headers: HashMap<String, String>,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            authorization: Value::Null,
            connection_timeout: Duration::from_secs(30),
            keep_alive_timeout: DEFAULT_KEEP_ALIVE_TIMEOUT,
            headers: HashMap::new(),
        }
    }
}

#[derive(Default)]
struct SubscriptionState {
    subscriptions: HashMap<String, mpsc::UnboundedSender<SubscriptionMessage>>,
    pending: HashMap<String, oneshot::Sender<Result<()>>>,
    next_id: u64,
    closed: bool,
}

impl SubscriptionState {
    /// Allocate an id for a new subscription awaiting its `start_ack`.
    fn register(
        &mut self,
        events: mpsc::UnboundedSender<SubscriptionMessage>,
        ack: oneshot::Sender<Result<()>>,
    ) -> Result<String> {
        if self.closed {
            return Err(NetworkError::ConnectionClosed);
        }
        self.next_id += 1;
        let id = self.next_id.to_string();
        self.subscriptions.insert(id.clone(), events);
        self.pending.insert(id.clone(), ack);
        Ok(id)
    }

    /// Mark the connection dead and fail everything registered on it.
    fn close(&mut self, reason: &str) {
        self.closed = true;
        self.fail_all(reason);
    }

    fn fail_all(&mut self, reason: &str) {
        for (_, tx) in self.subscriptions.drain() {
            let _ = tx.send(SubscriptionMessage::Error(reason.to_string()));
        }
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(NetworkError::ConnectionClosed));
        }
    }
}

/// One real-time connection shared by all subscriptions of a client.
pub(crate) struct SubscriptionConnection {
    config: SubscriptionConfig,
    state: Arc<Mutex<SubscriptionState>>,
    write_tx: mpsc::Sender<ClientMessage>,
    stop_tx: mpsc::UnboundedSender<String>,
}

impl SubscriptionConnection {
    /// Open the WebSocket and complete the `connection_init` handshake.
    pub async fn connect(config: SubscriptionConfig) -> Result<Self> {
        let mut request = config.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );
        for (name, value) in &config.headers {
            headers.insert(
                http::HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let (ws_stream, _) = tokio::time::timeout(
            config.connection_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| NetworkError::Timeout)??;

        let (mut write, mut read) = ws_stream.split();

        send_json(&mut write, &ClientMessage::ConnectionInit).await?;
        let keep_alive = tokio::time::timeout(
            config.connection_timeout,
            Self::await_ack(&mut read),
        )
        .await
        .map_err(|_| NetworkError::Timeout)??
        .unwrap_or(config.keep_alive_timeout);

        tracing::debug!(
            target: TARGET,
            keep_alive_ms = keep_alive.as_millis() as u64,
            "Connection acknowledged"
        );

        let state = Arc::new(Mutex::new(SubscriptionState::default()));
        let (write_tx, write_rx) = mpsc::channel::<ClientMessage>(32);
        let (stop_tx, stop_rx) = mpsc::unbounded_channel::<String>();
        // Dropped by the reader when the connection ends, closing the socket.
        let (reader_alive, reader_gone) = oneshot::channel::<()>();

        tokio::spawn(Self::write_task(
            write,
            write_rx,
            stop_rx,
            reader_gone,
            state.clone(),
        ));
        tokio::spawn(Self::read_task(read, state.clone(), reader_alive, keep_alive));

        Ok(Self {
            config,
            state,
            write_tx,
            stop_tx,
        })
    }

    /// Whether the connection has terminated.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Start a subscription and wait for the server's `start_ack`.
    pub async fn subscribe(&self, request: GraphQLRequest) -> Result<SubscriptionStream> {
        let data = serde_json::to_string(&request)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = oneshot::channel();
        let id = self.state.lock().register(tx, ack_tx)?;

        let start = ClientMessage::Start {
            id: id.clone(),
            payload: StartPayload {
                data,
                extensions: StartExtensions {
                    authorization: self.config.authorization.clone(),
                },
            },
        };

        let stream = SubscriptionStream {
            receiver: rx,
            subscription_id: id.clone(),
            stop_sender: Some(self.stop_tx.clone()),
        };

        if self.write_tx.send(start).await.is_err() {
            return Err(NetworkError::ConnectionClosed);
        }

        match tokio::time::timeout(self.config.connection_timeout, ack_rx).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(target: TARGET, id = %id, "Subscription started");
                Ok(stream)
            }
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_)) => Err(NetworkError::ConnectionClosed),
            // Dropping `stream` sends `stop` for the abandoned id.
            Err(_) => Err(NetworkError::Timeout),
        }
    }

    /// Wait for `connection_ack`, returning the announced keep-alive window.
    async fn await_ack(read: &mut SplitStream<WsStream>) -> Result<Option<Duration>> {
        while let Some(msg) = read.next().await {
            let text = match msg? {
                Message::Text(text) => text,
                Message::Close(_) => return Err(NetworkError::ConnectionClosed),
                _ => continue,
            };
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::ConnectionAck { payload }) => {
                    return Ok(payload.and_then(|p| p.keep_alive_timeout()));
                }
                Ok(ServerMessage::ConnectionError { payload }) => {
                    return Err(NetworkError::GraphQL(ErrorsPayload::into_errors(payload)));
                }
                Ok(ServerMessage::Ka) => {}
                Ok(other) => {
                    return Err(NetworkError::Protocol(format!(
                        "expected connection_ack, got {other:?}"
                    )));
                }
                Err(e) => {
                    tracing::debug!(target: TARGET, "Ignoring unparseable message: {}", e);
                }
            }
        }
        Err(NetworkError::ConnectionClosed)
    }

    async fn write_task(
        mut write: SplitSink<WsStream, Message>,
        mut write_rx: mpsc::Receiver<ClientMessage>,
        mut stop_rx: mpsc::UnboundedReceiver<String>,
        mut reader_gone: oneshot::Receiver<()>,
        state: Arc<Mutex<SubscriptionState>>,
    ) {
        loop {
            let msg = tokio::select! {
                _ = &mut reader_gone => break,
                msg = write_rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
                Some(id) = stop_rx.recv() => {
                    let known = {
                        let mut state = state.lock();
                        state.pending.remove(&id);
                        state.subscriptions.remove(&id).is_some()
                    };
                    if !known {
                        continue;
                    }
                    tracing::debug!(target: TARGET, id = %id, "Stopping subscription");
                    ClientMessage::Stop { id }
                }
            };
            if send_json(&mut write, &msg).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    }

    async fn read_task(
        mut read: SplitStream<WsStream>,
        state: Arc<Mutex<SubscriptionState>>,
        _alive: oneshot::Sender<()>,
        keep_alive: Duration,
    ) {
        let reason = loop {
            let msg = match tokio::time::timeout(keep_alive, read.next()).await {
                Err(_) => break "keep-alive timeout".to_string(),
                Ok(None) => break "connection closed".to_string(),
                Ok(Some(Err(e))) => break e.to_string(),
                Ok(Some(Ok(msg))) => msg,
            };
            match msg {
                Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::ConnectionError { payload }) => {
                        break NetworkError::GraphQL(ErrorsPayload::into_errors(payload))
                            .to_string();
                    }
                    Ok(msg) => Self::handle_message(msg, &state),
                    Err(e) => {
                        tracing::debug!(target: TARGET, "Ignoring unparseable message: {}", e);
                    }
                },
                Message::Close(_) => break "connection closed by server".to_string(),
                _ => {}
            }
        };

        tracing::warn!(target: TARGET, "Real-time connection ended: {}", reason);
        state.lock().close(&reason);
    }

    fn handle_message(msg: ServerMessage, state: &Mutex<SubscriptionState>) {
        let mut state = state.lock();
        match msg {
            ServerMessage::StartAck { id } => {
                if let Some(ack) = state.pending.remove(&id) {
                    let _ = ack.send(Ok(()));
                }
            }
            ServerMessage::Data { id, payload } => {
                if let Some(tx) = state.subscriptions.get(&id) {
                    let _ = tx.send(SubscriptionMessage::Data(payload));
                }
            }
            ServerMessage::Error { id: Some(id), payload } => {
                let errors = ErrorsPayload::into_errors(payload);
                let subscription = state.subscriptions.remove(&id);
                if let Some(ack) = state.pending.remove(&id) {
                    let _ = ack.send(Err(NetworkError::GraphQL(errors)));
                } else if let Some(tx) = subscription {
                    let message = NetworkError::GraphQL(errors).to_string();
                    let _ = tx.send(SubscriptionMessage::Error(message));
                }
            }
            ServerMessage::Error { id: None, payload } => {
                let errors = ErrorsPayload::into_errors(payload);
                tracing::warn!(
                    target: TARGET,
                    "Connection-level error: {}",
                    NetworkError::GraphQL(errors)
                );
            }
            ServerMessage::Complete { id } => {
                if let Some(tx) = state.subscriptions.remove(&id) {
                    let _ = tx.send(SubscriptionMessage::Complete);
                }
            }
            ServerMessage::Ka => {
                tracing::trace!(target: TARGET, "Keep-alive");
            }
            ServerMessage::ConnectionAck { .. } | ServerMessage::ConnectionError { .. } => {}
        }
    }
}

async fn send_json(write: &mut SplitSink<WsStream, Message>, msg: &ClientMessage) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}
