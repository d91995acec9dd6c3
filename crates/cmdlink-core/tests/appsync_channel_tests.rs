//! AppSync channel tests against mocked HTTP and real-time endpoints.

use std::net::SocketAddr;
use std::time::Duration;

use cmdlink_core::{AppSyncChannel, ChannelError, ChannelId, CommandChannel, CommandInput};
use cmdlink_net::GraphQLClient;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn channel_for(url: String) -> AppSyncChannel {
    let client = GraphQLClient::builder(url)
        .api_key("da2-test")
        .connection_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    AppSyncChannel::new(client)
}

// ============================================================================
// SendCommand
// ============================================================================

#[tokio::test]
async fn test_publish_returns_server_command() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("x-api-key", "da2-test"))
        .and(body_partial_json(json!({
            "operationName": "SendCommand",
            "variables": {"channelID": "abc123", "command": "FOOCOMMAND"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"sendCommand": {
                "channelID": "abc123",
                "command": "FOOCOMMAND",
                "sentAt": "2026-10-19T12:00:01.000Z"
            }}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = channel_for(format!("{}/graphql", server.uri()));
    let command = channel
        .publish(CommandInput::new("abc123", "FOOCOMMAND").unwrap())
        .await
        .unwrap();

    assert_eq!(command.channel_id.as_str(), "abc123");
    assert_eq!(command.command, "FOOCOMMAND");
    assert_eq!(command.sent_at.to_rfc3339(), "2026-10-19T12:00:01+00:00");
}

#[tokio::test]
async fn test_publish_rejected_by_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"sendCommand": null},
            "errors": [{
                "errorType": "UnauthorizedException",
                "message": "You are not authorized to make this call."
            }]
        })))
        .mount(&server)
        .await;

    let channel = channel_for(format!("{}/graphql", server.uri()));
    match channel
        .publish(CommandInput::new("abc123", "FOOCOMMAND").unwrap())
        .await
    {
        Err(ChannelError::Rejected(message)) => {
            assert!(message.contains("UnauthorizedException"));
            assert!(message.contains("not authorized"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_publish_http_failure_is_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("UnauthorizedException"))
        .mount(&server)
        .await;

    let channel = channel_for(format!("{}/graphql", server.uri()));
    let result = channel
        .publish(CommandInput::new("abc123", "FOOCOMMAND").unwrap())
        .await;
    assert!(matches!(result, Err(ChannelError::Network(_))));
}

#[tokio::test]
async fn test_publish_missing_field_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"sendCommand": {"channelID": "abc123"}}})),
        )
        .mount(&server)
        .await;

    let channel = channel_for(format!("{}/graphql", server.uri()));
    let result = channel
        .publish(CommandInput::new("abc123", "FOOCOMMAND").unwrap())
        .await;
    assert!(matches!(result, Err(ChannelError::Decode(_))));
}

// ============================================================================
// SubscribeToChannelCommands
// ============================================================================

enum Push {
    Data(Value),
    Error(&'static str),
}

struct FakeRealtime {
    addr: SocketAddr,
    push: mpsc::UnboundedSender<Push>,
    seen: mpsc::UnboundedReceiver<Value>,
}

impl FakeRealtime {
    /// Accepts one connection, acknowledges every start and forwards pushes to
    /// the most recent subscription.
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (push, mut push_rx) = mpsc::unbounded_channel::<Push>();
        let (seen_tx, seen) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
                if let Some(protocol) = req.headers().get("Sec-WebSocket-Protocol") {
                    resp.headers_mut()
                        .insert("Sec-WebSocket-Protocol", protocol.clone());
                }
                Ok(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();
            let (mut write, mut read) = ws.split();
            let mut current = String::new();

            loop {
                let reply = tokio::select! {
                    msg = read.next() => {
                        let Some(Ok(Message::Text(text))) = msg else { break };
                        let value: Value = serde_json::from_str(&text).unwrap();
                        let _ = seen_tx.send(value.clone());
                        match value["type"].as_str() {
                            Some("connection_init") => Some(json!({
                                "type": "connection_ack",
                                "payload": {"connectionTimeoutMs": 300000}
                            })),
                            Some("start") => {
                                current = value["id"].as_str().unwrap().to_string();
                                Some(json!({"type": "start_ack", "id": current}))
                            }
                            Some("stop") => Some(json!({"type": "complete", "id": value["id"]})),
                            _ => None,
                        }
                    }
                    push = push_rx.recv() => match push {
                        Some(Push::Data(data)) => Some(json!({
                            "type": "data",
                            "id": current,
                            "payload": {"data": data}
                        })),
                        Some(Push::Error(message)) => Some(json!({
                            "type": "error",
                            "id": current,
                            "payload": {"errors": [{"message": message}]}
                        })),
                        None => break,
                    }
                };
                if let Some(reply) = reply {
                    let _ = write.send(Message::Text(reply.to_string().into())).await;
                }
            }
        });

        Self { addr, push, seen }
    }

    fn channel(&self) -> AppSyncChannel {
        channel_for(format!("http://{}/graphql", self.addr))
    }

    fn push(&self, push: Push) {
        self.push.send(push).unwrap();
    }

    async fn expect(&mut self, kind: &str) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), self.seen.recv())
                .await
                .expect("timed out waiting for client message")
                .expect("server stopped");
            if msg["type"] == kind {
                return msg;
            }
        }
    }
}

fn received(command: &str, sent_at: &str) -> Value {
    json!({"receivedCommand": {
        "channelID": "abc123",
        "command": command,
        "sentAt": sent_at
    }})
}

async fn next_event(
    sub: &mut cmdlink_core::CommandSubscription,
) -> Option<cmdlink_core::Result<cmdlink_core::Command>> {
    tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_subscribe_sends_channel_variable() {
    let mut server = FakeRealtime::start().await;
    let channel = server.channel();

    let _sub = channel
        .subscribe(&ChannelId::new("abc123").unwrap())
        .await
        .unwrap();

    let start = server.expect("start").await;
    let data: Value = serde_json::from_str(start["payload"]["data"].as_str().unwrap()).unwrap();
    assert_eq!(data["variables"], json!({"channelID": "abc123"}));
    assert_eq!(data["operationName"], "SubscribeToChannelCommands");
    assert!(
        data["query"]
            .as_str()
            .unwrap()
            .contains("receivedCommand(channelID: $channelID)")
    );
}

#[tokio::test]
async fn test_subscribe_delivers_commands() {
    let server = FakeRealtime::start().await;
    let channel = server.channel();

    let mut sub = channel
        .subscribe(&ChannelId::new("abc123").unwrap())
        .await
        .unwrap();
    server.push(Push::Data(received("FOOCOMMAND", "2026-10-19T12:00:01.000Z")));

    let command = next_event(&mut sub).await.unwrap().unwrap();
    assert_eq!(command.channel_id.as_str(), "abc123");
    assert_eq!(command.command, "FOOCOMMAND");
}

#[tokio::test]
async fn test_undecodable_event_is_skipped() {
    let server = FakeRealtime::start().await;
    let channel = server.channel();

    let mut sub = channel
        .subscribe(&ChannelId::new("abc123").unwrap())
        .await
        .unwrap();
    server.push(Push::Data(json!({"receivedCommand": {"channelID": "abc123"}})));
    server.push(Push::Data(received("SECOND", "2026-10-19T12:00:02.000Z")));

    let command = next_event(&mut sub).await.unwrap().unwrap();
    assert_eq!(command.command, "SECOND");
}

#[tokio::test]
async fn test_subscription_error_is_terminal() {
    let server = FakeRealtime::start().await;
    let channel = server.channel();

    let mut sub = channel
        .subscribe(&ChannelId::new("abc123").unwrap())
        .await
        .unwrap();
    server.push(Push::Error("Subscription was revoked"));

    match next_event(&mut sub).await {
        Some(Err(ChannelError::Subscription(reason))) => {
            assert!(reason.contains("revoked"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(next_event(&mut sub).await.is_none());
}

#[tokio::test]
async fn test_unsubscribe_sends_stop() {
    let mut server = FakeRealtime::start().await;
    let channel = server.channel();

    let sub = channel
        .subscribe(&ChannelId::new("abc123").unwrap())
        .await
        .unwrap();
    let start = server.expect("start").await;

    sub.unsubscribe();

    let stop = server.expect("stop").await;
    assert_eq!(stop["id"], start["id"]);
}
