//! Integration tests for GraphQL operations over HTTP.

use std::time::Duration;

use cmdlink_net::{GraphQLClient, GraphQLRequest, NetworkError};
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_COMMAND: &str = "mutation SendCommand($channelID: ID!, $command: String!) {
  sendCommand(channelID: $channelID, command: $command) { channelID command sentAt }
}";

#[derive(Debug, Deserialize)]
struct Sent {
    #[serde(rename = "channelID")]
    channel_id: String,
    command: String,
    #[serde(rename = "sentAt")]
    sent_at: String,
}

fn client_for(server: &MockServer) -> GraphQLClient {
    GraphQLClient::builder(format!("{}/graphql", server.uri()))
        .api_key("da2-test")
        .build()
        .expect("Failed to build client")
}

#[tokio::test]
async fn test_mutation_sends_api_key_and_variables() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("x-api-key", "da2-test"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "variables": {"channelID": "abc123", "command": "FOOCOMMAND"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "sendCommand": {
                    "channelID": "abc123",
                    "command": "FOOCOMMAND",
                    "sentAt": "2026-10-19T12:00:00.000Z"
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let sent: Sent = client
        .mutate_field(
            SEND_COMMAND,
            json!({"channelID": "abc123", "command": "FOOCOMMAND"}),
            "sendCommand",
        )
        .await
        .expect("Mutation failed");

    assert_eq!(sent.channel_id, "abc123");
    assert_eq!(sent.command, "FOOCOMMAND");
    assert_eq!(sent.sent_at, "2026-10-19T12:00:00.000Z");
}

#[tokio::test]
async fn test_graphql_errors_are_returned_in_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{
                "errorType": "ValidationError",
                "message": "Variable 'channelID' has coerced Null value for NonNull type 'ID!'"
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = GraphQLRequest::mutation(SEND_COMMAND).variable("command", "FOOCOMMAND");
    let response = client.execute(request).await.expect("HTTP call failed");

    assert!(response.has_errors());
    assert_eq!(response.errors[0].error_type.as_deref(), Some("ValidationError"));
    assert!(matches!(
        response.field::<Sent>("sendCommand"),
        Err(NetworkError::GraphQL(_))
    ));
}

#[tokio::test]
async fn test_http_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"errorType": "UnauthorizedException", "message": "You are not authorized"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .execute(GraphQLRequest::mutation(SEND_COMMAND))
        .await;

    match result {
        Err(NetworkError::HttpStatus { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.unwrap_or_default().contains("UnauthorizedException"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_json_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.execute(GraphQLRequest::query("{ ping }")).await;
    assert!(matches!(result, Err(NetworkError::Json(_))));
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind and drop a listener to find a port nobody is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GraphQLClient::builder(format!("http://{addr}/graphql"))
        .build()
        .unwrap();
    let result = client.execute(GraphQLRequest::query("{ ping }")).await;
    assert!(matches!(
        result,
        Err(NetworkError::Connection(_)) | Err(NetworkError::Request(_))
    ));
}

#[tokio::test]
async fn test_extra_header_sent_with_post() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("x-trace-id", "t-1"))
        .and(header("x-api-key", "da2-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ping": "pong"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphQLClient::builder(format!("{}/graphql", server.uri()))
        .api_key("da2-test")
        .header("x-trace-id", "t-1")
        .build()
        .unwrap();

    let response = client.execute(GraphQLRequest::query("{ ping }")).await.unwrap();
    assert_eq!(response.field::<String>("ping").unwrap(), "pong");
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"ping": "pong"}}))
                .set_delay(Duration::from_millis(1000)),
        )
        .mount(&server)
        .await;

    let client = GraphQLClient::builder(format!("{}/graphql", server.uri()))
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let result = client.execute(GraphQLRequest::query("{ ping }")).await;
    assert!(matches!(result, Err(NetworkError::Timeout)), "{result:?}");
}
