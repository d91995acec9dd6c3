//! Delivery rules of the command channel, exercised on the in-process hub.

use std::collections::HashSet;
use std::time::Duration;

use cmdlink_core::{ChannelError, ChannelId, CommandChannel, CommandInput, LocalHub};

fn channel(id: &str) -> ChannelId {
    ChannelId::new(id).unwrap()
}

async fn no_event_within(sub: &mut cmdlink_core::CommandSubscription, wait: Duration) -> bool {
    tokio::time::timeout(wait, sub.next()).await.is_err()
}

#[tokio::test]
async fn test_publish_echoes_input_with_sent_at() {
    let hub = LocalHub::new();
    let before = chrono::Utc::now() - chrono::TimeDelta::seconds(1);

    let command = hub
        .publish(CommandInput::new("abc123", "FOOCOMMAND").unwrap())
        .await
        .unwrap();

    assert_eq!(command.channel_id, channel("abc123"));
    assert_eq!(command.command, "FOOCOMMAND");
    assert!(command.sent_at > before);
}

#[tokio::test]
async fn test_subscriber_receives_exactly_one_matching_event() {
    let hub = LocalHub::new();
    let mut sub = hub.subscribe(&channel("abc123")).await.unwrap();

    let sent = hub
        .publish(CommandInput::new("abc123", "FOOCOMMAND").unwrap())
        .await
        .unwrap();

    let received = sub.next().await.unwrap().unwrap();
    assert_eq!(received, sent);
    assert!(no_event_within(&mut sub, Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_other_channel_is_not_delivered() {
    let hub = LocalHub::new();
    let mut sub = hub.subscribe(&channel("abc123")).await.unwrap();

    hub.publish(CommandInput::new("xyz789", "FOOCOMMAND").unwrap())
        .await
        .unwrap();

    assert!(no_event_within(&mut sub, Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_channel_match_is_exact() {
    let hub = LocalHub::new();
    let mut sub = hub.subscribe(&channel("abc123")).await.unwrap();

    for near_miss in ["ABC123", "abc1234", "abc12", " abc123"] {
        hub.publish(CommandInput::new(near_miss, "X").unwrap())
            .await
            .unwrap();
    }

    assert!(no_event_within(&mut sub, Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_no_replay_of_earlier_publishes() {
    let hub = LocalHub::new();
    hub.publish(CommandInput::new("abc123", "EARLY").unwrap())
        .await
        .unwrap();

    let mut sub = hub.subscribe(&channel("abc123")).await.unwrap();
    assert!(no_event_within(&mut sub, Duration::from_millis(50)).await);

    hub.publish(CommandInput::new("abc123", "LATE").unwrap())
        .await
        .unwrap();
    assert_eq!(sub.next().await.unwrap().unwrap().command, "LATE");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery_and_releases_slot() {
    let hub = LocalHub::new();
    let id = channel("abc123");
    let sub = hub.subscribe(&id).await.unwrap();
    assert_eq!(hub.subscriber_count(&id), 1);

    sub.unsubscribe();
    assert_eq!(hub.subscriber_count(&id), 0);

    // A fresh subscriber sees only its own events.
    let mut other = hub.subscribe(&id).await.unwrap();
    hub.publish(CommandInput::new("abc123", "AFTER").unwrap())
        .await
        .unwrap();
    assert_eq!(other.next().await.unwrap().unwrap().command, "AFTER");
    assert_eq!(hub.subscriber_count(&id), 1);
}

#[tokio::test]
async fn test_dropped_subscription_is_released() {
    let hub = LocalHub::new();
    let id = channel("abc123");
    {
        let _sub = hub.subscribe(&id).await.unwrap();
        assert_eq!(hub.subscriber_count(&id), 1);
    }
    assert_eq!(hub.subscriber_count(&id), 0);
}

#[tokio::test]
async fn test_every_subscriber_of_a_channel_receives() {
    let hub = LocalHub::new();
    let mut first = hub.subscribe(&channel("abc123")).await.unwrap();
    let mut second = hub.subscribe(&channel("abc123")).await.unwrap();

    hub.publish(CommandInput::new("abc123", "ALL").unwrap())
        .await
        .unwrap();

    assert_eq!(first.next().await.unwrap().unwrap().command, "ALL");
    assert_eq!(second.next().await.unwrap().unwrap().command, "ALL");
}

#[tokio::test]
async fn test_events_arrive_in_publish_order() {
    let hub = LocalHub::new();
    let mut sub = hub.subscribe(&channel("abc123")).await.unwrap();

    for i in 0..20 {
        hub.publish(CommandInput::new("abc123", format!("CMD{i}")).unwrap())
            .await
            .unwrap();
    }

    for i in 0..20 {
        assert_eq!(sub.next().await.unwrap().unwrap().command, format!("CMD{i}"));
    }
}

#[tokio::test]
async fn test_identical_publishes_get_distinct_sent_at() {
    let hub = LocalHub::new();
    let mut stamps = HashSet::new();

    for _ in 0..25 {
        let command = hub
            .publish(CommandInput::new("abc123", "SAME").unwrap())
            .await
            .unwrap();
        assert!(stamps.insert(command.sent_at), "duplicate sentAt");
    }
}

#[test]
fn test_malformed_publish_is_rejected() {
    assert!(matches!(
        CommandInput::new("", "FOOCOMMAND"),
        Err(ChannelError::InvalidInput(_))
    ));
    assert!(matches!(
        CommandInput::from_variables(serde_json::json!({"command": "FOOCOMMAND"})),
        Err(ChannelError::InvalidInput(_))
    ));
}
