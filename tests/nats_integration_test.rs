//! Integration tests against a live NATS server with JetStream enabled.
//!
//! Broker tests are ignored by default. Run them against a server with
//! `NATS_URL=nats://localhost:4222 cargo test -- --ignored`.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use event_processor::nats::{
    Config, DedupJetStreamClient, EventProcessor, EventProcessorError, JetStreamClient,
    SimpleNatsClient, StreamDescriptor,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn broker_config() -> Config {
    let url = std::env::var("NATS_URL").expect("NATS_URL must be set for broker tests");
    Config::new(url)
}

/// Stream with subjects unique to this test run
fn unique_stream(prefix: &str) -> (StreamDescriptor, String) {
    let suffix = Uuid::new_v4().simple().to_string();
    let name = format!("{}_{}", prefix, suffix.to_uppercase());
    let subject_root = format!("test.{}.{}", prefix.to_lowercase(), suffix);
    (
        StreamDescriptor::new(name, [format!("{}.>", subject_root)]),
        subject_root,
    )
}

#[tokio::test]
async fn test_unreachable_url_fails() {
    let mut config = Config::new("nats://127.0.0.1:1");
    config.connection_timeout = Duration::from_secs(2);

    let result = SimpleNatsClient::connect(&config).await;
    assert!(matches!(result, Err(EventProcessorError::Connect(_))));

    let (descriptor, _) = unique_stream("INVALID");
    let result = JetStreamClient::connect(&config, descriptor).await;
    assert!(matches!(result, Err(EventProcessorError::Connect(_))));
}

#[tokio::test]
async fn test_empty_url_is_invalid_config() {
    let result = SimpleNatsClient::connect(&Config::new("")).await;
    assert!(matches!(result, Err(EventProcessorError::InvalidConfig(_))));
}

#[tokio::test]
#[ignore = "requires NATS_URL"]
async fn test_simple_publish_subscribe() {
    let config = broker_config();

    let client = SimpleNatsClient::connect(&config).await.unwrap();

    let subject = format!("test.simple.{}", Uuid::new_v4().simple());
    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe(&subject, move |data| {
            let _ = tx.send(data);
        })
        .await
        .unwrap();

    client
        .publish_to_stream(&subject, Bytes::from("test message"))
        .await
        .unwrap();

    let received = tokio::time::timeout(TEST_TIMEOUT, rx.recv())
        .await
        .expect("timeout waiting for message")
        .expect("subscription ended");
    assert_eq!(received, Bytes::from("test message"));

    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires NATS_URL"]
async fn test_simple_close_twice_and_publish_after_close() {
    let config = broker_config();

    let client = SimpleNatsClient::connect(&config).await.unwrap();
    client.close().await.unwrap();
    client.close().await.unwrap();

    assert!(!client.is_connected().await);
    let err = client
        .publish_to_stream("test.simple.closed", Bytes::from("late"))
        .await
        .unwrap_err();
    assert_eq!(err, EventProcessorError::Closed);
}

#[tokio::test]
#[ignore = "requires NATS_URL"]
async fn test_jetstream_consumer_receives_all_messages() {
    let config = broker_config();
    const MESSAGE_COUNT: u64 = 100;

    let (descriptor, subject_root) = unique_stream("JETSTREAM");
    let client = JetStreamClient::connect(&config, descriptor).await.unwrap();

    for i in 0..MESSAGE_COUNT {
        client
            .publish_to_stream(&format!("{}.{}", subject_root, i), Bytes::from("data"))
            .await
            .unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let consumer = client
        .consume_with("test-jetstream-consumer", move |msg| {
            let _ = tx.send(msg.consumer_sequence);
        })
        .await
        .unwrap();

    let last = tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Some(seq) if seq == MESSAGE_COUNT => return seq,
                Some(_) => continue,
                None => return 0,
            }
        }
    })
    .await
    .expect("did not receive all messages");
    assert_eq!(last, MESSAGE_COUNT);

    consumer.stop().await;
    client.close().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires NATS_URL"]
async fn test_jetstream_next_message() {
    let config = broker_config();

    let (descriptor, subject_root) = unique_stream("POLL");
    let client = JetStreamClient::connect(&config, descriptor).await.unwrap();

    let empty = client
        .next_message("poll-consumer", Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(empty, None);

    client
        .publish_to_stream(&format!("{}.messages", subject_root), Bytes::from("polled"))
        .await
        .unwrap();

    let next = client
        .next_message("poll-consumer", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(next, Some(Bytes::from("polled")));

    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires NATS_URL"]
async fn test_jetstream_next_message_survives_idle_period() {
    let mut config = broker_config();
    config.reconnect_wait = Duration::from_secs(1);

    let (descriptor, subject_root) = unique_stream("IDLE");
    let client = JetStreamClient::connect(&config, descriptor).await.unwrap();
    let subject = format!("{}.messages", subject_root);

    client.publish_to_stream(&subject, Bytes::from("first")).await.unwrap();
    let first = client
        .next_message("idle-consumer", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(first, Some(Bytes::from("first")));

    // Longer than any inactivity threshold derived from reconnect_wait
    tokio::time::sleep(Duration::from_secs(4)).await;

    client.publish_to_stream(&subject, Bytes::from("second")).await.unwrap();
    let second = client
        .next_message("idle-consumer", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(second, Some(Bytes::from("second")));

    let drained = client
        .next_message("idle-consumer", Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(drained, None);

    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires NATS_URL"]
async fn test_dedupe_drops_repeated_message_ids() {
    let config = broker_config();

    let (descriptor, subject_root) = unique_stream("DEDUPE");
    let descriptor = descriptor.with_duplicate_window(Duration::from_secs(60));
    let client = DedupJetStreamClient::connect(&config, descriptor).await.unwrap();

    let subject = format!("{}.events", subject_root);
    let first = client
        .publish_with_id(&subject, "message-1", Bytes::from("payload"))
        .await
        .unwrap();
    let second = client
        .publish_with_id(&subject, "message-1", Bytes::from("payload"))
        .await
        .unwrap();
    let other = client
        .publish_with_id(&subject, "message-2", Bytes::from("payload"))
        .await
        .unwrap();

    assert!(!first);
    assert!(second);
    assert!(!other);

    let consumer = client.deduplicate_consumer("test-dedupe-consumer").await.unwrap();
    assert_eq!(consumer.name(), "test-dedupe-consumer");
    consumer.stop().await;

    client.close().await.unwrap();
}
