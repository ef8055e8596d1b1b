//! JetStream client whose stream drops duplicate message ids.
//!
//! Deduplication is enforced by the broker: the stream is created with a
//! duplicate window and publishes carry a `Nats-Msg-Id`. This wrapper adds
//! the logging around it.

use std::ops::Deref;

use bytes::Bytes;

use super::config::Config;
use super::error::Result;
use super::jetstream::{ConsumeHandle, JetStreamClient, StreamDescriptor};
use super::processor::EventProcessor;

/// JetStream client with a broker-side deduplication window
pub struct DedupJetStreamClient {
    inner: JetStreamClient,
}

impl DedupJetStreamClient {
    /// Connect and create the stream described by `descriptor`.
    ///
    /// A descriptor without a duplicate window still works; the broker then
    /// applies its own default window.
    pub async fn connect(config: &Config, descriptor: StreamDescriptor) -> Result<Self> {
        let inner = JetStreamClient::connect(config, descriptor).await?;

        tracing::info!(
            stream = %inner.descriptor().name,
            dedupe_window = ?inner.descriptor().duplicate_window,
            "Deduplicating JetStream client ready"
        );

        Ok(Self { inner })
    }

    /// Create a durable pull consumer on the deduplicated stream and start
    /// consuming. Each message is logged and acknowledged.
    pub async fn deduplicate_consumer(&self, name: &str) -> Result<ConsumeHandle> {
        let stream = self.inner.descriptor().name.clone();

        tracing::info!(
            stream = %stream,
            name,
            dedupe_window = ?self.inner.descriptor().duplicate_window,
            "creating deduplicated consumer"
        );

        let description = format!("Deduplicated consumer {} for stream {}", name, stream);
        let consumer = name.to_string();
        let handle = self
            .inner
            .start_consumer(name, description, move |msg| {
                tracing::info!(
                    sequence = msg.consumer_sequence,
                    subject = %msg.subject,
                    consumer = %consumer,
                    "received deduplicated message"
                );
            })
            .await
            .map_err(|e| {
                tracing::error!(name, error = %e, "failed to create consumer");
                e
            })?;

        tracing::info!(name, "consumer created successfully");

        Ok(handle)
    }
}

impl Deref for DedupJetStreamClient {
    type Target = JetStreamClient;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl EventProcessor for DedupJetStreamClient {
    async fn publish_to_stream(&self, subject: &str, data: Bytes) -> Result<()> {
        self.inner.publish_to_stream(subject, data).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
