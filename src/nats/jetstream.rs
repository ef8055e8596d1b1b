//! JetStream client: durable stream plus durable pull consumers.
//!
//! The broker owns persistence, consumer cursors and redelivery. This client
//! creates the stream on connect, forwards publishes, and runs consumers on
//! background tasks that log and acknowledge every message.

use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy, PullConsumer},
    stream,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::Config;
use super::constants::{
    DEFAULT_INACTIVE_THRESHOLD_MULTIPLIER, DEFAULT_MAX_REQUEST_BATCH, DEFAULT_MAX_REQUEST_MAX_BYTES,
};
use super::error::{EventProcessorError, Result};
use super::processor::EventProcessor;

/// Shortest pull request worth sending to the broker
const MIN_FETCH_EXPIRES: Duration = Duration::from_millis(10);

/// Description of the stream a JetStream client works with.
///
/// The broker keeps the persisted representation; this is only what gets
/// sent on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub name: String,
    pub subjects: Vec<String>,
    /// Window during which the broker drops messages with a repeated `Nats-Msg-Id`
    pub duplicate_window: Option<Duration>,
    pub description: Option<String>,
}

impl StreamDescriptor {
    pub fn new<I, S>(name: impl Into<String>, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            subjects: subjects.into_iter().map(Into::into).collect(),
            duplicate_window: None,
            description: None,
        }
    }

    pub fn with_duplicate_window(mut self, window: Duration) -> Self {
        self.duplicate_window = Some(window);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Stream configuration sent to the broker
    pub fn to_stream_config(&self) -> stream::Config {
        let mut config = stream::Config {
            name: self.name.clone(),
            subjects: self.subjects.clone(),
            description: self.description.clone(),
            ..Default::default()
        };
        if let Some(window) = self.duplicate_window {
            config.duplicate_window = window;
        }
        config
    }
}

/// Durable pull consumer settings.
///
/// Deliver everything, explicit acks, request limits from the defaults, and
/// timings derived from the reconnect wait.
pub fn consumer_config(name: &str, description: String, reconnect_wait: Duration) -> pull::Config {
    pull::Config {
        durable_name: Some(name.to_string()),
        description: Some(description),
        deliver_policy: DeliverPolicy::All,
        ack_policy: AckPolicy::Explicit,
        max_batch: DEFAULT_MAX_REQUEST_BATCH,
        max_bytes: DEFAULT_MAX_REQUEST_MAX_BYTES,
        max_expires: reconnect_wait,
        inactive_threshold: reconnect_wait * DEFAULT_INACTIVE_THRESHOLD_MULTIPLIER,
        ..Default::default()
    }
}

/// Settings for the consumer behind [`JetStreamClient::next_message`].
///
/// Same as [`consumer_config`] but without an inactive threshold: polls can
/// be far apart, and a consumer the broker drops for inactivity would be
/// recreated from the start of the stream and hand out acked messages again.
pub fn poll_consumer_config(name: &str, description: String, reconnect_wait: Duration) -> pull::Config {
    pull::Config {
        inactive_threshold: Duration::ZERO,
        ..consumer_config(name, description, reconnect_wait)
    }
}

/// A message handed to a consumer handler
#[derive(Debug, Clone)]
pub struct ConsumedMessage {
    pub subject: String,
    pub payload: Bytes,
    /// Position in this consumer's delivery sequence (starts at 1)
    pub consumer_sequence: u64,
    /// Position in the stream
    pub stream_sequence: u64,
}

/// Running consumer. Dropping the handle stops consumption.
pub struct ConsumeHandle {
    name: String,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ConsumeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the background task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop consuming and wait for the background task to exit
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                tracing::error!(consumer = %self.name, error = %e, "Consumer task failed");
            }
        }
    }
}

impl Drop for ConsumeHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

struct Connection {
    client: async_nats::Client,
    js: jetstream::Context,
    stream: stream::Stream,
}

/// JetStream client bound to a single stream
pub struct JetStreamClient {
    inner: RwLock<Option<Connection>>,
    descriptor: StreamDescriptor,
    config: Config,
}

impl JetStreamClient {
    /// Connect to NATS, open a JetStream context and create the stream
    pub async fn connect(config: &Config, descriptor: StreamDescriptor) -> Result<Self> {
        let client = config.connect().await?;
        let js = jetstream::new(client.clone());

        // The connection is dropped with `client` if stream creation fails
        let stream = js
            .create_stream(descriptor.to_stream_config())
            .await
            .map_err(|e| EventProcessorError::Stream(format!("failed to create stream {}: {}", descriptor.name, e)))?;

        tracing::info!(
            stream = %descriptor.name,
            subjects = ?descriptor.subjects,
            "JetStream stream ready"
        );

        Ok(Self {
            inner: RwLock::new(Some(Connection { client, js, stream })),
            descriptor,
            config: config.clone(),
        })
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if the NATS connection is open and active
    pub async fn is_connected(&self) -> bool {
        match self.inner.read().await.as_ref() {
            Some(conn) => conn.client.connection_state() == async_nats::connection::State::Connected,
            None => false,
        }
    }

    /// Publish with a `Nats-Msg-Id` header so the broker can drop repeats.
    ///
    /// Returns `true` when the broker reports the message as a duplicate
    /// within the stream's duplicate window.
    pub async fn publish_with_id(&self, subject: &str, msg_id: &str, data: Bytes) -> Result<bool> {
        let guard = self.inner.read().await;
        let conn = guard.as_ref().ok_or(EventProcessorError::Closed)?;

        let mut headers = async_nats::HeaderMap::new();
        headers.insert(async_nats::header::NATS_MESSAGE_ID, msg_id);

        let ack = conn
            .js
            .publish_with_headers(subject.to_string(), headers, data)
            .await
            .map_err(|e| EventProcessorError::Publish(e.to_string()))?
            .await
            .map_err(|e| EventProcessorError::Publish(e.to_string()))?;

        if ack.duplicate {
            tracing::debug!(subject, msg_id, "Broker reported duplicate message");
        }

        Ok(ack.duplicate)
    }

    /// Create (or update) a durable consumer and start consuming.
    ///
    /// Each message is logged with its consumer sequence and acknowledged.
    pub async fn create_consumer(&self, name: &str) -> Result<ConsumeHandle> {
        let consumer = name.to_string();
        self.consume_with(name, move |msg| {
            tracing::info!(
                consumer = %consumer,
                consumer_sequence = msg.consumer_sequence,
                subject = %msg.subject,
                "received message"
            );
        })
        .await
    }

    /// Like [`create_consumer`](Self::create_consumer), handing every message
    /// to `handler` before it is acknowledged.
    pub async fn consume_with<F>(&self, name: &str, handler: F) -> Result<ConsumeHandle>
    where
        F: Fn(ConsumedMessage) + Send + Sync + 'static,
    {
        let description = format!("Consumer {} for stream {}", name, self.descriptor.name);
        self.start_consumer(name, description, handler).await
    }

    pub(crate) async fn start_consumer<F>(
        &self,
        name: &str,
        description: String,
        handler: F,
    ) -> Result<ConsumeHandle>
    where
        F: Fn(ConsumedMessage) + Send + Sync + 'static,
    {
        let consumer = {
            let guard = self.inner.read().await;
            let conn = guard.as_ref().ok_or(EventProcessorError::Closed)?;

            conn.stream
                .create_consumer(consumer_config(name, description, self.config.reconnect_wait))
                .await
                .map_err(|e| EventProcessorError::Consumer(format!("failed to create consumer: {}", e)))?
        };

        let messages = consumer
            .messages()
            .await
            .map_err(|e| EventProcessorError::Consumer(format!("failed to create consume context: {}", e)))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_consumer(name.to_string(), messages, handler, stop_rx));

        Ok(ConsumeHandle {
            name: name.to_string(),
            stop: Some(stop_tx),
            task,
        })
    }

    /// Wait up to `wait` for the next message on the durable consumer `name`.
    ///
    /// `wait` bounds the whole call, consumer lookup included. The message is
    /// acknowledged before its payload is returned. `None` means nothing
    /// arrived in time.
    pub async fn next_message(&self, name: &str, wait: Duration) -> Result<Option<Bytes>> {
        let lookup = async {
            let guard = self.inner.read().await;
            let conn = guard.as_ref().ok_or(EventProcessorError::Closed)?;
            let description = format!("Consumer {} for stream {}", name, self.descriptor.name);

            conn.stream
                .get_or_create_consumer(name, poll_consumer_config(name, description, self.config.reconnect_wait))
                .await
                .map_err(|e| EventProcessorError::Consumer(format!("failed to create consumer: {}", e)))
        };

        poll_within(wait, lookup, fetch_one).await
    }
}

impl EventProcessor for JetStreamClient {
    async fn publish_to_stream(&self, subject: &str, data: Bytes) -> Result<()> {
        let guard = self.inner.read().await;
        let conn = guard.as_ref().ok_or(EventProcessorError::Closed)?;

        // Publish with JetStream (durable, acknowledged)
        let ack = conn
            .js
            .publish(subject.to_string(), data)
            .await
            .map_err(|e| EventProcessorError::Publish(e.to_string()))?;

        ack.await.map_err(|e| EventProcessorError::Publish(e.to_string()))?;

        Ok(())
    }

    /// Deletes the stream, then closes the connection. A failed delete is
    /// logged and does not fail the close.
    async fn close(&self) -> Result<()> {
        let mut guard = self.inner.write().await;
        let Some(conn) = guard.take() else {
            return Ok(());
        };

        if let Err(e) = conn.js.delete_stream(&self.descriptor.name).await {
            tracing::error!(stream = %self.descriptor.name, error = %e, "failed to delete stream");
        }

        if let Err(e) = conn.client.flush().await {
            tracing::warn!(error = %e, "Failed to flush NATS connection on close");
        }

        tracing::info!(stream = %self.descriptor.name, "JetStream client closed");
        Ok(())
    }
}

/// Run `lookup` then `fetch` under a single deadline of `wait`.
///
/// `fetch` is given the time left after the lookup. Running out of time is
/// not an error and yields `None`.
async fn poll_within<C, L, F, Fut>(wait: Duration, lookup: L, fetch: F) -> Result<Option<Bytes>>
where
    L: Future<Output = Result<C>>,
    F: FnOnce(C, Duration) -> Fut,
    Fut: Future<Output = Result<Option<Bytes>>>,
{
    let deadline = Instant::now() + wait;

    let polled = tokio::time::timeout_at(deadline, async {
        let consumer = lookup.await?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining < MIN_FETCH_EXPIRES {
            return Ok(None);
        }
        fetch(consumer, remaining).await
    })
    .await;

    polled.unwrap_or(Ok(None))
}

/// Pull at most one message, waiting up to `expires` for it
async fn fetch_one(consumer: PullConsumer, expires: Duration) -> Result<Option<Bytes>> {
    let mut batch = consumer
        .batch()
        .max_messages(1)
        .expires(expires)
        .messages()
        .await
        .map_err(|e| EventProcessorError::Consumer(format!("failed to request messages: {}", e)))?;

    match batch.next().await {
        Some(Ok(message)) => {
            if let Err(e) = message.ack().await {
                tracing::error!(error = %e, "failed to acknowledge message");
            }
            Ok(Some(message.payload.clone()))
        }
        Some(Err(e)) => Err(EventProcessorError::Consumer(format!("failed to receive message: {}", e))),
        None => Ok(None),
    }
}

async fn run_consumer<F>(
    name: String,
    mut messages: pull::Stream,
    handler: F,
    mut stop: oneshot::Receiver<()>,
) where
    F: Fn(ConsumedMessage) + Send + Sync + 'static,
{
    loop {
        let next = tokio::select! {
            _ = &mut stop => break,
            next = messages.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::error!(consumer = %name, error = %e, "Error receiving message");
                continue;
            }
            None => break,
        };

        match message.info() {
            Ok(info) => handler(ConsumedMessage {
                subject: message.subject.to_string(),
                payload: message.payload.clone(),
                consumer_sequence: info.consumer_sequence,
                stream_sequence: info.stream_sequence,
            }),
            Err(e) => tracing::error!(
                consumer = %name,
                subject = %message.subject,
                error = %e,
                "failed to get metadata"
            ),
        }

        // Acknowledged either way, so unreadable metadata does not cause redelivery loops
        if let Err(e) = message.ack().await {
            tracing::error!(consumer = %name, error = %e, "failed to acknowledge message");
        }
    }

    tracing::debug!(consumer = %name, "Consumer stopped");
}
