//! Core NATS publish/subscribe client.

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::config::Config;
use super::error::{EventProcessorError, Result};
use super::processor::EventProcessor;

/// Plain NATS client: fire-and-forget publish and callback subscriptions.
///
/// The connection lives behind a read/write lock so publishes can run
/// concurrently while `close` waits for them and then takes the connection.
pub struct SimpleNatsClient {
    conn: RwLock<Option<async_nats::Client>>,
    subscriptions: Mutex<Vec<JoinHandle<()>>>,
    config: Config,
}

impl SimpleNatsClient {
    /// Connect to NATS with the provided configuration
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = config.connect().await?;

        Ok(Self {
            conn: RwLock::new(Some(client)),
            subscriptions: Mutex::new(Vec::new()),
            config: config.clone(),
        })
    }

    /// Subscribe to `subject`, calling `handler` with each message payload.
    ///
    /// Messages are delivered on a background task until the client is closed.
    pub async fn subscribe<F>(&self, subject: &str, handler: F) -> Result<()>
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        let guard = self.conn.read().await;
        let client = guard.as_ref().ok_or(EventProcessorError::Closed)?;

        let mut subscriber = client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| EventProcessorError::Subscribe(e.to_string()))?;

        tracing::debug!(subject, "Subscribed");

        let task = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                handler(message.payload);
            }
        });
        self.subscriptions.lock().await.push(task);

        Ok(())
    }

    /// Configuration this client was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if the NATS connection is open and active
    pub async fn is_connected(&self) -> bool {
        match self.conn.read().await.as_ref() {
            Some(client) => client.connection_state() == async_nats::connection::State::Connected,
            None => false,
        }
    }
}

impl EventProcessor for SimpleNatsClient {
    async fn publish_to_stream(&self, subject: &str, data: Bytes) -> Result<()> {
        let guard = self.conn.read().await;
        let client = guard.as_ref().ok_or(EventProcessorError::Closed)?;

        client
            .publish(subject.to_string(), data)
            .await
            .map_err(|e| EventProcessorError::Publish(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.conn.write().await;
        let Some(client) = guard.take() else {
            return Ok(());
        };

        for task in self.subscriptions.lock().await.drain(..) {
            task.abort();
        }

        // Pending publishes are best effort once we are shutting down
        if let Err(e) = client.flush().await {
            tracing::warn!(error = %e, "Failed to flush NATS connection on close");
        }

        tracing::info!(url = %self.config.url, "NATS connection closed");
        Ok(())
    }
}
