//! Event processor demo
//!
//! Connects the simple, JetStream and deduplicating clients, subscribes to
//! `simple.events`, publishes a timestamp every second and shuts everything
//! down on SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use uuid::Uuid;

use event_processor::nats::{
    Config, DedupJetStreamClient, EventProcessor, EventProcessorError, JetStreamClient,
    SimpleNatsClient, StreamDescriptor,
};
use event_processor::{debug, shutdown, telemetry};

const SIMPLE_SUBJECT: &str = "simple.events";
const JETSTREAM_SUBJECT: &str = "test.jetstream1.events";
const DEDUPE_SUBJECT: &str = "test.dedupe1.events";
const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

struct Clients {
    simple: Arc<SimpleNatsClient>,
    jetstream: Arc<JetStreamClient>,
    dedupe: Arc<DedupJetStreamClient>,
}

impl Clients {
    async fn close(&self) {
        if let Err(e) = self.simple.close().await {
            tracing::error!(error = %e, "Failed to close simple client");
        }
        if let Err(e) = self.jetstream.close().await {
            tracing::error!(error = %e, "Failed to close jetstream client");
        }
        if let Err(e) = self.dedupe.close().await {
            tracing::error!(error = %e, "Failed to close dedupe client");
        }
    }
}

/// Open all clients, closing the ones already opened if a later one fails
async fn setup_clients(config: &Config) -> Result<Clients, EventProcessorError> {
    let simple = SimpleNatsClient::connect(config).await?;

    let jetstream = match JetStreamClient::connect(
        config,
        StreamDescriptor::new("TEST_JETSTREAM", ["test.jetstream1.>"]),
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            let _ = simple.close().await;
            return Err(e);
        }
    };

    let dedupe = match DedupJetStreamClient::connect(
        config,
        StreamDescriptor::new("TEST_DEDUPE", ["test.dedupe1.>"])
            .with_duplicate_window(Duration::from_secs(60)),
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            let _ = simple.close().await;
            let _ = jetstream.close().await;
            return Err(e);
        }
    };

    Ok(Clients {
        simple: Arc::new(simple),
        jetstream: Arc::new(jetstream),
        dedupe: Arc::new(dedupe),
    })
}

/// Publish the current time every second until aborted
fn spawn_publisher(clients: &Clients) -> JoinHandle<()> {
    let simple = clients.simple.clone();
    let jetstream = clients.jetstream.clone();
    let dedupe = clients.dedupe.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PUBLISH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let message = Bytes::from(chrono::Utc::now().to_rfc3339());

            if let Err(e) = simple.publish_to_stream(SIMPLE_SUBJECT, message.clone()).await {
                tracing::error!(error = %e, "Failed to publish with simple client");
            }

            if let Err(e) = jetstream.publish_to_stream(JETSTREAM_SUBJECT, message.clone()).await {
                tracing::error!(error = %e, "Failed to publish with jetstream client");
            }

            // The second publish with the same id falls inside the duplicate window
            let msg_id = Uuid::new_v4().to_string();
            for _ in 0..2 {
                match dedupe.publish_with_id(DEDUPE_SUBJECT, &msg_id, message.clone()).await {
                    Ok(true) => tracing::debug!(msg_id = %msg_id, "Duplicate dropped by broker"),
                    Ok(false) => {}
                    Err(e) => tracing::error!(error = %e, "Failed to publish with dedupe client"),
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    telemetry::init();

    let config = Config::from_env();

    // Setup debug server if enabled
    let debug_server = debug::spawn(&debug::DebugConfig::from_env());

    let clients = setup_clients(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to setup clients");
        e
    })?;

    if let Err(e) = clients
        .simple
        .subscribe(SIMPLE_SUBJECT, |data| {
            tracing::info!(data = %String::from_utf8_lossy(&data), "Simple client received message");
        })
        .await
    {
        tracing::error!(error = %e, "Failed to subscribe with simple client");
    }

    let consumers = async {
        let jetstream = clients.jetstream.create_consumer("demo-jetstream").await?;
        let dedupe = clients.dedupe.deduplicate_consumer("demo-dedupe").await?;
        Ok::<_, EventProcessorError>((jetstream, dedupe))
    }
    .await;
    let consumers = match consumers {
        Ok(consumers) => Some(consumers),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create consumers");
            None
        }
    };

    let publisher = spawn_publisher(&clients);

    shutdown::shutdown_signal().await;
    tracing::info!("Shutting down...");

    publisher.abort();
    if let Some((jetstream, dedupe)) = consumers {
        jetstream.stop().await;
        dedupe.stop().await;
    }
    clients.close().await;

    if let Some(handle) = debug_server {
        handle.abort();
    }

    Ok(())
}
