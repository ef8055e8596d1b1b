//! Event API - HTTP endpoint that publishes to and polls from NATS JetStream
//!
//! Accepts `{"data": "..."}` on `POST /api/v1/messages` and hands out the
//! next stored message on `GET /api/v1/messages/latest`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use event_processor::api::{ApiConfig, Server};
use event_processor::nats::{Config, EventProcessor, JetStreamClient, StreamDescriptor};
use event_processor::{shutdown, telemetry};

#[derive(Parser, Debug)]
#[command(name = "event-api")]
#[command(about = "HTTP API for publishing and polling NATS JetStream messages", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// JetStream stream backing the API
    #[arg(long, env = "API_STREAM", default_value = "TEST_JETSTREAM")]
    stream: String,

    /// Subjects captured by the stream
    #[arg(long, env = "API_STREAM_SUBJECTS", value_delimiter = ',', default_value = "test.jetstream1.>")]
    stream_subjects: Vec<String>,

    /// Subject messages are published to
    #[arg(long, env = "API_SUBJECT", default_value = "test.jetstream1.messages")]
    subject: String,

    /// Durable consumer used for polling
    #[arg(long, env = "API_CONSUMER", default_value = "latest-message-consumer")]
    consumer: String,

    /// How long a poll waits for a message, in milliseconds
    #[arg(long, env = "API_POLL_TIMEOUT_MS", default_value_t = 1000)]
    poll_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables before clap reads its env fallbacks
    dotenv::dotenv().ok();

    // Initialize tracing
    telemetry::init();

    let args = Args::parse();

    // Connect to NATS JetStream
    let nats_config = Config::from_env();
    let descriptor = StreamDescriptor::new(args.stream.clone(), args.stream_subjects.clone());
    let client = Arc::new(JetStreamClient::connect(&nats_config, descriptor).await?);

    let api_config = ApiConfig {
        port: args.port,
        subject: args.subject,
        consumer: args.consumer,
        poll_timeout: Duration::from_millis(args.poll_timeout_ms),
        ..ApiConfig::default()
    };

    tracing::info!(
        stream = %args.stream,
        subject = %api_config.subject,
        "Publishing to NATS stream"
    );

    // Run server
    let server = Server::new(api_config, client.clone());
    let listener = server.bind().await?;
    let running = server.start(listener)?;
    tracing::info!(addr = %running.local_addr(), "Event API listening");

    shutdown::shutdown_signal().await;
    tracing::info!("Shutting down...");

    if let Err(e) = running.stop().await {
        tracing::error!(error = %e, "HTTP server did not shut down cleanly");
    }
    client.close().await?;

    Ok(())
}
