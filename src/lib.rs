//! # Event Processor: NATS and JetStream client wrappers
//!
//! Thin clients over a NATS broker plus a small HTTP API for publishing and
//! polling messages. Durability, consumer cursors and duplicate detection are
//! provided by the broker; this crate supplies configuration, forwarding,
//! logging and process wiring.
//!
//! ## Features
//!
//! - **Simple client**: core NATS publish and callback subscriptions
//! - **JetStream client**: creates a stream, publishes with acks, runs durable pull consumers
//! - **Deduplicating client**: JetStream stream with a broker-side duplicate window
//! - **HTTP API**: `POST /api/v1/messages` and `GET /api/v1/messages/latest`
//!
//! ## Example
//!
//! ```ignore
//! use event_processor::{Config, EventProcessor, JetStreamClient, StreamDescriptor};
//!
//! let config = Config::from_env();
//! let client = JetStreamClient::connect(
//!     &config,
//!     StreamDescriptor::new("ORDERS", ["orders.>"]),
//! ).await?;
//!
//! client.publish_to_stream("orders.created", "order-1".into()).await?;
//! let consumer = client.create_consumer("order-audit").await?;
//! // ...
//! consumer.stop().await;
//! client.close().await?;
//! ```

// NATS clients
pub mod nats;

// HTTP façade
pub mod api;

// Process support
pub mod debug;
pub mod shutdown;
pub mod telemetry;

// Re-export key types
pub use nats::{
    Config, ConsumeHandle, ConsumedMessage, DedupJetStreamClient, EventProcessor,
    EventProcessorError, JetStreamClient, SimpleNatsClient, StreamDescriptor,
};
pub use api::{ApiConfig, Server};
