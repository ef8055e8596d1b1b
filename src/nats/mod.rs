//! NATS client wrappers
//!
//! Three clients share one [`Config`] and the [`EventProcessor`] surface:
//! a plain publish/subscribe client, a JetStream client bound to one stream,
//! and a JetStream client whose stream deduplicates by message id.

pub mod config;
pub mod constants;
pub mod dedupe;
pub mod error;
pub mod jetstream;
pub mod processor;
pub mod simple;

pub use config::Config;
pub use dedupe::DedupJetStreamClient;
pub use error::{EventProcessorError, Result};
pub use jetstream::{consumer_config, poll_consumer_config, ConsumeHandle, ConsumedMessage, JetStreamClient, StreamDescriptor};
pub use processor::EventProcessor;
pub use simple::SimpleNatsClient;
