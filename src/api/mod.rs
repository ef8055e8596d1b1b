//! Minimal HTTP façade over the JetStream client
//!
//! - `POST /api/v1/messages` publishes `{"data": ...}` to a fixed subject
//! - `GET /api/v1/messages/latest` waits briefly for the next message

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, ServerError};
pub use handlers::{AppState, MessageBackend};
pub use server::{router, RunningServer, Server};
pub use types::{Message, Response};
