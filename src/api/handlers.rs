//! Request handlers for publishing and polling messages.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    Json,
};
use bytes::Bytes;

use super::config::ApiConfig;
use super::error::ApiError;
use super::types::{Message, Response};
use crate::nats::{self, EventProcessor, JetStreamClient};

/// What the HTTP layer needs from the broker
pub trait MessageBackend: Send + Sync + 'static {
    /// Publish `data` to `subject`
    fn publish(&self, subject: &str, data: Bytes) -> impl Future<Output = nats::Result<()>> + Send;

    /// Wait up to `wait` for the next message on the durable consumer `consumer`
    fn next_message(
        &self,
        consumer: &str,
        wait: Duration,
    ) -> impl Future<Output = nats::Result<Option<Bytes>>> + Send;
}

impl MessageBackend for JetStreamClient {
    async fn publish(&self, subject: &str, data: Bytes) -> nats::Result<()> {
        self.publish_to_stream(subject, data).await
    }

    async fn next_message(&self, consumer: &str, wait: Duration) -> nats::Result<Option<Bytes>> {
        JetStreamClient::next_message(self, consumer, wait).await
    }
}

/// Shared state for the handlers
pub struct AppState<B> {
    pub backend: Arc<B>,
    pub config: ApiConfig,
}

impl<B> AppState<B> {
    pub fn new(backend: Arc<B>, config: ApiConfig) -> Self {
        Self { backend, config }
    }
}

/// Publish a message (`POST /api/v1/messages`)
pub async fn publish_message<B: MessageBackend>(
    State(state): State<Arc<AppState<B>>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Response>), ApiError> {
    let message: Message = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to unmarshal request body");
        ApiError::ValidationError("Invalid JSON format".to_string())
    })?;

    state
        .backend
        .publish(&state.config.subject, Bytes::from(message.data))
        .await
        .map_err(|e| {
            tracing::error!(subject = %state.config.subject, error = %e, "Failed to publish message");
            ApiError::InternalError("Failed to publish message".to_string())
        })?;

    tracing::debug!(subject = %state.config.subject, "Message published");

    Ok((StatusCode::CREATED, Json(Response::published())))
}

/// Wait briefly for the next message (`GET /api/v1/messages/latest`).
///
/// Answers 200 with the message, or 204 when nothing arrives before the
/// poll timeout.
pub async fn get_latest_message<B: MessageBackend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<HttpResponse, ApiError> {
    let next = state
        .backend
        .next_message(&state.config.consumer, state.config.poll_timeout)
        .await
        .map_err(|e| {
            tracing::error!(consumer = %state.config.consumer, error = %e, "Error receiving message");
            ApiError::InternalError("Failed to receive message".to_string())
        })?;

    match next {
        Some(data) => {
            let message = Message {
                data: String::from_utf8_lossy(&data).into_owned(),
            };
            Ok((StatusCode::OK, Json(message)).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
