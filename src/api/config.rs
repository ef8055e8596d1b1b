//! HTTP API settings.

use std::time::Duration;

/// Configuration for the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Upper bound on draining in-flight requests during shutdown
    pub shutdown_timeout: Duration,
    /// Subject every published message goes to
    pub subject: String,
    /// Durable consumer used to poll for messages
    pub consumer: String,
    /// How long a poll waits for a message before answering 204
    pub poll_timeout: Duration,
}

impl ApiConfig {
    /// Per-request budget enforced by the router
    pub fn request_timeout(&self) -> Duration {
        self.read_timeout + self.write_timeout
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            subject: "test.jetstream1.messages".to_string(),
            consumer: "latest-message-consumer".to_string(),
            poll_timeout: Duration::from_secs(1),
        }
    }
}
