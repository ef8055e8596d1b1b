//! Error type shared by the NATS clients.

use std::fmt;

/// Errors surfaced by the NATS clients.
///
/// Every broker failure is wrapped with the operation that produced it;
/// nothing is retried or recovered locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventProcessorError {
    InvalidConfig(String),
    Connect(String),
    Publish(String),
    Subscribe(String),
    Stream(String),
    Consumer(String),
    /// The client has already been closed.
    Closed,
}

impl EventProcessorError {
    /// Returns true for configuration errors detected before touching the broker.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, EventProcessorError::InvalidConfig(_))
    }
}

impl fmt::Display for EventProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventProcessorError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            EventProcessorError::Connect(msg) => write!(f, "failed to connect to NATS: {}", msg),
            EventProcessorError::Publish(msg) => write!(f, "failed to publish message: {}", msg),
            EventProcessorError::Subscribe(msg) => write!(f, "failed to subscribe: {}", msg),
            EventProcessorError::Stream(msg) => write!(f, "stream error: {}", msg),
            EventProcessorError::Consumer(msg) => write!(f, "consumer error: {}", msg),
            EventProcessorError::Closed => write!(f, "client is closed"),
        }
    }
}

impl std::error::Error for EventProcessorError {}

/// Result alias used throughout the NATS clients
pub type Result<T> = std::result::Result<T, EventProcessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = EventProcessorError::Connect("connection refused".to_string());
        assert_eq!(err.to_string(), "failed to connect to NATS: connection refused");

        let err = EventProcessorError::Publish("no responders".to_string());
        assert_eq!(err.to_string(), "failed to publish message: no responders");
    }

    #[test]
    fn test_invalid_config_classification() {
        assert!(EventProcessorError::InvalidConfig("empty url".to_string()).is_invalid_config());
        assert!(!EventProcessorError::Closed.is_invalid_config());
    }
}
