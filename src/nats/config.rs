//! Connection configuration shared by all NATS clients.
//!
//! A [`Config`] is built once per process (usually from the environment) and
//! handed by reference to every client constructor. Clients keep their own
//! clone, so the configuration is never mutated after construction.

use std::path::PathBuf;
use std::time::Duration;

use super::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_MAX_RECONNECTS, DEFAULT_NATS_URL,
    DEFAULT_RECONNECT_WAIT_SECS,
};
use super::error::{EventProcessorError, Result};

/// Connection settings for a NATS server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// NATS server URL
    pub url: String,
    /// Authentication token. Deprecated: prefer `creds_file` for JWT authentication.
    pub token: Option<String>,
    /// Path to a credentials file for JWT authentication
    pub creds_file: Option<PathBuf>,
    /// Maximum number of reconnection attempts
    pub max_reconnects: usize,
    /// Wait between reconnection attempts
    pub reconnect_wait: Duration,
    /// Timeout for establishing the initial connection
    pub connection_timeout: Duration,
    /// Timeout for request/reply style calls (JetStream API, acks).
    /// `None` keeps the client library default.
    pub request_timeout: Option<Duration>,
    /// Name reported to the server for this connection
    pub client_name: Option<String>,
}

impl Config {
    /// Create a configuration for `url` with default reconnect settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            creds_file: None,
            max_reconnects: DEFAULT_MAX_RECONNECTS,
            reconnect_wait: Duration::from_secs(DEFAULT_RECONNECT_WAIT_SECS),
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
            request_timeout: None,
            client_name: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `NATS_URL` | `url` (defaults to `nats://localhost:4222`) |
    /// | `NATS_TOKEN` | `token` |
    /// | `NATS_CREDS` | `creds_file` |
    /// | `NATS_MAX_RECONNECTS` | `max_reconnects` |
    /// | `NATS_RECONNECT_WAIT_SECS` | `reconnect_wait` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset. Numbers that fail to parse are
    /// logged and replaced by their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(get("NATS_URL").unwrap_or_else(|| DEFAULT_NATS_URL.to_string()));
        config.token = get("NATS_TOKEN");
        config.creds_file = get("NATS_CREDS").map(PathBuf::from);

        if let Some(raw) = get("NATS_MAX_RECONNECTS") {
            match raw.parse::<usize>() {
                Ok(n) => config.max_reconnects = n,
                Err(_) => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_MAX_RECONNECTS,
                    "Invalid NATS_MAX_RECONNECTS value, using default"
                ),
            }
        }

        if let Some(raw) = get("NATS_RECONNECT_WAIT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => config.reconnect_wait = Duration::from_secs(secs),
                Err(_) => tracing::warn!(
                    value = %raw,
                    default = DEFAULT_RECONNECT_WAIT_SECS,
                    "Invalid NATS_RECONNECT_WAIT_SECS value, using default"
                ),
            }
        }

        config
    }

    /// Check the preconditions required before connecting
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(EventProcessorError::InvalidConfig("NATS URL must not be empty".to_string()));
        }
        Ok(())
    }

    /// Build the connect options for this configuration.
    ///
    /// A credentials file takes precedence over a token.
    pub async fn connect_options(&self) -> Result<async_nats::ConnectOptions> {
        let mut options = match (&self.creds_file, &self.token) {
            (Some(path), _) => async_nats::ConnectOptions::new()
                .credentials_file(path)
                .await
                .map_err(|e| {
                    EventProcessorError::InvalidConfig(format!(
                        "failed to load credentials file {}: {}",
                        path.display(),
                        e
                    ))
                })?,
            (None, Some(token)) => async_nats::ConnectOptions::new().token(token.clone()),
            (None, None) => async_nats::ConnectOptions::new(),
        };

        let reconnect_wait = self.reconnect_wait;
        options = options
            .max_reconnects(self.max_reconnects)
            .reconnect_delay_callback(move |_attempts| reconnect_wait)
            .connection_timeout(self.connection_timeout)
            .request_timeout(self.request_timeout)
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Connected => tracing::info!("NATS connection established"),
                    async_nats::Event::Disconnected => tracing::warn!("NATS connection lost"),
                    other => tracing::warn!(event = %other, "NATS connection event"),
                }
            });

        if let Some(name) = &self.client_name {
            options = options.name(name);
        }

        Ok(options)
    }

    /// Validate the configuration and open a connection
    pub async fn connect(&self) -> Result<async_nats::Client> {
        self.validate()?;

        let options = self.connect_options().await?;
        let client = options
            .connect(self.url.as_str())
            .await
            .map_err(|e| EventProcessorError::Connect(e.to_string()))?;

        tracing::info!(url = %self.url, "Connected to NATS");

        Ok(client)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_NATS_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[]));

        assert_eq!(config.url, DEFAULT_NATS_URL);
        assert_eq!(config.token, None);
        assert_eq!(config.creds_file, None);
        assert_eq!(config.max_reconnects, 5);
        assert_eq!(config.reconnect_wait, Duration::from_secs(5));
    }

    #[test]
    fn test_reads_environment_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("NATS_URL", "nats://broker:4222"),
            ("NATS_TOKEN", "secret"),
            ("NATS_CREDS", "/etc/nats/user.creds"),
            ("NATS_MAX_RECONNECTS", "12"),
            ("NATS_RECONNECT_WAIT_SECS", "2"),
        ]));

        assert_eq!(config.url, "nats://broker:4222");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.creds_file, Some(PathBuf::from("/etc/nats/user.creds")));
        assert_eq!(config.max_reconnects, 12);
        assert_eq!(config.reconnect_wait, Duration::from_secs(2));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = Config::from_lookup(lookup_from(&[("NATS_URL", ""), ("NATS_TOKEN", "  ")]));

        assert_eq!(config.url, DEFAULT_NATS_URL);
        assert_eq!(config.token, None);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("NATS_MAX_RECONNECTS", "many"),
            ("NATS_RECONNECT_WAIT_SECS", "-1"),
        ]));

        assert_eq!(config.max_reconnects, DEFAULT_MAX_RECONNECTS);
        assert_eq!(config.reconnect_wait, Duration::from_secs(DEFAULT_RECONNECT_WAIT_SECS));
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let err = Config::new("   ").validate().unwrap_err();
        assert!(err.is_invalid_config());

        assert!(Config::new("nats://localhost:4222").validate().is_ok());
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_url_before_dialing() {
        let err = Config::new("").connect().await.err().unwrap();
        assert!(err.is_invalid_config());
    }

    #[tokio::test]
    async fn test_missing_credentials_file_is_invalid_config() {
        let mut config = Config::new("nats://localhost:4222");
        config.creds_file = Some(PathBuf::from("/nonexistent/path/user.creds"));

        let err = config.connect_options().await.err().unwrap();
        assert!(err.is_invalid_config());
    }
}
