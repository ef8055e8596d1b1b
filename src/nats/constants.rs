//! Default connection and consumer settings.

/// Default number of reconnection attempts.
pub const DEFAULT_MAX_RECONNECTS: usize = 5;

/// Default wait between reconnection attempts, in seconds.
pub const DEFAULT_RECONNECT_WAIT_SECS: u64 = 5;

/// Default timeout for establishing the initial connection, in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Default number of messages a pull request may ask for.
pub const DEFAULT_MAX_REQUEST_BATCH: i64 = 100;

/// Default maximum bytes a pull request may ask for (1MB).
pub const DEFAULT_MAX_REQUEST_MAX_BYTES: i64 = 1024 * 1024;

/// Inactive threshold of a consumer, as a multiple of the reconnect wait.
pub const DEFAULT_INACTIVE_THRESHOLD_MULTIPLIER: u32 = 2;

/// Fallback server URL when `NATS_URL` is not set.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
