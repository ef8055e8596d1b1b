//! The publishing interface shared by every client.

use std::future::Future;

use bytes::Bytes;

use super::error::Result;

/// Common surface of the NATS clients: publish to a subject and shut down.
///
/// Implementations forward straight to the broker; they add no ordering,
/// batching or retry of their own.
pub trait EventProcessor: Send + Sync {
    /// Publish `data` to `subject`.
    ///
    /// For JetStream backed clients this waits for the broker acknowledgment,
    /// so an `Ok` means the message has been stored.
    fn publish_to_stream(
        &self,
        subject: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Gracefully shut down the client and its connection.
    ///
    /// Calling `close` more than once is allowed and returns `Ok`.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
