//! Request/response messaging seam.
//!
//! The coordinator talks to page contexts and the browser only through
//! [`Messenger`], so the same coordinator runs over a live WebSocket
//! [`Connection`](super::Connection) or an in-process fake.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{Notice, Request, Response};

// ============================================================================
// Messenger
// ============================================================================

/// Delivers requests to the extension and correlates their responses.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a request and waits for its response.
    ///
    /// An error response is returned as `Ok`; callers turn it into an
    /// error with [`Response::into_result`].
    ///
    /// # Errors
    ///
    /// Transport failures: closed connection, timeout, serialization.
    async fn send(&self, request: Request) -> Result<Response>;

    /// Like [`send`](Self::send), giving up after `limit`.
    ///
    /// Implementations that track in-flight requests should override this
    /// so a timed-out request stops counting against them.
    ///
    /// # Errors
    ///
    /// [`Error::RequestTimeout`] past `limit`, otherwise as [`send`](Self::send).
    async fn send_with_timeout(&self, request: Request, limit: Duration) -> Result<Response> {
        let request_id = request.id;
        match timeout(limit, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::request_timeout(
                request_id,
                u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Sends a fire-and-forget notice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the notice cannot be queued.
    async fn notify(&self, notice: Notice) -> Result<()>;
}
