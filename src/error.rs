//! Crate-wide error type.
//!
//! Every fallible call returns [`Result<T>`]:
//!
//! ```ignore
//! use tabfind::{Coordinator, Result};
//!
//! async fn find(coordinator: &mut Coordinator) -> Result<()> {
//!     coordinator.submit("needle").await?;
//!     Ok(())
//! }
//! ```
//!
//! | Group | Variants |
//! |-------|----------|
//! | Setup | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Link to the extension | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::Protocol`] |
//! | Single tab | [`Error::Unreachable`], [`Error::StaleTransaction`], [`Error::TabNotFound`], [`Error::RequestTimeout`] |
//! | Persistence | [`Error::Storage`] |
//! | Wrapped | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! The coordinator absorbs single-tab failures ([`Error::is_tab_failure`]):
//! the tab simply contributes no matches.

// ============================================================================
// Imports
// ============================================================================

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::identifiers::{RequestId, TabId};

// ============================================================================
// Error
// ============================================================================

/// Shorthand for `std::result::Result<T, tabfind::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in `tabfind`.
#[derive(Error, Debug)]
pub enum Error {
    /// Coordinator was built without a required part, or with bad options.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// A caller passed a value the operation cannot accept.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("extension connection failed: {message}")]
    Connection { message: String },

    /// The extension did not connect, or did not send READY, in time.
    #[error("no extension connection within {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// The socket is gone; every in-flight request fails with this.
    #[error("extension connection closed")]
    ConnectionClosed,

    /// The extension sent something that does not fit the wire format.
    #[error("protocol violation: {message}")]
    Protocol { message: String },

    /// The browser refused to run the page agent in this tab
    /// (privileged page, store page, crashed renderer).
    #[error("tab unreachable: {message}")]
    Unreachable { message: String },

    /// The page agent already saw a newer transaction and dropped this one.
    #[error("stale transaction: {message}")]
    StaleTransaction { message: String },

    #[error("no tab {tab_id} in this window")]
    TabNotFound { tab_id: TabId },

    /// A tab did not answer `request_id` in time.
    #[error("request {request_id} unanswered after {timeout_ms}ms")]
    RequestTimeout {
        request_id: RequestId,
        timeout_ms: u64,
    },

    #[error("storage failure: {message}")]
    Storage { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

// ============================================================================
// Constructors
// ============================================================================

impl Error {
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    #[inline]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    #[inline]
    pub fn stale_transaction(message: impl Into<String>) -> Self {
        Self::StaleTransaction {
            message: message.into(),
        }
    }

    #[inline]
    pub fn tab_not_found(tab_id: TabId) -> Self {
        Self::TabNotFound { tab_id }
    }

    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    #[inline]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

impl Error {
    /// Whether a deadline expired, on the link or on a single request.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Whether the link to the extension itself is broken.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Whether the failure is confined to one tab.
    ///
    /// The coordinator records such a tab as having zero matches.
    #[inline]
    #[must_use]
    pub fn is_tab_failure(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. }
                | Self::StaleTransaction { .. }
                | Self::TabNotFound { .. }
                | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: u32) -> TabId {
        TabId::new(id).expect("valid tab id")
    }

    #[test]
    fn test_messages_carry_context() {
        assert_eq!(
            Error::connection("refused").to_string(),
            "extension connection failed: refused"
        );
        assert_eq!(
            Error::config("missing tab oracle").to_string(),
            "invalid configuration: missing tab oracle"
        );
        assert_eq!(
            Error::tab_not_found(tab(4)).to_string(),
            "no tab 4 in this window"
        );
    }

    #[test]
    fn test_request_timeout_is_both_timeout_and_tab_failure() {
        let err = Error::request_timeout(RequestId::generate(), 5000);

        assert!(err.is_timeout());
        assert!(err.is_tab_failure());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_link_failures_are_not_tab_failures() {
        for err in [
            Error::connection("reset"),
            Error::connection_timeout(1000),
            Error::ConnectionClosed,
        ] {
            assert!(err.is_connection_error(), "{err}");
            assert!(!err.is_tab_failure(), "{err}");
        }
        assert!(Error::connection_timeout(1000).is_timeout());
    }

    #[test]
    fn test_tab_failures() {
        assert!(Error::unreachable("about:addons").is_tab_failure());
        assert!(Error::stale_transaction("7 <= 9").is_tab_failure());
        assert!(Error::tab_not_found(tab(3)).is_tab_failure());

        assert!(!Error::storage("disk full").is_tab_failure());
        assert!(!Error::config("no browser").is_tab_failure());
        assert!(!Error::protocol("bad frame").is_tab_failure());
    }

    #[test]
    fn test_wrapped_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert!(matches!(Error::from(io), Error::Io(_)));

        let json = serde_json::from_str::<u32>("\"seven\"").unwrap_err();
        assert!(matches!(Error::from(json), Error::Json(_)));
    }
}
