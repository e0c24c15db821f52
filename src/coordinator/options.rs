//! Coordinator configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tabfind::CoordinatorOptions;
//!
//! let options = CoordinatorOptions::new()
//!     .with_request_timeout(Duration::from_secs(2))
//!     .with_persistence(false);
//!
//! assert_eq!(options.request_timeout, Duration::from_secs(2));
//! assert!(options.broadcast_snapshots);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default time a page has to answer one request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on page requests a fan-out keeps in flight.
///
/// Stays below the connection's limit on unanswered requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

// ============================================================================
// CoordinatorOptions
// ============================================================================

/// Tunables of a [`Coordinator`](super::Coordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Time after which an unanswered page request counts as failed.
    pub request_timeout: Duration,

    /// Most page requests a fan-out (scan, clear, snapshot) has in flight.
    pub max_in_flight: usize,

    /// Write the last query, overlay position and tab states to storage.
    pub persist: bool,

    /// Push `page.sessionStateChanged` to every tab after state changes.
    pub broadcast_snapshots: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl CoordinatorOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            persist: true,
            broadcast_snapshots: true,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl CoordinatorOptions {
    /// Sets the per-request timeout.
    #[inline]
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the fan-out concurrency cap.
    #[inline]
    #[must_use]
    pub const fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Enables or disables persistence.
    #[inline]
    #[must_use]
    pub const fn with_persistence(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Enables or disables snapshot broadcasting.
    #[inline]
    #[must_use]
    pub const fn with_snapshot_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast_snapshots = broadcast;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
