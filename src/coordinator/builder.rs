//! Builder pattern for coordinator configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! use tabfind::browser::BrowserWindow;
//! use tabfind::coordinator::Coordinator;
//! use tabfind::storage::FileStore;
//! use tabfind::transport::PendingServer;
//!
//! # async fn example() -> tabfind::Result<()> {
//! let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//! let window = BrowserWindow::accept(server).await?;
//! let events = window.subscribe();
//!
//! let mut coordinator = Coordinator::builder()
//!     .window(window)
//!     .storage(Arc::new(FileStore::open("state/tabfind.json")?))
//!     .build()?;
//!
//! coordinator.restore().await?;
//! coordinator.serve(events).await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::browser::{BrowserWindow, TabOrderResolver};
use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::transport::Messenger;

use super::core::Coordinator;
use super::options::CoordinatorOptions;

// ============================================================================
// CoordinatorBuilder
// ============================================================================

/// Builder for configuring a [`Coordinator`].
///
/// Use [`Coordinator::builder()`] to create a new builder.
#[derive(Default)]
pub struct CoordinatorBuilder {
    /// Tab listing and activation.
    browser: Option<Arc<dyn TabOrderResolver>>,
    /// Page messaging.
    messenger: Option<Arc<dyn Messenger>>,
    /// Persistence, in memory if unset.
    storage: Option<Arc<dyn KeyValueStore>>,
    /// Tunables.
    options: CoordinatorOptions,
}

impl fmt::Debug for CoordinatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorBuilder")
            .field("browser", &self.browser.is_some())
            .field("messenger", &self.messenger.is_some())
            .field("storage", &self.storage.is_some())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// CoordinatorBuilder Implementation
// ============================================================================

impl CoordinatorBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tab order oracle.
    #[inline]
    #[must_use]
    pub fn browser<T: TabOrderResolver + 'static>(mut self, browser: Arc<T>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Sets the page messenger.
    #[inline]
    #[must_use]
    pub fn messenger<T: Messenger + 'static>(mut self, messenger: Arc<T>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Uses a connected window as both tab oracle and messenger.
    #[must_use]
    pub fn window(self, window: BrowserWindow) -> Self {
        let window = Arc::new(window);
        self.browser(Arc::clone(&window)).messenger(window)
    }

    /// Sets the persistence backend.
    #[inline]
    #[must_use]
    pub fn storage<T: KeyValueStore + 'static>(mut self, storage: Arc<T>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: CoordinatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the coordinator with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if browser or messenger not set
    /// - [`Error::Config`] if the request timeout is zero
    pub fn build(self) -> Result<Coordinator> {
        let browser = self.browser.ok_or_else(|| {
            Error::config(
                "Tab order resolver is required. Use .browser() or .window() to set it.",
            )
        })?;

        let messenger = self.messenger.ok_or_else(|| {
            Error::config("Messenger is required. Use .messenger() or .window() to set it.")
        })?;

        if self.options.request_timeout.is_zero() {
            return Err(Error::config("Request timeout must be greater than zero"));
        }

        if self.options.max_in_flight == 0 {
            return Err(Error::config("At least one request must be allowed in flight"));
        }

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        Ok(Coordinator::new(browser, messenger, storage, self.options))
    }
}

// ============================================================================
// Tests
// ============================================================================
