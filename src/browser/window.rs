//! Browser window handle.
//!
//! A [`BrowserWindow`] owns one WebSocket connection to the extension
//! background serving one browser window. It is both the live tab oracle
//! and the messenger the coordinator uses.
//!
//! # Example
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use tabfind::browser::BrowserWindow;
//! use tabfind::transport::PendingServer;
//!
//! # async fn example() -> tabfind::Result<()> {
//! let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//! println!("extension should connect to {}", server.ws_url());
//!
//! let window = BrowserWindow::accept(server).await?;
//! let events = window.subscribe();
//! let tabs = window.query_tabs().await?;
//! # let _ = (events, tabs);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::error::Result;
use crate::identifiers::{TabId, WindowId};
use crate::protocol::{BrowserCommand, Notice, ParsedEvent, Request, Response, TabsResult};
use crate::transport::{Connection, Messenger, PendingServer};

use super::tabs::{TabInfo, TabOrderResolver};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a window.
pub(crate) struct WindowInner {
    /// Unique identifier for this handle.
    pub uuid: Uuid,
    /// Window the extension serves.
    pub window_id: WindowId,
    /// WebSocket connection.
    pub connection: Connection,
    /// WebSocket port number.
    pub port: u16,
}

// ============================================================================
// BrowserWindow
// ============================================================================

/// A handle to one browser window behind the extension connection.
#[derive(Clone)]
pub struct BrowserWindow {
    /// Shared inner state.
    pub(crate) inner: Arc<WindowInner>,
}

// ============================================================================
// BrowserWindow - Display
// ============================================================================

impl fmt::Debug for BrowserWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserWindow")
            .field("uuid", &self.inner.uuid)
            .field("window_id", &self.inner.window_id)
            .field("port", &self.inner.port)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BrowserWindow - Constructor
// ============================================================================

impl BrowserWindow {
    /// Waits for the extension to connect and completes the handshake.
    ///
    /// # Errors
    ///
    /// Connection timeout, WebSocket upgrade failure or a bad READY.
    pub async fn accept(server: PendingServer) -> Result<Self> {
        let port = server.port();
        let (connection, ready) = server.accept().await?;
        Ok(Self::new(connection, ready.window_id, port))
    }

    /// Creates a window handle over an established connection.
    pub(crate) fn new(connection: Connection, window_id: WindowId, port: u16) -> Self {
        let uuid = Uuid::new_v4();

        debug!(uuid = %uuid, %window_id, port, "Window attached");

        Self {
            inner: Arc::new(WindowInner {
                uuid,
                window_id,
                connection,
                port,
            }),
        }
    }
}

// ============================================================================
// BrowserWindow - Accessors
// ============================================================================

impl BrowserWindow {
    /// Returns the browser's window id.
    #[inline]
    #[must_use]
    pub fn window_id(&self) -> WindowId {
        self.inner.window_id
    }

    /// Returns the handle's unique UUID.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> &Uuid {
        &self.inner.uuid
    }

    /// Returns the WebSocket port for this window.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.port
    }
}

// ============================================================================
// BrowserWindow - Events
// ============================================================================

impl BrowserWindow {
    /// Routes every extension event into a channel as a [`ParsedEvent`].
    ///
    /// Replaces any previous subscription.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ParsedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner
            .connection
            .set_event_handler(Box::new(move |event| {
                let parsed = event.parse();
                trace!(method = %event.method, "Forwarding event");
                let _ = tx.send(parsed);
            }));

        rx
    }

    /// Stops routing events.
    pub fn unsubscribe(&self) {
        self.inner.connection.clear_event_handler();
    }

    /// Closes the connection.
    pub fn close(&self) {
        debug!(uuid = %self.inner.uuid, "Closing window");
        self.inner.connection.shutdown();
        info!(uuid = %self.inner.uuid, "Window closed");
    }
}

// ============================================================================
// BrowserWindow - Tabs
// ============================================================================

impl BrowserWindow {
    /// Lists the window's tabs in native order.
    ///
    /// # Errors
    ///
    /// Transport failures or a malformed reply.
    pub async fn query_tabs(&self) -> Result<Vec<TabInfo>> {
        let response = self.send_command(BrowserCommand::QueryTabs).await?;
        let result: TabsResult = response.parse()?;
        trace!(count = result.tabs.len(), "Tabs queried");
        Ok(result.tabs)
    }

    /// Sends a browser command and waits for the response.
    async fn send_command(&self, command: BrowserCommand) -> Result<Response> {
        self.inner.connection.send(Request::browser(command)).await
    }
}

#[async_trait]
impl TabOrderResolver for BrowserWindow {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        self.query_tabs().await
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<()> {
        debug!(%tab_id, "Activating tab");
        self.send_command(BrowserCommand::ActivateTab { tab_id })
            .await?
            .into_result()?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for BrowserWindow {
    async fn send(&self, request: Request) -> Result<Response> {
        self.inner.connection.send(request).await
    }

    async fn send_with_timeout(&self, request: Request, limit: Duration) -> Result<Response> {
        self.inner.connection.send_with_timeout(request, limit).await
    }

    async fn notify(&self, notice: Notice) -> Result<()> {
        self.inner.connection.notify(notice)
    }
}

// ============================================================================
// Tests
// ============================================================================
