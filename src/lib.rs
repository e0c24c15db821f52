//! Tabfind - find-in-page across every tab of a browser window.
//!
//! A search box overlay sends a query; the coordinator scans every tab of
//! the window, keeps a global match count with each tab's offset into it,
//! and moves focus match by match, crossing into the next tab with matches
//! when the current tab's matches run out.
//!
//! # Architecture
//!
//! The crate follows a coordinator/page split:
//!
//! - **Coordinator (Rust)**: Owns the search session, talks to the browser
//!   extension background over WebSocket
//! - **Page contexts**: One per tab, highlight and focus matches on request
//!
//! Key design principles:
//!
//! - One [`Coordinator`] per window, the only writer of its session
//! - State-changing page requests carry a monotonically increasing
//!   transaction id; pages drop anything older than what they applied
//! - Every new query starts a new epoch; late reports from earlier epochs
//!   are dropped
//! - Tab order is read live from the browser on every navigation step
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! use tabfind::browser::BrowserWindow;
//! use tabfind::storage::FileStore;
//! use tabfind::transport::PendingServer;
//! use tabfind::{Coordinator, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//!     println!("connect the extension to {}", server.ws_url());
//!
//!     let window = BrowserWindow::accept(server).await?;
//!     let events = window.subscribe();
//!
//!     let mut coordinator = Coordinator::builder()
//!         .window(window)
//!         .storage(Arc::new(FileStore::open("tabfind-state.json")?))
//!         .build()?;
//!
//!     coordinator.restore().await?;
//!     coordinator.serve(events).await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | Window handle and live tab listing |
//! | [`coordinator`] | Search, navigation and event handling |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`page`] | Page context side of the protocol |
//! | [`protocol`] | WebSocket message types |
//! | [`session`] | Session and per-tab match state |
//! | [`storage`] | Persisted key-value state |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Browser window handle and tab listing.
pub mod browser;

/// Search coordinator.
///
/// Use [`Coordinator::builder()`] to create a configured coordinator.
pub mod coordinator;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Page context request handling and matching.
pub mod page;

/// WebSocket protocol message types.
pub mod protocol;

/// Search session state.
pub mod session;

/// Persisted key-value state.
pub mod storage;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{BrowserWindow, TabInfo, TabOrderResolver};

// Coordinator types
pub use coordinator::{
    AdvanceOutcome, Coordinator, CoordinatorBuilder, CoordinatorOptions, ReportOutcome,
    SearchOutcome, SubmitOutcome,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Epoch, RequestId, TabId, TransactionId, WindowId};

// Page types
pub use page::{Matcher, PageAgent, TextMatcher};

// Protocol types
pub use protocol::{Direction, ParsedEvent};

// Session types
pub use session::{LayoverPosition, SearchSession, SessionSnapshot, TabMatchState};

// Storage types
pub use storage::{FileStore, KeyValueStore, MemoryStore};

// Transport types
pub use transport::Messenger;
