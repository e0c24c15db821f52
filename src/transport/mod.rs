//! WebSocket transport layer.
//!
//! This module handles communication between the coordinator (Rust) and
//! the extension background via WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Coordinator     │                              │  Extension      │
//! │                  │         WebSocket            │  (Background)   │
//! │  PendingServer   │◄────────────────────────────►│                 │
//! │  → Connection    │      localhost:PORT          │  Page contexts  │
//! │  → Messenger     │                              │  via tabs API   │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `PendingServer::bind` - Bind to localhost with random port
//! 2. Extension background connects to the WebSocket URL
//! 3. `PendingServer::accept` - Wait for the connection and READY
//! 4. `Connection` - Send requests and notices, receive responses/events
//! 5. `Connection::shutdown` - Close the connection
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `messenger` | [`Messenger`] seam used by the coordinator |
//! | `server` | WebSocket server binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Request/response messaging seam.
pub mod messenger;

/// WebSocket server the extension connects to.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, EventHandler, ReadyData};
pub use messenger::Messenger;
pub use server::PendingServer;
