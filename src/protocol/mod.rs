//! Protocol message types.
//!
//! This module defines the messages exchanged between the coordinator and
//! the extension: page commands, browser tab commands, notices, responses
//! and events. Every message shape is a closed, tagged enum variant.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Coordinator → Extension | Page or tab command |
//! | `Response` | Extension → Coordinator | Command result |
//! | `Notice` | Coordinator → Extension | Fire-and-forget page notification |
//! | `Event` | Extension → Coordinator | UI command, page report, tab change |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types and page reports |
//! | `request` | Request, Notice, Response and typed results |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by module.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{BrowserCommand, Command, Direction, PageCommand, PageNotice};
pub use event::{Event, ParsedEvent, TabReport};
pub use request::{
    AdvanceResult, ERROR_STALE_TRANSACTION, ERROR_UNREACHABLE, Notice, Request, Response,
    ResponseType, ScanResult, TabsResult,
};
