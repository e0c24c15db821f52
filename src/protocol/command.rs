//! Command definitions organized by module.
//!
//! Commands follow `module.methodName` format.
//!
//! # Command Modules
//!
//! | Module | Commands | Delivery |
//! |--------|----------|----------|
//! | `page` | scan, focus, advance, clear, session state | request/response |
//! | `page` | tab became active/inactive | notify |
//! | `tabs` | query window tabs, activate tab | request/response |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::TabId;
use crate::session::SessionSnapshot;

// ============================================================================
// Command Wrapper
// ============================================================================

/// All request commands organized by module.
///
/// This enum wraps module-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Page context commands.
    Page(PageCommand),
    /// Browser tab commands.
    Browser(BrowserCommand),
}

impl Command {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Page(command) => command.method(),
            Self::Browser(command) => command.method(),
        }
    }
}

// ============================================================================
// Direction
// ============================================================================

/// Traversal direction for match navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward higher match indices.
    Next,
    /// Toward lower match indices.
    Previous,
}

impl Direction {
    /// Moves `index` one step within `count` matches, wrapping around.
    ///
    /// Returns the new index and whether the step wrapped.
    #[must_use]
    pub fn step(self, index: usize, count: usize) -> (usize, bool) {
        if count == 0 {
            return (0, false);
        }
        let index = index.min(count - 1);
        match self {
            Self::Next if index + 1 == count => (0, true),
            Self::Next => (index + 1, false),
            Self::Previous if index == 0 => (count - 1, true),
            Self::Previous => (index - 1, false),
        }
    }

    /// Index to focus when landing on a tab with `count` matches.
    #[inline]
    #[must_use]
    pub fn landing_index(self, count: usize) -> usize {
        match self {
            Self::Next => 0,
            Self::Previous => count.saturating_sub(1),
        }
    }
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page context commands (request/response).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Run the matcher for a query and highlight every match.
    #[serde(rename = "page.scanAndHighlight")]
    ScanAndHighlight {
        /// Search text.
        query: String,
        /// Tab the page belongs to.
        #[serde(rename = "tabId")]
        tab_id: TabId,
        /// Leave focus untouched; the coordinator focuses explicitly.
        #[serde(rename = "suppressFocus")]
        suppress_focus: bool,
    },

    /// Visually focus one match.
    #[serde(rename = "page.focusCurrentMatch")]
    FocusCurrentMatch {
        /// Tab the page belongs to.
        #[serde(rename = "tabId")]
        tab_id: TabId,
        /// Zero-based match index to focus.
        index: usize,
    },

    /// Move local focus one step.
    #[serde(rename = "page.advanceLocal")]
    AdvanceLocal {
        /// Step direction.
        direction: Direction,
    },

    /// Remove every highlight marker.
    #[serde(rename = "page.clearHighlights")]
    ClearHighlights,

    /// Push the session state the page renders.
    #[serde(rename = "page.sessionStateChanged")]
    SessionStateChanged {
        /// Session state as seen by this tab.
        snapshot: Box<SessionSnapshot>,
    },
}

impl PageCommand {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::ScanAndHighlight { .. } => "page.scanAndHighlight",
            Self::FocusCurrentMatch { .. } => "page.focusCurrentMatch",
            Self::AdvanceLocal { .. } => "page.advanceLocal",
            Self::ClearHighlights => "page.clearHighlights",
            Self::SessionStateChanged { .. } => "page.sessionStateChanged",
        }
    }
}

// ============================================================================
// Page Notices
// ============================================================================

/// Page context notifications (fire-and-forget).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum PageNotice {
    /// The tab is now the visible one; show the overlay.
    #[serde(rename = "page.tabBecameActive")]
    TabBecameActive,

    /// The tab is no longer visible; hide the overlay.
    #[serde(rename = "page.tabBecameInactive")]
    TabBecameInactive,
}

// ============================================================================
// Browser Commands
// ============================================================================

/// Browser tab commands, answered by the extension background page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowserCommand {
    /// List tabs of the session window in native order.
    #[serde(rename = "tabs.query")]
    QueryTabs,

    /// Make a tab the visible one.
    #[serde(rename = "tabs.activate")]
    ActivateTab {
        /// Tab to activate.
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

impl BrowserCommand {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::QueryTabs => "tabs.query",
            Self::ActivateTab { .. } => "tabs.activate",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
