//! Event message types.
//!
//! Events are notifications sent from the extension to the coordinator:
//! user commands raised by the overlay UI, asynchronous page reports and
//! browser tab lifecycle changes.
//!
//! # Event Types
//!
//! | Module | Events |
//! |--------|--------|
//! | `search` | `submit`, `next`, `previous`, `close`, `toggleOverlay` |
//! | `page` | `report` |
//! | `layover` | `moved` |
//! | `tabs` | `activated`, `created`, `removed`, `updated` |
//! | `runtime` | `installed` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{Epoch, RequestId, TabId};
use crate::session::{LayoverPosition, SerializedMatches};

// ============================================================================
// Event
// ============================================================================

/// An event notification from the extension.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "type": "event",
///   "method": "module.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier of the event.
    pub id: RequestId,

    /// Event type marker (always "event").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event name in `module.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Creates an event with a fresh ID.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: RequestId::generate(),
            event_type: "event".to_string(),
            method: method.into(),
            params,
        }
    }

    /// Returns the module name from the method.
    #[inline]
    #[must_use]
    pub fn module(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        self.parse_internal()
    }
}

// ============================================================================
// TabReport
// ============================================================================

/// A page context's own scan or navigation result, reported asynchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabReport {
    /// Reporting tab.
    pub tab_id: TabId,
    /// Epoch of the scan this report belongs to.
    pub epoch: Epoch,
    /// Number of matches on the page.
    pub match_count: usize,
    /// Focused match index within the page.
    #[serde(default)]
    pub current_index: usize,
    /// Opaque match locations.
    #[serde(default)]
    pub serialized_matches: SerializedMatches,
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// User submitted the search box.
    Submit {
        /// Search text.
        query: String,
    },

    /// User asked for the next match.
    Next,

    /// User asked for the previous match.
    Previous,

    /// User closed the overlay.
    Close,

    /// Keyboard shortcut or toolbar action toggled the overlay.
    ToggleOverlay,

    /// Page reported its own match state.
    PageReport(TabReport),

    /// User dragged the overlay.
    LayoverMoved(LayoverPosition),

    /// Browser switched the visible tab.
    TabActivated {
        /// Newly active tab.
        tab_id: TabId,
    },

    /// A tab was opened.
    TabCreated {
        /// New tab.
        tab_id: TabId,
    },

    /// A tab was closed.
    TabRemoved {
        /// Closed tab.
        tab_id: TabId,
    },

    /// A tab navigated or reloaded.
    TabUpdated {
        /// Updated tab.
        tab_id: TabId,
    },

    /// Extension installed or upgraded.
    Installed,

    /// Unknown or malformed event.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Event Parsing Implementation
// ============================================================================

impl Event {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> ParsedEvent {
        let parsed = match self.method.as_str() {
            "search.submit" => Some(ParsedEvent::Submit {
                query: self.get_string("query"),
            }),
            "search.next" => Some(ParsedEvent::Next),
            "search.previous" => Some(ParsedEvent::Previous),
            "search.close" => Some(ParsedEvent::Close),
            "search.toggleOverlay" => Some(ParsedEvent::ToggleOverlay),

            "page.report" => serde_json::from_value::<TabReport>(self.params.clone())
                .ok()
                .map(ParsedEvent::PageReport),

            "layover.moved" => Some(ParsedEvent::LayoverMoved(LayoverPosition {
                x: self.get_i32("x"),
                y: self.get_i32("y"),
            })),

            "tabs.activated" => self
                .get_tab_id()
                .map(|tab_id| ParsedEvent::TabActivated { tab_id }),
            "tabs.created" => self
                .get_tab_id()
                .map(|tab_id| ParsedEvent::TabCreated { tab_id }),
            "tabs.removed" => self
                .get_tab_id()
                .map(|tab_id| ParsedEvent::TabRemoved { tab_id }),
            "tabs.updated" => self
                .get_tab_id()
                .map(|tab_id| ParsedEvent::TabUpdated { tab_id }),

            "runtime.installed" => Some(ParsedEvent::Installed),

            _ => None,
        };

        parsed.unwrap_or_else(|| ParsedEvent::Unknown {
            method: self.method.clone(),
            params: self.params.clone(),
        })
    }

    /// Gets a string from params.
    #[inline]
    fn get_string(&self, key: &str) -> String {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets an i32 from params.
    #[inline]
    fn get_i32(&self, key: &str) -> i32 {
        self.params
            .get(key)
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or_default()
    }

    /// Gets the `tabId` param, rejecting missing or zero ids.
    #[inline]
    fn get_tab_id(&self) -> Option<TabId> {
        self.params
            .get("tabId")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .and_then(TabId::new)
    }
}

// ============================================================================
// Tests
// ============================================================================
