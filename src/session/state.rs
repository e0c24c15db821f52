//! Session and per-tab match state.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{Epoch, TabId};

use super::store::TabStateStore;

// ============================================================================
// SerializedMatches
// ============================================================================

/// Opaque, round-trippable match locations produced by a page's matcher.
///
/// The coordinator stores and forwards it but never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedMatches(String);

impl SerializedMatches {
    /// Wraps a matcher-produced blob.
    #[inline]
    #[must_use]
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    /// Returns the raw blob.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no blob was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// LayoverPosition
// ============================================================================

/// Position of the draggable search overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoverPosition {
    /// Horizontal offset in CSS pixels.
    pub x: i32,
    /// Vertical offset in CSS pixels.
    pub y: i32,
}

// ============================================================================
// TabMatchState
// ============================================================================

/// Last-known match summary of one searched tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMatchState {
    /// Tab this state belongs to.
    pub tab_id: TabId,
    /// Number of matches on the page.
    pub match_count: usize,
    /// Zero-based focused match; meaningless while `match_count == 0`.
    pub current_index: usize,
    /// Matches of all tabs before this one in traversal order.
    pub global_offset: usize,
    /// Opaque match locations.
    #[serde(default)]
    pub serialized_matches: SerializedMatches,
}

impl TabMatchState {
    /// Creates an empty state for a tab.
    #[must_use]
    pub fn new(tab_id: TabId) -> Self {
        Self {
            tab_id,
            match_count: 0,
            current_index: 0,
            global_offset: 0,
            serialized_matches: SerializedMatches::default(),
        }
    }

    /// Returns `true` if the page has at least one match.
    #[inline]
    #[must_use]
    pub fn has_matches(&self) -> bool {
        self.match_count > 0
    }

    /// 1-based position of the focused match across all tabs.
    #[inline]
    #[must_use]
    pub fn global_index(&self) -> Option<usize> {
        self.has_matches()
            .then(|| self.global_offset + self.current_index + 1)
    }
}

// ============================================================================
// SearchSession
// ============================================================================

/// One logical search spanning every tab of a window.
///
/// Owned and mutated only by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    /// Current search text; empty means no active search.
    pub(crate) query: String,
    /// Previously committed query.
    pub(crate) last_query: String,
    /// Sum of match counts across known tabs.
    pub(crate) global_match_count: usize,
    /// Overlay shown.
    pub(crate) overlay_visible: bool,
    /// Highlights shown.
    pub(crate) matches_visible: bool,
    /// Tab the browser currently focuses.
    pub(crate) active_tab_id: Option<TabId>,
    /// Last overlay position.
    pub(crate) layover_position: LayoverPosition,
    /// Generation counter used to drop superseded responses.
    pub(crate) epoch: Epoch,
    /// Per-tab match state.
    pub(crate) tabs: TabStateStore,
}

impl SearchSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-tab state and counts, records `query`, and starts a new epoch.
    ///
    /// Visibility flags, the active tab and the overlay position survive.
    pub fn reset(&mut self, query: &str) {
        self.tabs.clear();
        self.global_match_count = 0;
        self.query = query.to_string();
        self.last_query = query.to_string();
        self.epoch = self.epoch.next();
    }

    /// Current search text.
    #[inline]
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Previously committed query.
    #[inline]
    #[must_use]
    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    /// Returns `true` while a non-empty query is active.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    /// Sum of match counts across known tabs.
    #[inline]
    #[must_use]
    pub fn global_match_count(&self) -> usize {
        self.global_match_count
    }

    /// Overlay visibility.
    #[inline]
    #[must_use]
    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    /// Highlight visibility.
    #[inline]
    #[must_use]
    pub fn matches_visible(&self) -> bool {
        self.matches_visible
    }

    /// Tab the browser currently focuses.
    #[inline]
    #[must_use]
    pub fn active_tab_id(&self) -> Option<TabId> {
        self.active_tab_id
    }

    /// Last overlay position.
    #[inline]
    #[must_use]
    pub fn layover_position(&self) -> LayoverPosition {
        self.layover_position
    }

    /// Current epoch.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Per-tab state.
    #[inline]
    #[must_use]
    pub fn tabs(&self) -> &TabStateStore {
        &self.tabs
    }

    /// Recomputes the global count from per-tab state.
    pub(crate) fn refresh_global_count(&mut self) {
        self.global_match_count = self.tabs.total_matches();
    }

    /// 1-based "X" of the "X of Y" display, from the active tab.
    #[must_use]
    pub fn global_match_index(&self) -> Option<usize> {
        self.active_tab_id
            .and_then(|tab_id| self.tabs.get(tab_id))
            .and_then(TabMatchState::global_index)
    }

    /// Builds the state one tab renders.
    #[must_use]
    pub fn snapshot(&self, tab_id: Option<TabId>) -> SessionSnapshot {
        SessionSnapshot {
            query: self.query.clone(),
            last_query: self.last_query.clone(),
            global_match_count: self.global_match_count,
            global_match_index: self.global_match_index(),
            overlay_visible: self.overlay_visible,
            matches_visible: self.matches_visible,
            active_tab_id: self.active_tab_id,
            layover_position: self.layover_position,
            epoch: self.epoch,
            tab_state: tab_id.and_then(|id| self.tabs.get(id)).cloned(),
        }
    }
}

// ============================================================================
// SessionSnapshot
// ============================================================================

/// Session state pushed to a page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current search text.
    pub query: String,
    /// Previously committed query.
    pub last_query: String,
    /// "Y" of the "X of Y" display.
    pub global_match_count: usize,
    /// "X" of the "X of Y" display.
    pub global_match_index: Option<usize>,
    /// Overlay shown.
    pub overlay_visible: bool,
    /// Highlights shown.
    pub matches_visible: bool,
    /// Tab the browser focuses.
    pub active_tab_id: Option<TabId>,
    /// Overlay position.
    pub layover_position: LayoverPosition,
    /// Session epoch.
    pub epoch: Epoch,
    /// Receiving tab's own match state.
    pub tab_state: Option<TabMatchState>,
}

// ============================================================================
// Tests
// ============================================================================
