//! Tab traversal order.
//!
//! The traversal order of a window is its native tab order rotated so the
//! active tab comes first and the tabs after it follow, wrapping to the
//! start of the window.

// ============================================================================
// Imports
// ============================================================================

use crate::browser::TabInfo;
use crate::identifiers::TabId;
use crate::protocol::Direction;

use super::store::TabStateStore;

// ============================================================================
// Functions
// ============================================================================

/// Returns the active tab of a tab listing.
#[inline]
#[must_use]
pub fn active_tab(tabs: &[TabInfo]) -> Option<TabId> {
    tabs.iter().find(|tab| tab.active).map(|tab| tab.tab_id)
}

/// Rotates a tab listing to start at the active tab.
///
/// Tabs are sorted by native index first. A listing without an active tab
/// keeps native order.
#[must_use]
pub fn traversal_order(tabs: &[TabInfo]) -> Vec<TabId> {
    let mut sorted: Vec<&TabInfo> = tabs.iter().collect();
    sorted.sort_by_key(|tab| tab.index);

    let start = sorted.iter().position(|tab| tab.active).unwrap_or(0);
    let mut order: Vec<TabId> = sorted.iter().map(|tab| tab.tab_id).collect();
    order.rotate_left(start);
    order
}

/// Next tab with matches after `order[0]`, walking in `direction`.
///
/// `Next` walks the order forward; `Previous` walks it backward, wrapping
/// from the active tab to the last tab of the window. The first entry is
/// never returned.
#[must_use]
pub fn next_tab_with_matches(
    order: &[TabId],
    store: &TabStateStore,
    direction: Direction,
) -> Option<TabId> {
    let rest = order.get(1..)?;
    let has_matches = |tab_id: &&TabId| store.match_count(**tab_id) > 0;

    match direction {
        Direction::Next => rest.iter().find(has_matches).copied(),
        Direction::Previous => rest.iter().rev().find(has_matches).copied(),
    }
}

// ============================================================================
// Tests
// ============================================================================
