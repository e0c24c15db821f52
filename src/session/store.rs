//! Tab State Store.
//!
//! Maps each searched tab to its last-known [`TabMatchState`] and keeps the
//! traversal order used to assign global offsets.
//!
//! Updates merge field-by-field into the existing entry, so an update to
//! one tab never clobbers another tab's entry. Offsets are recomputed in
//! full only when membership or order changes; a count change on an
//! existing tab only shifts the tabs after it.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::{FxHashMap, FxHashSet};

use crate::identifiers::TabId;

use super::state::{SerializedMatches, TabMatchState};

// ============================================================================
// TabUpdate
// ============================================================================

/// Partial update for one tab; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabUpdate {
    /// New match count.
    pub match_count: Option<usize>,
    /// New focused index.
    pub current_index: Option<usize>,
    /// New match locations.
    pub serialized_matches: Option<SerializedMatches>,
}

impl TabUpdate {
    /// Update from a fresh scan: count and matches, focus reset to 0.
    #[must_use]
    pub fn scanned(match_count: usize, serialized_matches: SerializedMatches) -> Self {
        Self {
            match_count: Some(match_count),
            current_index: Some(0),
            serialized_matches: Some(serialized_matches),
        }
    }

    /// Update that only moves focus.
    #[must_use]
    pub fn focused(current_index: usize) -> Self {
        Self {
            current_index: Some(current_index),
            ..Self::default()
        }
    }

    /// Sets the match count.
    #[must_use]
    pub fn with_match_count(mut self, match_count: usize) -> Self {
        self.match_count = Some(match_count);
        self
    }
}

/// What a merge did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeEffect {
    /// New tab entry; offsets recomputed.
    Inserted,
    /// Existing entry's count changed; later offsets shifted.
    CountChanged,
    /// Existing entry updated without touching offsets.
    Updated,
}

// ============================================================================
// TabStateStore
// ============================================================================

/// Per-tab match state for one session.
#[derive(Debug, Clone, Default)]
pub struct TabStateStore {
    /// Entries by tab.
    entries: FxHashMap<TabId, TabMatchState>,
    /// Traversal order offsets are computed in.
    order: Vec<TabId>,
    /// Tabs still expected to report for the in-flight search.
    pending: FxHashSet<TabId>,
}

impl TabStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry, the order and pending expectations.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.pending.clear();
    }

    /// Number of recorded tabs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no tab is recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// State of one tab.
    #[inline]
    #[must_use]
    pub fn get(&self, tab_id: TabId) -> Option<&TabMatchState> {
        self.entries.get(&tab_id)
    }

    /// Match count of one tab, 0 if unknown.
    #[inline]
    #[must_use]
    pub fn match_count(&self, tab_id: TabId) -> usize {
        self.get(tab_id).map_or(0, |state| state.match_count)
    }

    /// Traversal order offsets are computed in.
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[TabId] {
        &self.order
    }

    /// Recorded states in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = &TabMatchState> {
        self.order.iter().filter_map(|tab_id| self.entries.get(tab_id))
    }

    /// Sum of match counts.
    #[must_use]
    pub fn total_matches(&self) -> usize {
        self.entries.values().map(|state| state.match_count).sum()
    }

    /// Replaces the traversal order and recomputes every offset.
    ///
    /// Recorded tabs missing from `order` keep their relative position at
    /// the end.
    pub fn set_order(&mut self, order: Vec<TabId>) {
        let mut seen: FxHashSet<TabId> = FxHashSet::default();
        let mut merged: Vec<TabId> = order.into_iter().filter(|id| seen.insert(*id)).collect();
        merged.extend(
            self.order
                .iter()
                .copied()
                .filter(|id| self.entries.contains_key(id) && !seen.contains(id)),
        );
        self.order = merged;
        self.recompute_offsets();
    }

    /// Merges an update into a tab's entry, creating it if needed.
    pub fn merge(&mut self, tab_id: TabId, update: TabUpdate) -> MergeEffect {
        let Some(state) = self.entries.get_mut(&tab_id) else {
            let mut state = TabMatchState::new(tab_id);
            Self::apply(&mut state, update);
            self.entries.insert(tab_id, state);
            if !self.order.contains(&tab_id) {
                self.order.push(tab_id);
            }
            self.recompute_offsets();
            return MergeEffect::Inserted;
        };

        let previous_count = state.match_count;
        Self::apply(state, update);

        if state.match_count == previous_count {
            return MergeEffect::Updated;
        }

        let position = self.order.iter().position(|id| *id == tab_id).unwrap_or(0);
        self.recompute_from(position);
        MergeEffect::CountChanged
    }

    /// Removes a tab, returning its last state.
    pub fn remove(&mut self, tab_id: TabId) -> Option<TabMatchState> {
        self.pending.remove(&tab_id);
        self.order.retain(|id| *id != tab_id);
        let removed = self.entries.remove(&tab_id);
        if removed.is_some() {
            self.recompute_offsets();
        }
        removed
    }

    /// Inserts a complete state, as restored from persistence.
    pub fn restore(&mut self, state: TabMatchState) {
        let tab_id = state.tab_id;
        self.entries.insert(tab_id, state);
        if !self.order.contains(&tab_id) {
            self.order.push(tab_id);
        }
        self.recompute_offsets();
    }

    // ========================================================================
    // Pending Reports
    // ========================================================================

    /// Marks tabs as expected to report for the in-flight search.
    pub fn expect(&mut self, tabs: impl IntoIterator<Item = TabId>) {
        self.pending.extend(tabs);
    }

    /// Marks a tab's report as received (or failed).
    ///
    /// Returns `true` if it was the last expected report.
    pub fn settle(&mut self, tab_id: TabId) -> bool {
        self.pending.remove(&tab_id) && self.pending.is_empty()
    }

    /// Returns `true` if no report is outstanding.
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of outstanding reports.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Applies the present fields of an update.
    fn apply(state: &mut TabMatchState, update: TabUpdate) {
        if let Some(match_count) = update.match_count {
            state.match_count = match_count;
        }
        if let Some(current_index) = update.current_index {
            state.current_index = current_index;
        }
        if let Some(serialized_matches) = update.serialized_matches {
            state.serialized_matches = serialized_matches;
        }
        if state.match_count == 0 {
            state.current_index = 0;
        } else if state.current_index >= state.match_count {
            state.current_index = state.match_count - 1;
        }
    }

    /// Recomputes every offset as a prefix sum over the order.
    fn recompute_offsets(&mut self) {
        self.recompute_from(0);
    }

    /// Recomputes offsets from `position` onward.
    fn recompute_from(&mut self, position: usize) {
        let mut running = self.order[..position.min(self.order.len())]
            .iter()
            .rev()
            .find_map(|id| self.entries.get(id))
            .map_or(0, |state| state.global_offset + state.match_count);

        for tab_id in self.order.iter().skip(position) {
            if let Some(state) = self.entries.get_mut(tab_id) {
                state.global_offset = running;
                running += state.match_count;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn tab(id: u32) -> TabId {
        TabId::new(id).expect("valid tab id")
    }

    fn scanned(count: usize) -> TabUpdate {
        TabUpdate::scanned(count, SerializedMatches::default())
    }

    #[test]
    fn test_merge_inserts_and_assigns_offsets() {
        let mut store = TabStateStore::new();
        store.set_order(vec![tab(1), tab(2), tab(3)]);

        assert_eq!(store.merge(tab(3), scanned(5)), MergeEffect::Inserted);
        assert_eq!(store.merge(tab(1), scanned(2)), MergeEffect::Inserted);
        assert_eq!(store.merge(tab(2), scanned(0)), MergeEffect::Inserted);

        assert_eq!(store.get(tab(1)).map(|s| s.global_offset), Some(0));
        assert_eq!(store.get(tab(2)).map(|s| s.global_offset), Some(2));
        assert_eq!(store.get(tab(3)).map(|s| s.global_offset), Some(2));
        assert_eq!(store.total_matches(), 7);
    }

    #[test]
    fn test_merge_does_not_clobber_other_fields() {
        let mut store = TabStateStore::new();
        store.merge(tab(1), TabUpdate::scanned(4, SerializedMatches::new("blob")));

        assert_eq!(store.merge(tab(1), TabUpdate::focused(3)), MergeEffect::Updated);

        let state = store.get(tab(1)).expect("state");
        assert_eq!(state.current_index, 3);
        assert_eq!(state.match_count, 4);
        assert_eq!(state.serialized_matches.as_str(), "blob");
    }

    #[test]
    fn test_count_change_shifts_following_offsets() {
        let mut store = TabStateStore::new();
        store.set_order(vec![tab(1), tab(2), tab(3)]);
        store.merge(tab(1), scanned(1));
        store.merge(tab(2), scanned(2));
        store.merge(tab(3), scanned(3));

        assert_eq!(store.merge(tab(2), scanned(10)), MergeEffect::CountChanged);

        assert_eq!(store.get(tab(1)).map(|s| s.global_offset), Some(0));
        assert_eq!(store.get(tab(2)).map(|s| s.global_offset), Some(1));
        assert_eq!(store.get(tab(3)).map(|s| s.global_offset), Some(11));
    }

    #[test]
    fn test_index_is_clamped() {
        let mut store = TabStateStore::new();
        store.merge(tab(1), scanned(3));
        store.merge(tab(1), TabUpdate::focused(9));
        assert_eq!(store.get(tab(1)).map(|s| s.current_index), Some(2));

        store.merge(tab(1), scanned(0));
        assert_eq!(store.get(tab(1)).map(|s| s.current_index), Some(0));
    }

    #[test]
    fn test_remove_recomputes() {
        let mut store = TabStateStore::new();
        store.set_order(vec![tab(1), tab(2), tab(3)]);
        store.merge(tab(1), scanned(4));
        store.merge(tab(2), scanned(1));
        store.merge(tab(3), scanned(2));

        let removed = store.remove(tab(1)).expect("removed");
        assert_eq!(removed.match_count, 4);
        assert_eq!(store.get(tab(2)).map(|s| s.global_offset), Some(0));
        assert_eq!(store.get(tab(3)).map(|s| s.global_offset), Some(1));
        assert_eq!(store.order(), &[tab(2), tab(3)]);
        assert!(store.remove(tab(1)).is_none());
    }

    #[test]
    fn test_set_order_keeps_unlisted_entries() {
        let mut store = TabStateStore::new();
        store.merge(tab(1), scanned(1));
        store.merge(tab(2), scanned(2));

        store.set_order(vec![tab(3), tab(2)]);
        assert_eq!(store.order(), &[tab(3), tab(2), tab(1)]);
        assert_eq!(store.get(tab(2)).map(|s| s.global_offset), Some(0));
        assert_eq!(store.get(tab(1)).map(|s| s.global_offset), Some(2));
    }

    #[test]
    fn test_pending_settles_on_last_report() {
        let mut store = TabStateStore::new();
        store.expect([tab(1), tab(2)]);
        assert_eq!(store.pending_count(), 2);

        assert!(!store.settle(tab(1)));
        assert!(!store.settle(tab(1)));
        assert!(store.settle(tab(2)));
        assert!(store.is_settled());
    }

    #[test]
    fn test_clear() {
        let mut store = TabStateStore::new();
        store.expect([tab(1)]);
        store.merge(tab(1), scanned(1));
        store.clear();

        assert!(store.is_empty());
        assert!(store.is_settled());
        assert!(store.order().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn offsets_form_prefix_sums(
            counts in prop::collection::vec(0usize..20, 1..12),
            merge_order in prop::collection::vec(any::<prop::sample::Index>(), 0..24),
        ) {
            let tabs: Vec<TabId> = (1..=counts.len() as u32).map(tab).collect();
            let mut store = TabStateStore::new();
            store.set_order(tabs.clone());

            // Merge in arbitrary completion order, including repeats.
            for index in &merge_order {
                let i = index.index(tabs.len());
                store.merge(tabs[i], scanned(counts[i]));
            }
            for (i, tab_id) in tabs.iter().enumerate() {
                store.merge(*tab_id, scanned(counts[i]));
            }

            let mut expected_offset = 0;
            for (i, tab_id) in tabs.iter().enumerate() {
                let state = store.get(*tab_id).expect("state");
                prop_assert_eq!(state.global_offset, expected_offset);
                expected_offset += counts[i];
            }
            prop_assert_eq!(store.total_matches(), counts.iter().sum::<usize>());
        }
    }
}
