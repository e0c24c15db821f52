//! UI commands, browser lifecycle events and the event loop.
//!
//! Every [`ParsedEvent`] maps onto one coordinator entry point. The event
//! loop handles events one at a time, so each entry point runs to
//! completion before the next event is looked at.

// ============================================================================
// Imports
// ============================================================================

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::{Direction, PageCommand, PageNotice, ParsedEvent, Response, ScanResult};
use crate::session::{LayoverPosition, TabMatchState};
use crate::storage::{self, keys};

use super::advance::AdvanceOutcome;
use super::core::Coordinator;
use super::search::SearchOutcome;

// ============================================================================
// SubmitOutcome
// ============================================================================

/// What a search-box submit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Empty query: the session was cleared.
    Cleared,
    /// Same query as last time: focus advanced.
    Advanced(AdvanceOutcome),
    /// New query: a fresh search ran.
    Searched(SearchOutcome),
}

// ============================================================================
// Coordinator - UI Commands
// ============================================================================

impl Coordinator {
    /// Handles a search-box submit.
    ///
    /// An empty query clears the session. Re-submitting the last query
    /// while it has matches advances to the next match. Anything else
    /// starts a new search.
    ///
    /// # Errors
    ///
    /// Errors of the underlying clear, advance or search.
    pub async fn submit(&mut self, query: &str) -> Result<SubmitOutcome> {
        if query.is_empty() {
            self.clear().await?;
            return Ok(SubmitOutcome::Cleared);
        }

        if query == self.session.last_query() && self.session.global_match_count() > 0 {
            debug!(query, "Repeated query advances");
            let outcome = self.advance_match(Direction::Next).await?;
            return Ok(SubmitOutcome::Advanced(outcome));
        }

        self.reset_session(query).await;
        let outcome = self.run_search(query).await?;
        Ok(SubmitOutcome::Searched(outcome))
    }

    /// Ends the search: empty query, no highlights anywhere.
    ///
    /// Clearing tolerates tabs that fail to answer.
    ///
    /// # Errors
    ///
    /// Errors of the tab listing.
    pub async fn clear(&mut self) -> Result<()> {
        self.reset_session("").await;

        let tabs = self.browser.list_tabs().await?;

        let requests = tabs
            .iter()
            .map(|tab| {
                let request = self.page_request(tab.tab_id, PageCommand::ClearHighlights);
                (tab.tab_id, request)
            })
            .collect();

        let mut results = self.fan_out(requests);
        while let Some((tab_id, result)) = results.next().await {
            if let Err(e) = result.and_then(Response::into_result) {
                debug!(%tab_id, error = %e, "Failed to clear highlights");
            }
        }

        info!(tabs = tabs.len(), "Search cleared");

        self.broadcast_snapshot().await;
        self.persist_marks().await;
        Ok(())
    }

    /// Hides the overlay and the highlights, then clears.
    ///
    /// # Errors
    ///
    /// See [`Coordinator::clear`].
    pub async fn close(&mut self) -> Result<()> {
        self.session.overlay_visible = false;
        self.session.matches_visible = false;
        self.clear().await
    }

    /// Flips overlay and highlight visibility together.
    ///
    /// Returns the new visibility.
    pub async fn toggle_overlay(&mut self) -> bool {
        let visible = !self.session.overlay_visible();
        self.session.overlay_visible = visible;
        self.session.matches_visible = visible;

        debug!(visible, "Overlay toggled");

        self.broadcast_snapshot().await;
        visible
    }

    /// Records where the user dragged the overlay.
    pub async fn set_layover_position(&mut self, position: LayoverPosition) {
        self.session.layover_position = position;

        if self.options.persist
            && let Err(e) =
                storage::save(self.storage.as_ref(), keys::LAYOVER_POSITION, &position).await
        {
            warn!(error = %e, "Failed to persist overlay position");
        }
    }
}

// ============================================================================
// Coordinator - Browser Events
// ============================================================================

impl Coordinator {
    /// Records a browser tab switch.
    ///
    /// While the overlay is visible the previous tab is told it went
    /// inactive and the new one that it became active.
    pub async fn on_tab_activated(&mut self, tab_id: TabId) {
        let previous = self.session.active_tab_id.replace(tab_id);
        if previous == Some(tab_id) {
            return;
        }

        debug!(%tab_id, previous = ?previous, "Tab activated");

        if self.session.overlay_visible() {
            if let Some(previous) = previous {
                self.notify_page(previous, PageNotice::TabBecameInactive)
                    .await;
            }
            self.notify_page(tab_id, PageNotice::TabBecameActive).await;
        }

        self.broadcast_snapshot().await;
    }

    /// Drops a closed tab's state.
    pub async fn on_tab_removed(&mut self, tab_id: TabId) {
        let removed = self.session.tabs.remove(tab_id);
        if self.session.active_tab_id == Some(tab_id) {
            self.session.active_tab_id = None;
        }
        if self.session.tabs().is_settled() {
            self.session.refresh_global_count();
        }

        debug!(
            %tab_id,
            match_count = removed.as_ref().map_or(0, |state| state.match_count),
            global_match_count = self.session.global_match_count(),
            "Tab removed"
        );

        self.persist_tab_state(tab_id).await;
        if removed.is_some() {
            self.broadcast_snapshot().await;
        }
    }

    /// Sends the current state to a newly opened tab.
    pub async fn on_tab_created(&mut self, tab_id: TabId) {
        debug!(%tab_id, "Tab created");
        if self.options.broadcast_snapshots {
            self.send_snapshot(tab_id).await;
        }
    }

    /// Rescans a navigated or reloaded tab while a search is showing.
    pub async fn on_tab_updated(&mut self, tab_id: TabId) {
        if !self.session.is_active() || !self.session.matches_visible() {
            return;
        }

        let query = self.session.query().to_string();
        let result = self
            .send_page(
                tab_id,
                PageCommand::ScanAndHighlight {
                    query,
                    tab_id,
                    suppress_focus: true,
                },
            )
            .await
            .and_then(Response::parse::<ScanResult>);

        self.record_scan(tab_id, result);
        if self.session.tabs().is_settled() {
            self.session.refresh_global_count();
        }

        debug!(
            %tab_id,
            match_count = self.session.tabs().match_count(tab_id),
            global_match_count = self.session.global_match_count(),
            "Tab rescanned"
        );

        self.persist_tab_state(tab_id).await;
        self.broadcast_snapshot().await;
    }

    /// Wipes persisted state after an install or upgrade.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn on_installed(&mut self) -> Result<()> {
        info!("Clearing persisted state");
        self.storage.clear().await
    }

    /// Reloads persisted state into a fresh session.
    ///
    /// Restores the last query, the overlay position and every persisted
    /// tab state. With tab states present the last query becomes the
    /// current one, so navigation continues where it left off. Returns the
    /// number of restored tabs.
    ///
    /// The epoch is restored too, and transaction ids continue past the
    /// highest one persisted, so open pages keep accepting requests.
    ///
    /// # Errors
    ///
    /// Storage failures and malformed query, position or epoch entries.
    /// Malformed tab entries are skipped.
    pub async fn restore(&mut self) -> Result<usize> {
        self.restore_marks().await?;
        let store = self.storage.as_ref();

        if let Some(last_query) = storage::load::<String>(store, keys::LAST_QUERY).await? {
            self.session.last_query = last_query;
        }
        if let Some(position) =
            storage::load::<LayoverPosition>(store, keys::LAYOVER_POSITION).await?
        {
            self.session.layover_position = position;
        }

        let mut states = Vec::new();
        for key in store.keys().await? {
            let Some(tab_id) = keys::parse_tab_state(&key) else {
                continue;
            };
            match storage::load::<TabMatchState>(store, &key).await {
                Ok(Some(state)) if state.tab_id == tab_id => states.push(state),
                Ok(_) => {}
                Err(e) => warn!(%tab_id, error = %e, "Skipping persisted tab state"),
            }
        }
        states.sort_by_key(|state| (state.global_offset, state.tab_id));

        let restored = states.len();
        for state in states {
            self.session.tabs.restore(state);
        }
        if restored > 0 {
            self.session.query = self.session.last_query.clone();
        }
        self.session.refresh_global_count();

        info!(
            restored,
            last_query = self.session.last_query(),
            global_match_count = self.session.global_match_count(),
            "Session restored"
        );

        Ok(restored)
    }
}

// ============================================================================
// Coordinator - Snapshots
// ============================================================================

impl Coordinator {
    /// Pushes each tab its own snapshot, concurrently.
    ///
    /// Returns the number of tabs that acknowledged. Failures are logged.
    pub async fn broadcast_snapshot(&mut self) -> usize {
        if !self.options.broadcast_snapshots {
            return 0;
        }

        let tabs = match self.browser.list_tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!(error = %e, "Failed to list tabs for snapshot");
                return 0;
            }
        };

        let requests = tabs
            .iter()
            .map(|tab| {
                let snapshot = Box::new(self.session.snapshot(Some(tab.tab_id)));
                let request =
                    self.page_request(tab.tab_id, PageCommand::SessionStateChanged { snapshot });
                (tab.tab_id, request)
            })
            .collect();

        let mut results = self.fan_out(requests);
        let mut delivered = 0;
        while let Some((tab_id, result)) = results.next().await {
            match result.and_then(Response::into_result) {
                Ok(_) => delivered += 1,
                Err(e) => debug!(%tab_id, error = %e, "Snapshot not delivered"),
            }
        }
        delivered
    }

    /// Pushes one tab its snapshot.
    async fn send_snapshot(&mut self, tab_id: TabId) {
        let snapshot = Box::new(self.session.snapshot(Some(tab_id)));
        let result = self
            .send_page(tab_id, PageCommand::SessionStateChanged { snapshot })
            .await
            .and_then(Response::into_result);

        if let Err(e) = result {
            debug!(%tab_id, error = %e, "Snapshot not delivered");
        }
    }
}

// ============================================================================
// Coordinator - Event Loop
// ============================================================================

impl Coordinator {
    /// Routes one event to its entry point.
    ///
    /// # Errors
    ///
    /// The entry point's error. Unknown events are ignored.
    pub async fn handle_event(&mut self, event: ParsedEvent) -> Result<()> {
        match event {
            ParsedEvent::Submit { query } => {
                self.submit(&query).await?;
            }
            ParsedEvent::Next => {
                self.advance_match(Direction::Next).await?;
            }
            ParsedEvent::Previous => {
                self.advance_match(Direction::Previous).await?;
            }
            ParsedEvent::Close => self.close().await?,
            ParsedEvent::ToggleOverlay => {
                self.toggle_overlay().await;
            }
            ParsedEvent::PageReport(report) => {
                self.on_tab_report(report).await;
            }
            ParsedEvent::LayoverMoved(position) => self.set_layover_position(position).await,
            ParsedEvent::TabActivated { tab_id } => self.on_tab_activated(tab_id).await,
            ParsedEvent::TabCreated { tab_id } => self.on_tab_created(tab_id).await,
            ParsedEvent::TabRemoved { tab_id } => self.on_tab_removed(tab_id).await,
            ParsedEvent::TabUpdated { tab_id } => self.on_tab_updated(tab_id).await,
            ParsedEvent::Installed => self.on_installed().await?,
            ParsedEvent::Unknown { method, .. } => {
                debug!(%method, "Ignoring unknown event");
            }
        }
        Ok(())
    }

    /// Handles events until the channel closes.
    ///
    /// A failing event is logged and the loop moves on.
    pub async fn serve(&mut self, mut events: mpsc::UnboundedReceiver<ParsedEvent>) {
        info!("Coordinator serving events");

        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                warn!(error = %e, "Event handling failed");
            }
        }

        info!("Event stream closed");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::coordinator::testing::{
        Call, FakeBrowser, PageBehavior, coordinator, coordinator_with, tab,
    };
    use crate::coordinator::CoordinatorOptions;
    use crate::storage::{KeyValueStore, MemoryStore};

    #[tokio::test]
    async fn test_repeated_query_advances() {
        let browser = FakeBrowser::with_pages(&["e e", "e"]);
        let mut coordinator = coordinator(&browser);

        let first = coordinator.submit("e").await.expect("submit");
        assert!(matches!(first, SubmitOutcome::Searched(_)));
        let scans = browser.count(|c| matches!(c, Call::Scan(_)));

        let second = coordinator.submit("e").await.expect("submit");
        assert_eq!(
            second,
            SubmitOutcome::Advanced(AdvanceOutcome::Moved {
                tab_id: tab(1),
                index: 1,
                wrapped: false
            })
        );
        assert_eq!(browser.count(|c| matches!(c, Call::Scan(_))), scans);
    }

    #[tokio::test]
    async fn test_new_query_searches_again() {
        let browser = FakeBrowser::with_pages(&["e f", "f"]);
        let mut coordinator = coordinator(&browser);

        coordinator.submit("e").await.expect("submit");
        let epoch = coordinator.session().epoch();

        let outcome = coordinator.submit("f").await.expect("submit");
        match outcome {
            SubmitOutcome::Searched(search) => {
                assert_eq!(search.global_match_count, 2);
                assert!(search.epoch > epoch);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(coordinator.session().last_query(), "f");
    }

    #[tokio::test]
    async fn test_repeated_query_without_matches_searches_again() {
        let browser = FakeBrowser::with_pages(&["abc"]);
        let mut coordinator = coordinator(&browser);

        coordinator.submit("zz").await.expect("submit");
        let outcome = coordinator.submit("zz").await.expect("submit");
        assert!(matches!(outcome, SubmitOutcome::Searched(_)));
    }

    #[tokio::test]
    async fn test_empty_submit_clears_every_tab() {
        let browser = FakeBrowser::with_pages(&["c c", "c"]);
        let mut coordinator = coordinator(&browser);
        coordinator.submit("c").await.expect("submit");

        let outcome = coordinator.submit("").await.expect("submit");
        assert_eq!(outcome, SubmitOutcome::Cleared);
        assert!(browser.calls().contains(&Call::Clear(tab(1))));
        assert!(browser.calls().contains(&Call::Clear(tab(2))));
        assert_eq!(browser.match_count(tab(1)), 0);
        assert!(coordinator.session().tabs().is_empty());
        assert_eq!(coordinator.session().global_match_count(), 0);
        assert!(!coordinator.session().is_active());
    }

    #[tokio::test]
    async fn test_close_hides_overlay() {
        let browser = FakeBrowser::with_pages(&["c"]);
        let mut coordinator = coordinator(&browser);
        coordinator.toggle_overlay().await;
        coordinator.submit("c").await.expect("submit");

        coordinator.close().await.expect("close");
        assert!(!coordinator.session().overlay_visible());
        assert!(!coordinator.session().matches_visible());
        assert!(coordinator.session().tabs().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_overlay_broadcasts() {
        let browser = FakeBrowser::with_pages(&["a", "b"]);
        let mut coordinator = coordinator(&browser);

        assert!(coordinator.toggle_overlay().await);
        let snapshot = browser.snapshot(tab(2)).expect("snapshot delivered");
        assert!(snapshot.overlay_visible);
        assert!(snapshot.matches_visible);

        assert!(!coordinator.toggle_overlay().await);
        assert!(!coordinator.session().overlay_visible());
    }

    #[tokio::test]
    async fn test_snapshot_carries_each_tabs_state() {
        let browser = FakeBrowser::with_pages(&["s s", "s s s"]);
        let mut coordinator = coordinator(&browser);
        coordinator.submit("s").await.expect("submit");

        let first = browser.snapshot(tab(1)).expect("snapshot");
        let second = browser.snapshot(tab(2)).expect("snapshot");
        assert_eq!(first.global_match_count, 5);
        assert_eq!(first.global_match_index, Some(1));
        assert_eq!(first.tab_state.map(|s| s.match_count), Some(2));
        assert_eq!(second.tab_state.map(|s| s.global_offset), Some(2));
    }

    #[tokio::test]
    async fn test_tab_activation_notifies_while_overlay_visible() {
        let browser = FakeBrowser::with_pages(&["a", "b"]);
        let mut coordinator = coordinator(&browser);
        coordinator.on_tab_activated(tab(1)).await;
        coordinator.toggle_overlay().await;

        coordinator.on_tab_activated(tab(2)).await;

        let calls = browser.calls();
        assert!(calls.contains(&Call::Notice(tab(1), PageNotice::TabBecameInactive)));
        assert!(calls.contains(&Call::Notice(tab(2), PageNotice::TabBecameActive)));
        assert_eq!(coordinator.session().active_tab_id(), Some(tab(2)));
    }

    #[tokio::test]
    async fn test_tab_removed_recomputes_offsets() {
        let browser = FakeBrowser::with_pages(&["d d", "d", "d d d"]);
        let mut coordinator = coordinator(&browser);
        coordinator.submit("d").await.expect("submit");

        browser.remove_page(tab(1));
        coordinator.on_tab_removed(tab(1)).await;

        let tabs = coordinator.session().tabs();
        assert!(tabs.get(tab(1)).is_none());
        assert_eq!(tabs.get(tab(2)).map(|s| s.global_offset), Some(0));
        assert_eq!(tabs.get(tab(3)).map(|s| s.global_offset), Some(1));
        assert_eq!(coordinator.session().global_match_count(), 4);
        assert_eq!(coordinator.session().active_tab_id(), None);
    }

    #[tokio::test]
    async fn test_tab_created_receives_snapshot() {
        let browser = FakeBrowser::with_pages(&["n"]);
        let mut coordinator = coordinator(&browser);
        coordinator.submit("n").await.expect("submit");

        let new_tab = browser.insert_page(1, "n n");
        coordinator.on_tab_created(new_tab).await;

        let snapshot = browser.snapshot(new_tab).expect("snapshot");
        assert_eq!(snapshot.query, "n");
        assert_eq!(snapshot.tab_state, None);
    }

    #[tokio::test]
    async fn test_tab_updated_rescans() {
        let browser = FakeBrowser::with_pages(&["u", "u"]);
        let mut coordinator = coordinator(&browser);
        coordinator.submit("u").await.expect("submit");
        assert_eq!(coordinator.session().global_match_count(), 2);

        browser.set_text(tab(2), "u u u u");
        coordinator.on_tab_updated(tab(2)).await;

        assert_eq!(coordinator.session().global_match_count(), 5);
        assert_eq!(browser.match_count(tab(2)), 4);
    }

    #[tokio::test]
    async fn test_tab_updated_ignored_without_search() {
        let browser = FakeBrowser::with_pages(&["u"]);
        let mut coordinator = coordinator(&browser);

        coordinator.on_tab_updated(tab(1)).await;
        assert_eq!(browser.count(|c| matches!(c, Call::Scan(_))), 0);
    }

    #[tokio::test]
    async fn test_persist_and_restore() {
        let browser = FakeBrowser::with_pages(&["r r", "r"]);
        let store = Arc::new(MemoryStore::new());
        let mut first = coordinator_with(&browser, Arc::clone(&store), CoordinatorOptions::new());
        first.submit("r").await.expect("submit");
        first
            .set_layover_position(LayoverPosition { x: 10, y: 20 })
            .await;

        let mut second = coordinator_with(&browser, Arc::clone(&store), CoordinatorOptions::new());
        let restored = second.restore().await.expect("restore");

        assert_eq!(restored, 2);
        assert_eq!(second.session().query(), "r");
        assert_eq!(second.session().last_query(), "r");
        assert_eq!(second.session().global_match_count(), 3);
        assert_eq!(
            second.session().layover_position(),
            LayoverPosition { x: 10, y: 20 }
        );
        assert_eq!(
            second.session().tabs().get(tab(2)).map(|s| s.global_offset),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_restarted_coordinator_keeps_driving_live_pages() {
        let browser = FakeBrowser::with_pages(&["a a b", "a b"]);
        let store = Arc::new(MemoryStore::new());

        let mut first = coordinator_with(&browser, Arc::clone(&store), CoordinatorOptions::new());
        first.run_search("a").await.expect("search");
        first.next_match().await.expect("advance");
        let epoch = first.session().epoch();
        drop(first);

        let mut second = coordinator_with(&browser, Arc::clone(&store), CoordinatorOptions::new());
        assert_eq!(second.restore().await.expect("restore"), 2);
        assert_eq!(second.session().epoch(), epoch);

        let outcome = second.next_match().await.expect("advance after restart");
        assert_eq!(
            outcome,
            AdvanceOutcome::SwitchedTab {
                from: tab(1),
                to: tab(2),
                index: 0
            }
        );
        assert_eq!(browser.focused(tab(2)), Some(0));

        let SubmitOutcome::Searched(search) = second.submit("b").await.expect("submit") else {
            panic!("a new query must search");
        };
        assert_eq!(search.global_match_count, 2);
        assert_eq!(search.failed, 0);
        assert!(search.epoch > epoch);
    }

    #[tokio::test]
    async fn test_new_search_forgets_persisted_tabs() {
        let browser = FakeBrowser::with_pages(&["a", "b"]);
        let store = Arc::new(MemoryStore::new());
        let mut coordinator =
            coordinator_with(&browser, Arc::clone(&store), CoordinatorOptions::new());

        coordinator.submit("a").await.expect("submit");
        assert!(store.get("tab:1").await.expect("get").is_some());

        coordinator.submit("b").await.expect("submit");
        let state: TabMatchState = storage::load(&*store, "tab:1")
            .await
            .expect("load")
            .expect("state");
        assert_eq!(state.match_count, 0);
    }

    #[tokio::test]
    async fn test_persistence_can_be_disabled() {
        let browser = FakeBrowser::with_pages(&["a"]);
        let store = Arc::new(MemoryStore::new());
        let mut coordinator = coordinator_with(
            &browser,
            Arc::clone(&store),
            CoordinatorOptions::new().with_persistence(false),
        );

        coordinator.submit("a").await.expect("submit");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_installed_clears_storage() {
        let browser = FakeBrowser::with_pages(&["i"]);
        let store = Arc::new(MemoryStore::new());
        let mut coordinator =
            coordinator_with(&browser, Arc::clone(&store), CoordinatorOptions::new());
        coordinator.submit("i").await.expect("submit");
        assert!(!store.is_empty());

        coordinator
            .handle_event(ParsedEvent::Installed)
            .await
            .expect("installed");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_serve_handles_events_in_order() {
        let browser = FakeBrowser::with_pages(&["x x", "x"]);
        let mut coordinator = coordinator(&browser);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(ParsedEvent::ToggleOverlay).expect("send");
        tx.send(ParsedEvent::Submit {
            query: "x".to_string(),
        })
        .expect("send");
        tx.send(ParsedEvent::Next).expect("send");
        tx.send(ParsedEvent::Next).expect("send");
        tx.send(ParsedEvent::Unknown {
            method: "custom.thing".to_string(),
            params: serde_json::Value::Null,
        })
        .expect("send");
        drop(tx);

        coordinator.serve(rx).await;

        assert!(coordinator.session().overlay_visible());
        assert_eq!(browser.active_tab(), Some(tab(2)));
        assert_eq!(coordinator.session().global_match_index(), Some(3));
    }

    #[tokio::test]
    async fn test_serve_survives_failing_events() {
        let browser = FakeBrowser::with_pages(&["y y"]);
        let mut coordinator = coordinator(&browser);
        coordinator.submit("y").await.expect("submit");
        browser.set_behavior(tab(1), PageBehavior::Unreachable);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ParsedEvent::Next).expect("send");
        tx.send(ParsedEvent::ToggleOverlay).expect("send");
        drop(tx);

        coordinator.serve(rx).await;
        assert!(coordinator.session().overlay_visible());
        assert_eq!(coordinator.session().global_match_count(), 2);
    }
}
