//! Session reset, window-wide search and page reports.
//!
//! A search runs in two phases over the traversal order:
//!
//! 1. Tabs are scanned one at a time until a tab reports a match. That tab
//!    is activated and told to focus its first match.
//! 2. Every tab not yet scanned is scanned concurrently. Results are merged
//!    as they arrive; a failed or timed-out tab counts as zero matches.

// ============================================================================
// Imports
// ============================================================================

use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, TabId};
use crate::protocol::{PageCommand, PageNotice, Response, ScanResult, TabReport};
use crate::session::{TabUpdate, active_tab, traversal_order};

use super::core::Coordinator;

// ============================================================================
// Types
// ============================================================================

/// Summary of a settled search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Epoch the search ran in.
    pub epoch: Epoch,
    /// Tab that received focus, if any tab matched.
    pub focused_tab: Option<TabId>,
    /// Sum of match counts across scanned tabs.
    pub global_match_count: usize,
    /// Tabs that answered.
    pub scanned: usize,
    /// Tabs that failed or timed out.
    pub failed: usize,
}

/// What happened to an asynchronous page report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Merged; more reports are outstanding.
    Applied,
    /// Merged; it was the last outstanding report and the count is final.
    Settled,
    /// Belongs to a superseded session and was dropped.
    Stale,
}

// ============================================================================
// Coordinator - Search
// ============================================================================

impl Coordinator {
    /// Starts a new session for `query`.
    ///
    /// Drops every tab state, zeroes the global count, records `query` as
    /// both current and last query and starts a new epoch. Page highlights
    /// are left alone.
    pub async fn reset_session(&mut self, query: &str) {
        self.session.reset(query);

        debug!(epoch = %self.session.epoch(), query, "Session reset");

        self.persist_last_query().await;
        self.forget_tab_states().await;
    }

    /// Searches every tab of the window for `query`.
    ///
    /// Resets the session first unless it was just reset for `query`.
    /// Per-tab failures never fail the search.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `query` is empty
    /// - errors of the tab listing
    pub async fn run_search(&mut self, query: &str) -> Result<SearchOutcome> {
        if query.is_empty() {
            return Err(Error::invalid_argument("search query must not be empty"));
        }
        if self.needs_reset(query) {
            self.reset_session(query).await;
        }

        let epoch = self.session.epoch();
        let tabs = self.browser.list_tabs().await?;
        let order = traversal_order(&tabs);
        let previous_active = active_tab(&tabs);

        self.session.active_tab_id = previous_active;
        self.session.tabs.set_order(order.clone());
        self.session.tabs.expect(order.iter().copied());

        debug!(%epoch, query, tabs = order.len(), "Search started");

        let mut scanned = 0;
        let mut failed = 0;
        let mut focused_tab = None;
        let mut next = 0;

        // Phase 1: sequential until the first match.
        while let Some(&tab_id) = order.get(next) {
            next += 1;
            let result = self
                .send_page(tab_id, scan_command(query, tab_id))
                .await
                .and_then(Response::parse::<ScanResult>);

            if self.record_scan(tab_id, result) {
                scanned += 1;
            } else {
                failed += 1;
            }

            if self.session.tabs().match_count(tab_id) > 0 {
                focused_tab = Some(tab_id);
                break;
            }
        }

        if let Some(tab_id) = focused_tab {
            self.focus_first_match(tab_id, previous_active).await;
        }

        // Phase 2: everything left, concurrently.
        let remaining = order.get(next..).unwrap_or_default();
        if !remaining.is_empty() {
            let (ok, err) = self.scan_concurrently(query, remaining).await;
            scanned += ok;
            failed += err;
        }

        self.session.refresh_global_count();
        self.session.matches_visible = true;

        info!(
            %epoch,
            query,
            global_match_count = self.session.global_match_count(),
            scanned,
            failed,
            focused_tab = ?focused_tab,
            "Search settled"
        );

        self.persist_all_tab_states().await;
        self.broadcast_snapshot().await;
        self.persist_marks().await;

        Ok(SearchOutcome {
            epoch,
            focused_tab,
            global_match_count: self.session.global_match_count(),
            scanned,
            failed,
        })
    }

    /// Whether the session still has to be reset before searching `query`.
    ///
    /// Only a session reset for this very query, with nothing recorded
    /// since, can be reused.
    fn needs_reset(&self, query: &str) -> bool {
        let freshly_reset = self.session.query() == query && self.session.tabs().is_empty();
        !freshly_reset
    }

    /// Merges a page's asynchronous report.
    ///
    /// Reports from a superseded epoch, or arriving while no search is
    /// active, are dropped without touching the session.
    pub async fn on_tab_report(&mut self, report: TabReport) -> ReportOutcome {
        let tab_id = report.tab_id;

        if report.epoch != self.session.epoch() || !self.session.is_active() {
            debug!(
                %tab_id,
                report_epoch = %report.epoch,
                epoch = %self.session.epoch(),
                "Dropping stale report"
            );
            return ReportOutcome::Stale;
        }

        self.session.tabs.merge(
            tab_id,
            TabUpdate {
                match_count: Some(report.match_count),
                current_index: Some(report.current_index),
                serialized_matches: Some(report.serialized_matches),
            },
        );

        let last = self.session.tabs.settle(tab_id);
        if self.session.tabs().is_settled() {
            self.session.refresh_global_count();
        }

        self.persist_tab_state(tab_id).await;

        if last {
            debug!(
                %tab_id,
                global_match_count = self.session.global_match_count(),
                "Last report settled the search"
            );
            ReportOutcome::Settled
        } else {
            ReportOutcome::Applied
        }
    }

    /// Records one scan result; returns `false` if the tab failed.
    ///
    /// Failed tabs are left out of the store and count as zero.
    pub(super) fn record_scan(&mut self, tab_id: TabId, result: Result<ScanResult>) -> bool {
        self.session.tabs.settle(tab_id);

        match result {
            Ok(scan) => {
                self.session.tabs.merge(
                    tab_id,
                    TabUpdate::scanned(scan.match_count, scan.serialized_matches),
                );
                debug!(%tab_id, match_count = scan.match_count, "Tab scanned");
                true
            }
            Err(e) => {
                self.session.tabs.remove(tab_id);
                if e.is_tab_failure() {
                    warn!(%tab_id, error = %e, "Tab scan failed; counting as zero");
                } else {
                    error!(%tab_id, error = %e, "Tab scan failed on transport; counting as zero");
                }
                false
            }
        }
    }

    /// Activates the first matching tab and focuses its first match.
    async fn focus_first_match(&mut self, tab_id: TabId, previous_active: Option<TabId>) {
        self.session.tabs.merge(tab_id, TabUpdate::focused(0));

        if previous_active != Some(tab_id) {
            if let Err(e) = self.browser.activate_tab(tab_id).await {
                warn!(%tab_id, error = %e, "Failed to activate tab");
            }
            if let Some(previous) = previous_active {
                self.notify_page(previous, PageNotice::TabBecameInactive)
                    .await;
            }
            self.notify_page(tab_id, PageNotice::TabBecameActive).await;
        }
        self.session.active_tab_id = Some(tab_id);

        self.focus_match(tab_id, 0).await;

        debug!(%tab_id, "Focused first match");
    }

    /// Scans tabs concurrently, merging results as they complete.
    ///
    /// Returns `(answered, failed)`.
    async fn scan_concurrently(&mut self, query: &str, tabs: &[TabId]) -> (usize, usize) {
        let requests = tabs
            .iter()
            .map(|&tab_id| (tab_id, self.page_request(tab_id, scan_command(query, tab_id))))
            .collect();
        let mut results = self.fan_out(requests);

        let mut answered = 0;
        let mut failed = 0;

        while let Some((tab_id, result)) = results.next().await {
            let result = result.and_then(Response::parse::<ScanResult>);
            if self.record_scan(tab_id, result) {
                answered += 1;
            } else {
                failed += 1;
            }
        }

        (answered, failed)
    }
}

/// Scan command for one tab; focus is always driven explicitly.
fn scan_command(query: &str, tab_id: TabId) -> PageCommand {
    PageCommand::ScanAndHighlight {
        query: query.to_string(),
        tab_id,
        suppress_focus: true,
    }
}

// ============================================================================
// Tests
// ============================================================================
