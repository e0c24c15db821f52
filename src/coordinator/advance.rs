//! Next/previous match navigation across tabs.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::{AdvanceResult, Direction, PageCommand, PageNotice, Response};
use crate::session::{
    SerializedMatches, TabUpdate, active_tab, next_tab_with_matches, traversal_order,
};

use super::core::Coordinator;

// ============================================================================
// AdvanceOutcome
// ============================================================================

/// Where focus ended up after [`Coordinator::advance_match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Nothing to advance: no active tab or it has no matches.
    Idle,
    /// Focus moved within the active tab.
    Moved {
        /// Active tab.
        tab_id: TabId,
        /// Focused match.
        index: usize,
        /// Whether the move wrapped around inside the tab.
        wrapped: bool,
    },
    /// Focus crossed into another tab.
    SwitchedTab {
        /// Previously active tab.
        from: TabId,
        /// Newly active tab.
        to: TabId,
        /// Focused match in the new tab.
        index: usize,
    },
}

// ============================================================================
// Coordinator - Advance
// ============================================================================

impl Coordinator {
    /// Moves focus one match in `direction`, crossing tabs on wrap.
    ///
    /// The tab order is re-read from the browser on every call. When the
    /// active tab's local traversal wraps, focus moves to the next (or
    /// previous) tab in traversal order that has matches, landing on its
    /// first (or last) match. With no other matching tab the traversal
    /// wraps in place.
    ///
    /// An active tab that fails to answer is recorded as having no matches
    /// and focus moves on as if it had wrapped. Activation failures are
    /// logged; the target tab is focused regardless.
    ///
    /// # Errors
    ///
    /// Errors of the tab listing.
    pub async fn advance_match(&mut self, direction: Direction) -> Result<AdvanceOutcome> {
        let tabs = self.browser.list_tabs().await?;
        let Some(active) = active_tab(&tabs) else {
            debug!("No active tab to advance in");
            return Ok(AdvanceOutcome::Idle);
        };
        self.session.active_tab_id = Some(active);

        if self.session.tabs().match_count(active) == 0 {
            debug!(tab_id = %active, "Active tab has no matches");
            return Ok(AdvanceOutcome::Idle);
        }

        let order = traversal_order(&tabs);
        let result = self
            .send_page(active, PageCommand::AdvanceLocal { direction })
            .await
            .and_then(Response::parse::<AdvanceResult>);

        let outcome = match result {
            Ok(result) if !result.wrapped => {
                self.apply_local_advance(active, result);
                AdvanceOutcome::Moved {
                    tab_id: active,
                    index: result.current_index,
                    wrapped: false,
                }
            }
            Ok(result) => {
                self.apply_local_advance(active, result);
                match next_tab_with_matches(&order, self.session.tabs(), direction) {
                    Some(target) => self.switch_to(active, target, direction).await,
                    None => {
                        self.focus_match(active, result.current_index).await;
                        AdvanceOutcome::Moved {
                            tab_id: active,
                            index: result.current_index,
                            wrapped: true,
                        }
                    }
                }
            }
            Err(e) => {
                warn!(tab_id = %active, error = %e, "Local advance failed; counting tab as zero");
                self.forget_matches(active);
                match next_tab_with_matches(&order, self.session.tabs(), direction) {
                    Some(target) => self.switch_to(active, target, direction).await,
                    None => AdvanceOutcome::Idle,
                }
            }
        };

        debug!(?direction, ?outcome, "Advanced");

        self.persist_tab_state(active).await;
        if let AdvanceOutcome::SwitchedTab { to, .. } = outcome {
            self.persist_tab_state(to).await;
        }
        self.broadcast_snapshot().await;
        self.persist_marks().await;

        Ok(outcome)
    }

    /// Merges the active tab's own advance result.
    fn apply_local_advance(&mut self, tab_id: TabId, result: AdvanceResult) {
        let previous = self.session.tabs().match_count(tab_id);
        self.session.tabs.merge(
            tab_id,
            TabUpdate::focused(result.current_index).with_match_count(result.match_count),
        );
        if previous != result.match_count && self.session.tabs().is_settled() {
            self.session.refresh_global_count();
        }
    }

    /// Zeroes a tab that could not be reached.
    fn forget_matches(&mut self, tab_id: TabId) {
        self.session
            .tabs
            .merge(tab_id, TabUpdate::scanned(0, SerializedMatches::default()));
        if self.session.tabs().is_settled() {
            self.session.refresh_global_count();
        }
    }

    /// Activates `target` and focuses its landing match.
    ///
    /// Activation is best effort: on failure the match is still focused.
    async fn switch_to(&mut self, from: TabId, target: TabId, direction: Direction) -> AdvanceOutcome {
        if let Err(e) = self.browser.activate_tab(target).await {
            warn!(tab_id = %target, error = %e, "Failed to activate tab");
        }

        let index = direction.landing_index(self.session.tabs().match_count(target));
        self.session.tabs.merge(target, TabUpdate::focused(index));
        self.session.active_tab_id = Some(target);

        self.notify_page(from, PageNotice::TabBecameInactive).await;
        self.notify_page(target, PageNotice::TabBecameActive).await;
        self.focus_match(target, index).await;

        AdvanceOutcome::SwitchedTab {
            from,
            to: target,
            index,
        }
    }

    /// Steps focus forward.
    ///
    /// # Errors
    ///
    /// See [`Coordinator::advance_match`].
    #[inline]
    pub async fn next_match(&mut self) -> Result<AdvanceOutcome> {
        self.advance_match(Direction::Next).await
    }

    /// Steps focus backward.
    ///
    /// # Errors
    ///
    /// See [`Coordinator::advance_match`].
    #[inline]
    pub async fn previous_match(&mut self) -> Result<AdvanceOutcome> {
        self.advance_match(Direction::Previous).await
    }
}

// ============================================================================
// Tests
// ============================================================================
