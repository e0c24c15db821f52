//! Page context request handler.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, trace};

use crate::identifiers::{Epoch, TabId};
use crate::protocol::{
    AdvanceResult, Command, Direction, ERROR_STALE_TRANSACTION, Notice, PageCommand, PageNotice,
    Request, Response, ScanResult, TabReport,
};
use crate::session::{SerializedMatches, SessionSnapshot};

use super::guard::TransactionGuard;
use super::matcher::Matcher;

// ============================================================================
// PageAgent
// ============================================================================

/// One page context's side of the protocol.
///
/// Owns the page's [`Matcher`], applies the transaction-id rule to every
/// tagged request and keeps the local focus index between calls.
#[derive(Debug)]
pub struct PageAgent<M> {
    tab_id: TabId,
    matcher: M,
    guard: TransactionGuard,
    query: String,
    epoch: Epoch,
    match_count: usize,
    current_index: usize,
    serialized_matches: SerializedMatches,
    active: bool,
    snapshot: Option<SessionSnapshot>,
}

impl<M: Matcher> PageAgent<M> {
    /// Creates an agent for a tab.
    #[must_use]
    pub fn new(tab_id: TabId, matcher: M) -> Self {
        Self {
            tab_id,
            matcher,
            guard: TransactionGuard::new(),
            query: String::new(),
            epoch: Epoch::INITIAL,
            match_count: 0,
            current_index: 0,
            serialized_matches: SerializedMatches::default(),
            active: false,
            snapshot: None,
        }
    }

    /// Tab this agent serves.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Query of the last scan.
    #[inline]
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Number of matches from the last scan.
    #[inline]
    #[must_use]
    pub fn match_count(&self) -> usize {
        self.match_count
    }

    /// Focused match index.
    #[inline]
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Whether the browser shows this tab.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last pushed session state.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.snapshot.as_ref()
    }

    /// Page matcher.
    #[inline]
    #[must_use]
    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Mutable page matcher, for pages whose content changes.
    #[inline]
    pub fn matcher_mut(&mut self) -> &mut M {
        &mut self.matcher
    }

    /// Handles one request and builds its response.
    ///
    /// Requests whose transaction id does not advance are answered with a
    /// `stale transaction` error and have no effect.
    pub fn handle(&mut self, request: &Request) -> Response {
        if !self.guard.admit(request.transaction_id) {
            debug!(
                tab_id = %self.tab_id,
                transaction_id = ?request.transaction_id,
                method = request.method(),
                "Discarding stale message"
            );
            return Response::error(
                request.id,
                ERROR_STALE_TRANSACTION,
                format!("{} not newer than last processed", request.method()),
            );
        }

        let Command::Page(command) = &request.command else {
            return Response::error(
                request.id,
                "unsupported",
                format!("{} is not a page command", request.method()),
            );
        };

        trace!(tab_id = %self.tab_id, method = command.method(), "Handling page command");

        match command {
            PageCommand::ScanAndHighlight {
                query,
                suppress_focus,
                ..
            } => {
                let result = self.scan(query, request.epoch, *suppress_focus);
                Self::success(request, &result)
            }

            PageCommand::FocusCurrentMatch { index, .. } => {
                self.focus(*index);
                Response::ack(request.id)
            }

            PageCommand::AdvanceLocal { direction } => {
                let result = self.advance(*direction);
                Self::success(request, &result)
            }

            PageCommand::ClearHighlights => {
                self.clear();
                Response::ack(request.id)
            }

            PageCommand::SessionStateChanged { snapshot } => {
                self.snapshot = Some((**snapshot).clone());
                Response::ack(request.id)
            }
        }
    }

    /// Handles a fire-and-forget notice.
    pub fn handle_notice(&mut self, notice: &Notice) {
        match notice.notice {
            PageNotice::TabBecameActive => {
                self.active = true;
                if self.match_count > 0 {
                    self.matcher.focus(self.current_index);
                }
            }
            PageNotice::TabBecameInactive => {
                self.active = false;
                self.matcher.blur();
            }
        }
    }

    /// Builds an asynchronous report of the current state.
    #[must_use]
    pub fn report(&self) -> TabReport {
        TabReport {
            tab_id: self.tab_id,
            epoch: self.epoch,
            match_count: self.match_count,
            current_index: self.current_index,
            serialized_matches: self.serialized_matches.clone(),
        }
    }

    /// Runs the matcher for a new query.
    fn scan(&mut self, query: &str, epoch: Option<Epoch>, suppress_focus: bool) -> ScanResult {
        self.matcher.clear();
        let matches = self.matcher.scan(query);

        self.query = query.to_string();
        self.epoch = epoch.unwrap_or(self.epoch);
        self.match_count = matches.count;
        self.current_index = 0;
        self.serialized_matches = matches.serialized;

        if !suppress_focus && self.match_count > 0 {
            self.matcher.focus(0);
        }

        ScanResult {
            match_count: self.match_count,
            serialized_matches: self.serialized_matches.clone(),
            current_index: self.current_index,
        }
    }

    /// Focuses a match, clamped to the match count.
    fn focus(&mut self, index: usize) {
        if self.match_count == 0 {
            return;
        }
        self.current_index = index.min(self.match_count - 1);
        self.matcher.focus(self.current_index);
    }

    /// Moves the local focus by one position.
    ///
    /// On wrap the index moves to the other end but the emphasis is
    /// dropped; the coordinator decides where focus lands.
    fn advance(&mut self, direction: Direction) -> AdvanceResult {
        let (index, wrapped) = direction.step(self.current_index, self.match_count);
        self.current_index = index;

        if self.match_count > 0 {
            if wrapped {
                self.matcher.blur();
            } else {
                self.matcher.focus(index);
            }
        }

        AdvanceResult {
            match_count: self.match_count,
            current_index: self.current_index,
            wrapped,
        }
    }

    /// Removes highlights and forgets the last scan.
    fn clear(&mut self) {
        self.matcher.clear();
        self.query.clear();
        self.match_count = 0;
        self.current_index = 0;
        self.serialized_matches = SerializedMatches::default();
    }

    /// Serializes a typed result into a success response.
    fn success<T: serde::Serialize>(request: &Request, result: &T) -> Response {
        match serde_json::to_value(result) {
            Ok(value) => Response::success(request.id, value),
            Err(e) => Response::error(request.id, "serialization", e.to_string()),
        }
    }
}

impl<M: Matcher> PageAgent<M> {
    /// Handles a request given as raw JSON.
    ///
    /// Used by bridges that relay page traffic as untyped values.
    #[must_use]
    pub fn handle_value(&mut self, request: Value) -> Option<Response> {
        match serde_json::from_value::<Request>(request) {
            Ok(request) => Some(self.handle(&request)),
            Err(e) => {
                debug!(tab_id = %self.tab_id, error = %e, "Ignoring malformed request");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
