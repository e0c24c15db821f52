//! Coordinator type and shared plumbing.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tracing::{debug, trace, warn};

use crate::browser::TabOrderResolver;
use crate::error::Result;
use crate::identifiers::{Epoch, TabId, TransactionCounter, TransactionId};
use crate::protocol::{Notice, PageCommand, PageNotice, Request, Response};
use crate::session::{SearchSession, SessionSnapshot};
use crate::storage::{self, KeyValueStore, keys};
use crate::transport::Messenger;

use super::builder::CoordinatorBuilder;
use super::options::CoordinatorOptions;

// ============================================================================
// Coordinator
// ============================================================================

/// Owner of one window's search session.
///
/// Every entry point takes `&mut self`: the coordinator is the only writer
/// of its [`SearchSession`]. Page traffic goes through the [`Messenger`],
/// tab order and activation through the [`TabOrderResolver`].
pub struct Coordinator {
    /// Session state.
    pub(super) session: SearchSession,
    /// Live tab oracle.
    pub(super) browser: Arc<dyn TabOrderResolver>,
    /// Page messaging.
    pub(super) messenger: Arc<dyn Messenger>,
    /// Persistence.
    pub(super) storage: Arc<dyn KeyValueStore>,
    /// Tunables.
    pub(super) options: CoordinatorOptions,
    /// Source of transaction ids for page requests.
    pub(super) transactions: TransactionCounter,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("session", &self.session)
            .field("options", &self.options)
            .field("transactions", &self.transactions)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Coordinator - Constructor
// ============================================================================

impl Coordinator {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Creates a coordinator from its parts.
    pub(crate) fn new(
        browser: Arc<dyn TabOrderResolver>,
        messenger: Arc<dyn Messenger>,
        storage: Arc<dyn KeyValueStore>,
        options: CoordinatorOptions,
    ) -> Self {
        debug!(?options, "Coordinator created");

        Self {
            session: SearchSession::new(),
            browser,
            messenger,
            storage,
            options,
            transactions: TransactionCounter::from_clock(),
        }
    }
}

// ============================================================================
// Coordinator - Accessors
// ============================================================================

impl Coordinator {
    /// Current session state.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    /// Configured options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    /// State a page renders, including that tab's own match state.
    #[must_use]
    pub fn snapshot(&self, tab_id: Option<TabId>) -> SessionSnapshot {
        self.session.snapshot(tab_id)
    }
}

// ============================================================================
// Coordinator - Messaging
// ============================================================================

impl Coordinator {
    /// Tags a page command with the next transaction id and current epoch.
    pub(super) fn page_request(&mut self, tab_id: TabId, command: PageCommand) -> Request {
        Request::page(
            tab_id,
            self.transactions.next(),
            self.session.epoch(),
            command,
        )
    }

    /// Sends a page command and waits for the response.
    ///
    /// # Errors
    ///
    /// Transport errors and [`Error::RequestTimeout`](crate::Error::RequestTimeout)
    /// past the configured timeout.
    /// Error responses are returned as `Ok`.
    pub(super) async fn send_page(
        &mut self,
        tab_id: TabId,
        command: PageCommand,
    ) -> Result<Response> {
        let request = self.page_request(tab_id, command);
        dispatch(
            Arc::clone(&self.messenger),
            request,
            self.options.request_timeout,
        )
        .await
    }

    /// Sends a notice, logging failures.
    pub(super) async fn notify_page(&self, tab_id: TabId, notice: PageNotice) {
        if let Err(e) = self.messenger.notify(Notice::new(tab_id, notice)).await {
            warn!(%tab_id, ?notice, error = %e, "Failed to notify page");
        }
    }

    /// Tells a tab to focus a match, logging failures.
    pub(super) async fn focus_match(&mut self, tab_id: TabId, index: usize) {
        let result = self
            .send_page(tab_id, PageCommand::FocusCurrentMatch { tab_id, index })
            .await
            .and_then(Response::into_result);

        if let Err(e) = result {
            warn!(%tab_id, index, error = %e, "Failed to focus match");
        }
    }

    /// Sends tagged requests concurrently, at most
    /// [`max_in_flight`](CoordinatorOptions::max_in_flight) at a time.
    ///
    /// Yields each tab's result as it completes.
    pub(super) fn fan_out(
        &self,
        requests: Vec<(TabId, Request)>,
    ) -> BoxStream<'static, (TabId, Result<Response>)> {
        let messenger = Arc::clone(&self.messenger);
        let request_timeout = self.options.request_timeout;

        stream::iter(requests)
            .map(move |(tab_id, request)| {
                let messenger = Arc::clone(&messenger);
                async move { (tab_id, dispatch(messenger, request, request_timeout).await) }
            })
            .buffer_unordered(self.options.max_in_flight)
            .boxed()
    }
}

/// Sends one request with a timeout.
///
/// Free of `self` so fan-out futures can own their inputs.
async fn dispatch(
    messenger: Arc<dyn Messenger>,
    request: Request,
    request_timeout: Duration,
) -> Result<Response> {
    let request_id = request.id;
    let method = request.method();

    trace!(%request_id, method, "Dispatching page request");

    messenger.send_with_timeout(request, request_timeout).await
}

// ============================================================================
// Coordinator - Persistence
// ============================================================================

impl Coordinator {
    /// Persists the last committed query.
    pub(super) async fn persist_last_query(&self) {
        if !self.options.persist {
            return;
        }
        let last_query = self.session.last_query();
        if let Err(e) = storage::save(self.storage.as_ref(), keys::LAST_QUERY, last_query).await {
            warn!(error = %e, "Failed to persist last query");
        }
    }

    /// Persists the epoch and the transaction high-water mark.
    pub(super) async fn persist_marks(&self) {
        if !self.options.persist {
            return;
        }
        let store = self.storage.as_ref();
        let epoch = storage::save(store, keys::EPOCH, &self.session.epoch()).await;
        let transaction = match self.transactions.last() {
            Some(last) => storage::save(store, keys::LAST_TRANSACTION, &last).await,
            None => Ok(()),
        };
        if let Err(e) = epoch.and(transaction) {
            warn!(error = %e, "Failed to persist session marks");
        }
    }

    /// Reloads the epoch and moves the transaction counter past every
    /// persisted id.
    pub(super) async fn restore_marks(&mut self) -> Result<()> {
        let store = self.storage.as_ref();
        if let Some(epoch) = storage::load::<Epoch>(store, keys::EPOCH).await? {
            self.session.epoch = self.session.epoch.max(epoch);
        }
        if let Some(last) = storage::load::<TransactionId>(store, keys::LAST_TRANSACTION).await? {
            self.transactions.advance_past(last);
        }
        Ok(())
    }

    /// Persists one tab's state, or removes it if the tab has none.
    pub(super) async fn persist_tab_state(&self, tab_id: TabId) {
        if !self.options.persist {
            return;
        }
        let key = keys::tab_state(tab_id);
        let result = match self.session.tabs().get(tab_id) {
            Some(state) => storage::save(self.storage.as_ref(), &key, state).await,
            None => self.storage.remove(&key).await,
        };
        if let Err(e) = result {
            warn!(%tab_id, error = %e, "Failed to persist tab state");
        }
    }

    /// Persists every recorded tab state.
    pub(super) async fn persist_all_tab_states(&self) {
        if !self.options.persist {
            return;
        }
        for tab_id in self.session.tabs().order().to_vec() {
            self.persist_tab_state(tab_id).await;
        }
    }

    /// Removes every persisted tab state.
    pub(super) async fn forget_tab_states(&self) {
        if !self.options.persist {
            return;
        }
        let stored = match self.storage.keys().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to list persisted keys");
                return;
            }
        };
        for key in stored
            .iter()
            .filter(|key| keys::parse_tab_state(key).is_some())
        {
            if let Err(e) = self.storage.remove(key).await {
                warn!(%key, error = %e, "Failed to remove persisted tab state");
            }
        }
    }
}
