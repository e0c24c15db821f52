//! In-memory browser window for coordinator tests.
//!
//! Each page runs a real [`PageAgent`] over a [`TextMatcher`], so requests
//! go through the same transaction and focus rules as in a live window.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::browser::{TabInfo, TabOrderResolver};
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::page::{PageAgent, TextMatcher};
use crate::protocol::{
    Command, ERROR_UNREACHABLE, Notice, PageCommand, PageNotice, Request, Response,
};
use crate::session::SessionSnapshot;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::transport::Messenger;

use super::core::Coordinator;
use super::options::CoordinatorOptions;

// ============================================================================
// Types
// ============================================================================

/// How a fake page answers requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageBehavior {
    /// Handles requests normally.
    Normal,
    /// Answers every request with an unreachable error.
    Unreachable,
    /// Never answers.
    Hang,
}

/// A recorded interaction with the fake window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Scan(TabId),
    Focus(TabId, usize),
    Advance(TabId),
    Clear(TabId),
    Snapshot(TabId),
    Activate(TabId),
    Notice(TabId, PageNotice),
}

struct FakePage {
    agent: PageAgent<TextMatcher>,
    behavior: PageBehavior,
}

#[derive(Default)]
struct FakeWindow {
    /// Pages in native tab-strip order.
    pages: Vec<FakePage>,
    active: Option<TabId>,
    calls: Vec<Call>,
    refuse_activation: bool,
    in_flight: usize,
    peak_in_flight: usize,
}

impl FakeWindow {
    fn page(&self, tab_id: TabId) -> Option<&FakePage> {
        self.pages.iter().find(|p| p.agent.tab_id() == tab_id)
    }

    fn page_mut(&mut self, tab_id: TabId) -> Option<&mut FakePage> {
        self.pages.iter_mut().find(|p| p.agent.tab_id() == tab_id)
    }
}

/// A browser window whose tabs are in-process page agents.
#[derive(Default)]
pub struct FakeBrowser {
    window: Mutex<FakeWindow>,
}

// ============================================================================
// FakeBrowser
// ============================================================================

impl FakeBrowser {
    /// Creates a window with one tab per text, ids `1..=n`, first tab active.
    pub fn with_pages(texts: &[&str]) -> Arc<Self> {
        let pages = texts
            .iter()
            .enumerate()
            .map(|(i, text)| FakePage {
                agent: PageAgent::new(tab(i as u32 + 1), TextMatcher::new(*text)),
                behavior: PageBehavior::Normal,
            })
            .collect();

        Arc::new(Self {
            window: Mutex::new(FakeWindow {
                pages,
                active: (!texts.is_empty()).then(|| tab(1)),
                ..FakeWindow::default()
            }),
        })
    }

    /// Opens a tab at `index` in the strip and returns its id.
    pub fn insert_page(&self, index: usize, text: &str) -> TabId {
        let mut window = self.window.lock();
        let next = window
            .pages
            .iter()
            .map(|p| p.agent.tab_id().as_u32())
            .max()
            .unwrap_or(0)
            + 1;
        let tab_id = tab(next);
        let index = index.min(window.pages.len());
        window.pages.insert(
            index,
            FakePage {
                agent: PageAgent::new(tab_id, TextMatcher::new(text)),
                behavior: PageBehavior::Normal,
            },
        );
        tab_id
    }

    /// Closes a tab.
    pub fn remove_page(&self, tab_id: TabId) {
        let mut window = self.window.lock();
        window.pages.retain(|p| p.agent.tab_id() != tab_id);
        if window.active == Some(tab_id) {
            window.active = None;
        }
    }

    /// Switches the active tab, as the user would.
    pub fn set_active(&self, tab_id: TabId) {
        self.window.lock().active = Some(tab_id);
    }

    pub fn set_behavior(&self, tab_id: TabId, behavior: PageBehavior) {
        if let Some(page) = self.window.lock().page_mut(tab_id) {
            page.behavior = behavior;
        }
    }

    /// Replaces a page's content, as a navigation would.
    pub fn set_text(&self, tab_id: TabId, text: &str) {
        if let Some(page) = self.window.lock().page_mut(tab_id) {
            page.agent.matcher_mut().set_text(text);
        }
    }

    /// Makes `tabs.activate` fail, as for a tab being torn down.
    pub fn refuse_activation(&self, refuse: bool) {
        self.window.lock().refuse_activation = refuse;
    }

    /// Most page requests that were ever outstanding at once.
    pub fn peak_in_flight(&self) -> usize {
        self.window.lock().peak_in_flight
    }

    pub fn calls(&self) -> Vec<Call> {
        self.window.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.window.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.window.lock().active
    }

    pub fn match_count(&self, tab_id: TabId) -> usize {
        self.window
            .lock()
            .page(tab_id)
            .map_or(0, |p| p.agent.match_count())
    }

    pub fn current_index(&self, tab_id: TabId) -> usize {
        self.window
            .lock()
            .page(tab_id)
            .map_or(0, |p| p.agent.current_index())
    }

    /// Match the page has visibly focused, if any.
    pub fn focused(&self, tab_id: TabId) -> Option<usize> {
        self.window
            .lock()
            .page(tab_id)
            .and_then(|p| p.agent.matcher().focused())
    }

    /// Last snapshot the page received.
    pub fn snapshot(&self, tab_id: TabId) -> Option<SessionSnapshot> {
        self.window
            .lock()
            .page(tab_id)
            .and_then(|p| p.agent.snapshot().cloned())
    }
}

fn record(command: &PageCommand, tab_id: TabId) -> Call {
    match command {
        PageCommand::ScanAndHighlight { .. } => Call::Scan(tab_id),
        PageCommand::FocusCurrentMatch { index, .. } => Call::Focus(tab_id, *index),
        PageCommand::AdvanceLocal { .. } => Call::Advance(tab_id),
        PageCommand::ClearHighlights => Call::Clear(tab_id),
        PageCommand::SessionStateChanged { .. } => Call::Snapshot(tab_id),
    }
}

/// Counts one outstanding request until dropped.
struct InFlight<'a>(&'a FakeBrowser);

impl<'a> InFlight<'a> {
    fn enter(browser: &'a FakeBrowser) -> Self {
        let mut window = browser.window.lock();
        window.in_flight += 1;
        window.peak_in_flight = window.peak_in_flight.max(window.in_flight);
        Self(browser)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.window.lock().in_flight -= 1;
    }
}

#[async_trait]
impl Messenger for FakeBrowser {
    async fn send(&self, request: Request) -> Result<Response> {
        let tab_id = request
            .tab_id
            .ok_or_else(|| Error::invalid_argument("page request without tab id"))?;
        let _in_flight = InFlight::enter(self);

        let behavior = {
            let mut window = self.window.lock();
            if let Command::Page(command) = &request.command {
                window.calls.push(record(command, tab_id));
            }

            let page = window
                .page_mut(tab_id)
                .ok_or_else(|| Error::tab_not_found(tab_id))?;
            match page.behavior {
                PageBehavior::Normal => return Ok(page.agent.handle(&request)),
                behavior => behavior,
            }
        };

        match behavior {
            PageBehavior::Hang => std::future::pending::<Result<Response>>().await,
            _ => Ok(Response::error(
                request.id,
                ERROR_UNREACHABLE,
                "no receiving end",
            )),
        }
    }

    async fn notify(&self, notice: Notice) -> Result<()> {
        let mut window = self.window.lock();
        window.calls.push(Call::Notice(notice.tab_id, notice.notice));
        if let Some(page) = window.page_mut(notice.tab_id)
            && page.behavior == PageBehavior::Normal
        {
            page.agent.handle_notice(&notice);
        }
        Ok(())
    }
}

#[async_trait]
impl TabOrderResolver for FakeBrowser {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let window = self.window.lock();
        Ok(window
            .pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let tab_id = page.agent.tab_id();
                TabInfo {
                    tab_id,
                    index: index as u32,
                    active: window.active == Some(tab_id),
                }
            })
            .collect())
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<()> {
        let mut window = self.window.lock();
        if window.page(tab_id).is_none() {
            return Err(Error::tab_not_found(tab_id));
        }
        if window.refuse_activation {
            return Err(Error::protocol("tabs.activate refused"));
        }
        window.calls.push(Call::Activate(tab_id));
        window.active = Some(tab_id);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn tab(id: u32) -> TabId {
    TabId::new(id).expect("valid tab id")
}

/// Short per-request timeout so hanging pages fail fast.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Coordinator over `browser` with in-memory storage.
pub fn coordinator(browser: &Arc<FakeBrowser>) -> Coordinator {
    coordinator_with(
        browser,
        Arc::new(MemoryStore::new()),
        CoordinatorOptions::new(),
    )
}

/// Coordinator over `browser` with the given storage and options.
///
/// The request timeout is always [`TEST_TIMEOUT`].
pub fn coordinator_with<S: KeyValueStore + 'static>(
    browser: &Arc<FakeBrowser>,
    storage: Arc<S>,
    options: CoordinatorOptions,
) -> Coordinator {
    Coordinator::builder()
        .browser(Arc::clone(browser))
        .messenger(Arc::clone(browser))
        .storage(storage)
        .options(options.with_request_timeout(TEST_TIMEOUT))
        .build()
        .expect("coordinator")
}
