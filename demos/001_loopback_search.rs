//! Loopback search demonstration.
//!
//! Demonstrates:
//! - Accepting an extension connection and the READY handshake
//! - Driving the coordinator from overlay events (submit, next, previous, close)
//! - Cross-tab navigation over a simulated extension background
//!
//! The extension side runs in-process: one page agent per simulated tab,
//! answering over a real WebSocket.
//!
//! Usage:
//!   cargo run --example 001_loopback_search
//!   cargo run --example 001_loopback_search -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use common::Args;
use tabfind::browser::BrowserWindow;
use tabfind::protocol::{
    BrowserCommand, Command, ERROR_UNREACHABLE, Event, Notice, Request, Response,
};
use tabfind::transport::PendingServer;
use tabfind::{Coordinator, PageAgent, TabId, TextMatcher};

// ============================================================================
// Constants
// ============================================================================

const PAGES: &[&str] = &[
    "release notes for the needle parser",
    "nothing relevant on this page",
    "needle in a haystack, another needle, a third needle",
    "the last needle",
];

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(&args);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    println!("=== 001: Loopback Search ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
    let url = server.ws_url();
    println!("[Setup] Listening on {url}");

    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let extension = tokio::spawn(run_extension(url, ui_rx));

    let window = BrowserWindow::accept(server).await?;
    let mut events = window.subscribe();
    println!("        ✓ Extension connected (window={})\n", window.window_id());

    let mut coordinator = Coordinator::builder().window(window.clone()).build()?;

    // ========================================================================
    // Script
    // ========================================================================

    let script = [
        ("search.submit", json!({ "query": "needle" })),
        ("search.next", Value::Null),
        ("search.next", Value::Null),
        ("search.next", Value::Null),
        ("search.next", Value::Null),
        ("search.next", Value::Null),
        ("search.previous", Value::Null),
        ("search.submit", json!({ "query": "needle" })),
        ("search.close", Value::Null),
    ];

    for (method, params) in script {
        ui_tx.send(Event::new(method, params))?;

        let event = timeout(EVENT_TIMEOUT, events.recv())
            .await?
            .context("event stream closed")?;
        coordinator.handle_event(event).await?;

        let session = coordinator.session();
        println!(
            "[{method:<16}] query={:?} match={}/{} tab={}",
            session.query(),
            session
                .global_match_index()
                .map_or_else(|| "-".to_string(), |i| i.to_string()),
            session.global_match_count(),
            session
                .active_tab_id()
                .map_or_else(|| "-".to_string(), |t| t.to_string()),
        );
    }

    // ========================================================================
    // Done
    // ========================================================================

    drop(ui_tx);
    window.close();
    extension.await??;

    println!("\n=== Done ===");
    Ok(())
}

// ============================================================================
// Simulated Extension
// ============================================================================

/// Background side of the connection: tabs API plus one agent per page.
async fn run_extension(url: String, mut ui: mpsc::UnboundedReceiver<Event>) -> anyhow::Result<()> {
    let (ws, _) = tokio_tungstenite::connect_async(url).await?;
    let (mut write, mut read) = ws.split();

    let ready = json!({
        "id": "00000000-0000-0000-0000-000000000000",
        "type": "success",
        "result": { "windowId": 1 }
    });
    write.send(Message::Text(ready.to_string().into())).await?;

    let mut tabs = SimulatedTabs::new(PAGES)?;

    loop {
        tokio::select! {
            message = read.next() => {
                let Some(Ok(message)) = message else { break };
                let Message::Text(text) = message else { continue };

                let value: Value = serde_json::from_str(&text)?;
                if let Some(reply) = tabs.handle(value)? {
                    let reply = serde_json::to_string(&reply)?;
                    write.send(Message::Text(reply.into())).await?;
                }
            }
            event = ui.recv() => {
                let Some(event) = event else { break };
                let event = serde_json::to_string(&event)?;
                write.send(Message::Text(event.into())).await?;
            }
        }
    }

    Ok(())
}

struct SimulatedTabs {
    agents: Vec<PageAgent<TextMatcher>>,
    active: TabId,
}

impl SimulatedTabs {
    fn new(pages: &[&str]) -> anyhow::Result<Self> {
        let agents = pages
            .iter()
            .zip(1u32..)
            .map(|(text, id)| {
                let tab_id = TabId::new(id).context("tab ids start at 1")?;
                Ok(PageAgent::new(tab_id, TextMatcher::new(*text)))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let active = agents.first().context("at least one page")?.tab_id();

        Ok(Self { agents, active })
    }

    fn agent(&mut self, tab_id: Option<TabId>) -> Option<&mut PageAgent<TextMatcher>> {
        self.agents
            .iter_mut()
            .find(|agent| Some(agent.tab_id()) == tab_id)
    }

    fn handle(&mut self, value: Value) -> anyhow::Result<Option<Response>> {
        if value["type"] == "notice" {
            let notice: Notice = serde_json::from_value(value)?;
            if let Some(agent) = self.agent(Some(notice.tab_id)) {
                agent.handle_notice(&notice);
            }
            return Ok(None);
        }

        let request: Request = serde_json::from_value(value)?;
        let response = match &request.command {
            Command::Browser(BrowserCommand::QueryTabs) => {
                let tabs: Vec<Value> = self
                    .agents
                    .iter()
                    .enumerate()
                    .map(|(index, agent)| {
                        json!({
                            "tabId": agent.tab_id(),
                            "index": index,
                            "active": agent.tab_id() == self.active,
                        })
                    })
                    .collect();
                Response::success(request.id, json!({ "tabs": tabs }))
            }
            Command::Browser(BrowserCommand::ActivateTab { tab_id }) => {
                self.active = *tab_id;
                Response::ack(request.id)
            }
            Command::Page(_) => match self.agent(request.tab_id) {
                Some(agent) => agent.handle(&request),
                None => Response::error(request.id, ERROR_UNREACHABLE, "no such tab"),
            },
        };

        Ok(Some(response))
    }
}
