//! Live link to the extension background.
//!
//! A [`Connection`] is a cheap handle onto a single spawned task (the pump)
//! that owns the WebSocket. Callers hand the pump outbound frames over a
//! channel; the pump writes them, matches replies to waiting callers by
//! request id, and hands unsolicited events to the installed handler.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, WindowId};
use crate::protocol::{Event, Notice, Request, Response};

// ============================================================================
// Constants
// ============================================================================

/// Round-trip limit used by [`Connection::send`].
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on requests awaiting a reply.
const PENDING_LIMIT: usize = 100;

/// How long the background has to announce itself.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

type ReplySender = oneshot::Sender<Result<Response>>;

/// Callers waiting on a reply, keyed by request id.
type Waiters = Arc<Mutex<FxHashMap<RequestId, ReplySender>>>;

type Handler = Arc<Mutex<Option<EventHandler>>>;

type WsStream = WebSocketStream<TcpStream>;

/// Callback invoked on the pump task for every event from the extension.
///
/// Runs inline with socket reads, so it should only forward the event.
pub type EventHandler = Box<dyn Fn(Event) + Send + Sync>;

/// What the background reported when it connected.
#[derive(Debug, Clone, Copy)]
pub struct ReadyData {
    /// Window the extension background serves.
    pub window_id: WindowId,
}

enum Outbound {
    Request {
        request: Request,
        reply: ReplySender,
    },
    Notice(Notice),
    /// The caller stopped waiting; drop its slot.
    Abandon(RequestId),
    Close,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to the extension background socket.
///
/// Clones share the same pump and the same waiters.
#[derive(Clone)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<Outbound>,
    waiters: Waiters,
    handler: Handler,
}

impl Connection {
    /// Takes ownership of an upgraded socket and starts its pump.
    pub(crate) fn new(ws_stream: WsStream) -> Self {
        let (outbound, inbox) = mpsc::unbounded_channel();
        let waiters = Waiters::default();
        let handler = Handler::default();

        let (sink, stream) = ws_stream.split();
        let pump = Pump {
            sink,
            stream,
            waiters: Arc::clone(&waiters),
            handler: Arc::clone(&handler),
        };
        tokio::spawn(pump.run(inbox));

        Self {
            outbound,
            waiters,
            handler,
        }
    }

    /// Waits for the background's first frame, a success response under the
    /// nil id carrying `windowId`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if nothing arrives in time
    /// - [`Error::ConnectionClosed`] if the socket drops first
    /// - [`Error::Protocol`] if the window id is missing or too large
    pub async fn wait_ready(&self) -> Result<ReadyData> {
        let (reply, answer) = oneshot::channel();
        self.waiters.lock().insert(RequestId::ready(), reply);

        let response = match timeout(HANDSHAKE_TIMEOUT, answer).await {
            Ok(Ok(response)) => response?,
            Ok(Err(_)) => return Err(Error::ConnectionClosed),
            Err(_) => {
                self.waiters.lock().remove(&RequestId::ready());
                return Err(Error::connection_timeout(
                    HANDSHAKE_TIMEOUT.as_millis() as u64,
                ));
            }
        };

        let window_id = u32::try_from(response.get_u64("windowId"))
            .map(WindowId::new)
            .map_err(|_| Error::protocol("READY windowId out of range"))?;

        debug!(%window_id, "Extension background ready");
        Ok(ReadyData { window_id })
    }

    /// Installs the callback for incoming events, replacing any previous one.
    pub fn set_event_handler(&self, handler: EventHandler) {
        self.handler.lock().replace(handler);
    }

    /// Drops the installed event callback.
    pub fn clear_event_handler(&self) {
        self.handler.lock().take();
    }

    /// [`send_with_timeout`](Self::send_with_timeout) with a 30 second limit.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, REPLY_TIMEOUT).await
    }

    /// Sends `request` and waits up to `limit` for the matching reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if 100 requests are already waiting
    /// - [`Error::RequestTimeout`] if no reply arrives within `limit`
    /// - [`Error::ConnectionClosed`] if the pump has stopped
    pub async fn send_with_timeout(&self, request: Request, limit: Duration) -> Result<Response> {
        let in_flight = self.pending_count();
        if in_flight >= PENDING_LIMIT {
            warn!(in_flight, limit = PENDING_LIMIT, "Rejecting request, too many in flight");
            return Err(Error::protocol(format!(
                "{in_flight} requests already awaiting a reply (limit {PENDING_LIMIT})"
            )));
        }

        let id = request.id;
        let (reply, answer) = oneshot::channel();
        self.push(Outbound::Request { request, reply })?;

        // Dropping this future early, or timing out, must release the slot.
        let mut waiting = Waiting {
            connection: self,
            id,
            armed: true,
        };

        match timeout(limit, answer).await {
            Ok(answer) => {
                waiting.armed = false;
                answer.unwrap_or(Err(Error::ConnectionClosed))
            }
            Err(_) => Err(Error::request_timeout(id, limit.as_millis() as u64)),
        }
    }

    /// Queues a fire-and-forget notice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the pump has stopped.
    pub fn notify(&self, notice: Notice) -> Result<()> {
        self.push(Outbound::Notice(notice))
    }

    /// Requests still waiting for a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Asks the pump to close the socket. Affects every clone.
    pub fn shutdown(&self) {
        let _ = self.push(Outbound::Close);
    }

    fn push(&self, frame: Outbound) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| Error::ConnectionClosed)
    }
}

/// Pending reply slot of one in-flight request.
///
/// Unless disarmed, dropping it tells the pump to forget the waiter.
struct Waiting<'a> {
    connection: &'a Connection,
    id: RequestId,
    armed: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.connection.push(Outbound::Abandon(self.id));
        }
    }
}

// ============================================================================
// Pump
// ============================================================================

/// Socket owner running on its own task.
struct Pump {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    waiters: Waiters,
    handler: Handler,
}

impl Pump {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Outbound>) {
        loop {
            tokio::select! {
                incoming = self.stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => dispatch(&text, &self.waiters, &self.handler),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Extension closed the socket");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Socket read failed");
                        break;
                    }
                    None => {
                        debug!("Socket stream exhausted");
                        break;
                    }
                },

                frame = inbox.recv() => match frame {
                    Some(Outbound::Request { request, reply }) => self.write_request(request, reply).await,
                    Some(Outbound::Notice(notice)) => self.write_notice(notice).await,
                    Some(Outbound::Abandon(id)) => {
                        if self.waiters.lock().remove(&id).is_some() {
                            debug!(%id, "Dropped waiter after timeout");
                        }
                    }
                    Some(Outbound::Close) => {
                        debug!("Closing socket on request");
                        let _ = self.sink.close().await;
                        break;
                    }
                    None => {
                        debug!("All connection handles dropped");
                        break;
                    }
                },
            }
        }

        let orphaned: Vec<_> = self.waiters.lock().drain().map(|(_, reply)| reply).collect();
        if !orphaned.is_empty() {
            debug!(count = orphaned.len(), "Failing requests left without a reply");
        }
        for reply in orphaned {
            let _ = reply.send(Err(Error::ConnectionClosed));
        }

        debug!("Connection pump stopped");
    }

    async fn write_request(&mut self, request: Request, reply: ReplySender) {
        let id = request.id;
        let text = match encode(&request) {
            Ok(text) => text,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        // Register before writing so a fast reply finds its waiter.
        self.waiters.lock().insert(id, reply);

        match self.sink.send(Message::Text(text.into())).await {
            Ok(()) => trace!(%id, method = request.method(), "Request written"),
            Err(e) => {
                if let Some(reply) = self.waiters.lock().remove(&id) {
                    let _ = reply.send(Err(e.into()));
                }
            }
        }
    }

    async fn write_notice(&mut self, notice: Notice) {
        let tab_id = notice.tab_id;
        let written = match encode(&notice) {
            Ok(text) => self
                .sink
                .send(Message::Text(text.into()))
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            warn!(error = %e, %tab_id, "Notice not delivered");
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Routes one text frame: replies go to their waiter, events to the handler.
fn dispatch(text: &str, waiters: &Waiters, handler: &Handler) {
    if let Ok(response) = serde_json::from_str::<Response>(text) {
        let waiter = waiters.lock().remove(&response.id);
        match waiter {
            Some(reply) => {
                let _ = reply.send(Ok(response));
            }
            None => warn!(id = %response.id, "Reply with no waiting request"),
        }
    } else if let Ok(event) = serde_json::from_str::<Event>(text) {
        trace!(method = %event.method, "Event from extension");
        if let Some(handler) = handler.lock().as_ref() {
            handler(event);
        }
    } else {
        warn!(%text, "Unrecognised frame from extension");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        assert_eq!(REPLY_TIMEOUT.as_secs(), 30);
        assert_eq!(PENDING_LIMIT, 100);
        assert_eq!(HANDSHAKE_TIMEOUT.as_secs(), 30);
    }

    #[test]
    fn test_reply_without_waiter_is_ignored() {
        let waiters = Waiters::default();
        let handler = Handler::default();

        let text = r#"{"id":"550e8400-e29b-41d4-a716-446655440000","type":"success","result":{}}"#;
        dispatch(text, &waiters, &handler);

        assert!(waiters.lock().is_empty());
    }

    #[test]
    fn test_reply_wakes_its_waiter() {
        let waiters = Waiters::default();
        let handler = Handler::default();

        let (reply, mut answer) = oneshot::channel();
        waiters.lock().insert(RequestId::ready(), reply);

        let text = r#"{"id":"00000000-0000-0000-0000-000000000000","type":"success","result":{"windowId":3}}"#;
        dispatch(text, &waiters, &handler);

        let response = answer.try_recv().expect("resolved").expect("ok response");
        assert_eq!(response.get_u64("windowId"), 3);
        assert!(waiters.lock().is_empty());
    }

    #[test]
    fn test_event_goes_to_handler() {
        let waiters = Waiters::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Handler = Arc::new(Mutex::new(Some(Box::new(move |event: Event| {
            sink.lock().push(event.method);
        }))));

        let text = r#"{"id":"550e8400-e29b-41d4-a716-446655440000","type":"event","method":"search.next"}"#;
        dispatch(text, &waiters, &handler);

        assert_eq!(seen.lock().as_slice(), ["search.next".to_string()]);
    }

    #[test]
    fn test_garbage_frame_touches_nothing() {
        let waiters = Waiters::default();
        let handler = Handler::default();

        dispatch("not json", &waiters, &handler);

        assert!(waiters.lock().is_empty());
    }
}
