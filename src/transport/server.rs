//! Listener the extension background dials into.
//!
//! Bind first, give the background [`PendingServer::ws_url`], then
//! [`PendingServer::accept`] the single connection it opens. Accepting
//! consumes the server; one server serves one window.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::Connection;
use super::connection::ReadyData;

// ============================================================================
// Constants
// ============================================================================

/// How long [`PendingServer::accept`] waits for the background to dial in.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// PendingServer
// ============================================================================

/// Bound listener with no extension attached yet.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use tabfind::transport::PendingServer;
///
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// launch_background_with(server.ws_url());
/// let (connection, ready) = server.accept().await?;
/// ```
pub struct PendingServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl PendingServer {
    /// Binds to `ip:port`. Port 0 picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        debug!(%addr, "Listening for extension background");

        Ok(Self { listener, addr })
    }

    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// URL to hand to the background, e.g. `ws://127.0.0.1:40123`.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Address actually bound, with the resolved port.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts the background's connection, upgrades it and waits for READY.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if nobody connects in time, or READY is late
    /// - [`Error::Connection`] if the WebSocket upgrade fails
    /// - [`Error::Protocol`] if READY is malformed
    pub async fn accept(self) -> Result<(Connection, ReadyData)> {
        let (stream, peer) = timeout(ACCEPT_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| Error::connection_timeout(ACCEPT_TIMEOUT.as_millis() as u64))??;
        debug!(%peer, "Extension dialed in");

        let socket = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        let connection = Connection::new(socket);
        let ready = connection.wait_ready().await?;
        info!(addr = %self.addr, window_id = %ready.window_id, "Extension connected");

        Ok((connection, ready))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    use crate::protocol::{BrowserCommand, Request};

    async fn loopback() -> PendingServer {
        PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed")
    }

    #[tokio::test]
    async fn test_bind_resolves_port() {
        let server = loopback().await;

        assert!(server.port() > 0);
        assert_eq!(server.ws_url(), format!("ws://127.0.0.1:{}", server.port()));

        let addr = server.local_addr();
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(addr.port(), server.port());
    }

    #[tokio::test]
    async fn test_accept_completes_handshake_and_correlates() {
        let server = loopback().await;
        let url = server.ws_url();

        let client = tokio::spawn(async move {
            let (mut ws, _) = tokio_tungstenite::connect_async(url)
                .await
                .expect("client connect");

            let ready = r#"{"id":"00000000-0000-0000-0000-000000000000","type":"success","result":{"windowId":9}}"#;
            ws.send(Message::Text(ready.into())).await.expect("send READY");

            while let Some(Ok(message)) = ws.next().await {
                let Message::Text(text) = message else { continue };
                let request: serde_json::Value =
                    serde_json::from_str(&text).expect("request json");
                assert_eq!(request["method"], "tabs.query");

                let reply = serde_json::json!({
                    "id": request["id"],
                    "type": "success",
                    "result": {"tabs": []}
                });
                ws.send(Message::Text(reply.to_string().into()))
                    .await
                    .expect("send reply");
                break;
            }
        });

        let (connection, ready) = server.accept().await.expect("accept");
        assert_eq!(ready.window_id.as_u32(), 9);

        let response = connection
            .send(Request::browser(BrowserCommand::QueryTabs))
            .await
            .expect("response");
        assert!(response.is_success());
        assert_eq!(connection.pending_count(), 0);

        client.await.expect("client task");
        connection.shutdown();
    }

    #[tokio::test]
    async fn test_request_fails_once_extension_hangs_up() {
        let server = loopback().await;
        let url = server.ws_url();

        let client = tokio::spawn(async move {
            let (mut ws, _) = tokio_tungstenite::connect_async(url)
                .await
                .expect("client connect");
            let ready = r#"{"id":"00000000-0000-0000-0000-000000000000","type":"success","result":{"windowId":1}}"#;
            ws.send(Message::Text(ready.into())).await.expect("send READY");
            let _ = ws.next().await;
            let _ = ws.close(None).await;
        });

        let (connection, _) = server.accept().await.expect("accept");
        let err = connection
            .send(Request::browser(BrowserCommand::QueryTabs))
            .await
            .expect_err("no reply");
        assert!(err.is_connection_error());

        client.await.expect("client task");
    }
}
