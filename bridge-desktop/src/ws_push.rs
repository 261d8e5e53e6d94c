//! Push transport over a websocket using tokio-tungstenite.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    PushConnection, PushTransport,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// Websocket implementation of [`PushTransport`].
///
/// Each `connect` call dials a fresh connection; reconnect policy belongs
/// to the caller.
pub struct WsPushTransport {
    ws_url: String,
}

impl WsPushTransport {
    /// Create a transport for an explicit websocket URL
    /// (e.g. `ws://192.168.1.10:8090/ws`).
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    /// Derive the push endpoint from the server's HTTP base URL.
    pub fn from_http_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        Self::new(format!("{ws_base}/ws"))
    }

    pub fn url(&self) -> &str {
        &self.ws_url
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn connect(&self) -> Result<Box<dyn PushConnection>> {
        debug!(url = self.ws_url.as_str(), "dialing push endpoint");
        let (stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| BridgeError::Network(e.to_string()))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for WsConnection {
    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Ping(payload))) => {
                    trace!("ws ping, answering pong");
                    self.stream
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| BridgeError::Network(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Binary and stray pong frames carry nothing for us.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BridgeError::Network(e.to_string())),
            }
        }
    }

    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| BridgeError::Network(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(BridgeError::Network(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_ws_url_from_http_base() {
        let transport = WsPushTransport::from_http_base("http://localhost:8090/");
        assert_eq!(transport.url(), "ws://localhost:8090/ws");
    }

    #[test]
    fn derives_wss_url_from_https_base() {
        let transport = WsPushTransport::from_http_base("https://player.example.com");
        assert_eq!(transport.url(), "wss://player.example.com/ws");
    }

    #[test]
    fn explicit_ws_url_is_kept_verbatim() {
        let transport = WsPushTransport::new("ws://10.0.0.2:9000/ws");
        assert_eq!(transport.url(), "ws://10.0.0.2:9000/ws");
    }
}
