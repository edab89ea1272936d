//! WebSocket Feed Transport - Publish/Subscribe over TLS
//!
//! Coinbase-style feed: open the socket, send one JSON subscribe
//! message, then receive text frames. There is no in-band logon, so
//! the authenticate step is empty.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{
    connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, instrument, warn};

use crate::domain::credentials::CredentialInjector;
use crate::domain::error::FeedError;
use crate::domain::frame::{InboundFrame, SessionId};
use crate::domain::subscription::SubscriptionRequest;
use crate::ports::transport::{FeedTransport, TransportEvent, TransportKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close` waits for the server's close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket transport implementing `FeedTransport`.
pub struct WsTransport {
    /// Connection URI (`wss://` in production, `ws://` in tests).
    uri: String,
    /// TLS context handed to tungstenite for `wss://`.
    tls: Arc<ClientConfig>,
    stream: Option<WsStream>,
    session: SessionId,
}

impl WsTransport {
    pub fn new(uri: impl Into<String>, tls: Arc<ClientConfig>) -> Self {
        Self {
            uri: uri.into(),
            tls,
            stream: None,
            session: SessionId::nil(),
        }
    }

    fn stream(&mut self) -> Result<&mut WsStream, FeedError> {
        self.stream.as_mut().ok_or(FeedError::NotConnected)
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    #[instrument(skip(self), fields(uri = %self.uri))]
    async fn connect(&mut self, session: SessionId) -> Result<(), FeedError> {
        let connector = Connector::Rustls(Arc::clone(&self.tls));
        let (stream, response) =
            connect_async_tls_with_config(self.uri.as_str(), None, false, Some(connector))
                .await
                .map_err(|e| FeedError::ConnectionInit(e.to_string()))?;

        info!(status = %response.status(), "Connected to WebSocket feed");
        self.stream = Some(stream);
        self.session = session;
        Ok(())
    }

    async fn authenticate(
        &mut self,
        _injector: &CredentialInjector,
    ) -> Result<Vec<InboundFrame>, FeedError> {
        debug!("WebSocket feed has no in-band logon");
        Ok(Vec::new())
    }

    async fn send_subscription(&mut self, request: &SubscriptionRequest) -> Result<(), FeedError> {
        let text = request.to_ws_text()?;
        self.stream()?
            .send(Message::Text(text))
            .await
            .map_err(|e| FeedError::SubscriptionSend(e.to_string()))
    }

    async fn next_event(&mut self) -> Result<TransportEvent, FeedError> {
        let session = self.session;
        let stream = self.stream()?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(TransportEvent::Frame(InboundFrame::text(text, session)));
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    return Ok(TransportEvent::Closed { reason });
                }
                Some(Ok(Message::Ping(data))) => {
                    // Pong is handled automatically by tungstenite
                    debug!(len = data.len(), "WebSocket ping received");
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(FeedError::Transport(e.to_string())),
                None => return Err(FeedError::Transport("WebSocket stream ended".to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        match stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
            Err(e) => return Err(FeedError::Transport(e.to_string())),
        }

        // Drain until the server echoes the close and the stream ends.
        let drained = tokio::time::timeout(CLOSE_TIMEOUT, async {
            while let Some(msg) = stream.next().await {
                if msg.is_err() {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("Timed out waiting for WebSocket close confirmation");
        }

        info!("WebSocket connection closed");
        Ok(())
    }
}
