//! Feed Connection
//!
//! Owns the single websocket connection to the Coinbase feed.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect_and_subscribe──► Subscribed
//!      ▲                                      │
//!      └──── read error / close frame / EOF ──┘
//! ```
//!
//! Ping frames are answered with a pong carrying the local time. Binary
//! frames are logged and discarded. Server close frames count as a read
//! failure so the recorder reconnects.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};

use super::messages::SubscribeRequest;
use super::tls::TlsVerification;
use crate::application::ports::{ConnectionError, FeedTransport, ReadOutcome};
use crate::domain::subscription::Subscription;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Dial settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Upper bound on TCP, TLS and websocket handshakes together.
    pub handshake_timeout: Duration,
    /// Server certificate validation.
    pub tls: TlsVerification,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            tls: TlsVerification::default(),
        }
    }
}

/// Websocket connection to the feed, replaced on every reconnect.
pub struct ConnectionManager {
    url: String,
    subscription: Subscription,
    settings: ConnectionSettings,
    stream: Option<FeedStream>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        subscription: Subscription,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            url: url.into(),
            subscription,
            settings,
            stream: None,
        }
    }

    async fn dial(&self) -> Result<FeedStream, ConnectionError> {
        let connector = self
            .settings
            .tls
            .connector()
            .map_err(|e| ConnectionError::Tls(e.to_string()))?;

        let handshake = connect_async_tls_with_config(self.url.as_str(), None, false, connector);
        let (stream, _response) = tokio::time::timeout(self.settings.handshake_timeout, handshake)
            .await
            .map_err(|_| ConnectionError::HandshakeTimeout {
                timeout: self.settings.handshake_timeout,
            })?
            .map_err(|e| ConnectionError::Dial(e.to_string()))?;

        Ok(stream)
    }

    fn disconnect(&mut self, reason: String) -> ReadOutcome {
        tracing::warn!(url = %self.url, reason = %reason, "Feed connection lost");
        self.stream = None;
        ReadOutcome::Disconnected { reason }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url)
            .field("subscription", &self.subscription)
            .field("settings", &self.settings)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

#[async_trait]
impl FeedTransport for ConnectionManager {
    async fn connect_and_subscribe(&mut self) -> Result<(), ConnectionError> {
        self.stream = None;

        tracing::info!(
            url = %self.url,
            tls = self.settings.tls.as_str(),
            "Connecting to feed"
        );
        let mut stream = self.dial().await?;

        let request = SubscribeRequest::from_subscription(&self.subscription)
            .to_json()
            .map_err(|e| ConnectionError::Encode(e.to_string()))?;
        stream
            .send(Message::Text(request.into()))
            .await
            .map_err(|e| ConnectionError::Subscribe(e.to_string()))?;

        tracing::info!(
            url = %self.url,
            products = ?self.subscription.product_ids(),
            channels = ?self.subscription.channels(),
            "Subscribed to feed"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn read_next(&mut self) -> ReadOutcome {
        let Some(stream) = self.stream.as_mut() else {
            return ReadOutcome::Disconnected {
                reason: "not connected".to_string(),
            };
        };

        let reason = match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return ReadOutcome::Text {
                    received_at: Local::now(),
                    payload: text.as_str().to_owned(),
                };
            }
            Some(Ok(Message::Ping(_))) => {
                let stamp = Local::now().to_rfc3339();
                match stream.send(Message::Pong(stamp.into_bytes().into())).await {
                    Ok(()) => return ReadOutcome::Control,
                    Err(e) => format!("pong failed: {e}"),
                }
            }
            Some(Ok(Message::Binary(data))) => {
                tracing::warn!(bytes = data.len(), "Discarding binary frame");
                return ReadOutcome::Control;
            }
            Some(Ok(Message::Pong(_) | Message::Frame(_))) => return ReadOutcome::Control,
            Some(Ok(Message::Close(frame))) => match frame {
                Some(frame) => format!(
                    "server closed connection: {} {}",
                    u16::from(frame.code),
                    frame.reason.as_str()
                ),
                None => "server closed connection".to_string(),
            },
            Some(Err(e)) => e.to_string(),
            None => "stream ended".to_string(),
        };

        self.disconnect(reason)
    }

    async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        match stream.close(Some(frame)).await {
            Ok(()) => tracing::info!(url = %self.url, "Closed feed connection"),
            Err(e) => tracing::debug!(url = %self.url, error = %e, "Close handshake failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::SubscriptionMode;

    fn manager(url: &str) -> ConnectionManager {
        let subscription =
            Subscription::new(["BTC-USD".to_string()], SubscriptionMode::Trades, false).unwrap();
        ConnectionManager::new(
            url,
            subscription,
            ConnectionSettings {
                handshake_timeout: Duration::from_secs(2),
                tls: TlsVerification::Relaxed,
            },
        )
    }

    #[test]
    fn default_settings() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.handshake_timeout, Duration::from_secs(10));
        assert_eq!(settings.tls, TlsVerification::Relaxed);
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let mut conn = manager("ws://127.0.0.1:9");
        assert!(!conn.is_connected());
        assert!(matches!(
            conn.read_next().await,
            ReadOutcome::Disconnected { .. }
        ));
    }

    #[tokio::test]
    async fn failed_dial_leaves_handle_unset() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut conn = manager(&format!("ws://{addr}"));
        let err = conn.connect_and_subscribe().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Dial(_)));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn close_without_connection_is_noop() {
        let mut conn = manager("ws://127.0.0.1:9");
        conn.close().await;
        assert!(!conn.is_connected());
    }
}
