//! Connection Manager Integration Tests
//!
//! Runs the manager against a loopback websocket server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use chrono::DateTime;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

use md_capture::{
    ConnectionManager, ConnectionSettings, FeedTransport, ReadOutcome, Subscription,
    SubscriptionMode, TlsVerification,
};

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        handshake_timeout: Duration::from_secs(5),
        tls: TlsVerification::Relaxed,
    }
}

fn subscription() -> Subscription {
    Subscription::new(
        ["BTC-USD".to_string(), "ETH-USD".to_string()],
        SubscriptionMode::QuotesTrades,
        false,
    )
    .unwrap()
}

/// Accept one client, report its subscribe request, then play `frames`.
async fn serve_once(frames: Vec<Message>) -> (String, oneshot::Receiver<(String, Vec<Message>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();

        let subscribe = match ws.next().await {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            other => panic!("expected subscribe request, got {other:?}"),
        };

        for frame in frames {
            ws.send(frame).await.unwrap();
        }

        let mut received = Vec::new();
        while let Some(Ok(msg)) = ws.next().await {
            let closing = matches!(msg, Message::Close(_));
            received.push(msg);
            if closing {
                break;
            }
        }
        let _ = tx.send((subscribe, received));
    });

    (url, rx)
}

#[tokio::test]
async fn subscribes_and_forwards_text_frames() {
    let (url, server) = serve_once(vec![
        Message::Text(r#"{"type":"ticker"}"#.into()),
        Message::Binary(vec![1, 2, 3].into()),
        Message::Ping(Vec::new().into()),
        Message::Text(r#"{"type":"match"}"#.into()),
    ])
    .await;

    let mut conn = ConnectionManager::new(url, subscription(), settings());
    conn.connect_and_subscribe().await.unwrap();
    assert!(conn.is_connected());

    let ReadOutcome::Text { payload, .. } = conn.read_next().await else {
        panic!("expected text frame");
    };
    assert_eq!(payload, r#"{"type":"ticker"}"#);

    assert_eq!(conn.read_next().await, ReadOutcome::Control);
    assert_eq!(conn.read_next().await, ReadOutcome::Control);

    let ReadOutcome::Text { payload, .. } = conn.read_next().await else {
        panic!("expected text frame");
    };
    assert_eq!(payload, r#"{"type":"match"}"#);

    conn.close().await;
    assert!(!conn.is_connected());

    let (subscribe, received) = server.await.unwrap();
    let request: serde_json::Value = serde_json::from_str(&subscribe).unwrap();
    assert_eq!(request["type"], "subscribe");
    assert_eq!(
        request["product_ids"],
        serde_json::json!(["BTC-USD", "ETH-USD"])
    );
    assert_eq!(
        request["channels"],
        serde_json::json!(["ticker", "matches", "level2"])
    );

    let stamps: Vec<_> = received
        .iter()
        .filter_map(|m| match m {
            Message::Pong(payload) if !payload.is_empty() => {
                Some(std::str::from_utf8(payload).unwrap().to_owned())
            }
            _ => None,
        })
        .collect();
    assert_eq!(stamps.len(), 1, "expected one timestamped pong, got {received:?}");
    assert!(DateTime::parse_from_rfc3339(&stamps[0]).is_ok(), "{}", stamps[0]);
    assert!(matches!(received.last(), Some(Message::Close(_))));
}

#[tokio::test]
async fn server_close_disconnects() {
    let (url, _server) = serve_once(vec![Message::Close(None)]).await;

    let mut conn = ConnectionManager::new(url, subscription(), settings());
    conn.connect_and_subscribe().await.unwrap();

    assert!(matches!(
        conn.read_next().await,
        ReadOutcome::Disconnected { .. }
    ));
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn reconnect_replaces_the_handle() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        for payload in ["first", "second"] {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let _subscribe = ws.next().await;
            ws.send(Message::Text(payload.into())).await.unwrap();
            ws.send(Message::Close(None)).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    let mut conn = ConnectionManager::new(url, subscription(), settings());
    let mut payloads = Vec::new();
    for _ in 0..2 {
        conn.connect_and_subscribe().await.unwrap();
        while let ReadOutcome::Text { payload, .. } = conn.read_next().await {
            payloads.push(payload);
        }
        assert!(!conn.is_connected());
    }

    assert_eq!(payloads, ["first", "second"]);
}
