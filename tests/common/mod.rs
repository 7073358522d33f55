#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use forumrelay::{app, db, history::History, AppState};
use futures_util::{stream::SplitStream, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Serves the full router over an in-memory store on a random port.
pub async fn start_test_server() -> (SocketAddr, AppState) {
    let db_pool = db::connect_in_memory().await.expect("in-memory database");
    let state = AppState::new(History::new(db_pool));
    let router = app(state.clone(), "*");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, state)
}

/// Next relayed `private message` payload, skipping presence snapshots.
pub async fn next_delivery(read: &mut WsRead, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let frame = tokio::time::timeout_at(deadline, read.next()).await.ok()??.ok()?;
        let Message::Text(text) = frame else {
            continue;
        };
        let event: Value = serde_json::from_str(text.as_str()).ok()?;
        if event["event"] == "private message" {
            return Some(event["data"].clone());
        }
    }
}

/// Polls `check` until it holds or a second passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
