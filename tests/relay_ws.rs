//! Drives the relay over real WebSocket connections.

mod common;

use std::time::Duration;

use common::{eventually, next_delivery, start_test_server, WsRead};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

const QUIET: Duration = Duration::from_millis(300);
const PATIENT: Duration = Duration::from_secs(2);

async fn connect(addr: std::net::SocketAddr, user_id: &str, username: &str) -> (WsWrite, WsRead) {
    let (stream, _) = connect_async(format!("ws://{addr}/ws?userID={user_id}&username={username}"))
        .await
        .expect("handshake should succeed");
    stream.split()
}

async fn emit(write: &mut WsWrite, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    write.send(Message::Text(frame.into())).await.unwrap();
}

#[tokio::test]
async fn room_message_reaches_bob_but_not_alice() {
    let (addr, state) = start_test_server().await;
    let (mut alice_tx, mut alice_rx) = connect(addr, "u1", "alice").await;
    let (mut bob_tx, mut bob_rx) = connect(addr, "u2", "bob").await;

    emit(&mut alice_tx, "join room", json!("r1")).await;
    emit(&mut bob_tx, "join room", json!("r1")).await;
    let registry = state.registry().clone();
    assert!(eventually(|| { let registry = registry.clone(); async move { registry.members_of("r1").len() == 2 } }).await);

    emit(&mut alice_tx, "private message", json!({ "content": "hi", "room": "r1" })).await;

    assert_eq!(next_delivery(&mut bob_rx, PATIENT).await, Some(json!({ "content": "hi", "from": "u1" })));
    assert_eq!(next_delivery(&mut alice_rx, QUIET).await, None);
}

#[tokio::test]
async fn outsiders_never_see_room_traffic() {
    let (addr, state) = start_test_server().await;
    let (mut alice_tx, _alice_rx) = connect(addr, "u1", "alice").await;
    let (_carol_tx, mut carol_rx) = connect(addr, "u3", "carol").await;

    emit(&mut alice_tx, "join room", json!("r1")).await;
    let registry = state.registry().clone();
    assert!(eventually(|| { let registry = registry.clone(); async move { registry.members_of("r1").len() == 1 } }).await);

    emit(&mut alice_tx, "private message", json!({ "content": "secret", "room": "r1" })).await;
    assert_eq!(next_delivery(&mut carol_rx, QUIET).await, None);
}

#[tokio::test]
async fn direct_message_reaches_every_device() {
    let (addr, _state) = start_test_server().await;
    let (mut alice_tx, _alice_rx) = connect(addr, "u1", "alice").await;
    let (_phone_tx, mut phone_rx) = connect(addr, "u2", "bob").await;
    let (_laptop_tx, mut laptop_rx) = connect(addr, "u2", "bob").await;

    emit(&mut alice_tx, "individual message", json!({ "content": "yo", "to": "u2" })).await;

    let expected = Some(json!({ "content": "yo", "from": "u1" }));
    assert_eq!(next_delivery(&mut phone_rx, PATIENT).await, expected);
    assert_eq!(next_delivery(&mut laptop_rx, PATIENT).await, expected);
}

#[tokio::test]
async fn direct_message_to_offline_user_is_only_persisted() {
    let (addr, state) = start_test_server().await;
    let (mut alice_tx, mut alice_rx) = connect(addr, "u1", "alice").await;

    emit(&mut alice_tx, "individual message", json!({ "content": "see you", "to": "u2" })).await;

    let history = state.history.clone();
    assert!(
        eventually(|| {
            let history = history.clone();
            async move { history.list_direct_messages("u1", "u2").await.map(|m| m.len() == 1).unwrap_or(false) }
        })
        .await
    );
    assert_eq!(next_delivery(&mut alice_rx, QUIET).await, None);
}

#[tokio::test]
async fn malformed_events_are_dropped() {
    let (addr, state) = start_test_server().await;
    let (mut alice_tx, _alice_rx) = connect(addr, "u1", "alice").await;
    let (mut bob_tx, mut bob_rx) = connect(addr, "u2", "bob").await;

    emit(&mut bob_tx, "join room", json!("r1")).await;
    let registry = state.registry().clone();
    assert!(eventually(|| { let registry = registry.clone(); async move { registry.members_of("r1").len() == 1 } }).await);

    emit(&mut alice_tx, "private message", json!({ "room": "r1" })).await;
    emit(&mut alice_tx, "individual message", json!({ "content": "nobody" })).await;
    alice_tx.send(Message::Text("{not json".into())).await.unwrap();

    assert_eq!(next_delivery(&mut bob_rx, QUIET).await, None);
    assert_eq!(state.registry().lookup("u1").len(), 1, "a bad frame must not drop the connection");
}

#[tokio::test]
async fn presence_snapshot_follows_connects_and_disconnects() {
    let (addr, state) = start_test_server().await;
    let (_alice_tx, _alice_rx) = connect(addr, "u1", "alice").await;
    let (bob_tx, bob_rx) = connect(addr, "u2", "bob").await;

    let registry = state.registry().clone();
    assert!(eventually(|| { let registry = registry.clone(); async move { registry.list_online().len() == 2 } }).await);

    drop(bob_tx.reunite(bob_rx).unwrap());
    assert!(eventually(|| { let registry = registry.clone(); async move { registry.lookup("u2").is_empty() } }).await);
    assert_eq!(registry.list_online().len(), 1);
}

#[tokio::test]
async fn handshake_without_identifier_is_refused() {
    let (addr, state) = start_test_server().await;

    assert!(connect_async(format!("ws://{addr}/ws")).await.is_err());
    assert!(connect_async(format!("ws://{addr}/ws?userID=")).await.is_err());
    assert!(state.registry().list_online().is_empty());
}
