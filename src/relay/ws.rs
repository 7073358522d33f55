use axum::{
    debug_handler,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{AppResult, AppState};

use super::{
    events::{ClientEvent, ServerEvent},
    registry::{validate_identifier, ConnectionHandle},
    Relay,
};

#[derive(Debug, Deserialize)]
pub(crate) struct Handshake {
    #[serde(rename = "userID")]
    user_id: Option<String>,
    username: Option<String>,
}

/// `GET /ws?userID=..`. The identifier is checked before the upgrade so a
/// bad handshake is refused outright.
#[debug_handler(state = AppState)]
pub(crate) async fn relay_ws(
    Query(Handshake { user_id, username }): Query<Handshake>,
    State(relay): State<Relay>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user_id = validate_identifier(user_id.as_deref())?.to_owned();

    Ok(ws
        .on_upgrade(async move |socket| {
            let (handle, rx) = match relay.registry().admit(&user_id, username.as_deref()) {
                Ok(admitted) => admitted,
                Err(err) => {
                    tracing::warn!(%user_id, error = %err, "admission refused");
                    return;
                }
            };
            run_connection(socket, relay, handle, rx).await;
        })
        .into_response())
}

async fn run_connection(
    socket: WebSocket,
    relay: Relay,
    handle: ConnectionHandle,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
) {
    tracing::info!(user_id = %handle.user_id(), key = %handle.key(), "connected");
    let (sender, mut receiver) = socket.split();
    let mut writer = tokio::spawn(writer_task(sender, rx));
    let (saves, saver) = relay.save_queue(&handle);

    loop {
        tokio::select! {
            _ = &mut writer => break,
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => match ClientEvent::parse(text.as_str()) {
                    Ok(event) => {
                        relay.dispatch(&handle, &saves, event);
                    }
                    Err(err) => {
                        tracing::debug!(user_id = %handle.user_id(), error = %err, "dropped malformed event");
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(user_id = %handle.user_id(), error = %err, "receive failed");
                    break;
                }
            },
        }
    }

    writer.abort();
    relay.registry().remove(&handle);

    // let the backlog of writes finish before the connection is gone
    drop(saves);
    if let Err(err) = saver.await {
        tracing::warn!(user_id = %handle.user_id(), error = %err, "save task failed");
    }
    tracing::info!(user_id = %handle.user_id(), key = %handle.key(), "disconnected");
}

async fn writer_task(mut sender: SplitSink<WebSocket, Message>, mut rx: mpsc::UnboundedReceiver<ServerEvent>) {
    while let Some(event) = rx.recv().await {
        let frame = match event.to_json() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "unserializable event");
                continue;
            }
        };
        if sender.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }
}
