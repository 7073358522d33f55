mod deliver;
mod events;
mod registry;
mod rooms;
mod ws;

use axum::{routing::get, Router};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};

use crate::AppState;

pub use deliver::{Outcome, Relay, SaveQueue};
pub use events::{ClientEvent, Delivery, ServerEvent};
pub use registry::{validate_identifier, ConnectionHandle, ConnectionKey, OnlineUser, PresenceChange, Registry};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::relay_ws))
}

/// Pushes a fresh `users` snapshot to every connection whenever presence changes.
pub fn spawn_presence_broadcaster(registry: Registry) -> JoinHandle<()> {
    let mut changes = registry.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "presence broadcaster lagged");
                }
                Err(RecvError::Closed) => break,
            }
            let snapshot = ServerEvent::Users(registry.list_online());
            registry.broadcast(&snapshot);
        }
    })
}
