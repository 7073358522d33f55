use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::history::History;

use super::{
    events::{ClientEvent, Delivery, ServerEvent},
    registry::{ConnectionHandle, Registry},
};

/// Routes inbound events to room members or addressed users.
///
/// Live delivery is fire-and-forget. The durable write of the same message
/// goes through the connection's [`SaveQueue`] and is never awaited before
/// fan-out.
#[derive(Clone)]
pub struct Relay {
    registry: Registry,
    history: History,
}

#[derive(Debug)]
pub struct Outcome {
    pub delivered: usize,
    /// Resolves once the message has been written (or the write has failed).
    pub persisted: Option<oneshot::Receiver<()>>,
}

impl Outcome {
    fn live(delivered: usize) -> Self {
        Self { delivered, persisted: None }
    }
}

enum Record {
    Room { room: String, content: String },
    Direct { to: String, content: String },
}

struct PendingSave {
    record: Record,
    done: oneshot::Sender<()>,
}

/// Durable writes of one connection. A single task drains the queue and
/// awaits each append before starting the next, so a sender's messages are
/// stored in the order they arrived.
#[derive(Clone)]
pub struct SaveQueue {
    tx: mpsc::UnboundedSender<PendingSave>,
}

impl SaveQueue {
    fn push(&self, record: Record) -> Option<oneshot::Receiver<()>> {
        let (done, persisted) = oneshot::channel();
        match self.tx.send(PendingSave { record, done }) {
            Ok(()) => Some(persisted),
            Err(_) => {
                tracing::warn!("save queue closed, message not persisted");
                None
            }
        }
    }
}

impl Relay {
    pub fn new(registry: Registry, history: History) -> Self {
        Self { registry, history }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Starts the save task for `sender`. It exits once every clone of the
    /// returned queue is dropped and the backlog is written.
    pub fn save_queue(&self, sender: &ConnectionHandle) -> (SaveQueue, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PendingSave>();
        let history = self.history.clone();
        let user_id = sender.user_id().to_owned();
        let username = sender.display_name().to_owned();

        let saver = tokio::spawn(async move {
            while let Some(PendingSave { record, done }) = rx.recv().await {
                match record {
                    Record::Room { room, content } => {
                        if let Err(err) = history.append_room_message(&room, &user_id, &username, &content).await {
                            tracing::warn!(%user_id, %room, error = %err, "room message not persisted");
                        }
                    }
                    Record::Direct { to, content } => {
                        if let Err(err) = history.append_direct_message(Some(&user_id), Some(&to), Some(&content)).await {
                            tracing::warn!(%user_id, %to, error = %err, "direct message not persisted");
                        }
                    }
                }
                let _ = done.send(());
            }
        });

        (SaveQueue { tx }, saver)
    }

    pub fn dispatch(&self, sender: &ConnectionHandle, saves: &SaveQueue, event: ClientEvent) -> Outcome {
        match event {
            ClientEvent::FetchUsers => {
                let snapshot = ServerEvent::Users(self.registry.list_online());
                Outcome::live(self.registry.deliver(std::slice::from_ref(sender), &snapshot))
            }
            ClientEvent::JoinRoom { room } => {
                if self.registry.join(sender, &room) {
                    tracing::info!(user_id = %sender.user_id(), key = %sender.key(), %room, "joined room");
                }
                Outcome::live(0)
            }
            ClientEvent::RoomMessage { room, content, created_at } => {
                let delivered = self.to_room(sender, &room, &content, created_at);
                // only forum rooms have a history; other room ids are live-only
                if Uuid::parse_str(room.trim()).is_err() {
                    tracing::debug!(%room, "room is not a forum, message not persisted");
                    return Outcome::live(delivered);
                }
                let persisted = saves.push(Record::Room { room, content });
                Outcome { delivered, persisted }
            }
            ClientEvent::DirectMessage { to, content } => {
                let delivered = self.to_user(sender, &to, &content);
                let persisted = saves.push(Record::Direct { to, content });
                Outcome { delivered, persisted }
            }
        }
    }

    /// Fans out to every connection joined to `room` except the sending one.
    pub fn to_room(&self, sender: &ConnectionHandle, room: &str, content: &str, created_at: Option<Value>) -> usize {
        let recipients: Vec<_> = self
            .registry
            .members_of(room)
            .into_iter()
            .filter(|member| member.key() != sender.key())
            .collect();

        let event = ServerEvent::Message(Delivery {
            content: content.to_owned(),
            from: sender.user_id().to_owned(),
            created_at,
        });
        let delivered = self.registry.deliver(&recipients, &event);
        tracing::debug!(user_id = %sender.user_id(), %room, delivered, "room message relayed");
        delivered
    }

    /// Delivers to every connection of `to`. An offline recipient is not an error.
    pub fn to_user(&self, sender: &ConnectionHandle, to: &str, content: &str) -> usize {
        let recipients = self.registry.lookup(to);
        if recipients.is_empty() {
            tracing::debug!(user_id = %sender.user_id(), to, "recipient offline");
            return 0;
        }

        let event = ServerEvent::Message(Delivery {
            content: content.to_owned(),
            from: sender.user_id().to_owned(),
            created_at: None,
        });
        self.registry.deliver(&recipients, &event)
    }
}
