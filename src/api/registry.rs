//! Process-wide registry of live streaming connections.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::protocol::ServerFrame;

/// A message queued for one socket's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(ServerFrame),
    Audio(Vec<u8>),
}

/// Maps connection ids to the outbound queue of their socket.
///
/// Cloning is cheap and every clone sees the same connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<Uuid, UnboundedSender<Outbound>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, UnboundedSender<Outbound>>> {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, UnboundedSender<Outbound>>> {
        self.connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new connection and return its id and outbound queue.
    ///
    /// The queue closes once the connection is unregistered.
    pub fn register(&self) -> (Uuid, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client_id = Uuid::new_v4();
        self.write().insert(client_id, tx);
        (client_id, rx)
    }

    /// Returns whether the connection was registered.
    pub fn unregister(&self, client_id: &Uuid) -> bool {
        self.write().remove(client_id).is_some()
    }

    fn send(&self, client_id: &Uuid, message: Outbound) -> bool {
        self.read()
            .get(client_id)
            .is_some_and(|tx| tx.send(message).is_ok())
    }

    /// Queue a JSON frame. Returns false if the client is gone.
    pub fn send_json(&self, client_id: &Uuid, frame: ServerFrame) -> bool {
        self.send(client_id, Outbound::Frame(frame))
    }

    /// Queue a binary audio frame. Returns false if the client is gone.
    pub fn send_bytes(&self, client_id: &Uuid, bytes: Vec<u8>) -> bool {
        self.send(client_id, Outbound::Audio(bytes))
    }

    pub fn contains(&self, client_id: &Uuid) -> bool {
        self.read().contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
