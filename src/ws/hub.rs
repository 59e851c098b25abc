//! Connection outboxes and lobby group membership

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::ServerMsg;

/// Per-connection outbound queue depth
pub const OUTBOX_CAPACITY: usize = 128;

pub type Outbox = mpsc::Sender<Arc<ServerMsg>>;

/// Routes server messages to single connections or whole lobbies
#[derive(Default)]
pub struct Hub {
    connections: DashMap<Uuid, Outbox>,
    groups: DashMap<String, HashSet<Uuid>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiving end of its outbox
    pub fn register(&self, conn_id: Uuid) -> mpsc::Receiver<Arc<ServerMsg>> {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        self.connections.insert(conn_id, tx);
        rx
    }

    pub fn unregister(&self, conn_id: Uuid) {
        self.connections.remove(&conn_id);
    }

    pub fn join_group(&self, code: &str, conn_id: Uuid) {
        self.groups
            .entry(code.to_string())
            .or_default()
            .insert(conn_id);
    }

    pub fn leave_group(&self, code: &str, conn_id: Uuid) {
        if let Some(mut members) = self.groups.get_mut(code) {
            members.remove(&conn_id);
        }
        self.groups.remove_if(code, |_, members| members.is_empty());
    }

    pub fn members(&self, code: &str) -> Vec<Uuid> {
        self.groups
            .get(code)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Unicast
    pub fn send_to(&self, conn_id: Uuid, msg: ServerMsg) {
        self.deliver(conn_id, Arc::new(msg));
    }

    /// Multicast to every connection in a lobby group
    pub fn broadcast(&self, code: &str, msg: ServerMsg) {
        let msg = Arc::new(msg);
        for conn_id in self.members(code) {
            self.deliver(conn_id, msg.clone());
        }
    }

    fn deliver(&self, conn_id: Uuid, msg: Arc<ServerMsg>) {
        let Some(outbox) = self.connections.get(&conn_id).map(|o| o.value().clone()) else {
            debug!(conn_id = %conn_id, "No outbox for connection");
            return;
        };
        match outbox.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %conn_id, "Client lagging, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn_id = %conn_id, "Outbox closed");
            }
        }
    }
}
