//! Connection -> lobby routing table

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Where a connection's events go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub lobby_code: String,
    pub player_id: Uuid,
}

/// Connection session directory
#[derive(Default)]
pub struct SessionDirectory {
    sessions: DashMap<Uuid, SessionEntry>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection to a lobby; false if it is already bound
    pub fn bind(&self, conn_id: Uuid, lobby_code: &str) -> bool {
        match self.sessions.entry(conn_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    lobby_code: lobby_code.to_string(),
                    player_id: conn_id,
                });
                true
            }
        }
    }

    pub fn lookup(&self, conn_id: Uuid) -> Option<SessionEntry> {
        self.sessions.get(&conn_id).map(|e| e.value().clone())
    }

    pub fn contains(&self, conn_id: Uuid) -> bool {
        self.sessions.contains_key(&conn_id)
    }

    pub fn unbind(&self, conn_id: Uuid) -> Option<SessionEntry> {
        self.sessions.remove(&conn_id).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_once() {
        let dir = SessionDirectory::new();
        let conn = Uuid::new_v4();
        assert!(dir.bind(conn, "123456"));
        assert!(!dir.bind(conn, "654321"));
        assert_eq!(dir.lookup(conn).unwrap().lobby_code, "123456");
        assert_eq!(dir.unbind(conn).unwrap().player_id, conn);
        assert!(dir.is_empty());
        assert!(dir.lookup(conn).is_none());
    }
}
