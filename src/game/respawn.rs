//! Deferred respawns keyed by (lobby code, player id)

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

/// Pending respawns, drained by the tick driver
#[derive(Default)]
pub struct RespawnQueue {
    pending: Mutex<HashMap<(String, Uuid), u64>>,
}

impl RespawnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule (or reschedule) a respawn at `due_at` millis
    pub fn schedule(&self, code: &str, player_id: Uuid, due_at: u64) {
        self.pending
            .lock()
            .insert((code.to_string(), player_id), due_at);
    }

    /// Drop a pending respawn, returns true if one existed
    pub fn cancel(&self, code: &str, player_id: Uuid) -> bool {
        self.pending
            .lock()
            .remove(&(code.to_string(), player_id))
            .is_some()
    }

    /// Drop every pending respawn for a lobby
    pub fn cancel_lobby(&self, code: &str) {
        self.pending.lock().retain(|(c, _), _| c != code);
    }

    /// Remove and return entries due at or before `now`
    pub fn take_due(&self, now: u64) -> Vec<(String, Uuid)> {
        let mut pending = self.pending.lock();
        let due: Vec<(String, Uuid)> = pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            pending.remove(key);
        }
        due
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_when_due() {
        let queue = RespawnQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        queue.schedule("111111", a, 2000);
        queue.schedule("111111", b, 3000);

        assert!(queue.take_due(1999).is_empty());
        assert_eq!(queue.take_due(2000), vec![("111111".to_string(), a)]);
        assert_eq!(queue.len(), 1);
        assert!(queue.take_due(2500).is_empty());
    }

    #[test]
    fn cancellation() {
        let queue = RespawnQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        queue.schedule("111111", a, 10);
        queue.schedule("222222", b, 10);

        assert!(queue.cancel("111111", a));
        assert!(!queue.cancel("111111", a));
        queue.cancel_lobby("222222");
        assert!(queue.is_empty());
        assert!(queue.take_due(u64::MAX).is_empty());
    }
}
