//! Registry of all active lobbies

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use uuid::Uuid;

use super::error::LobbyError;
use super::lobby::Lobby;

/// A lobby behind its own lock
pub type SharedLobby = Arc<Mutex<Lobby>>;

/// Attempts before giving up on finding a free code
const MAX_CODE_ATTEMPTS: usize = 64;

/// Source of join codes
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random 6-digit codes
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn generate(&self) -> String {
        rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
    }
}

/// Lobby code -> lobby
pub struct LobbyRegistry {
    lobbies: DashMap<String, SharedLobby>,
    codes: Box<dyn CodeGenerator>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self::with_codes(Box::new(RandomCodes))
    }

    pub fn with_codes(codes: Box<dyn CodeGenerator>) -> Self {
        Self {
            lobbies: DashMap::new(),
            codes,
        }
    }

    /// Create a lobby under a fresh code with `host_id` as host
    pub fn create(
        &self,
        host_id: Uuid,
        host_name: String,
        now: u64,
    ) -> Result<(String, SharedLobby), LobbyError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.codes.generate();
            if let Entry::Vacant(slot) = self.lobbies.entry(code.clone()) {
                let lobby = Lobby::new(code.clone(), host_id, host_name, rand::random(), now);
                let shared = Arc::new(Mutex::new(lobby));
                slot.insert(shared.clone());
                return Ok((code, shared));
            }
        }
        Err(LobbyError::CodeSpaceExhausted)
    }

    pub fn get(&self, code: &str) -> Option<SharedLobby> {
        self.lobbies.get(code).map(|l| l.value().clone())
    }

    pub fn remove(&self, code: &str) -> Option<SharedLobby> {
        self.lobbies.remove(code).map(|(_, l)| l)
    }

    /// Handles to every lobby; no map locks are held once this returns
    pub fn handles(&self) -> Vec<(String, SharedLobby)> {
        self.lobbies
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn active_lobbies(&self) -> usize {
        self.lobbies.len()
    }

    pub fn total_players(&self) -> usize {
        self.handles()
            .into_iter()
            .map(|(_, lobby)| lobby.lock().player_count())
            .sum()
    }
}

impl Default for LobbyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Always hands out the same code
    pub(crate) struct FixedCode(pub &'static str);

    impl CodeGenerator for FixedCode {
        fn generate(&self) -> String {
            self.0.to_string()
        }
    }

    /// Hands out the given codes in order, then repeats the last one
    pub(crate) struct ScriptedCodes {
        codes: Mutex<Vec<&'static str>>,
    }

    impl ScriptedCodes {
        pub(crate) fn new(codes: &[&'static str]) -> Self {
            let mut codes = codes.to_vec();
            codes.reverse();
            Self {
                codes: Mutex::new(codes),
            }
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn generate(&self) -> String {
            let mut codes = self.codes.lock();
            let code = if codes.len() > 1 { codes.pop() } else { codes.last().copied() };
            code.unwrap_or("000000").to_string()
        }
    }

    #[test]
    fn random_codes_are_six_digits() {
        for _ in 0..100 {
            let code = RandomCodes.generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn create_get_remove() {
        let registry = LobbyRegistry::with_codes(Box::new(FixedCode("123456")));
        let host = Uuid::new_v4();
        let (code, lobby) = registry.create(host, "host".into(), 0).unwrap();
        assert_eq!(code, "123456");
        assert_eq!(lobby.lock().host_id, host);
        assert_eq!(registry.total_players(), 1);
        assert!(registry.get("123456").is_some());
        assert!(registry.get("654321").is_none());

        assert!(registry.remove("123456").is_some());
        assert_eq!(registry.active_lobbies(), 0);
    }

    #[test]
    fn code_collision_regenerates() {
        let registry = LobbyRegistry::with_codes(Box::new(ScriptedCodes::new(&[
            "111111", "111111", "111111", "222222",
        ])));
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let (code_a, _) = registry.create(first, "a".into(), 0).unwrap();
        let (code_b, lobby_b) = registry.create(second, "b".into(), 0).unwrap();

        assert_eq!(code_a, "111111");
        assert_eq!(code_b, "222222");
        assert_eq!(registry.active_lobbies(), 2);
        assert_eq!(registry.get("111111").unwrap().lock().host_id, first);
        assert_eq!(lobby_b.lock().host_id, second);
    }

    #[test]
    fn code_collision_is_retried_then_fails() {
        let registry = LobbyRegistry::with_codes(Box::new(FixedCode("123456")));
        registry.create(Uuid::new_v4(), "a".into(), 0).unwrap();
        assert_eq!(
            registry.create(Uuid::new_v4(), "b".into(), 0).err(),
            Some(LobbyError::CodeSpaceExhausted)
        );
        assert_eq!(registry.active_lobbies(), 1);
    }
}
