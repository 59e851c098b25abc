//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{LobbyRegistry, RespawnQueue, TickDriver};
use crate::session::SessionService;
use crate::ws::Hub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<LobbyRegistry>,
    pub hub: Arc<Hub>,
    pub respawns: Arc<RespawnQueue>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(LobbyRegistry::new());
        let hub = Arc::new(Hub::new());
        let respawns = Arc::new(RespawnQueue::new());
        let sessions = Arc::new(SessionService::new(
            registry.clone(),
            hub.clone(),
            respawns.clone(),
        ));

        Self {
            config,
            registry,
            hub,
            respawns,
            sessions,
        }
    }

    /// Simulation driver sharing this state's lobbies and connections
    pub fn tick_driver(&self) -> TickDriver {
        TickDriver::new(
            self.registry.clone(),
            self.hub.clone(),
            self.respawns.clone(),
            self.config.tick_interval,
        )
    }
}
