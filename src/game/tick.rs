//! Fixed-rate simulation driver for every racing lobby

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::util::time::unix_millis;
use crate::ws::hub::Hub;
use crate::ws::protocol::{GameStateSnapshot, LobbyState, ServerMsg, StateUpdate};

use super::combat::RESPAWN_DELAY_MS;
use super::lobby::TickOutcome;
use super::registry::{LobbyRegistry, SharedLobby};
use super::respawn::RespawnQueue;
use super::snapshot::SnapshotBuilder;

/// Default tick period (~60 Hz)
pub const DEFAULT_TICK_MS: u64 = 16;

pub struct TickDriver {
    registry: Arc<LobbyRegistry>,
    hub: Arc<Hub>,
    respawns: Arc<RespawnQueue>,
    period: Duration,
}

impl TickDriver {
    pub fn new(
        registry: Arc<LobbyRegistry>,
        hub: Arc<Hub>,
        respawns: Arc<RespawnQueue>,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            hub,
            respawns,
            period,
        }
    }

    /// Run forever
    pub async fn run(self) {
        info!(period_ms = self.period.as_millis() as u64, "Tick driver started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.step(unix_millis());
        }
    }

    /// One pass over all lobbies. Returns how many racing lobbies advanced.
    pub fn step(&self, now: u64) -> usize {
        self.fire_respawns(now);

        let mut advanced = 0;
        for (code, lobby) in self.registry.handles() {
            // a fault in one lobby must not stall the others
            match panic::catch_unwind(AssertUnwindSafe(|| Self::advance(&lobby, now))) {
                Ok(Some((outcome, state))) => {
                    advanced += 1;
                    for hit in &outcome.hits {
                        debug!(
                            code = %code,
                            shooter = %hit.shooter_id,
                            target = %hit.target_id,
                            killed = hit.target_killed,
                            "Projectile hit"
                        );
                    }
                    for victim in outcome.killed {
                        self.respawns
                            .schedule(&code, victim, now + RESPAWN_DELAY_MS);
                    }
                    self.hub.broadcast(
                        &code,
                        ServerMsg::GameUpdate(StateUpdate { game_state: state }),
                    );
                }
                Ok(None) => {}
                Err(_) => {
                    error!(code = %code, "Lobby tick panicked, skipping");
                }
            }
        }
        advanced
    }

    fn advance(lobby: &SharedLobby, now: u64) -> Option<(TickOutcome, GameStateSnapshot)> {
        let mut lobby = lobby.lock();
        if lobby.state != LobbyState::Racing {
            return None;
        }
        let outcome = lobby.tick(now);
        Some((outcome, SnapshotBuilder::build(&lobby, now)))
    }

    fn fire_respawns(&self, now: u64) {
        for (code, player_id) in self.respawns.take_due(now) {
            let Some(lobby) = self.registry.get(&code) else {
                continue;
            };
            if lobby.lock().respawn_player(player_id) {
                debug!(code = %code, player_id = %player_id, "Player respawned");
            }
        }
    }
}
