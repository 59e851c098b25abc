//! Snapshot building for network transmission

use crate::ws::protocol::{GameStateSnapshot, LeaderboardEntry, LobbyState, PlayerSnapshot};

use super::combat::MAX_HEALTH;
use super::lobby::{Lobby, PlayerState};

/// Builds full lobby snapshots
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build the snapshot every member of `lobby` receives
    pub fn build(lobby: &Lobby, now: u64) -> GameStateSnapshot {
        let elapsed_ms = match (lobby.state, lobby.race_start_time) {
            (LobbyState::Racing, Some(start)) => Some(now.saturating_sub(start)),
            _ => None,
        };

        let leaderboard = lobby
            .leaderboard
            .iter()
            .filter_map(|id| lobby.player(*id))
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: (i + 1) as u32,
                id: p.id,
                name: p.name.clone(),
                finish_time: p.finish_time,
                progress: p.progress,
            })
            .collect();

        GameStateSnapshot {
            code: lobby.code.clone(),
            state: lobby.state,
            race_distance: lobby.race_distance,
            game_mode: lobby.game_mode,
            race_start_time: lobby.race_start_time,
            elapsed_ms,
            players: lobby.players.iter().map(Self::player).collect(),
            projectiles: lobby.projectiles.iter().map(|p| p.to_snapshot()).collect(),
            obstacles: lobby.obstacles.clone(),
            power_ups: lobby.power_ups.clone(),
            players_finished_count: lobby.players_finished,
            leaderboard,
        }
    }

    fn player(p: &PlayerState) -> PlayerSnapshot {
        PlayerSnapshot {
            id: p.id,
            name: p.name.clone(),
            is_host: p.is_host,
            color: p.color,
            x: p.x,
            y: p.y,
            vel_y: p.vel_y,
            jumping: p.jumping,
            grounded: p.grounded,
            health: p.health,
            max_health: MAX_HEALTH,
            progress: p.progress,
            current_segment: p.current_segment,
            score: p.score,
            finish_time: p.finish_time,
            active_power_up: p.active_power_up,
        }
    }
}
