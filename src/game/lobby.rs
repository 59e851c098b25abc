//! Lobby state machine and per-tick race simulation

use uuid::Uuid;

use crate::ws::protocol::{ActivePowerUp, GameMode, LobbyState, PlayerUpdate, ShootRequest};

use super::combat::{CombatSystem, HitResult, Projectile, MAX_HEALTH, PVP_DAMAGE};
use super::error::LobbyError;
use super::physics::{Aabb, PhysicsSystem, SPAWN_X, SPAWN_Y};
use super::world::{Obstacle, PowerUp, RosterSpan, WorldSpawner};

/// Colors handed out in join order
pub const PLAYER_COLORS: [&str; 6] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFB347", "#98D8C8",
];

/// Race length used until the host picks one
pub const DEFAULT_RACE_DISTANCE: f32 = 1000.0;

/// Player state in a lobby (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: Uuid,
    pub name: String,
    pub is_host: bool,
    pub color: &'static str,

    // Mirrored from the client
    pub x: f32,
    pub y: f32,
    pub vel_y: f32,
    pub jumping: bool,
    pub grounded: bool,
    pub active_power_up: ActivePowerUp,

    // Server-owned race state
    pub health: f32,
    pub progress: f32,
    pub current_segment: u8,
    pub score: u32,
    pub finish_time: Option<u64>,
    pub last_update: u64,
}

impl PlayerState {
    pub fn new(id: Uuid, name: String, is_host: bool, color: &'static str, now: u64) -> Self {
        Self {
            id,
            name,
            is_host,
            color,
            x: SPAWN_X,
            y: SPAWN_Y,
            vel_y: 0.0,
            jumping: false,
            grounded: true,
            active_power_up: ActivePowerUp::default(),
            health: MAX_HEALTH,
            progress: 0.0,
            current_segment: 1,
            score: 0,
            finish_time: None,
            last_update: now,
        }
    }

    /// Back to the start line with full health
    fn reset_for_race(&mut self) {
        self.x = SPAWN_X;
        self.y = SPAWN_Y;
        self.vel_y = 0.0;
        self.jumping = false;
        self.grounded = true;
        self.active_power_up = ActivePowerUp::default();
        self.health = MAX_HEALTH;
        self.progress = 0.0;
        self.current_segment = 1;
        self.score = 0;
        self.finish_time = None;
    }

    fn apply_update(&mut self, update: &PlayerUpdate) {
        if let Some(x) = update.x.filter(|v| v.is_finite()) {
            self.x = x;
        }
        if let Some(y) = update.y.filter(|v| v.is_finite()) {
            self.y = y;
        }
        if let Some(vel_y) = update.vel_y.filter(|v| v.is_finite()) {
            self.vel_y = vel_y;
        }
        if let Some(jumping) = update.jumping {
            self.jumping = jumping;
        }
        if let Some(grounded) = update.grounded {
            self.grounded = grounded;
        }
        if let Some(power_up) = update.active_power_up {
            self.active_power_up = power_up;
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

/// What happened during one simulation tick
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub hits: Vec<HitResult>,
    /// Players killed this tick, pending respawn
    pub killed: Vec<Uuid>,
}

/// One race session
pub struct Lobby {
    pub code: String,
    pub host_id: Uuid,
    pub state: LobbyState,
    pub race_distance: f32,
    pub game_mode: GameMode,
    /// Roster in join order
    pub players: Vec<PlayerState>,
    pub obstacles: Vec<Obstacle>,
    pub power_ups: Vec<PowerUp>,
    pub projectiles: Vec<Projectile>,
    pub race_start_time: Option<u64>,
    pub players_finished: usize,
    /// Player ids, best first
    pub leaderboard: Vec<Uuid>,
    /// Set once the last player leaves; the lobby is unreachable afterwards
    pub closed: bool,
    spawner: WorldSpawner,
    #[cfg(test)]
    pub(crate) fail_next_tick: bool,
}

impl Lobby {
    /// Create a lobby with `host_name` as its first player
    pub fn new(code: String, host_id: Uuid, host_name: String, seed: u64, now: u64) -> Self {
        let mut lobby = Self {
            code,
            host_id,
            state: LobbyState::Lobby,
            race_distance: DEFAULT_RACE_DISTANCE,
            game_mode: GameMode::default(),
            players: Vec::new(),
            obstacles: Vec::new(),
            power_ups: Vec::new(),
            projectiles: Vec::new(),
            race_start_time: None,
            players_finished: 0,
            leaderboard: Vec::new(),
            closed: false,
            spawner: WorldSpawner::new(seed),
            #[cfg(test)]
            fail_next_tick: false,
        };
        lobby.add_player(host_id, host_name, true, now);
        lobby
    }

    pub fn player(&self, id: Uuid) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: Uuid) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Case-sensitive name check
    pub fn name_taken(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    /// Add a player; name uniqueness is checked by the caller
    pub fn add_player(&mut self, id: Uuid, name: String, is_host: bool, now: u64) -> &PlayerState {
        let color = PLAYER_COLORS[self.players.len() % PLAYER_COLORS.len()];
        self.players
            .push(PlayerState::new(id, name, is_host, color, now));
        if is_host {
            self.host_id = id;
        }
        &self.players[self.players.len() - 1]
    }

    /// Remove a player, handing host to the earliest remaining joiner
    pub fn remove_player(&mut self, id: Uuid) -> Option<PlayerState> {
        let idx = self.players.iter().position(|p| p.id == id)?;
        let removed = self.players.remove(idx);

        if self.host_id == id {
            if let Some(next) = self.players.first_mut() {
                next.is_host = true;
                self.host_id = next.id;
            }
        }

        self.projectiles.retain(|p| p.owner_id != id);
        self.refresh_standings();
        Some(removed)
    }

    /// Start or restart the race
    pub fn start_race(
        &mut self,
        requester: Uuid,
        race_distance: f32,
        game_mode: GameMode,
        now: u64,
    ) -> Result<(), LobbyError> {
        if requester != self.host_id {
            return Err(LobbyError::NotHost);
        }
        if !race_distance.is_finite() || race_distance <= 0.0 {
            return Err(LobbyError::InvalidRaceDistance(race_distance));
        }

        self.race_distance = race_distance;
        self.game_mode = game_mode;
        self.state = LobbyState::Racing;
        self.race_start_time = Some(now);
        self.players_finished = 0;
        self.leaderboard.clear();

        for player in &mut self.players {
            player.reset_for_race();
        }

        self.obstacles.clear();
        self.power_ups.clear();
        self.projectiles.clear();
        self.spawner.reset();
        Ok(())
    }

    /// Merge a client report and advance race standings.
    /// Returns false if the player is not in this lobby.
    pub fn update_player(&mut self, id: Uuid, update: &PlayerUpdate, now: u64) -> bool {
        let racing = self.state == LobbyState::Racing;
        let race_distance = self.race_distance;
        let Some(player) = self.player_mut(id) else {
            return false;
        };

        player.apply_update(update);
        player.last_update = now;
        player.progress = PhysicsSystem::progress(player.x, race_distance);
        player.current_segment = PhysicsSystem::segment(player.progress);
        player.score = PhysicsSystem::score(player.x);

        if racing && player.progress >= 1.0 && player.finish_time.is_none() {
            player.finish_time = Some(now);
            self.refresh_standings();
        }
        true
    }

    /// Fire a bullet for `owner`
    pub fn add_projectile(
        &mut self,
        owner: Uuid,
        shot: &ShootRequest,
        now: u64,
    ) -> Result<u64, LobbyError> {
        let player = self.player(owner).ok_or(LobbyError::UnknownConnection)?;
        let power_up = player.active_power_up;
        let armed = power_up.is_active() && power_up.kind.is_some_and(|k| k.is_offensive());
        if !armed {
            return Err(LobbyError::NoWeapon);
        }
        // a bullet that never moves right would never leave the track
        let speed_ok = shot.speed.map_or(true, |s| s.is_finite() && s > 0.0);
        if !shot.x.is_finite() || !shot.y.is_finite() || !speed_ok {
            return Err(LobbyError::InvalidShot);
        }

        let id = self.spawner.next_id();
        self.projectiles
            .push(Projectile::new(id, owner, shot.x, shot.y, shot.speed, now));
        Ok(id)
    }

    /// Recount finishers, rebuild the leaderboard and end the race when
    /// everyone still present has crossed the line.
    fn refresh_standings(&mut self) {
        self.players_finished = self
            .players
            .iter()
            .filter(|p| p.finish_time.is_some())
            .count();
        if self.state == LobbyState::Lobby {
            return;
        }

        self.leaderboard = rank_players(&self.players);

        if self.state == LobbyState::Racing
            && !self.players.is_empty()
            && self.players_finished == self.players.len()
        {
            self.state = LobbyState::Finished;
        }
    }

    /// Advance projectiles, resolve hits, spawn world objects
    pub fn tick(&mut self, now: u64) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.state != LobbyState::Racing {
            return outcome;
        }
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_tick) {
            panic!("injected tick failure in lobby {}", self.code);
        }

        for player in &mut self.players {
            if player.active_power_up.kind.is_some() {
                player.active_power_up.time_left -= 1.0;
                if player.active_power_up.time_left <= 0.0 {
                    player.active_power_up = ActivePowerUp::default();
                }
            }
        }

        self.update_projectiles(now, &mut outcome);

        if let Some(span) = RosterSpan::from_positions(self.players.iter().map(|p| p.x)) {
            self.spawner.update(
                now,
                span,
                self.game_mode,
                &mut self.obstacles,
                &mut self.power_ups,
            );
        }

        outcome
    }

    fn update_projectiles(&mut self, now: u64, outcome: &mut TickOutcome) {
        let mut i = 0;
        while i < self.projectiles.len() {
            if !self.projectiles[i].update() || self.projectiles[i].expired(now) {
                self.projectiles.remove(i);
                continue;
            }

            let bullet = self.projectiles[i].hitbox();
            let owner = self.projectiles[i].owner_id;

            let target = self
                .players
                .iter_mut()
                .find(|p| p.id != owner && p.is_alive() && bullet.overlaps(&Aabb::player(p.x, p.y)));

            if let Some(target) = target {
                let (health, killed) = CombatSystem::apply_damage(target.health, PVP_DAMAGE);
                target.health = health;
                outcome.hits.push(HitResult {
                    projectile_id: self.projectiles[i].id,
                    shooter_id: owner,
                    target_id: target.id,
                    target_killed: killed,
                });
                if killed {
                    outcome.killed.push(target.id);
                }
                self.projectiles.remove(i);
                continue;
            }

            if let Some(hit) = self.obstacles.iter().position(|o| bullet.overlaps(&o.hitbox())) {
                self.obstacles.remove(hit);
                self.projectiles.remove(i);
                continue;
            }

            i += 1;
        }
    }

    /// Bring a killed player back at the spawn point.
    /// Returns false if the player is gone or already alive again.
    pub fn respawn_player(&mut self, id: Uuid) -> bool {
        match self.player_mut(id) {
            Some(player) if !player.is_alive() => {
                player.health = MAX_HEALTH;
                player.x = SPAWN_X;
                player.y = SPAWN_Y;
                true
            }
            _ => false,
        }
    }
}

/// Finished players first by finish time, then the rest by progress
pub fn rank_players(players: &[PlayerState]) -> Vec<Uuid> {
    let mut ranked: Vec<&PlayerState> = players.iter().collect();
    ranked.sort_by(|a, b| match (a.finish_time, b.finish_time) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.progress.total_cmp(&a.progress),
    });
    ranked.into_iter().map(|p| p.id).collect()
}
