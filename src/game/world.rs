//! Synchronized obstacle and power-up spawning
//!
//! Objects are placed relative to the furthest and slowest players in a
//! lobby so that every client races through the same track.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::ws::protocol::{GameMode, ObstacleKind, PowerUpKind};

use super::physics::{Aabb, GROUND_Y};

/// Milliseconds between obstacle spawns
pub const OBSTACLE_INTERVAL_MS: u64 = 2000;
/// Milliseconds between power-up spawns
pub const POWER_UP_INTERVAL_MS: u64 = 5000;
/// Objects further than this behind the last player are dropped
pub const PRUNE_MARGIN: f32 = 500.0;

pub const OBSTACLE_SIZE: f32 = 30.0;
pub const OBSTACLE_LEAD: f32 = 800.0;
pub const OBSTACLE_JITTER: f32 = 200.0;

pub const POWER_UP_SIZE: f32 = 25.0;
pub const POWER_UP_LEAD: f32 = 600.0;
pub const POWER_UP_JITTER: f32 = 300.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Obstacle {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
}

impl Obstacle {
    pub fn hitbox(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerUp {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(rename = "type")]
    pub kind: PowerUpKind,
}

/// Horizontal extent of the roster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RosterSpan {
    pub min_x: f32,
    pub max_x: f32,
}

impl RosterSpan {
    /// None for an empty roster
    pub fn from_positions(xs: impl IntoIterator<Item = f32>) -> Option<Self> {
        xs.into_iter().fold(None, |span, x| {
            Some(match span {
                None => RosterSpan { min_x: x, max_x: x },
                Some(s) => RosterSpan {
                    min_x: s.min_x.min(x),
                    max_x: s.max_x.max(x),
                },
            })
        })
    }
}

/// Per-lobby spawn timers and RNG
pub struct WorldSpawner {
    rng: ChaCha8Rng,
    next_id: u64,
    last_obstacle_at: Option<u64>,
    last_power_up_at: Option<u64>,
}

impl WorldSpawner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 1,
            last_obstacle_at: None,
            last_power_up_at: None,
        }
    }

    /// Restart the spawn clocks (race start)
    pub fn reset(&mut self) {
        self.last_obstacle_at = None;
        self.last_power_up_at = None;
    }

    /// Next id for any lobby-scoped object
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Spawn and prune world objects if their interval has elapsed
    pub fn update(
        &mut self,
        now: u64,
        span: RosterSpan,
        mode: GameMode,
        obstacles: &mut Vec<Obstacle>,
        power_ups: &mut Vec<PowerUp>,
    ) {
        if Self::interval_elapsed(&mut self.last_obstacle_at, now, OBSTACLE_INTERVAL_MS) {
            let obstacle = self.spawn_obstacle(span.max_x);
            obstacles.push(obstacle);
            obstacles.retain(|o| o.x > span.min_x - PRUNE_MARGIN);
        }

        if Self::interval_elapsed(&mut self.last_power_up_at, now, POWER_UP_INTERVAL_MS) {
            if let Some(power_up) = self.spawn_power_up(span.max_x, mode) {
                power_ups.push(power_up);
            }
            power_ups.retain(|p| p.x > span.min_x - PRUNE_MARGIN);
        }
    }

    /// First call only arms the clock
    fn interval_elapsed(last: &mut Option<u64>, now: u64, interval: u64) -> bool {
        match *last {
            None => {
                *last = Some(now);
                false
            }
            Some(at) if now.saturating_sub(at) > interval => {
                *last = Some(now);
                true
            }
            Some(_) => false,
        }
    }

    fn spawn_obstacle(&mut self, lead_x: f32) -> Obstacle {
        let offset = self.rng.gen_range(0.0..OBSTACLE_JITTER);
        let kind = if self.rng.gen_bool(0.5) {
            ObstacleKind::Rock
        } else {
            ObstacleKind::Spike
        };
        Obstacle {
            id: self.next_id(),
            x: lead_x.max(0.0) + OBSTACLE_LEAD + offset,
            y: GROUND_Y - OBSTACLE_SIZE,
            width: OBSTACLE_SIZE,
            height: OBSTACLE_SIZE,
            kind,
        }
    }

    fn spawn_power_up(&mut self, lead_x: f32, mode: GameMode) -> Option<PowerUp> {
        let offset = self.rng.gen_range(0.0..POWER_UP_JITTER);
        let kind = *mode.power_up_pool().choose(&mut self.rng)?;
        Some(PowerUp {
            id: self.next_id(),
            x: lead_x.max(0.0) + POWER_UP_LEAD + offset,
            y: GROUND_Y - POWER_UP_SIZE,
            width: POWER_UP_SIZE,
            height: POWER_UP_SIZE,
            kind,
        })
    }
}
