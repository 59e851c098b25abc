//! Combat system - bullets, damage, hit detection

use std::collections::VecDeque;

use uuid::Uuid;

use crate::ws::protocol::{ProjectileSnapshot, TrailPoint};

use super::physics::{Aabb, MAX_SCREEN_WIDTH};

/// Damage dealt by one bullet
pub const PVP_DAMAGE: f32 = 50.0;
/// Health a player spawns and respawns with
pub const MAX_HEALTH: f32 = 100.0;
/// Delay before a killed player comes back
pub const RESPAWN_DELAY_MS: u64 = 2000;
/// Bullet speed when the client does not send one
pub const DEFAULT_BULLET_SPEED: f32 = 10.0;
pub const BULLET_WIDTH: f32 = 8.0;
pub const BULLET_HEIGHT: f32 = 4.0;
/// Trail positions kept for display
pub const TRAIL_LENGTH: usize = 3;
/// Bullets older than this are dropped even if still on screen
pub const MAX_PROJECTILE_AGE_MS: u64 = 5000;

/// Active projectile in the game
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub trail: VecDeque<TrailPoint>,
    pub created_at: u64,
}

impl Projectile {
    pub fn new(id: u64, owner_id: Uuid, x: f32, y: f32, speed: Option<f32>, now: u64) -> Self {
        Self {
            id,
            owner_id,
            x,
            y,
            speed: speed.unwrap_or(DEFAULT_BULLET_SPEED),
            trail: VecDeque::with_capacity(TRAIL_LENGTH + 1),
            created_at: now,
        }
    }

    /// Move one tick forward, returns false once past the playable area
    pub fn update(&mut self) -> bool {
        self.trail.push_back(TrailPoint {
            x: self.x,
            y: self.y,
        });
        while self.trail.len() > TRAIL_LENGTH {
            self.trail.pop_front();
        }
        self.x += self.speed;
        self.x <= MAX_SCREEN_WIDTH
    }

    /// True once the bullet has outlived `MAX_PROJECTILE_AGE_MS`
    pub fn expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > MAX_PROJECTILE_AGE_MS
    }

    pub fn hitbox(&self) -> Aabb {
        Aabb::new(self.x, self.y, BULLET_WIDTH, BULLET_HEIGHT)
    }

    pub fn to_snapshot(&self) -> ProjectileSnapshot {
        ProjectileSnapshot {
            id: self.id,
            player_id: self.owner_id,
            x: self.x,
            y: self.y,
            speed: self.speed,
            width: BULLET_WIDTH,
            height: BULLET_HEIGHT,
            trail: self.trail.iter().copied().collect(),
        }
    }
}

/// Combat system for managing damage
pub struct CombatSystem;

impl CombatSystem {
    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}

/// Hit result from combat resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: u64,
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub target_killed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trail_keeps_last_three_positions() {
        let mut p = Projectile::new(1, Uuid::new_v4(), 0.0, 10.0, Some(10.0), 0);
        for _ in 0..5 {
            assert!(p.update());
        }
        assert_eq!(p.x, 50.0);
        let xs: Vec<f32> = p.trail.iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn projectile_expires_past_screen_width() {
        let mut p = Projectile::new(1, Uuid::new_v4(), 0.0, 0.0, None, 0);
        let mut ticks = 0;
        while p.update() {
            ticks += 1;
        }
        assert_eq!(ticks, 200);
        assert!(p.x > MAX_SCREEN_WIDTH);
    }

    #[test]
    fn projectile_ages_out() {
        let p = Projectile::new(1, Uuid::new_v4(), 0.0, 0.0, None, 1_000);
        assert!(!p.expired(1_000 + MAX_PROJECTILE_AGE_MS));
        assert!(p.expired(1_001 + MAX_PROJECTILE_AGE_MS));
        // clock going backwards never expires a bullet
        assert!(!p.expired(0));
    }

    #[test]
    fn damage_floors_at_zero() {
        assert_eq!(CombatSystem::apply_damage(100.0, PVP_DAMAGE), (50.0, false));
        assert_eq!(CombatSystem::apply_damage(50.0, PVP_DAMAGE), (0.0, true));
        assert_eq!(CombatSystem::apply_damage(20.0, PVP_DAMAGE), (0.0, true));
    }
}
