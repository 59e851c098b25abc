//! Race geometry: finish line, progress and box collisions

/// Ground line of the track
pub const GROUND_Y: f32 = 240.0;
/// Nominal player box (pixels)
pub const PLAYER_WIDTH: f32 = 40.0;
pub const PLAYER_HEIGHT: f32 = 40.0;
/// Pixels per meter of race distance
pub const FINISH_LINE_MULTIPLIER: f32 = 10.0;
/// Where players appear at race start and after a respawn
pub const SPAWN_X: f32 = 100.0;
pub const SPAWN_Y: f32 = GROUND_Y - PLAYER_HEIGHT;
/// Projectiles past this x are discarded
pub const MAX_SCREEN_WIDTH: f32 = 2000.0;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Nominal hitbox of a player standing at (x, y)
    pub fn player(x: f32, y: f32) -> Self {
        Self::new(x, y, PLAYER_WIDTH, PLAYER_HEIGHT)
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// Physics helpers for the race track
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// X coordinate of the finish line for a race of `race_distance` meters
    pub fn finish_line_x(race_distance: f32) -> f32 {
        race_distance * FINISH_LINE_MULTIPLIER
    }

    /// Fraction of the race covered at position `x`, clamped to [0, 1]
    pub fn progress(x: f32, race_distance: f32) -> f32 {
        let finish = Self::finish_line_x(race_distance);
        if finish <= 0.0 {
            return 0.0;
        }
        (x / finish).clamp(0.0, 1.0)
    }

    /// Track quarter (1-4) for a progress value
    pub fn segment(progress: f32) -> u8 {
        if progress < 0.25 {
            1
        } else if progress < 0.5 {
            2
        } else if progress < 0.75 {
            3
        } else {
            4
        }
    }

    /// Display score for distance travelled
    pub fn score(x: f32) -> u32 {
        (x.max(0.0) / 4.0).round() as u32
    }
}
