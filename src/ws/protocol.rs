//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::error::LobbyError;
use crate::game::world::{Obstacle, PowerUp};

/// Race environment selected by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Land,
    Underwater,
}

impl GameMode {
    /// Power-ups that can appear on the track in this mode
    pub fn power_up_pool(self) -> &'static [PowerUpKind] {
        match self {
            GameMode::Land => &[PowerUpKind::Gun, PowerUpKind::Car, PowerUpKind::Jumper],
            GameMode::Underwater => &[PowerUpKind::Gun, PowerUpKind::Boat, PowerUpKind::Diver],
        }
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerUpKind {
    /// Fires bullets
    Gun,
    /// Speed boost on land, can also shoot
    Car,
    /// Super jump on land
    Jumper,
    /// Speed boost underwater
    Boat,
    /// Dives under obstacles
    Diver,
}

impl PowerUpKind {
    /// Whether holding this power-up allows the player to shoot
    pub fn is_offensive(self) -> bool {
        matches!(self, PowerUpKind::Gun | PowerUpKind::Car)
    }
}

/// Obstacle visual subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    Rock,
    Spike,
}

/// Power-up currently held by a player
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePowerUp {
    #[serde(rename = "type")]
    pub kind: Option<PowerUpKind>,
    /// Frames remaining (60 per second)
    #[serde(default)]
    pub time_left: f32,
}

impl ActivePowerUp {
    pub fn is_active(&self) -> bool {
        self.kind.is_some() && self.time_left > 0.0
    }
}

// ============================================================================
// Client -> server
// ============================================================================

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Create a new lobby and become its host
    CreateLobby(CreateLobbyRequest),
    /// Join an existing lobby by code
    JoinLobby(JoinLobbyRequest),
    /// Host starts (or restarts) the race
    StartRace(StartRaceRequest),
    /// Client-reported player state
    PlayerUpdate(PlayerUpdate),
    /// Fire a bullet
    Shoot(ShootRequest),
    /// Leave the current lobby without disconnecting
    LeaveLobby,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyRequest {
    pub player_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyRequest {
    pub code: String,
    pub player_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRaceRequest {
    /// Race length in meters
    pub race_distance: f32,
    #[serde(default)]
    pub game_mode: GameMode,
}

/// Fields a client may report about its own player.
///
/// Anything else in the payload (health, finishTime, isHost, ...) is
/// server-owned and dropped during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub vel_y: Option<f32>,
    pub jumping: Option<bool>,
    pub grounded: Option<bool>,
    pub active_power_up: Option<ActivePowerUp>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootRequest {
    pub x: f32,
    pub y: f32,
    /// Horizontal speed in pixels per tick
    pub speed: Option<f32>,
}

// ============================================================================
// Server -> client
// ============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once after the socket is upgraded
    Welcome(Welcome),
    /// Reply to createLobby
    LobbyCreated(LobbyReply),
    /// Reply to joinLobby
    LobbyJoined(LobbyReply),
    PlayerJoined(StateUpdate),
    PlayerLeft(StateUpdate),
    RaceStarted(StateUpdate),
    /// Per-tick world state while racing
    GameUpdate(StateUpdate),
    /// Failure of a request that has no dedicated reply
    Error(ErrorReply),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub id: Uuid,
    pub server_time: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_state: Option<GameStateSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LobbyReply {
    pub fn ok(game_state: GameStateSnapshot) -> Self {
        Self {
            success: true,
            code: Some(game_state.code.clone()),
            game_state: Some(game_state),
            error: None,
        }
    }

    pub fn failed(err: &LobbyError) -> Self {
        Self {
            success: false,
            code: None,
            game_state: None,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub game_state: GameStateSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReply {
    pub code: &'static str,
    pub message: String,
}

impl From<&LobbyError> for ErrorReply {
    fn from(err: &LobbyError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Lobby lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyState {
    /// Accepting joins
    Lobby,
    /// Race running, joins rejected
    Racing,
    /// Everyone crossed the line
    Finished,
}

/// Full lobby state sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub code: String,
    pub state: LobbyState,
    pub race_distance: f32,
    pub game_mode: GameMode,
    pub race_start_time: Option<u64>,
    /// Milliseconds since the race started, while racing
    pub elapsed_ms: Option<u64>,
    pub players: Vec<PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub obstacles: Vec<Obstacle>,
    pub power_ups: Vec<PowerUp>,
    pub players_finished_count: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub is_host: bool,
    /// Hex color assigned at join
    pub color: &'static str,
    pub x: f32,
    pub y: f32,
    pub vel_y: f32,
    pub jumping: bool,
    pub grounded: bool,
    /// Health (0-100)
    pub health: f32,
    pub max_health: f32,
    /// Fraction of the race completed (0.0-1.0)
    pub progress: f32,
    /// Track quarter the player is in (1-4)
    pub current_segment: u8,
    pub score: u32,
    pub finish_time: Option<u64>,
    pub active_power_up: ActivePowerUp,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub player_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub width: f32,
    pub height: f32,
    pub trail: Vec<TrailPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub id: Uuid,
    pub name: String,
    pub finish_time: Option<u64>,
    pub progress: f32,
}
