//! Lobby operation errors

/// Reasons a lobby request is refused.
///
/// The `Display` text is what the requesting client sees.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found")]
    LobbyNotFound,

    #[error("Game already in progress")]
    GameInProgress,

    #[error("Player name already taken")]
    NameTaken,

    #[error("Only the host can start the race")]
    NotHost,

    #[error("Connection is not in a lobby")]
    UnknownConnection,

    #[error("Already in a lobby")]
    AlreadyInLobby,

    #[error("Player name must not be empty")]
    InvalidName,

    #[error("Invalid race distance: {0}")]
    InvalidRaceDistance(f32),

    #[error("Race is not running")]
    NotRacing,

    #[error("No weapon power-up active")]
    NoWeapon,

    #[error("Invalid shot")]
    InvalidShot,

    #[error("Could not allocate a lobby code")]
    CodeSpaceExhausted,
}

impl LobbyError {
    /// Stable machine-readable code for error frames
    pub fn code(&self) -> &'static str {
        match self {
            LobbyError::LobbyNotFound => "lobby_not_found",
            LobbyError::GameInProgress => "game_in_progress",
            LobbyError::NameTaken => "name_taken",
            LobbyError::NotHost => "not_host",
            LobbyError::UnknownConnection => "unknown_connection",
            LobbyError::AlreadyInLobby => "already_in_lobby",
            LobbyError::InvalidName => "invalid_name",
            LobbyError::InvalidRaceDistance(_) => "invalid_race_distance",
            LobbyError::NotRacing => "not_racing",
            LobbyError::NoWeapon => "no_weapon",
            LobbyError::InvalidShot => "invalid_shot",
            LobbyError::CodeSpaceExhausted => "code_space_exhausted",
        }
    }

    /// Errors the client has nothing useful to do with; logged, never sent.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            LobbyError::UnknownConnection
                | LobbyError::NotRacing
                | LobbyError::NoWeapon
                | LobbyError::InvalidShot
        )
    }
}
