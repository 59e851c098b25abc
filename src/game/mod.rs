//! Race simulation modules

pub mod combat;
pub mod error;
pub mod lobby;
pub mod physics;
pub mod registry;
pub mod respawn;
pub mod snapshot;
pub mod tick;
pub mod world;

pub use registry::LobbyRegistry;
pub use respawn::RespawnQueue;
pub use tick::TickDriver;
