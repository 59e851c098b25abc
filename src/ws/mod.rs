//! WebSocket transport: upgrade handler, outbound routing, wire protocol

pub mod handler;
pub mod hub;
pub mod protocol;

pub use hub::Hub;
