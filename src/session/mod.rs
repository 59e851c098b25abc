//! Per-connection sessions and event dispatch

pub mod directory;
pub mod service;

pub use service::SessionService;
