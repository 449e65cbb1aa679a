//! WebSocket playback surface

pub mod handler;
pub mod protocol;
