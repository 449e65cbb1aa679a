//! WebSocket protocol message definitions
//! These are the wire types for viewer-server playback control

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::replay::normalize::ParticipantRecord;
use crate::replay::snapshot::PlaybackSnapshot;
use crate::upstream::FailureKind;

/// Messages sent from viewer to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Pick a match; supersedes any load still in flight
    Load {
        match_id: String,
    },

    Play,

    Pause,

    /// Play if paused, pause if playing
    Toggle,

    /// Jump to an absolute match time
    Seek {
        time_ms: i64,
    },

    /// Jump relative to the current time (keyboard scrubbing)
    Step {
        delta_ms: i64,
    },

    /// Playback speed multiplier (e.g. 0.5, 1, 2)
    SetSpeed {
        multiplier: f64,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        session_id: Uuid,
        server_time: u64,
    },

    /// A load has started for this match
    Loading {
        match_id: String,
    },

    /// Match normalized and cursor parked at 0
    MatchLoaded {
        match_id: String,
        participants: Vec<ParticipantRecord>,
        duration_ms: i64,
        duration_label: String,
        frame_count: usize,
        event_count: usize,
    },

    /// The current selection could not be loaded
    LoadFailed {
        match_id: String,
        kind: FailureKind,
        message: String,
    },

    /// Playback state (sent while playing and after every command)
    Snapshot(PlaybackSnapshot),

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}
