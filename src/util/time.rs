//! Time utilities for playback

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Playback scheduler rate
pub const PLAYBACK_TPS: u32 = 30;
/// Snapshot rate while playing
pub const SNAPSHOT_TPS: u32 = 15;
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / PLAYBACK_TPS as u64;

/// Format match time as `m:ss`
pub fn format_clock(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Measures wall-clock time between scheduler wake-ups
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed ms since the last lap, restarting the timer
    pub fn lap_ms(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start).as_secs_f64() * 1000.0;
        self.start = now;
        elapsed
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
