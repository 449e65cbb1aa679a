//! Seekable virtual clock over a loaded match

use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::normalize::TimelineEvent;

/// Cursor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    /// No match loaded
    Stopped,
    Paused,
    Playing,
}

/// Result of moving the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub previous_ms: i64,
    pub time_ms: i64,
}

impl TickOutcome {
    /// Indices of events newly crossed by this update: `t` in `(previous, now]`
    ///
    /// Only forward movement crosses anything, so scrubbing back never
    /// re-triggers effects, while re-advancing over the same span does.
    pub fn crossed_range(&self, events: &[TimelineEvent]) -> Range<usize> {
        crossed_range(events, self.previous_ms, self.time_ms)
    }
}

/// Indices of events with `prev < t <= next` in a chronological sequence
pub fn crossed_range(events: &[TimelineEvent], prev: i64, next: i64) -> Range<usize> {
    if next <= prev {
        return 0..0;
    }
    let start = events.partition_point(|e| e.t() <= prev);
    let end = events.partition_point(|e| e.t() <= next);
    start..end.max(start)
}

#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    time_ms: i64,
    /// Sub-millisecond remainder so slow speeds don't stall
    carry_ms: f64,
    state: CursorState,
    speed: f64,
    duration_ms: i64,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self {
            time_ms: 0,
            carry_ms: 0.0,
            state: CursorState::Stopped,
            speed: 1.0,
            duration_ms: 0,
        }
    }

    /// Enter `Paused(0)` for a freshly loaded match
    pub fn load(&mut self, duration_ms: i64) {
        self.time_ms = 0;
        self.carry_ms = 0.0;
        self.duration_ms = duration_ms.max(0);
        self.state = CursorState::Paused;
    }

    /// Drop the current match
    pub fn unload(&mut self) {
        self.time_ms = 0;
        self.carry_ms = 0.0;
        self.duration_ms = 0;
        self.state = CursorState::Stopped;
    }

    pub fn time_ms(&self) -> i64 {
        self.time_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == CursorState::Playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Start playing; at the end of the timeline playback restarts from 0
    pub fn play(&mut self) -> TickOutcome {
        let previous_ms = self.time_ms;
        if self.state == CursorState::Paused && self.duration_ms > 0 {
            if self.time_ms >= self.duration_ms {
                self.time_ms = 0;
                self.carry_ms = 0.0;
            }
            self.state = CursorState::Playing;
        }
        self.outcome(previous_ms)
    }

    pub fn pause(&mut self) {
        if self.state == CursorState::Playing {
            self.state = CursorState::Paused;
        }
    }

    pub fn toggle(&mut self) -> TickOutcome {
        match self.state {
            CursorState::Playing => {
                self.pause();
                self.outcome(self.time_ms)
            }
            _ => self.play(),
        }
    }

    /// Ignores non-finite and non-positive multipliers
    pub fn set_speed(&mut self, multiplier: f64) -> bool {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.speed = multiplier;
            true
        } else {
            false
        }
    }

    /// Advance by a wall-clock delta while playing
    pub fn tick(&mut self, delta_ms: f64) -> TickOutcome {
        let previous_ms = self.time_ms;
        if self.state != CursorState::Playing || !delta_ms.is_finite() || delta_ms <= 0.0 {
            return self.outcome(previous_ms);
        }

        let advance = delta_ms * self.speed + self.carry_ms;
        let whole = advance.floor();
        self.carry_ms = advance - whole;

        let target = (self.time_ms as f64 + whole).min(self.duration_ms as f64) as i64;
        self.time_ms = target.clamp(0, self.duration_ms);

        if self.time_ms >= self.duration_ms {
            self.carry_ms = 0.0;
            self.state = CursorState::Paused;
        }

        self.outcome(previous_ms)
    }

    /// Jump to an absolute time; always pauses
    pub fn seek(&mut self, time_ms: i64) -> TickOutcome {
        let previous_ms = self.time_ms;
        if self.state == CursorState::Stopped {
            return self.outcome(previous_ms);
        }
        self.time_ms = time_ms.clamp(0, self.duration_ms);
        self.carry_ms = 0.0;
        self.state = CursorState::Paused;
        self.outcome(previous_ms)
    }

    /// Relative seek
    pub fn step(&mut self, delta_ms: i64) -> TickOutcome {
        self.seek(self.time_ms.saturating_add(delta_ms))
    }

    fn outcome(&self, previous_ms: i64) -> TickOutcome {
        TickOutcome {
            previous_ms,
            time_ms: self.time_ms,
        }
    }
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self::new()
    }
}
