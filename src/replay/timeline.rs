//! A normalized match ready for playback queries

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::interpolate::positions_at;
use super::live_state::{compute_live_state, LiveState};
use super::normalize::{
    extract_events, extract_frames, parse_participants, team_lookup, Frame, ParticipantRecord,
    TimelineEvent,
};
use super::{Position, TeamId};

/// Immutable derived data for one match
#[derive(Debug, Clone, Serialize)]
pub struct MatchTimeline {
    pub match_id: String,
    pub participants: Vec<ParticipantRecord>,
    pub frames: Vec<Frame>,
    pub events: Vec<TimelineEvent>,
    pub duration_ms: i64,
    #[serde(skip)]
    teams: HashMap<i64, TeamId>,
}

impl MatchTimeline {
    /// Normalize a raw match and (optional) timeline
    pub fn derive(match_id: impl Into<String>, raw_match: &Value, raw_timeline: Option<&Value>) -> Self {
        let participants = parse_participants(raw_match);
        let (frames, events) = match raw_timeline {
            Some(timeline) => (extract_frames(timeline), extract_events(timeline)),
            None => (Vec::new(), Vec::new()),
        };
        Self::from_parts(match_id, participants, frames, events)
    }

    pub fn from_parts(
        match_id: impl Into<String>,
        participants: Vec<ParticipantRecord>,
        frames: Vec<Frame>,
        events: Vec<TimelineEvent>,
    ) -> Self {
        let duration_ms = frames.last().map(|f| f.t.max(0)).unwrap_or(0);
        let teams = team_lookup(&participants);
        Self {
            match_id: match_id.into(),
            participants,
            frames,
            events,
            duration_ms,
            teams,
        }
    }

    pub fn teams(&self) -> &HashMap<i64, TeamId> {
        &self.teams
    }

    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn positions_at(&self, t: i64, speed_cap: f64) -> BTreeMap<i64, Position> {
        positions_at(&self.frames, &self.participants, t, speed_cap)
    }

    pub fn live_state_at(&self, t: i64, death_window_ms: i64) -> LiveState {
        compute_live_state(&self.events, t, death_window_ms)
    }
}
