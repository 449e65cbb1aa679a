//! Playback snapshot building

use serde::{Deserialize, Serialize};

use super::cursor::{CursorState, PlaybackCursor};
use super::landmarks::LandmarkSite;
use super::live_state::ObjectivesUp;
use super::notify::Notification;
use super::timeline::MatchTimeline;
use super::Position;

/// Interpolated location of one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantPosition {
    pub participant_id: i64,
    pub x: f64,
    pub y: f64,
    pub dead: bool,
}

/// Everything a renderer needs for one playback instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub time_ms: i64,
    pub duration_ms: i64,
    pub state: CursorState,
    pub speed: f64,
    pub positions: Vec<ParticipantPosition>,
    pub dead: Vec<i64>,
    pub destroyed_towers: Vec<Position>,
    pub objectives: ObjectivesUp,
    pub standing_landmarks: Vec<LandmarkSite>,
    /// One-shot notifications crossed since the previous snapshot
    pub notifications: Vec<Notification>,
}

/// Decides when to send snapshots and assembles them
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Notifications waiting for the next snapshot
    pending: Vec<Notification>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            pending: Vec::new(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used after commands and notifications)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Queue notifications; they ride on the next snapshot
    pub fn push_notifications(&mut self, notifications: Vec<Notification>) {
        if !notifications.is_empty() {
            self.pending.extend(notifications);
            self.force_next();
        }
    }

    /// Drop anything queued for a match that is no longer current
    pub fn clear(&mut self) {
        self.pending.clear();
        self.ticks_since_snapshot = 0;
    }

    /// Build a snapshot at the cursor's current time
    pub fn build(
        &mut self,
        timeline: &MatchTimeline,
        cursor: &PlaybackCursor,
        standing_landmarks: Vec<LandmarkSite>,
        speed_cap: f64,
        death_window_ms: i64,
    ) -> PlaybackSnapshot {
        let t = cursor.time_ms();
        let live = timeline.live_state_at(t, death_window_ms);

        let positions = timeline
            .positions_at(t, speed_cap)
            .into_iter()
            .map(|(participant_id, pos)| ParticipantPosition {
                participant_id,
                x: pos.x,
                y: pos.y,
                dead: live.dead.contains(&participant_id),
            })
            .collect();

        PlaybackSnapshot {
            time_ms: t,
            duration_ms: cursor.duration_ms(),
            state: cursor.state(),
            speed: cursor.speed(),
            positions,
            dead: live.dead.into_iter().collect(),
            destroyed_towers: live.destroyed_towers,
            objectives: live.objectives_up,
            standing_landmarks,
            notifications: std::mem::take(&mut self.pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::normalize::{Frame, ParticipantRecord, TimelineEvent};
    use crate::replay::TeamId;
    use crate::replay::notify::{StructureClass, BANNER_LIFE_MS};
    use crate::replay::landmarks::Lane;
    use std::collections::BTreeMap;

    fn timeline() -> MatchTimeline {
        let frame = |t: i64, x: f64| Frame {
            t,
            positions: BTreeMap::from([(1, Some(Position::new(x, 0.0)))]),
        };
        let events = vec![TimelineEvent::ChampionKill {
            t: 1000,
            x: None,
            y: None,
            killer_id: Some(6),
            victim_id: Some(1),
        }];
        let participants = vec![ParticipantRecord {
            id: 1,
            display_name: "Top".to_string(),
            champion_name: "Garen".to_string(),
            team_id: TeamId::Blue,
            kills: 0,
            deaths: 1,
            assists: 0,
        }];
        MatchTimeline::from_parts("NA1_9", participants, vec![frame(0, 0.0), frame(10_000, 100.0)], events)
    }

    #[test]
    fn interval_and_force() {
        let mut builder = SnapshotBuilder::new(2);
        assert!(!builder.should_send());
        assert!(builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn notifications_drain_once() {
        let tl = timeline();
        let mut cursor = PlaybackCursor::new();
        cursor.load(tl.duration_ms);

        let mut builder = SnapshotBuilder::new(2);
        builder.push_notifications(vec![Notification::StructureDestroyed {
            owner: None,
            structure: StructureClass::Tower,
            lane: Lane::Unknown,
            at_ms: 5,
            life_ms: BANNER_LIFE_MS,
        }]);
        assert!(builder.should_send());

        let first = builder.build(&tl, &cursor, Vec::new(), 1800.0, 30_000);
        assert_eq!(first.notifications.len(), 1);
        let second = builder.build(&tl, &cursor, Vec::new(), 1800.0, 30_000);
        assert!(second.notifications.is_empty());
    }

    #[test]
    fn positions_flag_dead_participants() {
        let tl = timeline();
        let mut builder = SnapshotBuilder::new(1);

        let mut cursor = PlaybackCursor::new();
        cursor.load(tl.duration_ms);
        cursor.seek(2000);
        let snap = builder.build(&tl, &cursor, Vec::new(), f64::INFINITY, 30_000);
        assert_eq!(
            snap.positions,
            vec![ParticipantPosition { participant_id: 1, x: 20.0, y: 0.0, dead: true }]
        );
        assert_eq!(snap.dead, vec![1]);
        assert_eq!(snap.time_ms, 2000);
        assert_eq!(snap.state, CursorState::Paused);
    }
}
