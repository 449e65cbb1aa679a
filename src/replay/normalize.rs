//! Raw provider payloads -> canonical participants, frames and events
//!
//! Every function here is total: the payload is walked as a loose
//! `serde_json::Value` and malformed fields degrade to defaults instead
//! of failing the whole match.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::{Position, TeamId};

const UNKNOWN_NAME: &str = "Unknown";

/// One player in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: i64,
    pub display_name: String,
    pub champion_name: String,
    pub team_id: TeamId,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

/// Snapshot of every tracked participant at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Milliseconds since match start
    pub t: i64,
    /// `None` means the participant is in the frame but untracked
    pub positions: BTreeMap<i64, Option<Position>>,
}

impl Frame {
    pub fn position_of(&self, participant_id: i64) -> Option<Position> {
        self.positions.get(&participant_id).copied().flatten()
    }
}

/// Discrete timeline events the engine understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEvent {
    ChampionKill {
        t: i64,
        x: Option<f64>,
        y: Option<f64>,
        killer_id: Option<i64>,
        victim_id: Option<i64>,
    },
    BuildingKill {
        t: i64,
        x: Option<f64>,
        y: Option<f64>,
        /// Team that owned the destroyed structure
        team_id: Option<i64>,
        lane: Option<String>,
        building_type: Option<String>,
        tower_type: Option<String>,
        killer_id: Option<i64>,
    },
    EliteMonsterKill {
        t: i64,
        x: Option<f64>,
        y: Option<f64>,
        monster_type: Option<String>,
        monster_sub_type: Option<String>,
        killer_id: Option<i64>,
        killer_team_id: Option<i64>,
    },
}

impl TimelineEvent {
    pub fn t(&self) -> i64 {
        match self {
            TimelineEvent::ChampionKill { t, .. }
            | TimelineEvent::BuildingKill { t, .. }
            | TimelineEvent::EliteMonsterKill { t, .. } => *t,
        }
    }

    /// Event location, only when both coordinates are present
    pub fn position(&self) -> Option<Position> {
        let (x, y) = match self {
            TimelineEvent::ChampionKill { x, y, .. }
            | TimelineEvent::BuildingKill { x, y, .. }
            | TimelineEvent::EliteMonsterKill { x, y, .. } => (x, y),
        };
        match (x, y) {
            (Some(x), Some(y)) => Some(Position::new(*x, *y)),
            _ => None,
        }
    }

    /// Short label used in logs and effect spawns
    pub fn kind_name(&self) -> &'static str {
        match self {
            TimelineEvent::ChampionKill { .. } => "champion_kill",
            TimelineEvent::BuildingKill { .. } => "building_kill",
            TimelineEvent::EliteMonsterKill { .. } => "elite_monster_kill",
        }
    }
}

/// Parse `info.participants` of a raw match, sorted by id
pub fn parse_participants(raw_match: &Value) -> Vec<ParticipantRecord> {
    let Some(list) = raw_match.pointer("/info/participants").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out: Vec<ParticipantRecord> = list
        .iter()
        .filter_map(|p| {
            let id = int_field(p, "participantId").filter(|id| *id != 0)?;
            let display_name = str_field(p, "summonerName")
                .filter(|name| !name.is_empty())
                .or_else(|| str_field(p, "riotIdGameName"))
                .unwrap_or(UNKNOWN_NAME)
                .to_string();

            Some(ParticipantRecord {
                id,
                display_name,
                champion_name: str_field(p, "championName")
                    .unwrap_or(UNKNOWN_NAME)
                    .to_string(),
                team_id: TeamId::from_raw_or_blue(int_field(p, "teamId")),
                kills: count_field(p, "kills"),
                deaths: count_field(p, "deaths"),
                assists: count_field(p, "assists"),
            })
        })
        .collect();

    out.sort_by_key(|p| p.id);
    out
}

/// Participant id -> team, used to attribute kills
pub fn team_lookup(participants: &[ParticipantRecord]) -> HashMap<i64, TeamId> {
    participants.iter().map(|p| (p.id, p.team_id)).collect()
}

/// Extract position frames from a raw timeline, sorted by time
pub fn extract_frames(raw_timeline: &Value) -> Vec<Frame> {
    let mut frames: Vec<Frame> = raw_frames(raw_timeline)
        .iter()
        .map(|f| {
            let t = int_field(f, "timestamp").unwrap_or(0);
            let positions = f
                .get("participantFrames")
                .and_then(Value::as_object)
                .map(|pf| {
                    pf.iter()
                        .filter_map(|(key, entry)| {
                            let pid = key.trim().parse::<i64>().ok()?;
                            Some((pid, entry.get("position").and_then(parse_position)))
                        })
                        .collect()
                })
                .unwrap_or_default();

            Frame { t, positions }
        })
        .collect();

    // Stable: equal timestamps keep provider order
    frames.sort_by_key(|f| f.t);
    frames
}

/// Flatten per-frame events into one chronological sequence
pub fn extract_events(raw_timeline: &Value) -> Vec<TimelineEvent> {
    let mut out = Vec::new();

    for frame in raw_frames(raw_timeline) {
        let frame_t = int_field(frame, "timestamp").unwrap_or(0);
        let Some(events) = frame.get("events").and_then(Value::as_array) else {
            continue;
        };

        for e in events {
            if let Some(event) = parse_event(e, frame_t) {
                out.push(event);
            }
        }
    }

    enforce_chronology(&mut out);
    out
}

/// Downstream scans break on the first event past the query time, so the
/// sequence must be non-decreasing. Well-formed payloads pass untouched.
fn enforce_chronology(events: &mut [TimelineEvent]) {
    let inversions = events.windows(2).filter(|w| w[1].t() < w[0].t()).count();
    if inversions > 0 {
        warn!(
            inversions,
            event_count = events.len(),
            "Timeline events out of order, re-sorting at ingestion"
        );
        events.sort_by_key(TimelineEvent::t);
    }
}

fn parse_event(e: &Value, frame_t: i64) -> Option<TimelineEvent> {
    let t = int_field(e, "timestamp").unwrap_or(frame_t);
    let (x, y) = coords(e);

    match str_field(e, "type")? {
        "CHAMPION_KILL" => Some(TimelineEvent::ChampionKill {
            t,
            x,
            y,
            killer_id: int_field(e, "killerId"),
            victim_id: int_field(e, "victimId"),
        }),
        "BUILDING_KILL" => Some(TimelineEvent::BuildingKill {
            t,
            x,
            y,
            team_id: int_field(e, "teamId"),
            lane: owned_str(e, "laneType"),
            building_type: owned_str(e, "buildingType"),
            tower_type: owned_str(e, "towerType"),
            killer_id: int_field(e, "killerId"),
        }),
        "ELITE_MONSTER_KILL" => Some(TimelineEvent::EliteMonsterKill {
            t,
            x,
            y,
            monster_type: owned_str(e, "monsterType"),
            monster_sub_type: owned_str(e, "monsterSubType"),
            killer_id: int_field(e, "killerId"),
            killer_team_id: int_field(e, "killerTeamId"),
        }),
        _ => None,
    }
}

fn raw_frames(raw_timeline: &Value) -> &[Value] {
    raw_timeline
        .pointer("/info/frames")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_position(v: &Value) -> Option<Position> {
    let x = v.get("x")?.as_f64()?;
    let y = v.get("y")?.as_f64()?;
    Some(Position::new(x, y))
}

fn coords(e: &Value) -> (Option<f64>, Option<f64>) {
    match e.get("position") {
        Some(p) => (
            p.get("x").and_then(Value::as_f64),
            p.get("y").and_then(Value::as_f64),
        ),
        None => (None, None),
    }
}

/// Integral JSON number; floats with no fractional part are accepted
fn int_field(v: &Value, key: &str) -> Option<i64> {
    let field = v.get(key)?;
    field.as_i64().or_else(|| {
        field
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn count_field(v: &Value, key: &str) -> u32 {
    int_field(v, key)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn owned_str(v: &Value, key: &str) -> Option<String> {
    str_field(v, key).map(str::to_string)
}
