//! Transient match state at a query time, derived from events
//!
//! Respawns and objective timers are fixed heuristics, not server state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::normalize::TimelineEvent;
use super::Position;

/// How long a champion stays dead after a kill
pub const DEFAULT_DEATH_WINDOW_MS: i64 = 30_000;

const MINUTE_MS: i64 = 60 * 1000;

pub const DRAGON_SPAWN_MS: i64 = 5 * MINUTE_MS;
pub const DRAGON_RESPAWN_MS: i64 = 5 * MINUTE_MS;
pub const HERALD_SPAWN_MS: i64 = 8 * MINUTE_MS;
pub const HERALD_DESPAWN_MS: i64 = 20 * MINUTE_MS;
pub const HERALD_RESPAWN_MS: i64 = 6 * MINUTE_MS;
pub const BARON_SPAWN_MS: i64 = 20 * MINUTE_MS;
pub const BARON_RESPAWN_MS: i64 = 6 * MINUTE_MS;

/// Epic monsters with a spawn schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Dragon,
    Baron,
    Herald,
}

impl Objective {
    /// Classify a provider monster type by case-insensitive substring
    pub fn classify(monster_type: Option<&str>) -> Option<Self> {
        let up = monster_type?.to_uppercase();
        if up.contains("DRAGON") {
            Some(Objective::Dragon)
        } else if up.contains("BARON") {
            Some(Objective::Baron)
        } else if up.contains("HERALD") {
            Some(Objective::Herald)
        } else {
            None
        }
    }
}

/// Which objectives are currently up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectivesUp {
    pub dragon: bool,
    pub baron: bool,
    pub herald: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    /// Participants dead at the query time
    pub dead: BTreeSet<i64>,
    /// Raw positions of structures destroyed so far
    pub destroyed_towers: Vec<Position>,
    pub objectives_up: ObjectivesUp,
}

/// Scan events up to `t_query` and derive the live state
pub fn compute_live_state(events: &[TimelineEvent], t_query: i64, death_window_ms: i64) -> LiveState {
    let mut last_death: HashMap<i64, i64> = HashMap::new();
    let mut destroyed_towers = Vec::new();
    let mut last_dragon: Option<i64> = None;
    let mut last_baron: Option<i64> = None;
    let mut last_herald: Option<i64> = None;

    for event in events {
        if event.t() > t_query {
            break;
        }

        match event {
            TimelineEvent::ChampionKill {
                t,
                victim_id: Some(victim),
                ..
            } => {
                last_death.insert(*victim, *t);
            }
            TimelineEvent::BuildingKill {
                x: Some(x),
                y: Some(y),
                ..
            } => {
                destroyed_towers.push(Position::new(*x, *y));
            }
            TimelineEvent::EliteMonsterKill { t, monster_type, .. } => {
                match Objective::classify(monster_type.as_deref()) {
                    Some(Objective::Dragon) => last_dragon = Some(*t),
                    Some(Objective::Baron) => last_baron = Some(*t),
                    Some(Objective::Herald) => last_herald = Some(*t),
                    None => {}
                }
            }
            _ => {}
        }
    }

    let dead = last_death
        .into_iter()
        .filter(|(_, died_at)| t_query.saturating_sub(*died_at) < death_window_ms)
        .map(|(pid, _)| pid)
        .collect();

    let objectives_up = ObjectivesUp {
        dragon: t_query >= DRAGON_SPAWN_MS && respawned(t_query, last_dragon, DRAGON_RESPAWN_MS),
        baron: t_query >= BARON_SPAWN_MS && respawned(t_query, last_baron, BARON_RESPAWN_MS),
        herald: t_query >= HERALD_SPAWN_MS
            && t_query < HERALD_DESPAWN_MS
            && respawned(t_query, last_herald, HERALD_RESPAWN_MS),
    };

    LiveState {
        dead,
        destroyed_towers,
        objectives_up,
    }
}

/// Never killed counts as respawned
fn respawned(t_query: i64, last_kill: Option<i64>, respawn_ms: i64) -> bool {
    match last_kill {
        Some(killed_at) => t_query > killed_at.saturating_add(respawn_ms),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kill(t: i64, victim: i64) -> TimelineEvent {
        TimelineEvent::ChampionKill {
            t,
            x: None,
            y: None,
            killer_id: Some(1),
            victim_id: Some(victim),
        }
    }

    fn epic(t: i64, monster: &str) -> TimelineEvent {
        TimelineEvent::EliteMonsterKill {
            t,
            x: None,
            y: None,
            monster_type: Some(monster.to_string()),
            monster_sub_type: None,
            killer_id: None,
            killer_team_id: Some(100),
        }
    }

    fn building(t: i64, pos: Option<(f64, f64)>) -> TimelineEvent {
        TimelineEvent::BuildingKill {
            t,
            x: pos.map(|p| p.0),
            y: pos.map(|p| p.1),
            team_id: Some(200),
            lane: Some("TOP_LANE".to_string()),
            building_type: Some("TOWER_BUILDING".to_string()),
            tower_type: Some("OUTER_TURRET".to_string()),
            killer_id: None,
        }
    }

    #[test]
    fn death_window() {
        let events = vec![kill(10_000, 6), kill(20_000, 7), kill(50_000, 6)];

        let at_25s = compute_live_state(&events, 25_000, DEFAULT_DEATH_WINDOW_MS);
        assert_eq!(at_25s.dead, BTreeSet::from([6, 7]));

        // 6 respawned at 40s; 7 still dead until 50s exclusive
        let at_45s = compute_live_state(&events, 45_000, DEFAULT_DEATH_WINDOW_MS);
        assert_eq!(at_45s.dead, BTreeSet::from([7]));

        // Kill at 50s is included at exactly 50s, and 7's window has closed
        let at_50s = compute_live_state(&events, 50_000, DEFAULT_DEATH_WINDOW_MS);
        assert_eq!(at_50s.dead, BTreeSet::from([6]));
    }

    #[test]
    fn objective_schedule() {
        let nothing: Vec<TimelineEvent> = Vec::new();

        let early = compute_live_state(&nothing, 4 * MINUTE_MS, DEFAULT_DEATH_WINDOW_MS);
        assert_eq!(early.objectives_up, ObjectivesUp::default());

        let mid = compute_live_state(&nothing, 10 * MINUTE_MS, DEFAULT_DEATH_WINDOW_MS);
        assert!(mid.objectives_up.dragon && mid.objectives_up.herald && !mid.objectives_up.baron);

        let late = compute_live_state(&nothing, 25 * MINUTE_MS, DEFAULT_DEATH_WINDOW_MS);
        assert!(late.objectives_up.baron && !late.objectives_up.herald);
    }

    #[test]
    fn objective_respawn_after_kill() {
        let events = vec![epic(6 * MINUTE_MS, "DRAGON"), epic(21 * MINUTE_MS, "BARON_NASHOR")];

        let s = compute_live_state(&events, 8 * MINUTE_MS, DEFAULT_DEATH_WINDOW_MS);
        assert!(!s.objectives_up.dragon);

        // Exactly at the respawn boundary it is still down
        let s = compute_live_state(&events, 11 * MINUTE_MS, DEFAULT_DEATH_WINDOW_MS);
        assert!(!s.objectives_up.dragon);
        let s = compute_live_state(&events, 11 * MINUTE_MS + 1, DEFAULT_DEATH_WINDOW_MS);
        assert!(s.objectives_up.dragon);

        let s = compute_live_state(&events, 22 * MINUTE_MS, DEFAULT_DEATH_WINDOW_MS);
        assert!(!s.objectives_up.baron);
    }

    #[test]
    fn herald_classified_by_substring() {
        assert_eq!(Objective::classify(Some("riftherald")), Some(Objective::Herald));
        assert_eq!(Objective::classify(Some("HORDE")), None);
        assert_eq!(Objective::classify(None), None);
    }

    #[test]
    fn destroyed_towers_need_coordinates_and_time() {
        let events = vec![
            building(100_000, Some((10.0, 20.0))),
            building(200_000, None),
            building(300_000, Some((30.0, 40.0))),
        ];
        let s = compute_live_state(&events, 250_000, DEFAULT_DEATH_WINDOW_MS);
        assert_eq!(s.destroyed_towers, vec![Position::new(10.0, 20.0)]);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let ancient = vec![kill(i64::MIN, 6)];
        assert!(compute_live_state(&ancient, 30_000, DEFAULT_DEATH_WINDOW_MS).dead.is_empty());

        let events = vec![epic(i64::MAX, "DRAGON")];
        let s = compute_live_state(&events, i64::MAX, DEFAULT_DEATH_WINDOW_MS);
        assert!(!s.objectives_up.dragon);
    }
}
