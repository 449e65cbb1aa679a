//! One-shot notifications for events crossed by the playback clock

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::landmarks::Lane;
use super::live_state::Objective;
use super::normalize::TimelineEvent;
use super::{Position, TeamId};

/// Display lifetimes, in ms
pub const MULTI_KILL_LIFE_MS: u32 = 2500;
pub const MAJOR_BANNER_LIFE_MS: u32 = 3000;
pub const BANNER_LIFE_MS: u32 = 2000;
pub const CHAMPION_KILL_EFFECT_LIFE_MS: u32 = 1100;
pub const ELITE_MONSTER_EFFECT_LIFE_MS: u32 = 1300;
pub const BUILDING_EFFECT_LIFE_MS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiKillTier {
    Double,
    Triple,
    Quadra,
    Penta,
}

impl MultiKillTier {
    /// Saturates at Penta; a single kill has no tier
    pub fn from_count(kills: usize) -> Option<Self> {
        match kills {
            0 | 1 => None,
            2 => Some(MultiKillTier::Double),
            3 => Some(MultiKillTier::Triple),
            4 => Some(MultiKillTier::Quadra),
            _ => Some(MultiKillTier::Penta),
        }
    }

    pub fn banner_text(self) -> &'static str {
        match self {
            MultiKillTier::Double => "DOUBLE KILL!",
            MultiKillTier::Triple => "TRIPLE KILL!",
            MultiKillTier::Quadra => "QUADRA KILL!",
            MultiKillTier::Penta => "PENTA KILL!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureClass {
    Tower,
    Inhibitor,
}

impl StructureClass {
    pub fn classify(building_type: Option<&str>) -> Self {
        match building_type {
            Some(b) if b.to_uppercase().contains("INHIBITOR") => StructureClass::Inhibitor,
            _ => StructureClass::Tower,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    MultiKill {
        team: TeamId,
        tier: MultiKillTier,
        kills: usize,
        at_ms: i64,
        text: String,
        life_ms: u32,
    },
    EpicSlain {
        team: Option<TeamId>,
        objective: Objective,
        at_ms: i64,
        life_ms: u32,
    },
    StructureDestroyed {
        /// Team that lost the structure
        owner: Option<TeamId>,
        structure: StructureClass,
        lane: Lane,
        at_ms: i64,
        life_ms: u32,
    },
    EffectSpawn {
        /// Index of the source event in the match timeline
        event_index: usize,
        effect: String,
        position: Position,
        at_ms: i64,
        life_ms: u32,
    },
}

/// Build notifications for one crossed window
///
/// Champion kills are grouped per killing team, so four kills by one team
/// produce a single Quadra rather than four separate banners. `first_index`
/// is the timeline index of `crossed[0]`.
pub fn notifications_for(
    crossed: &[TimelineEvent],
    first_index: usize,
    teams: &HashMap<i64, TeamId>,
) -> Vec<Notification> {
    let mut out = Vec::new();
    let mut kills_by_team: BTreeMap<TeamId, (usize, i64)> = BTreeMap::new();

    for (offset, event) in crossed.iter().enumerate() {
        match event {
            TimelineEvent::ChampionKill { t, killer_id, .. } => {
                if let Some(team) = killer_id.and_then(|id| teams.get(&id)) {
                    let entry = kills_by_team.entry(*team).or_insert((0, *t));
                    entry.0 += 1;
                    entry.1 = entry.1.max(*t);
                }
            }
            TimelineEvent::EliteMonsterKill {
                t,
                monster_type,
                killer_id,
                killer_team_id,
                ..
            } => {
                if let Some(objective) = Objective::classify(monster_type.as_deref()) {
                    let team = killer_team_id
                        .and_then(TeamId::from_raw)
                        .or_else(|| killer_id.and_then(|id| teams.get(&id).copied()));
                    let life_ms = if objective == Objective::Baron {
                        MAJOR_BANNER_LIFE_MS
                    } else {
                        BANNER_LIFE_MS
                    };
                    out.push(Notification::EpicSlain {
                        team,
                        objective,
                        at_ms: *t,
                        life_ms,
                    });
                }
            }
            TimelineEvent::BuildingKill {
                t,
                team_id,
                lane,
                building_type,
                ..
            } => {
                out.push(Notification::StructureDestroyed {
                    owner: team_id.and_then(TeamId::from_raw),
                    structure: StructureClass::classify(building_type.as_deref()),
                    lane: Lane::classify(lane.as_deref()),
                    at_ms: *t,
                    life_ms: BANNER_LIFE_MS,
                });
            }
        }

        if let Some(position) = event.position() {
            out.push(Notification::EffectSpawn {
                event_index: first_index + offset,
                effect: event.kind_name().to_string(),
                position,
                at_ms: event.t(),
                life_ms: effect_life_ms(event),
            });
        }
    }

    for (team, (kills, at_ms)) in kills_by_team {
        if let Some(tier) = MultiKillTier::from_count(kills) {
            out.push(Notification::MultiKill {
                team,
                tier,
                kills,
                at_ms,
                text: tier.banner_text().to_string(),
                life_ms: MULTI_KILL_LIFE_MS,
            });
        }
    }

    out
}

fn effect_life_ms(event: &TimelineEvent) -> u32 {
    match event {
        TimelineEvent::ChampionKill { .. } => CHAMPION_KILL_EFFECT_LIFE_MS,
        TimelineEvent::EliteMonsterKill { .. } => ELITE_MONSTER_EFFECT_LIFE_MS,
        TimelineEvent::BuildingKill { .. } => BUILDING_EFFECT_LIFE_MS,
    }
}
