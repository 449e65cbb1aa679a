//! Timeline derivation and playback engine

pub mod cursor;
pub mod interpolate;
pub mod landmarks;
pub mod live_state;
pub mod normalize;
pub mod notify;
pub mod session;
pub mod snapshot;
pub mod timeline;

pub use landmarks::LandmarkStore;
pub use session::{PlaybackSettings, SessionRegistry};
pub use timeline::MatchTimeline;

use serde::{Deserialize, Serialize};

/// A point on the map in provider units (roughly 0..14820 on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// The two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum TeamId {
    /// Blue side
    Blue,
    /// Red side
    Red,
}

impl TeamId {
    pub fn as_u16(self) -> u16 {
        match self {
            TeamId::Blue => 100,
            TeamId::Red => 200,
        }
    }

    /// Strict parse: only 100 and 200 are teams
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            100 => Some(TeamId::Blue),
            200 => Some(TeamId::Red),
            _ => None,
        }
    }

    /// Lenient parse used for participants: anything that isn't 200 is blue
    pub fn from_raw_or_blue(raw: Option<i64>) -> Self {
        match raw {
            Some(200) => TeamId::Red,
            _ => TeamId::Blue,
        }
    }
}

impl Default for TeamId {
    fn default() -> Self {
        Self::Blue
    }
}

impl From<TeamId> for u16 {
    fn from(team: TeamId) -> u16 {
        team.as_u16()
    }
}

impl TryFrom<u16> for TeamId {
    type Error = String;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        TeamId::from_raw(raw as i64).ok_or_else(|| format!("invalid team id {}", raw))
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
