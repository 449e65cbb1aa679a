//! Provider routing regions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Americas,
    Europe,
    Asia,
    Sea,
}

/// Regions serving account lookups
pub const ACCOUNT_REGIONS: [Region; 3] = [Region::Americas, Region::Europe, Region::Asia];

/// Regions serving match data
pub const MATCH_REGIONS: [Region; 4] = [Region::Americas, Region::Europe, Region::Asia, Region::Sea];

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Americas => "americas",
            Region::Europe => "europe",
            Region::Asia => "asia",
            Region::Sea => "sea",
        }
    }

    pub fn host(self) -> String {
        format!("{}.api.riotgames.com", self.as_str())
    }

    /// Guess the region from a match id platform prefix like `NA1_`
    pub fn from_match_id(match_id: &str) -> Option<Self> {
        let (platform, rest) = match_id.split_once('_')?;
        if rest.is_empty() {
            return None;
        }
        match platform.to_uppercase().as_str() {
            "NA1" | "BR1" | "LA1" | "LA2" | "LAN" | "LAS" => Some(Region::Americas),
            "EUW1" | "EUN1" | "TR1" | "RU1" => Some(Region::Europe),
            "KR" | "JP1" => Some(Region::Asia),
            "OC1" => Some(Region::Sea),
            _ => None,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
