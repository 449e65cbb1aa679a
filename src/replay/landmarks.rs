//! Structure positions learned from destruction events
//!
//! The provider only reports where a structure was at the moment it died.
//! Averaging those observations across matches gives positions for
//! structures that are still standing.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::normalize::TimelineEvent;
use super::TeamId;

/// Lane a structure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lane {
    Top,
    Mid,
    Bot,
    Inhibitor,
    Nexus,
    Unknown,
}

impl Lane {
    /// Case-insensitive substring classification of a provider lane string
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Lane::Unknown;
        };
        let up = raw.to_uppercase();
        if up.contains("TOP") {
            Lane::Top
        } else if up.contains("MID") {
            Lane::Mid
        } else if up.contains("BOT") {
            Lane::Bot
        } else if up.contains("INHIB") {
            Lane::Inhibitor
        } else if up.contains("NEXUS") {
            Lane::Nexus
        } else {
            Lane::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Top => "TOP",
            Lane::Mid => "MID",
            Lane::Bot => "BOT",
            Lane::Inhibitor => "INHIBITOR",
            Lane::Nexus => "NEXUS",
            Lane::Unknown => "UNKNOWN",
        }
    }
}

/// Structure tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureKind {
    Outer,
    Inner,
    Base,
    Inhib,
    Nexus,
    Unknown,
}

impl StructureKind {
    /// Classify from the tower type, falling back to the building type
    pub fn classify(tower_type: Option<&str>, building_type: Option<&str>) -> Self {
        let source = tower_type
            .filter(|s| !s.is_empty())
            .or(building_type)
            .unwrap_or_default()
            .to_uppercase();

        if source.contains("OUTER") {
            StructureKind::Outer
        } else if source.contains("INNER") {
            StructureKind::Inner
        } else if source.contains("BASE") {
            StructureKind::Base
        } else if source.contains("INHIB") {
            StructureKind::Inhib
        } else if source.contains("NEXUS") {
            StructureKind::Nexus
        } else {
            StructureKind::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StructureKind::Outer => "OUTER",
            StructureKind::Inner => "INNER",
            StructureKind::Base => "BASE",
            StructureKind::Inhib => "INHIB",
            StructureKind::Nexus => "NEXUS",
            StructureKind::Unknown => "UNKNOWN",
        }
    }
}

/// Identity of a structure across matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LandmarkKey {
    pub team_id: TeamId,
    pub lane: Lane,
    pub kind: StructureKind,
}

impl LandmarkKey {
    /// Key of a building kill; `None` for other events or unusable teams
    pub fn of_event(event: &TimelineEvent) -> Option<Self> {
        let TimelineEvent::BuildingKill {
            team_id,
            lane,
            building_type,
            tower_type,
            ..
        } = event
        else {
            return None;
        };

        Some(Self {
            team_id: TeamId::from_raw((*team_id)?)?,
            lane: Lane::classify(lane.as_deref()),
            kind: StructureKind::classify(tower_type.as_deref(), building_type.as_deref()),
        })
    }

    /// Persisted key shape `teamId|lane|kind`; must stay stable across releases
    pub fn storage_key(&self) -> String {
        format!("{}|{}|{}", self.team_id, self.lane.as_str(), self.kind.as_str())
    }
}

/// Learned location of one structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkSite {
    pub team_id: TeamId,
    pub lane: Lane,
    pub structure_kind: StructureKind,
    pub x: f64,
    pub y: f64,
    pub observation_count: u64,
}

impl LandmarkSite {
    pub fn key(&self) -> LandmarkKey {
        LandmarkKey {
            team_id: self.team_id,
            lane: self.lane,
            kind: self.structure_kind,
        }
    }
}

/// Storage key -> site
pub type LandmarkModel = BTreeMap<String, LandmarkSite>;

/// Fold building kills into the model with an incremental mean
pub fn learn_from_events(model: &LandmarkModel, events: &[TimelineEvent]) -> LandmarkModel {
    let mut model = model.clone();

    for event in events {
        let Some(pos) = event.position() else {
            continue;
        };
        let Some(key) = LandmarkKey::of_event(event) else {
            continue;
        };

        model
            .entry(key.storage_key())
            .and_modify(|site| {
                let n = site.observation_count + 1;
                site.x += (pos.x - site.x) / n as f64;
                site.y += (pos.y - site.y) / n as f64;
                site.observation_count = n;
            })
            .or_insert_with(|| LandmarkSite {
                team_id: key.team_id,
                lane: key.lane,
                structure_kind: key.kind,
                x: pos.x,
                y: pos.y,
                observation_count: 1,
            });
    }

    model
}

/// Learned sites not yet destroyed at `t_query`
pub fn alive_sites_at(model: &LandmarkModel, events: &[TimelineEvent], t_query: i64) -> Vec<LandmarkSite> {
    let killed: HashSet<LandmarkKey> = events
        .iter()
        .filter(|e| e.t() <= t_query)
        .filter_map(LandmarkKey::of_event)
        .collect();

    model
        .values()
        .filter(|site| !killed.contains(&site.key()))
        .cloned()
        .collect()
}

/// Persistence errors; never surfaced past the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid landmark data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read a persisted model from disk
pub fn load_model(path: &Path) -> Result<LandmarkModel, StoreError> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Write a model atomically: temp file then rename
pub fn save_model(path: &Path, model: &LandmarkModel) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(model)?;
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Process-wide landmark model with best-effort durable storage
pub struct LandmarkStore {
    path: PathBuf,
    model: RwLock<LandmarkModel>,
    /// Serializes writers so the temp file is never shared
    save_lock: Mutex<()>,
}

impl LandmarkStore {
    /// Load the model once; missing or corrupt storage yields an empty model
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let model = match load_model(&path) {
            Ok(model) => {
                info!(path = %path.display(), sites = model.len(), "Loaded landmark model");
                model
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No landmark model yet, starting empty");
                LandmarkModel::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable landmark model");
                LandmarkModel::new()
            }
        };

        Self {
            path,
            model: RwLock::new(model),
            save_lock: Mutex::new(()),
        }
    }

    /// Copy of the current model
    pub fn snapshot(&self) -> LandmarkModel {
        self.model.read().clone()
    }

    pub fn site_count(&self) -> usize {
        self.model.read().len()
    }

    /// Standing structures at `t_query` for a match's events
    pub fn alive_sites_at(&self, events: &[TimelineEvent], t_query: i64) -> Vec<LandmarkSite> {
        alive_sites_at(&self.model.read(), events, t_query)
    }

    /// Learn from a match and persist in the background when anything changed
    pub fn learn(self: &Arc<Self>, events: &[TimelineEvent]) {
        {
            let mut model = self.model.write();
            let updated = learn_from_events(&model, events);
            if updated == *model {
                return;
            }
            debug!(sites = updated.len(), "Landmark model updated");
            *model = updated;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(self);
                handle.spawn_blocking(move || store.flush());
            }
            Err(_) => self.flush(),
        }
    }

    /// Write the latest model synchronously (also used at shutdown)
    pub fn flush(&self) {
        let _guard = self.save_lock.lock();
        let model = self.snapshot();
        if let Err(e) = save_model(&self.path, &model) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist landmark model");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tower(t: i64, team: i64, lane: &str, tower_type: &str, pos: Option<(f64, f64)>) -> TimelineEvent {
        TimelineEvent::BuildingKill {
            t,
            x: pos.map(|p| p.0),
            y: pos.map(|p| p.1),
            team_id: Some(team),
            lane: Some(lane.to_string()),
            building_type: Some("TOWER_BUILDING".to_string()),
            tower_type: Some(tower_type.to_string()),
            killer_id: None,
        }
    }

    #[test]
    fn classification() {
        assert_eq!(Lane::classify(Some("top_lane")), Lane::Top);
        assert_eq!(Lane::classify(Some("MID_LANE")), Lane::Mid);
        assert_eq!(Lane::classify(Some("BOT_LANE")), Lane::Bot);
        assert_eq!(Lane::classify(Some("river")), Lane::Unknown);
        assert_eq!(Lane::classify(None), Lane::Unknown);

        assert_eq!(StructureKind::classify(Some("OUTER_TURRET"), None), StructureKind::Outer);
        assert_eq!(StructureKind::classify(Some("base_turret"), None), StructureKind::Base);
        assert_eq!(
            StructureKind::classify(None, Some("INHIBITOR_BUILDING")),
            StructureKind::Inhib
        );
        assert_eq!(StructureKind::classify(Some(""), Some("NEXUS_TURRET")), StructureKind::Nexus);
        assert_eq!(StructureKind::classify(None, None), StructureKind::Unknown);
    }

    #[test]
    fn storage_key_shape() {
        let key = LandmarkKey {
            team_id: TeamId::Blue,
            lane: Lane::Top,
            kind: StructureKind::Outer,
        };
        assert_eq!(key.storage_key(), "100|TOP|OUTER");
    }

    #[test]
    fn two_observations_average() {
        let events = vec![
            tower(1000, 100, "TOP_LANE", "OUTER_TURRET", Some((10.0, 10.0))),
            tower(2000, 100, "TOP_LANE", "OUTER_TURRET", Some((20.0, 10.0))),
        ];
        let model = learn_from_events(&LandmarkModel::new(), &events);

        let site = &model["100|TOP|OUTER"];
        assert_eq!((site.x, site.y), (15.0, 10.0));
        assert_eq!(site.observation_count, 2);
    }

    #[test]
    fn identical_observations_are_stable() {
        let mut model = LandmarkModel::new();
        for i in 0..50 {
            let event = tower(i, 200, "MID_LANE", "INNER_TURRET", Some((9866.0, 10564.0)));
            model = learn_from_events(&model, &[event]);
            let site = &model["200|MID|INNER"];
            assert_eq!((site.x, site.y), (9866.0, 10564.0));
            assert_eq!(site.observation_count, (i + 1) as u64);
        }
    }

    #[test]
    fn unusable_events_skipped_unknowns_bucketed() {
        let events = vec![
            tower(1000, 300, "TOP_LANE", "OUTER_TURRET", Some((1.0, 1.0))),
            tower(1000, 100, "TOP_LANE", "OUTER_TURRET", None),
            tower(1000, 200, "jungle", "mystery", Some((5.0, 6.0))),
        ];
        let model = learn_from_events(&LandmarkModel::new(), &events);
        assert_eq!(model.len(), 1);
        assert!(model.contains_key("200|UNKNOWN|UNKNOWN"));
    }

    #[test]
    fn destroyed_sites_are_hidden() {
        let history = vec![
            tower(0, 100, "TOP_LANE", "OUTER_TURRET", Some((981.0, 10441.0))),
            tower(0, 200, "BOT_LANE", "OUTER_TURRET", Some((13866.0, 4505.0))),
        ];
        let model = learn_from_events(&LandmarkModel::new(), &history);

        let this_match = vec![tower(600_000, 100, "TOP_LANE", "OUTER_TURRET", Some((990.0, 10400.0)))];

        let before = alive_sites_at(&model, &this_match, 599_999);
        assert_eq!(before.len(), 2);

        let at = alive_sites_at(&model, &this_match, 600_000);
        assert_eq!(at.len(), 1);
        assert_eq!(at[0].key().storage_key(), "200|BOT|OUTER");
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("landmarks.json");

        let empty = LandmarkModel::new();
        save_model(&path, &empty).unwrap();
        assert_eq!(load_model(&path).unwrap(), empty);

        let events = vec![
            tower(0, 100, "TOP_LANE", "OUTER_TURRET", Some((10.5, 10.25))),
            tower(0, 200, "MID_LANE", "BASE_TURRET", Some((11000.0, 11000.0))),
        ];
        let model = learn_from_events(&empty, &events);
        save_model(&path, &model).unwrap();
        assert_eq!(load_model(&path).unwrap(), model);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn persisted_format_is_flat_object() {
        let events = vec![tower(0, 100, "TOP_LANE", "OUTER_TURRET", Some((1.0, 2.0)))];
        let model = learn_from_events(&LandmarkModel::new(), &events);
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "100|TOP|OUTER": {
                    "teamId": 100, "lane": "TOP", "structureKind": "OUTER",
                    "x": 1.0, "y": 2.0, "observationCount": 1
                }
            })
        );
    }

    #[test]
    fn corrupt_or_missing_storage_opens_empty() {
        let dir = TempDir::new().unwrap();

        let missing = LandmarkStore::open(dir.path().join("absent.json"));
        assert_eq!(missing.site_count(), 0);

        let corrupt_path = dir.path().join("corrupt.json");
        std::fs::write(&corrupt_path, b"{ not json").unwrap();
        let corrupt = LandmarkStore::open(&corrupt_path);
        assert_eq!(corrupt.site_count(), 0);
    }

    #[test]
    fn store_learns_and_persists_without_runtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("landmarks.json");
        let store = Arc::new(LandmarkStore::open(&path));

        store.learn(&[tower(0, 100, "TOP_LANE", "OUTER_TURRET", Some((1.0, 2.0)))]);
        assert_eq!(store.site_count(), 1);

        let reopened = LandmarkStore::open(&path);
        assert_eq!(reopened.snapshot(), store.snapshot());
    }

    #[tokio::test]
    async fn store_persists_in_background_under_runtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("landmarks.json");
        let store = Arc::new(LandmarkStore::open(&path));

        store.learn(&[tower(0, 200, "BOT_LANE", "INNER_TURRET", Some((8226.0, 1235.0)))]);
        assert_eq!(store.site_count(), 1);

        let mut persisted = LandmarkModel::new();
        for _ in 0..100 {
            if let Ok(model) = load_model(&path) {
                persisted = model;
                if !persisted.is_empty() {
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(persisted, store.snapshot());

        store.learn(&[tower(0, 200, "BOT_LANE", "INNER_TURRET", Some((8230.0, 1235.0)))]);
        store.flush();
        let reopened = LandmarkStore::open(&path);
        assert_eq!(reopened.snapshot()["200|BOT|INNER"].observation_count, 2);
    }

    #[test]
    fn unwritable_storage_is_swallowed() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("occupied");
        std::fs::create_dir_all(path.join("child")).unwrap();

        let store = Arc::new(LandmarkStore::open(&path));
        store.learn(&[tower(0, 100, "TOP_LANE", "OUTER_TURRET", Some((1.0, 2.0)))]);
        store.flush();
        assert_eq!(store.site_count(), 1);
    }
}
