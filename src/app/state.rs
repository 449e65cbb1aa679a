//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::replay::{LandmarkStore, SessionRegistry};
use crate::upstream::{MatchSource, RiotClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub riot: RiotClient,
    /// Match bundles for sessions and the replay routes
    pub source: Arc<dyn MatchSource>,
    pub landmarks: Arc<LandmarkStore>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize provider client
        let riot = RiotClient::new(&config);
        let source: Arc<dyn MatchSource> = Arc::new(riot.clone());

        // Load the learned landmark model once per process
        let landmarks = Arc::new(LandmarkStore::open(config.landmark_store_path.clone()));

        let sessions = Arc::new(SessionRegistry::new());

        Self {
            config,
            riot,
            source,
            landmarks,
            sessions,
        }
    }
}
