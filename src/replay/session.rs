//! Per-viewer playback session and the registry of live sessions

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::upstream::{MatchBundle, MatchSource, UpstreamError};
use crate::util::time::{format_clock, Timer, PLAYBACK_TPS, SNAPSHOT_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::cursor::{PlaybackCursor, TickOutcome};
use super::interpolate::DEFAULT_SPEED_CAP;
use super::landmarks::LandmarkStore;
use super::live_state::DEFAULT_DEATH_WINDOW_MS;
use super::notify::notifications_for;
use super::snapshot::SnapshotBuilder;
use super::timeline::MatchTimeline;

const COMMAND_QUEUE: usize = 64;
const OUTBOUND_QUEUE: usize = 64;
const LOAD_QUEUE: usize = 8;

/// Tunables shared by every session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub speed_cap: f64,
    pub death_window_ms: i64,
}

impl PlaybackSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            speed_cap: config.speed_cap,
            death_window_ms: config.death_window_ms,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed_cap: DEFAULT_SPEED_CAP,
            death_window_ms: DEFAULT_DEATH_WINDOW_MS,
        }
    }
}

/// A finished fetch, tagged with the selection that asked for it
pub struct LoadResult {
    pub token: u64,
    pub match_id: String,
    pub result: Result<MatchBundle, UpstreamError>,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub cmd_tx: mpsc::Sender<ClientMsg>,
}

/// Registry of all connected viewers
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Start a session task; the receiver yields everything it sends to the viewer
    pub fn spawn(
        &self,
        source: Arc<dyn MatchSource>,
        landmarks: Arc<LandmarkStore>,
        settings: PlaybackSettings,
    ) -> (SessionHandle, mpsc::Receiver<ServerMsg>) {
        let id = Uuid::new_v4();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);

        let session = PlaybackSession::new(id, source, landmarks, settings);
        tokio::spawn(session.run(cmd_rx, out_tx));

        let handle = SessionHandle { id, cmd_tx };
        self.sessions.insert(id, handle.clone());
        (handle, out_rx)
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The playback state for one viewer (owned by the session task)
pub struct PlaybackSession {
    id: Uuid,
    source: Arc<dyn MatchSource>,
    landmarks: Arc<LandmarkStore>,
    settings: PlaybackSettings,
    cursor: PlaybackCursor,
    current: Option<Arc<MatchTimeline>>,
    /// Bumped on every load; completions carrying an older value are dropped
    selection: u64,
    snapshots: SnapshotBuilder,
}

impl PlaybackSession {
    pub fn new(
        id: Uuid,
        source: Arc<dyn MatchSource>,
        landmarks: Arc<LandmarkStore>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            id,
            source,
            landmarks,
            settings,
            cursor: PlaybackCursor::new(),
            current: None,
            selection: 0,
            snapshots: SnapshotBuilder::new(PLAYBACK_TPS / SNAPSHOT_TPS),
        }
    }

    #[cfg(test)]
    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&MatchTimeline> {
        self.current.as_deref()
    }

    /// Run the playback scheduler until the viewer goes away
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<ClientMsg>, out_tx: mpsc::Sender<ServerMsg>) {
        info!(session_id = %self.id, "Playback session started");

        let (load_tx, mut load_rx) = mpsc::channel::<LoadResult>(LOAD_QUEUE);
        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timer = Timer::new();

        'session: loop {
            let outgoing: Vec<ServerMsg> = tokio::select! {
                _ = tick_interval.tick() => self.advance(timer.lap_ms()).into_iter().collect(),
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, &load_tx),
                    None => break 'session,
                },
                Some(loaded) = load_rx.recv() => self.apply_loaded(loaded),
            };

            for msg in outgoing {
                if out_tx.send(msg).await.is_err() {
                    debug!(session_id = %self.id, "Viewer channel closed");
                    break 'session;
                }
            }
        }

        info!(session_id = %self.id, "Playback session ended");
    }

    /// Apply one viewer command, spawning a fetch for loads
    pub fn handle_command(&mut self, cmd: ClientMsg, load_tx: &mpsc::Sender<LoadResult>) -> Vec<ServerMsg> {
        match cmd {
            ClientMsg::Load { match_id } => {
                let token = self.begin_load(&match_id);
                self.spawn_fetch(token, match_id.clone(), load_tx.clone());
                vec![ServerMsg::Loading { match_id }]
            }
            ClientMsg::Ping { t } => vec![ServerMsg::Pong { t }],
            control => self.apply_control(control),
        }
    }

    /// Supersede the current selection and return its token
    pub fn begin_load(&mut self, match_id: &str) -> u64 {
        self.selection += 1;
        self.current = None;
        self.cursor.unload();
        self.snapshots.clear();
        info!(session_id = %self.id, match_id, token = self.selection, "Loading match");
        self.selection
    }

    fn spawn_fetch(&self, token: u64, match_id: String, load_tx: mpsc::Sender<LoadResult>) {
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let result = source.fetch_bundle(&match_id).await;
            let _ = load_tx.send(LoadResult { token, match_id, result }).await;
        });
    }

    /// Install a finished fetch if it still belongs to the current selection
    pub fn apply_loaded(&mut self, loaded: LoadResult) -> Vec<ServerMsg> {
        if loaded.token != self.selection {
            debug!(
                session_id = %self.id,
                match_id = %loaded.match_id,
                token = loaded.token,
                current = self.selection,
                "Discarding stale load"
            );
            return Vec::new();
        }

        let bundle = match loaded.result {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(session_id = %self.id, match_id = %loaded.match_id, error = %e, "Match load failed");
                return vec![ServerMsg::LoadFailed {
                    match_id: loaded.match_id,
                    kind: e.kind(),
                    message: e.to_string(),
                }];
            }
        };

        let timeline = Arc::new(MatchTimeline::derive(
            loaded.match_id,
            &bundle.match_data,
            bundle.timeline.as_ref(),
        ));
        if !timeline.has_frames() {
            warn!(session_id = %self.id, match_id = %timeline.match_id, "Match has no timeline frames");
        }
        self.landmarks.learn(&timeline.events);
        self.cursor.load(timeline.duration_ms);
        self.current = Some(Arc::clone(&timeline));

        info!(
            session_id = %self.id,
            match_id = %timeline.match_id,
            region = %bundle.region,
            frames = timeline.frames.len(),
            events = timeline.events.len(),
            "Match loaded"
        );

        vec![
            ServerMsg::MatchLoaded {
                match_id: timeline.match_id.clone(),
                participants: timeline.participants.clone(),
                duration_ms: timeline.duration_ms,
                duration_label: format_clock(timeline.duration_ms),
                frame_count: timeline.frames.len(),
                event_count: timeline.events.len(),
            },
            self.snapshot(&timeline),
        ]
    }

    fn apply_control(&mut self, cmd: ClientMsg) -> Vec<ServerMsg> {
        let Some(timeline) = self.current.clone() else {
            return vec![ServerMsg::Error {
                code: "no_match".to_string(),
                message: "No match loaded".to_string(),
            }];
        };

        let now = self.cursor.time_ms();
        let stationary = TickOutcome {
            previous_ms: now,
            time_ms: now,
        };

        let outcome = match cmd {
            ClientMsg::Play => self.cursor.play(),
            ClientMsg::Pause => {
                self.cursor.pause();
                stationary
            }
            ClientMsg::Toggle => self.cursor.toggle(),
            ClientMsg::Seek { time_ms } => self.cursor.seek(time_ms),
            ClientMsg::Step { delta_ms } => self.cursor.step(delta_ms),
            ClientMsg::SetSpeed { multiplier } => {
                if !self.cursor.set_speed(multiplier) {
                    return vec![ServerMsg::Error {
                        code: "invalid_speed".to_string(),
                        message: format!("Speed must be a positive number, got {}", multiplier),
                    }];
                }
                stationary
            }
            ClientMsg::Load { .. } | ClientMsg::Ping { .. } => return Vec::new(),
        };

        self.collect_crossings(&timeline, outcome);
        vec![self.snapshot(&timeline)]
    }

    /// One scheduler tick; returns a snapshot when one is due
    pub fn advance(&mut self, delta_ms: f64) -> Option<ServerMsg> {
        let timeline = self.current.clone()?;
        if !self.cursor.is_playing() {
            return None;
        }

        let outcome = self.cursor.tick(delta_ms);
        self.collect_crossings(&timeline, outcome);

        // Reaching the end pauses; always report that final frame
        if self.cursor.is_playing() && !self.snapshots.should_send() {
            return None;
        }
        Some(self.snapshot(&timeline))
    }

    fn collect_crossings(&mut self, timeline: &MatchTimeline, outcome: TickOutcome) {
        let range = outcome.crossed_range(&timeline.events);
        if !range.is_empty() {
            let crossed = &timeline.events[range.clone()];
            self.snapshots
                .push_notifications(notifications_for(crossed, range.start, timeline.teams()));
        }
    }

    fn snapshot(&mut self, timeline: &MatchTimeline) -> ServerMsg {
        let t = self.cursor.time_ms();
        let standing = self.landmarks.alive_sites_at(&timeline.events, t);
        ServerMsg::Snapshot(self.snapshots.build(
            timeline,
            &self.cursor,
            standing,
            self.settings.speed_cap,
            self.settings.death_window_ms,
        ))
    }
}
