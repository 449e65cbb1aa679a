//! HTTP route definitions

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::debug;

use crate::app::AppState;
use crate::replay::landmarks::LandmarkModel;
use crate::replay::MatchTimeline;
use crate::upstream::{MatchBundle, Region, UpstreamError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MATCH_COUNT: u32 = 20;
const MAX_MATCH_COUNT: u32 = 100;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    let api_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/matches/resolve", get(resolve_handler))
        .route("/match/:match_id", get(match_handler))
        .route("/replay/:match_id", get(replay_handler))
        .route("/landmarks", get(landmarks_handler))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for `CLIENT_ORIGIN`: `*` allows any origin, otherwise a comma-separated list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed_origins))
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    server_time: String,
    uptime_secs: u64,
    active_sessions: usize,
    learned_landmarks: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        server_time: chrono::Utc::now().to_rfc3339(),
        uptime_secs: uptime_secs(),
        active_sessions: state.sessions.active_sessions(),
        learned_landmarks: state.landmarks.site_count(),
    })
}

// ============================================================================
// Match resolution
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveQuery {
    riot_id: Option<String>,
    match_id: Option<String>,
    start: Option<u32>,
    count: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    region_guess: Option<Region>,
    puuid: Option<String>,
    match_ids: Vec<String>,
}

async fn resolve_handler(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, AppError> {
    if let Some(match_id) = query.match_id.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()) {
        return Ok(Json(ResolveResponse {
            region_guess: Some(Region::from_match_id(&match_id).unwrap_or(Region::Americas)),
            puuid: None,
            match_ids: vec![match_id],
        }));
    }

    let riot_id = query
        .riot_id
        .ok_or_else(|| AppError::BadRequest("Provide riotId or matchId".to_string()))?;
    let (game_name, tag_line) = split_riot_id(&riot_id)?;

    let account = state.riot.find_account(game_name, tag_line).await?;

    let start = query.start.unwrap_or(0);
    let count = query.count.unwrap_or(DEFAULT_MATCH_COUNT).clamp(1, MAX_MATCH_COUNT);
    let (region_guess, match_ids) = state.riot.recent_match_ids(&account.puuid, start, count).await;
    debug!(riot_id = %riot_id, matches = match_ids.len(), "Resolved account");

    Ok(Json(ResolveResponse {
        region_guess,
        puuid: Some(account.puuid),
        match_ids,
    }))
}

/// `Name#Tag` into its two non-empty halves
fn split_riot_id(riot_id: &str) -> Result<(&str, &str), AppError> {
    match riot_id.trim().split_once('#') {
        Some((name, tag)) if !name.trim().is_empty() && !tag.trim().is_empty() => Ok((name.trim(), tag.trim())),
        _ => Err(AppError::BadRequest(format!("Riot ID must look like Name#Tag, got {:?}", riot_id))),
    }
}

// ============================================================================
// Match data
// ============================================================================

async fn match_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchBundle>, AppError> {
    let bundle = state.source.fetch_bundle(&match_id).await?;
    Ok(Json(bundle))
}

async fn replay_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchTimeline>, AppError> {
    let bundle = state.source.fetch_bundle(&match_id).await?;
    let timeline = MatchTimeline::derive(match_id, &bundle.match_data, bundle.timeline.as_ref());
    state.landmarks.learn(&timeline.events);
    Ok(Json(timeline))
}

async fn landmarks_handler(State(state): State<AppState>) -> Json<LandmarkModel> {
    Json(state.landmarks.snapshot())
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::NotFound(what) => AppError::NotFound(what),
            UpstreamError::RateLimited { .. } => AppError::RateLimited(e.to_string()),
            UpstreamError::MissingApiKey => AppError::Internal(e.to_string()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::RateLimited(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
