//! Client for the third-party match-data provider

pub mod regions;
pub mod riot;

pub use regions::Region;
pub use riot::RiotClient;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw match payloads as returned by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchBundle {
    #[serde(rename = "match")]
    pub match_data: Value,
    pub timeline: Option<Value>,
    pub region: Region,
}

/// Anything that can produce a match bundle by id
pub trait MatchSource: Send + Sync {
    fn fetch_bundle<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, Result<MatchBundle, UpstreamError>>;
}

impl MatchSource for RiotClient {
    fn fetch_bundle<'a>(&'a self, match_id: &'a str) -> BoxFuture<'a, Result<MatchBundle, UpstreamError>> {
        Box::pin(self.match_bundle(match_id))
    }
}

/// Coarse failure class reported to viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    RateLimited,
    Upstream,
}

/// Provider errors
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider API key not configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UpstreamError::NotFound(_) => FailureKind::NotFound,
            UpstreamError::RateLimited { .. } => FailureKind::RateLimited,
            _ => FailureKind::Upstream,
        }
    }
}
