//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::replay::interpolate::DEFAULT_SPEED_CAP;
use crate::replay::live_state::DEFAULT_DEATH_WINDOW_MS;
use crate::util::rate_limit::UPSTREAM_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Provider API key; lookups fail until it is set
    pub riot_api_key: Option<String>,
    /// Provider requests per second
    pub upstream_rps: u32,
    /// Retries after a 429 before giving up
    pub upstream_max_retries: u32,

    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,

    /// Where the learned landmark model is persisted
    pub landmark_store_path: PathBuf,
    /// Interpolation speed cap, map units per second
    pub speed_cap: f64,
    /// Fixed respawn approximation
    pub death_window_ms: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:5050".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            riot_api_key: env::var("RIOT_TOKEN").ok().filter(|k| !k.trim().is_empty()),
            upstream_rps: parse_var("UPSTREAM_RPS", UPSTREAM_RATE_LIMIT)?,
            upstream_max_retries: parse_var("UPSTREAM_MAX_RETRIES", 3)?,

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            landmark_store_path: env::var("LANDMARK_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/landmarks.v1.json")),
            speed_cap: parse_var("SPEED_CAP", DEFAULT_SPEED_CAP)?,
            death_window_ms: parse_var("DEATH_WINDOW_MS", DEFAULT_DEATH_WINDOW_MS)?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            riot_api_key: None,
            upstream_rps: UPSTREAM_RATE_LIMIT,
            upstream_max_retries: 0,
            client_origin: "*".to_string(),
            landmark_store_path: std::env::temp_dir().join("rift-replay-test-landmarks.json"),
            speed_cap: DEFAULT_SPEED_CAP,
            death_window_ms: DEFAULT_DEATH_WINDOW_MS,
        }
    }
}

/// Optional variable with a default; present but unparsable is an error
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
