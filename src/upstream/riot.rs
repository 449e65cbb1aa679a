//! Match-data provider REST client

use futures::future::join_all;
use rand::Rng;
use reqwest::{header::RETRY_AFTER, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::util::rate_limit::{create_limiter, Limiter};

use super::regions::{Region, ACCOUNT_REGIONS, MATCH_REGIONS};
use super::{MatchBundle, UpstreamError};

/// Used when a 429 carries no usable Retry-After
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;
/// Upper bound on a single provider-requested wait
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Account identity behind a Riot ID
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub puuid: String,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub tag_line: Option<String>,
}

/// Provider client with request pacing and 429 backoff
#[derive(Clone)]
pub struct RiotClient {
    client: Client,
    api_key: Option<String>,
    limiter: Arc<Limiter>,
    max_retries: u32,
}

impl RiotClient {
    pub fn new(config: &Config) -> Self {
        if config.riot_api_key.is_none() {
            warn!("RIOT_TOKEN not set, provider lookups will fail until it is configured");
        }

        Self {
            client: Client::new(),
            api_key: config.riot_api_key.clone(),
            limiter: create_limiter(config.upstream_rps),
            max_retries: config.upstream_max_retries,
        }
    }

    /// Authenticated GET with pacing and retry on rate limiting
    async fn get_json(&self, region: Region, segments: &[&str], query: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::MissingApiKey)?;
        let url = build_url(region, segments, query)?;

        let mut attempt = 0;
        loop {
            self.limiter.until_ready().await;

            let response = self
                .client
                .get(url.clone())
                .header("X-Riot-Token", api_key)
                .send()
                .await
                .map_err(UpstreamError::Request)?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = parse_retry_after(
                    response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok()),
                );

                if attempt >= self.max_retries {
                    return Err(UpstreamError::RateLimited { retry_after_secs });
                }
                attempt += 1;

                warn!(
                    region = %region,
                    path = url.path(),
                    attempt,
                    retry_after_secs,
                    "Provider rate limited, backing off"
                );

                let jitter_ms = rand::thread_rng().gen_range(0..250);
                tokio::time::sleep(Duration::from_secs(retry_after_secs) + Duration::from_millis(jitter_ms)).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(UpstreamError::NotFound(url.path().to_string()));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            return response.json().await.map_err(UpstreamError::Parse);
        }
    }

    /// Look up a Riot ID in every account region, first hit wins
    pub async fn find_account(&self, game_name: &str, tag_line: &str) -> Result<Account, UpstreamError> {
        let lookups = ACCOUNT_REGIONS.iter().map(|region| async move {
            let raw = self
                .get_json(
                    *region,
                    &["riot", "account", "v1", "accounts", "by-riot-id", game_name, tag_line],
                    &[],
                )
                .await?;
            serde_json::from_value::<Account>(raw).map_err(UpstreamError::Decode)
        });

        let mut rate_limited = None;
        for result in join_all(lookups).await {
            match result {
                Ok(account) if !account.puuid.is_empty() => return Ok(account),
                Ok(_) => {}
                Err(UpstreamError::RateLimited { retry_after_secs }) => {
                    rate_limited = Some(retry_after_secs);
                }
                Err(UpstreamError::MissingApiKey) => return Err(UpstreamError::MissingApiKey),
                Err(e) => debug!(error = %e, "Account lookup miss"),
            }
        }

        match rate_limited {
            Some(retry_after_secs) => Err(UpstreamError::RateLimited { retry_after_secs }),
            None => Err(UpstreamError::NotFound(format!("{}#{}", game_name, tag_line))),
        }
    }

    /// Recent match ids for an account; the first region with any wins
    pub async fn recent_match_ids(&self, puuid: &str, start: u32, count: u32) -> (Option<Region>, Vec<String>) {
        let query = [("start", start.to_string()), ("count", count.to_string())];
        let lookups = MATCH_REGIONS.iter().map(|region| {
            let query = &query;
            async move {
                let raw = self
                    .get_json(*region, &["lol", "match", "v5", "matches", "by-puuid", puuid, "ids"], query)
                    .await;
                (*region, raw)
            }
        });

        for (region, result) in join_all(lookups).await {
            match result {
                Ok(raw) => {
                    let ids: Vec<String> = serde_json::from_value(raw).unwrap_or_default();
                    if !ids.is_empty() {
                        return (Some(region), ids);
                    }
                }
                Err(e) => debug!(region = %region, error = %e, "Match list lookup miss"),
            }
        }

        (None, Vec::new())
    }

    /// Match plus timeline; a missing timeline degrades to `None`
    pub async fn match_bundle(&self, match_id: &str) -> Result<MatchBundle, UpstreamError> {
        let region = Region::from_match_id(match_id).unwrap_or(Region::Americas);

        let match_data = self
            .get_json(region, &["lol", "match", "v5", "matches", match_id], &[])
            .await?;

        let timeline = match self
            .get_json(region, &["lol", "match", "v5", "matches", match_id, "timeline"], &[])
            .await
        {
            Ok(timeline) => Some(timeline),
            Err(e) => {
                debug!(match_id, error = %e, "No timeline for match");
                None
            }
        };

        Ok(MatchBundle {
            match_data,
            timeline,
            region,
        })
    }
}

/// Build a provider URL; segments are percent-encoded individually
pub fn build_url(region: Region, segments: &[&str], query: &[(&str, String)]) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(&format!("https://{}/", region.host()))
        .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;

    url.path_segments_mut()
        .map_err(|_| UpstreamError::InvalidUrl(region.host()))?
        .clear()
        .extend(segments);

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Seconds to wait from a Retry-After header, clamped to a sane range
pub fn parse_retry_after(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
        .clamp(DEFAULT_RETRY_AFTER_SECS, MAX_RETRY_AFTER_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_encode_segments() {
        let url = build_url(
            Region::Europe,
            &["riot", "account", "v1", "accounts", "by-riot-id", "Some Name", "EUW"],
            &[],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://europe.api.riotgames.com/riot/account/v1/accounts/by-riot-id/Some%20Name/EUW"
        );
    }

    #[test]
    fn urls_carry_query() {
        let url = build_url(
            Region::Americas,
            &["lol", "match", "v5", "matches", "by-puuid", "abc", "ids"],
            &[("start", "0".to_string()), ("count", "10".to_string())],
        )
        .unwrap();
        assert_eq!(url.query(), Some("start=0&count=10"));
    }

    #[test]
    fn retry_after_parsing() {
        assert_eq!(parse_retry_after(Some("3")), 3);
        assert_eq!(parse_retry_after(Some(" 7 ")), 7);
        assert_eq!(parse_retry_after(Some("soon")), DEFAULT_RETRY_AFTER_SECS);
        assert_eq!(parse_retry_after(Some("0")), DEFAULT_RETRY_AFTER_SECS);
        assert_eq!(parse_retry_after(Some("3600")), MAX_RETRY_AFTER_SECS);
        assert_eq!(parse_retry_after(None), DEFAULT_RETRY_AFTER_SECS);
    }

    #[test]
    fn missing_key_fails_fast() {
        let client = RiotClient::new(&Config::for_tests());
        let err = tokio_test::block_on(client.match_bundle("NA1_1")).unwrap_err();
        assert!(matches!(err, UpstreamError::MissingApiKey));

        let err = tokio_test::block_on(client.find_account("Faker", "KR1")).unwrap_err();
        assert!(matches!(err, UpstreamError::MissingApiKey));
    }
}
