//! Read-only client for the SportsDataIO NBA play-by-play feed, used for display only.

use std::{sync::Arc, time::Instant};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{info, warn};

use crate::{dto::feed::FeedMode, error::ServiceError, state::SharedState};

const API_KEY_ENV: &str = "SPORTSDATAIO_API_KEY";
const REPLAY_BASE_URL_ENV: &str = "SPORTSDATAIO_REPLAY_BASE_URL";
const LIVE_BASE_URL_ENV: &str = "SPORTSDATAIO_LIVE_BASE_URL";
const DEFAULT_REPLAY_BASE_URL: &str = "https://replay.sportsdata.io";
const DEFAULT_LIVE_BASE_URL: &str = "https://api.sportsdata.io";
/// Longest slice of an upstream error body carried in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Failures that can occur while talking to the sports data feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Required environment variable is missing.
    #[error("missing sports feed environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed.
    #[error("failed to build sports feed client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent.
    #[error("failed to send {mode} play-by-play request for game `{game_id}`")]
    RequestSend {
        mode: &'static str,
        game_id: i64,
        #[source]
        source: reqwest::Error,
    },
    /// The feed answered with a non-success status.
    #[error("{mode} play-by-play request for game `{game_id}` failed: {status} {body}")]
    RequestStatus {
        mode: &'static str,
        game_id: i64,
        status: StatusCode,
        body: String,
    },
    /// The payload was not valid JSON.
    #[error("failed to decode {mode} play-by-play for game `{game_id}`")]
    DecodeResponse {
        mode: &'static str,
        game_id: i64,
        #[source]
        source: reqwest::Error,
    },
}

/// Connection settings for the feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub api_key: String,
    pub replay_base_url: String,
    pub live_base_url: String,
}

impl FeedConfig {
    /// Read the API key (required) and base URLs (optional) from the environment.
    pub fn from_env() -> Result<Self, FeedError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(FeedError::MissingEnvVar { var: API_KEY_ENV })?;

        let base_url = |var: &str, default: &str| {
            std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        Ok(Self {
            api_key,
            replay_base_url: base_url(REPLAY_BASE_URL_ENV, DEFAULT_REPLAY_BASE_URL),
            live_base_url: base_url(LIVE_BASE_URL_ENV, DEFAULT_LIVE_BASE_URL),
        })
    }
}

/// HTTP client for replay and live play-by-play requests.
#[derive(Clone)]
pub struct SportsFeedClient {
    client: Client,
    api_key: Arc<str>,
    replay_base_url: Arc<str>,
    live_base_url: Arc<str>,
}

impl SportsFeedClient {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .build()
            .map_err(|source| FeedError::ClientBuilder { source })?;

        Ok(Self {
            client,
            api_key: Arc::from(config.api_key),
            replay_base_url: Arc::from(config.replay_base_url.trim_end_matches('/')),
            live_base_url: Arc::from(config.live_base_url.trim_end_matches('/')),
        })
    }

    fn play_by_play_url(&self, mode: FeedMode, game_id: i64) -> String {
        let base = match mode {
            FeedMode::Replay => &self.replay_base_url,
            FeedMode::Live => &self.live_base_url,
        };
        format!("{base}/api/v3/nba/pbp/json/playbyplay/{game_id}")
    }

    /// Fetch the raw `{Game, Plays}` document of `game_id`.
    pub async fn nba_play_by_play(
        &self,
        mode: FeedMode,
        game_id: i64,
    ) -> Result<serde_json::Value, FeedError> {
        let started = Instant::now();
        let mode_label = mode.as_str();
        let response = self
            .client
            .get(self.play_by_play_url(mode, game_id))
            .query(&[("key", self.api_key.as_ref())])
            .send()
            .await
            .map_err(|source| FeedError::RequestSend {
                mode: mode_label,
                game_id,
                source: source.without_url(),
            })?;

        let status = response.status();
        info!(
            mode = mode_label,
            game_id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sports feed responded"
        );

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map_or(body.len(), |(index, _)| index),
            );
            return Err(FeedError::RequestStatus {
                mode: mode_label,
                game_id,
                status,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| FeedError::DecodeResponse {
                mode: mode_label,
                game_id,
                source: source.without_url(),
            })
    }
}

/// Proxy a play-by-play request through the configured client.
pub async fn play_by_play(
    state: &SharedState,
    mode: FeedMode,
    game_id: i64,
) -> Result<serde_json::Value, ServiceError> {
    let client = state
        .feed()
        .ok_or_else(|| ServiceError::Upstream(format!("{API_KEY_ENV} is not configured")))?;

    client.nba_play_by_play(mode, game_id).await.map_err(|err| {
        warn!(mode = mode.as_str(), game_id, error = %err, "sports feed request failed");
        ServiceError::Upstream(err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_the_play_by_play_layout() {
        let client = SportsFeedClient::new(FeedConfig {
            api_key: "k".into(),
            replay_base_url: "https://replay.example/".into(),
            live_base_url: DEFAULT_LIVE_BASE_URL.into(),
        })
        .unwrap();

        assert_eq!(
            client.play_by_play_url(FeedMode::Replay, 21_450),
            "https://replay.example/api/v3/nba/pbp/json/playbyplay/21450"
        );
        assert_eq!(
            client.play_by_play_url(FeedMode::Live, 7),
            "https://api.sportsdata.io/api/v3/nba/pbp/json/playbyplay/7"
        );
    }
}
