//! Application-level configuration loading: scoring rules, host tokens and request limits.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::scoring::ScoringRules;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GAME_NIGHT_BACK_CONFIG_PATH";
/// Default bound on the wait for a prompt's transition gate.
const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of rows returned by the leaderboard.
const DEFAULT_LEADERBOARD_SIZE: usize = 20;

/// Identity resolved from a host API token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    /// Host account identifier.
    pub user_id: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    scoring: ScoringRules,
    host_tokens: HashMap<String, String>,
    transition_timeout: Option<Duration>,
    leaderboard_size: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        hosts = app_config.host_tokens.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Scoring constants shared by the countdown display and resolution.
    pub fn scoring(&self) -> &ScoringRules {
        &self.scoring
    }

    /// Resolve a host token to the host it was issued to.
    pub fn host_for_token(&self, token: &str) -> Option<HostIdentity> {
        self.host_tokens.get(token).map(|user_id| HostIdentity {
            user_id: user_id.clone(),
        })
    }

    /// Upper bound on the wait for a prompt's transition gate, `None` for no limit.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }

    /// Number of rows returned by the leaderboard.
    pub fn leaderboard_size(&self) -> usize {
        self.leaderboard_size
    }

    /// Register a host token, replacing any previous owner.
    pub fn with_host_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.host_tokens.insert(token.into(), user_id.into());
        self
    }

    /// Override the scoring constants.
    pub fn with_scoring(mut self, scoring: ScoringRules) -> Self {
        self.scoring = scoring;
        self
    }

    /// Override the transition timeout.
    pub fn with_transition_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transition_timeout = timeout;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringRules::default(),
            host_tokens: HashMap::new(),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    scoring: Option<RawScoring>,
    #[serde(default)]
    host_tokens: HashMap<String, String>,
    #[serde(default)]
    limits: RawLimits,
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// Scoring section; every field falls back to the default rule when omitted.
struct RawScoring {
    min_points: Option<u32>,
    max_points: Option<u32>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(rename = "fast_window_secs")]
    fast_window: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(rename = "slow_window_secs")]
    slow_window: Option<Duration>,
    incorrect_points: Option<u32>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct RawLimits {
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "transition_timeout_ms")]
    transition_timeout: Option<Duration>,
    #[serde(default)]
    disable_transition_timeout: bool,
    #[serde(default)]
    leaderboard_size: Option<usize>,
}

impl From<RawScoring> for ScoringRules {
    fn from(value: RawScoring) -> Self {
        let defaults = ScoringRules::default();
        let rules = ScoringRules {
            min_points: value.min_points.unwrap_or(defaults.min_points),
            max_points: value.max_points.unwrap_or(defaults.max_points),
            fast_window: value.fast_window.unwrap_or(defaults.fast_window),
            slow_window: value.slow_window.unwrap_or(defaults.slow_window),
            incorrect_points: value.incorrect_points.unwrap_or(defaults.incorrect_points),
        };

        if rules.min_points > rules.max_points {
            warn!(
                min_points = rules.min_points,
                max_points = rules.max_points,
                "min_points exceeds max_points; using default scoring"
            );
            return defaults;
        }
        rules
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let transition_timeout = if value.limits.disable_transition_timeout {
            None
        } else {
            value
                .limits
                .transition_timeout
                .or(defaults.transition_timeout)
        };

        Self {
            scoring: value.scoring.map(Into::into).unwrap_or_default(),
            host_tokens: value.host_tokens,
            transition_timeout,
            leaderboard_size: value
                .limits
                .leaderboard_size
                .filter(|size| *size > 0)
                .unwrap_or(defaults.leaderboard_size),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.scoring(), &ScoringRules::default());
        assert_eq!(config.transition_timeout(), Some(DEFAULT_TRANSITION_TIMEOUT));
        assert_eq!(config.leaderboard_size(), DEFAULT_LEADERBOARD_SIZE);
        assert!(config.host_for_token("anything").is_none());
    }

    #[test]
    fn partial_scoring_keeps_remaining_defaults() {
        let config = AppConfig::from_json(
            r#"{ "scoring": { "max_points": 20, "fast_window_secs": 3 } }"#,
        )
        .unwrap();

        let scoring = config.scoring();
        assert_eq!(scoring.max_points, 20);
        assert_eq!(scoring.min_points, 5);
        assert_eq!(scoring.fast_window, Duration::from_secs(3));
        assert_eq!(scoring.slow_window, Duration::from_secs(2));
    }

    #[test]
    fn inverted_point_range_falls_back_to_defaults() {
        let config =
            AppConfig::from_json(r#"{ "scoring": { "min_points": 12, "max_points": 10 } }"#)
                .unwrap();
        assert_eq!(config.scoring(), &ScoringRules::default());
    }

    #[test]
    fn host_tokens_resolve_to_identity() {
        let config =
            AppConfig::from_json(r#"{ "host_tokens": { "s3cret": "host-7" } }"#).unwrap();
        assert_eq!(
            config.host_for_token("s3cret"),
            Some(HostIdentity {
                user_id: "host-7".into()
            })
        );
        assert!(config.host_for_token("other").is_none());
    }

    #[test]
    fn limits_section_is_honoured() {
        let config = AppConfig::from_json(
            r#"{ "limits": { "transition_timeout_ms": 250, "leaderboard_size": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.transition_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.leaderboard_size(), 3);

        let unlimited =
            AppConfig::from_json(r#"{ "limits": { "disable_transition_timeout": true } }"#)
                .unwrap();
        assert_eq!(unlimited.transition_timeout(), None);
    }
}
