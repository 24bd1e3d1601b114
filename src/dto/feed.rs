use serde::Deserialize;
use utoipa::ToSchema;

/// Which upstream play-by-play host to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// Recorded games replayed at broadcast speed, for rehearsals.
    Replay,
    /// Games currently on air.
    Live,
}

impl FeedMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedMode::Replay => "replay",
            FeedMode::Live => "live",
        }
    }
}
