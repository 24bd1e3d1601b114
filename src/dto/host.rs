//! DTO definitions used by the host REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{BarEntity, GameNightEntity, GameNightStatus, PromptKind},
    dto::{
        common::PromptSummary,
        format_optional_time, format_system_time,
        validation::{validate_game_code, validate_not_blank},
    },
};

/// Request to fetch or create the calling host's bar.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct EnsureBarRequest {
    #[validate(length(max = 80), custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Bar owned by the calling host.
#[derive(Debug, Serialize, ToSchema)]
pub struct BarSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
}

impl From<BarEntity> for BarSummary {
    fn from(bar: BarEntity) -> Self {
        Self {
            id: bar.id,
            name: bar.name,
            created_at: format_system_time(bar.created_at),
        }
    }
}

/// Payload used to schedule a game night at one of the host's bars.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameNightRequest {
    pub bar_id: Uuid,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub title: Option<String>,
    /// Defaults to `NBA`.
    #[serde(default)]
    #[validate(length(min = 1, max = 16))]
    pub sport: Option<String>,
    /// Join code; a random one is generated when omitted.
    #[serde(default)]
    #[validate(custom(function = "validate_game_code"))]
    pub code: Option<String>,
    /// Identifier of the broadcast game in the sports data feed.
    #[serde(default)]
    pub external_game_id: Option<i64>,
}

/// Game night as seen by its host.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameNightSummary {
    pub id: Uuid,
    pub bar_id: Uuid,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub sport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_game_id: Option<i64>,
    pub status: GameNightStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl From<GameNightEntity> for GameNightSummary {
    fn from(game_night: GameNightEntity) -> Self {
        Self {
            id: game_night.id,
            bar_id: game_night.bar_id,
            code: game_night.code,
            title: game_night.title,
            sport: game_night.sport,
            external_game_id: game_night.external_game_id,
            status: game_night.status,
            created_at: format_system_time(game_night.created_at),
            ended_at: format_optional_time(game_night.ended_at),
        }
    }
}

/// Host's view of one prompt, including its results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HostPromptView {
    #[serde(flatten)]
    pub prompt: PromptSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option_id: Option<Uuid>,
    pub submission_count: usize,
    pub score_count: usize,
}

/// A game night with every prompt created so far.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameNightDetail {
    pub game_night: GameNightSummary,
    pub prompts: Vec<HostPromptView>,
}

/// Payload used to draft a new prompt.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePromptRequest {
    pub game_night_id: Uuid,
    pub kind: PromptKind,
    #[validate(length(max = 280), custom(function = "validate_not_blank"))]
    pub question: String,
    /// Multiple-choice labels; blank entries are dropped and only the first eight are kept.
    #[serde(default)]
    pub options: Vec<String>,
    /// Required for over/under prompts, ignored otherwise.
    #[serde(default)]
    pub over_under_line: Option<f64>,
}

/// Answer window requested when opening or reopening a prompt.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct OpenPromptRequest {
    #[validate(range(min = 1, max = 3600))]
    pub duration_secs: u64,
}

/// Declaration of the correct option.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolvePromptRequest {
    pub correct_option_id: Uuid,
}

/// Result of a resolution.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResolutionSummary {
    pub prompt: PromptSummary,
    pub correct_option_id: Uuid,
    /// Patrons who submitted and received a score row.
    pub scored: usize,
    /// Among them, patrons who picked the correct option.
    pub correct: usize,
}
