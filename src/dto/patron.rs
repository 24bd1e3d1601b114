//! DTO definitions used by the patron-facing REST API.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameNightStatus, PromptKind},
    dto::{
        common::{CountdownView, OptionView},
        validation::validate_not_blank,
    },
    state::{scoring::ScoreReason, state_machine::PromptState},
};

/// Longest nickname a patron may pick.
pub const MAX_NICKNAME_LEN: usize = 24;

/// Request to join a game night under a nickname.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    #[validate(length(max = 24), custom(function = "validate_not_blank"))]
    pub nickname: String,
}

/// Identity handed back to a patron after joining.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub patron_id: Uuid,
    pub game_night_id: Uuid,
    pub code: String,
    pub nickname: String,
}

/// An answer to the current prompt.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    pub patron_id: Uuid,
    pub prompt_id: Uuid,
    pub option_id: Uuid,
}

/// Acknowledgement of a stored answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionReceipt {
    pub prompt_id: Uuid,
    pub option_id: Uuid,
    pub submitted_at: String,
    /// What the answer earns if it turns out to be correct.
    pub potential_points: u32,
}

/// Optional patron identity for personalised views.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PatronQuery {
    pub patron_id: Option<Uuid>,
}

/// Points earned by the requesting patron on a prompt.
#[derive(Debug, Serialize, ToSchema)]
pub struct MyPoints {
    pub points: u32,
    pub reason: ScoreReason,
}

/// Prompt as displayed on a patron's phone.
#[derive(Debug, Serialize, ToSchema)]
pub struct PatronPromptView {
    pub id: Uuid,
    pub kind: PromptKind,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub over_under_line: Option<f64>,
    pub state: PromptState,
    pub options: Vec<OptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<CountdownView>,
    /// Option picked by the requesting patron, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_option_id: Option<Uuid>,
    /// Correct option once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option_id: Option<Uuid>,
    /// Points of the requesting patron once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_points: Option<MyPoints>,
}

/// Current state of a game night for patrons.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentPromptResponse {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: GameNightStatus,
    /// Most recently created prompt, `null` before the first one.
    pub prompt: Option<PatronPromptView>,
}

/// One leaderboard line.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct LeaderboardRow {
    /// 1-based position; ties share the rank of the first tied row.
    pub rank: usize,
    pub patron_id: Uuid,
    pub nickname: String,
    pub total_points: u64,
}

/// Leaderboard of a game night.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub rows: Vec<LeaderboardRow>,
    /// The requesting patron's line, even outside the top rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub me: Option<LeaderboardRow>,
}
