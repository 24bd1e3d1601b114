use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{scoring::ScoreReason, state_machine::PromptState, window::PromptWindow};

/// Venue owned by a host account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BarEntity {
    /// Stable identifier for the bar.
    pub id: Uuid,
    /// Identifier of the owning host account.
    pub owner_user_id: String,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Whether a game night still accepts patrons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameNightStatus {
    /// Running.
    Active,
    /// Closed by the host.
    Ended,
}

impl GameNightStatus {
    /// Stored label.
    pub fn as_str(self) -> &'static str {
        match self {
            GameNightStatus::Active => "active",
            GameNightStatus::Ended => "ended",
        }
    }
}

/// A single broadcast watched at a bar, grouping prompts and patrons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameNightEntity {
    /// Stable identifier for the game night.
    pub id: Uuid,
    /// Bar hosting the game night.
    pub bar_id: Uuid,
    /// Identifier of the owning host account.
    pub owner_user_id: String,
    /// Normalised join code (uppercase alphanumerics), unique.
    pub code: String,
    /// Optional display title.
    pub title: Option<String>,
    /// Sport label (e.g. "NBA").
    pub sport: String,
    /// Identifier of the game in the sports data feed.
    pub external_game_id: Option<i64>,
    /// Running or ended.
    pub status: GameNightStatus,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Set when the host ends the game night.
    pub ended_at: Option<SystemTime>,
}

/// Kind of question asked by a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Between two and eight labelled options.
    MultipleChoice,
    /// Exactly "Over" and "Under" around a numeric line.
    OverUnder,
}

/// Persisted prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptEntity {
    /// Stable identifier for the prompt.
    pub id: Uuid,
    /// Game night the prompt belongs to.
    pub game_night_id: Uuid,
    /// Host account that created the prompt.
    pub created_by_user_id: String,
    /// Question kind.
    pub kind: PromptKind,
    /// Question text.
    pub question: String,
    /// Line for over/under prompts.
    pub over_under_line: Option<f64>,
    /// Lifecycle state.
    pub state: PromptState,
    /// Set when the prompt is opened (or reopened).
    pub opens_at: Option<SystemTime>,
    /// `opens_at` plus the host-chosen duration.
    pub locks_at: Option<SystemTime>,
    /// Set on resolve and void, cleared on reopen.
    pub resolved_at: Option<SystemTime>,
    /// Creation timestamp, used to find the current prompt of a game night.
    pub created_at: SystemTime,
}

impl PromptEntity {
    /// Answer window, when both bounds are set.
    pub fn window(&self) -> Option<PromptWindow> {
        PromptWindow::from_bounds(self.opens_at, self.locks_at)
    }
}

/// One answer choice of a prompt. Options are never edited after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptOptionEntity {
    /// Stable identifier for the option.
    pub id: Uuid,
    /// Prompt the option belongs to.
    pub prompt_id: Uuid,
    /// Display label.
    pub label: String,
    /// Display order within the prompt.
    pub position: u32,
}

/// Anonymous participant of a game night.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatronEntity {
    /// Stable identifier for the patron.
    pub id: Uuid,
    /// Game night joined.
    pub game_night_id: Uuid,
    /// Display name.
    pub nickname: String,
    /// Join timestamp.
    pub joined_at: SystemTime,
}

/// A patron's answer to a prompt, unique per (prompt, patron).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionEntity {
    /// Prompt answered.
    pub prompt_id: Uuid,
    /// Patron answering.
    pub patron_id: Uuid,
    /// Chosen option.
    pub option_id: Uuid,
    /// Server-observed submission instant, immutable once written.
    pub created_at: SystemTime,
}

/// Host's declaration of the correct option, unique per prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolutionEntity {
    /// Prompt resolved.
    pub prompt_id: Uuid,
    /// Declared correct option.
    pub correct_option_id: Uuid,
    /// Host account that resolved the prompt.
    pub resolved_by_user_id: String,
    /// Last time the resolution was written.
    pub resolved_at: SystemTime,
}

/// Points earned by a patron on a prompt, unique per (prompt, patron).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Prompt scored.
    pub prompt_id: Uuid,
    /// Game night of the prompt, denormalised for leaderboards.
    pub game_night_id: Uuid,
    /// Patron scored.
    pub patron_id: Uuid,
    /// Point value.
    pub points: u32,
    /// Reason tag.
    pub reason: ScoreReason,
}

/// Aggregated points of a patron over a game night.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRowEntity {
    /// Patron.
    pub patron_id: Uuid,
    /// Patron display name.
    pub nickname: String,
    /// Sum of the patron's score rows (zero when none).
    pub total_points: u64,
}

/// Audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticEventEntity {
    /// Event identifier.
    pub id: Uuid,
    /// Event kind (e.g. `prompt_resolved`).
    pub kind: String,
    /// Acting host account, if any.
    pub user_id: Option<String>,
    /// Game night concerned, if any.
    pub game_night_id: Option<Uuid>,
    /// Free-form payload.
    pub payload: serde_json::Value,
    /// Emission timestamp.
    pub created_at: SystemTime,
}

/// Tri-state change applied to an optional column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the stored value as is.
    Keep,
    /// Overwrite with a new value.
    Set(T),
    /// Reset to unset.
    Clear,
}

impl<T: Copy> FieldUpdate<T> {
    /// Apply the change to `slot`.
    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(value) => *slot = Some(value),
            FieldUpdate::Clear => *slot = None,
        }
    }
}

/// State flip written by `set_prompt_state`. The window bounds are always replaced together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptStateUpdate {
    /// New state.
    pub state: PromptState,
    /// Replacement window, `None` to keep the stored bounds.
    pub window: Option<PromptWindow>,
    /// `resolved_at` change.
    pub resolved_at: FieldUpdate<SystemTime>,
}

impl PromptStateUpdate {
    /// Change the state only.
    pub fn state_only(state: PromptState) -> Self {
        Self {
            state,
            window: None,
            resolved_at: FieldUpdate::Keep,
        }
    }

    /// Apply the update to an in-memory prompt.
    pub fn apply_to(&self, prompt: &mut PromptEntity) {
        prompt.state = self.state;
        if let Some(window) = self.window {
            prompt.opens_at = Some(window.opens_at);
            prompt.locks_at = Some(window.locks_at);
        }
        self.resolved_at.apply_to(&mut prompt.resolved_at);
    }
}
