pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    AnalyticEventEntity, BarEntity, GameNightEntity, LeaderboardRowEntity, PatronEntity,
    PromptEntity, PromptOptionEntity, PromptStateUpdate, ResolutionEntity, ScoreEntity,
    SubmissionEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use std::time::SystemTime;
use uuid::Uuid;

/// Abstraction over the relational store holding bars, game nights, prompts, submissions,
/// resolutions and scores.
///
/// Every write scoped to a prompt is idempotent (upserts keyed on the natural key, or deletes
/// of every row of the prompt) so callers can retry a failed operation from the start.
pub trait PromptStore: Send + Sync {
    fn find_bar(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BarEntity>>>;
    fn find_bar_by_owner(
        &self,
        owner_user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<BarEntity>>>;
    fn insert_bar(&self, bar: BarEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Insert a game night. Returns `false` when the join code is already taken.
    fn insert_game_night(&self, game_night: GameNightEntity)
    -> BoxFuture<'static, StorageResult<bool>>;
    fn find_game_night(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<GameNightEntity>>>;
    fn find_game_night_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameNightEntity>>>;
    fn end_game_night(&self, id: Uuid, ended_at: SystemTime)
    -> BoxFuture<'static, StorageResult<()>>;

    /// Insert a prompt together with its options.
    fn insert_prompt(
        &self,
        prompt: PromptEntity,
        options: Vec<PromptOptionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_prompt(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PromptEntity>>>;
    /// Prompts of a game night in creation order.
    fn find_prompts(&self, game_night_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>>;
    /// Most recently created prompt of a game night.
    fn find_latest_prompt(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PromptEntity>>>;
    fn set_prompt_state(
        &self,
        id: Uuid,
        update: PromptStateUpdate,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Options of a prompt in display order.
    fn find_options(&self, prompt_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<PromptOptionEntity>>>;

    fn insert_patron(&self, patron: PatronEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_patron(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PatronEntity>>>;
    fn find_patrons(&self, game_night_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<PatronEntity>>>;

    /// Insert a submission. Returns `false` when the patron already answered this prompt; the
    /// stored submission is left untouched.
    fn insert_submission(&self, submission: SubmissionEntity)
    -> BoxFuture<'static, StorageResult<bool>>;
    fn find_submissions(&self, prompt_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>>;

    fn upsert_resolution(&self, resolution: ResolutionEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    fn find_resolution(
        &self,
        prompt_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResolutionEntity>>>;
    fn delete_resolution(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// Upsert a batch of scores keyed on (prompt, patron).
    fn upsert_scores(&self, scores: Vec<ScoreEntity>) -> BoxFuture<'static, StorageResult<()>>;
    fn find_scores(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    fn delete_scores(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Per-patron totals for a game night, patrons without scores included with zero.
    fn leaderboard(&self, game_night_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<LeaderboardRowEntity>>>;

    fn record_event(&self, event: AnalyticEventEntity) -> BoxFuture<'static, StorageResult<()>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
