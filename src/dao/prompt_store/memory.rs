//! In-process [`PromptStore`] used when no database is configured and by the test-suite.

use std::{
    cmp::Reverse,
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{
        AnalyticEventEntity, BarEntity, GameNightEntity, GameNightStatus, LeaderboardRowEntity,
        PatronEntity, PromptEntity, PromptOptionEntity, PromptStateUpdate, ResolutionEntity,
        ScoreEntity, SubmissionEntity,
    },
    prompt_store::PromptStore,
    storage::{StorageError, StorageResult},
};

/// Failure injected through [`MemoryPromptStore::set_unavailable`],
/// [`MemoryPromptStore::fail_score_writes`] or [`MemoryPromptStore::fail_event_writes`].
#[derive(Debug, Error)]
#[error("in-memory store rejected `{operation}`")]
pub struct MemoryStoreError {
    operation: &'static str,
}

#[derive(Default)]
struct Tables {
    bars: IndexMap<Uuid, BarEntity>,
    game_nights: IndexMap<Uuid, GameNightEntity>,
    prompts: IndexMap<Uuid, PromptEntity>,
    options: IndexMap<Uuid, PromptOptionEntity>,
    patrons: IndexMap<Uuid, PatronEntity>,
    submissions: IndexMap<(Uuid, Uuid), SubmissionEntity>,
    resolutions: IndexMap<Uuid, ResolutionEntity>,
    scores: IndexMap<(Uuid, Uuid), ScoreEntity>,
    events: Vec<AnalyticEventEntity>,
}

#[derive(Default)]
struct MemoryInner {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    fail_score_writes: AtomicBool,
    fail_event_writes: AtomicBool,
    score_delete_delay_ms: AtomicU64,
}

impl MemoryInner {
    fn check(&self, operation: &'static str) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(injected(operation));
        }
        Ok(())
    }
}

fn injected(operation: &'static str) -> StorageError {
    StorageError::unavailable(
        format!("`{operation}` failed"),
        MemoryStoreError { operation },
    )
}

/// Prompt store keeping every table in memory behind a single lock, so batch writes are atomic.
#[derive(Clone, Default)]
pub struct MemoryPromptStore {
    inner: Arc<MemoryInner>,
}

impl MemoryPromptStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make score upserts fail until reset, leaving every other operation working.
    pub fn fail_score_writes(&self, fail: bool) {
        self.inner.fail_score_writes.store(fail, Ordering::SeqCst);
    }

    /// Make audit event writes fail until reset.
    pub fn fail_event_writes(&self, fail: bool) {
        self.inner.fail_event_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every `delete_scores` call for `delay` before it touches the tables.
    pub fn delay_score_deletes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.score_delete_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Audit events recorded so far, oldest first.
    pub async fn recorded_events(&self) -> Vec<AnalyticEventEntity> {
        self.inner.tables.read().await.events.clone()
    }

    fn read<T, F>(&self, operation: &'static str, f: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Tables) -> T + Send + 'static,
    {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.check(operation)?;
            let tables = inner.tables.read().await;
            Ok(f(&tables))
        })
    }

    fn write<T, F>(&self, operation: &'static str, f: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Tables) -> StorageResult<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.check(operation)?;
            let mut tables = inner.tables.write().await;
            f(&mut tables)
        })
    }
}

impl PromptStore for MemoryPromptStore {
    fn find_bar(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BarEntity>>> {
        self.read("find_bar", move |t| t.bars.get(&id).cloned())
    }

    fn find_bar_by_owner(
        &self,
        owner_user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<BarEntity>>> {
        self.read("find_bar_by_owner", move |t| {
            t.bars
                .values()
                .filter(|bar| bar.owner_user_id == owner_user_id)
                .min_by_key(|bar| bar.created_at)
                .cloned()
        })
    }

    fn insert_bar(&self, bar: BarEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write("insert_bar", move |t| {
            t.bars.insert(bar.id, bar);
            Ok(())
        })
    }

    fn insert_game_night(
        &self,
        game_night: GameNightEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.write("insert_game_night", move |t| {
            if t.game_nights.values().any(|gn| gn.code == game_night.code) {
                return Ok(false);
            }
            t.game_nights.insert(game_night.id, game_night);
            Ok(true)
        })
    }

    fn find_game_night(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameNightEntity>>> {
        self.read("find_game_night", move |t| t.game_nights.get(&id).cloned())
    }

    fn find_game_night_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameNightEntity>>> {
        self.read("find_game_night_by_code", move |t| {
            t.game_nights.values().find(|gn| gn.code == code).cloned()
        })
    }

    fn end_game_night(
        &self,
        id: Uuid,
        ended_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write("end_game_night", move |t| {
            if let Some(game_night) = t.game_nights.get_mut(&id) {
                game_night.status = GameNightStatus::Ended;
                game_night.ended_at = Some(ended_at);
            }
            Ok(())
        })
    }

    fn insert_prompt(
        &self,
        prompt: PromptEntity,
        options: Vec<PromptOptionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write("insert_prompt", move |t| {
            t.prompts.insert(prompt.id, prompt);
            for option in options {
                t.options.insert(option.id, option);
            }
            Ok(())
        })
    }

    fn find_prompt(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PromptEntity>>> {
        self.read("find_prompt", move |t| t.prompts.get(&id).cloned())
    }

    fn find_prompts(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>> {
        self.read("find_prompts", move |t| {
            t.prompts
                .values()
                .filter(|prompt| prompt.game_night_id == game_night_id)
                .cloned()
                .collect()
        })
    }

    fn find_latest_prompt(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PromptEntity>>> {
        self.read("find_latest_prompt", move |t| {
            // Insertion order breaks ties between prompts created within the same instant.
            t.prompts
                .values()
                .enumerate()
                .filter(|(_, prompt)| prompt.game_night_id == game_night_id)
                .max_by_key(|(index, prompt)| (prompt.created_at, *index))
                .map(|(_, prompt)| prompt.clone())
        })
    }

    fn set_prompt_state(
        &self,
        id: Uuid,
        update: PromptStateUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write("set_prompt_state", move |t| {
            if let Some(prompt) = t.prompts.get_mut(&id) {
                update.apply_to(prompt);
            }
            Ok(())
        })
    }

    fn find_options(
        &self,
        prompt_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PromptOptionEntity>>> {
        self.read("find_options", move |t| {
            let mut options: Vec<_> = t
                .options
                .values()
                .filter(|option| option.prompt_id == prompt_id)
                .cloned()
                .collect();
            options.sort_by_key(|option| option.position);
            options
        })
    }

    fn insert_patron(&self, patron: PatronEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write("insert_patron", move |t| {
            t.patrons.insert(patron.id, patron);
            Ok(())
        })
    }

    fn find_patron(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PatronEntity>>> {
        self.read("find_patron", move |t| t.patrons.get(&id).cloned())
    }

    fn find_patrons(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PatronEntity>>> {
        self.read("find_patrons", move |t| {
            t.patrons
                .values()
                .filter(|patron| patron.game_night_id == game_night_id)
                .cloned()
                .collect()
        })
    }

    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.write("insert_submission", move |t| {
            let key = (submission.prompt_id, submission.patron_id);
            if t.submissions.contains_key(&key) {
                return Ok(false);
            }
            t.submissions.insert(key, submission);
            Ok(true)
        })
    }

    fn find_submissions(
        &self,
        prompt_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        self.read("find_submissions", move |t| {
            t.submissions
                .values()
                .filter(|submission| submission.prompt_id == prompt_id)
                .cloned()
                .collect()
        })
    }

    fn upsert_resolution(
        &self,
        resolution: ResolutionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write("upsert_resolution", move |t| {
            t.resolutions.insert(resolution.prompt_id, resolution);
            Ok(())
        })
    }

    fn find_resolution(
        &self,
        prompt_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResolutionEntity>>> {
        self.read("find_resolution", move |t| {
            t.resolutions.get(&prompt_id).cloned()
        })
    }

    fn delete_resolution(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.write("delete_resolution", move |t| {
            t.resolutions.shift_remove(&prompt_id);
            Ok(())
        })
    }

    fn upsert_scores(&self, scores: Vec<ScoreEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let fail = self.inner.fail_score_writes.load(Ordering::SeqCst);
        self.write("upsert_scores", move |t| {
            if fail {
                return Err(injected("upsert_scores"));
            }
            for score in scores {
                t.scores.insert((score.prompt_id, score.patron_id), score);
            }
            Ok(())
        })
    }

    fn find_scores(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        self.read("find_scores", move |t| {
            t.scores
                .values()
                .filter(|score| score.prompt_id == prompt_id)
                .cloned()
                .collect()
        })
    }

    fn delete_scores(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let delay = Duration::from_millis(self.inner.score_delete_delay_ms.load(Ordering::SeqCst));
        let delete = self.write("delete_scores", move |t| {
            t.scores.retain(|(score_prompt_id, _), _| *score_prompt_id != prompt_id);
            Ok(())
        });
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            delete.await
        })
    }

    fn leaderboard(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardRowEntity>>> {
        self.read("leaderboard", move |t| {
            let mut totals: HashMap<Uuid, u64> = HashMap::new();
            for score in t.scores.values() {
                if score.game_night_id == game_night_id {
                    *totals.entry(score.patron_id).or_default() += u64::from(score.points);
                }
            }

            let mut rows: Vec<LeaderboardRowEntity> = t
                .patrons
                .values()
                .filter(|patron| patron.game_night_id == game_night_id)
                .map(|patron| LeaderboardRowEntity {
                    patron_id: patron.id,
                    nickname: patron.nickname.clone(),
                    total_points: totals.get(&patron.id).copied().unwrap_or(0),
                })
                .collect();
            rows.sort_by(|a, b| {
                (Reverse(a.total_points), &a.nickname).cmp(&(Reverse(b.total_points), &b.nickname))
            });
            rows
        })
    }

    fn record_event(&self, event: AnalyticEventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let fail = self.inner.fail_event_writes.load(Ordering::SeqCst);
        self.write("record_event", move |t| {
            if fail {
                return Err(injected("record_event"));
            }
            t.events.push(event);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.check("health_check") })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.check("try_reconnect") })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::state::scoring::ScoreReason;

    fn score(prompt_id: Uuid, game_night_id: Uuid, patron_id: Uuid, points: u32) -> ScoreEntity {
        ScoreEntity {
            prompt_id,
            game_night_id,
            patron_id,
            points,
            reason: ScoreReason::CorrectSpeed,
        }
    }

    #[tokio::test]
    async fn duplicate_submission_keeps_first_timestamp() {
        let store = MemoryPromptStore::new();
        let (prompt_id, patron_id) = (Uuid::new_v4(), Uuid::new_v4());
        let first = SubmissionEntity {
            prompt_id,
            patron_id,
            option_id: Uuid::new_v4(),
            created_at: UNIX_EPOCH + Duration::from_secs(3),
        };
        let second = SubmissionEntity {
            created_at: UNIX_EPOCH + Duration::from_secs(9),
            ..first.clone()
        };

        assert!(store.insert_submission(first.clone()).await.unwrap());
        assert!(!store.insert_submission(second).await.unwrap());
        assert_eq!(store.find_submissions(prompt_id).await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn score_upsert_replaces_by_prompt_and_patron() {
        let store = MemoryPromptStore::new();
        let (prompt_id, game_night_id, patron_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store
            .upsert_scores(vec![score(prompt_id, game_night_id, patron_id, 10)])
            .await
            .unwrap();
        store
            .upsert_scores(vec![score(prompt_id, game_night_id, patron_id, 6)])
            .await
            .unwrap();

        let scores = store.find_scores(prompt_id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].points, 6);

        store.delete_scores(prompt_id).await.unwrap();
        assert!(store.find_scores(prompt_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_score_batch_writes_nothing() {
        let store = MemoryPromptStore::new();
        let prompt_id = Uuid::new_v4();
        store.fail_score_writes(true);

        let batch = vec![
            score(prompt_id, Uuid::nil(), Uuid::new_v4(), 10),
            score(prompt_id, Uuid::nil(), Uuid::new_v4(), 2),
        ];
        assert!(store.upsert_scores(batch).await.is_err());

        store.fail_score_writes(false);
        assert!(store.find_scores(prompt_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_game_night_code_is_refused() {
        let store = MemoryPromptStore::new();
        let game_night = GameNightEntity {
            id: Uuid::new_v4(),
            bar_id: Uuid::new_v4(),
            owner_user_id: "host-1".into(),
            code: "PUB42".into(),
            title: None,
            sport: "NBA".into(),
            external_game_id: None,
            status: GameNightStatus::Active,
            created_at: UNIX_EPOCH,
            ended_at: None,
        };
        let clash = GameNightEntity {
            id: Uuid::new_v4(),
            ..game_night.clone()
        };

        assert!(store.insert_game_night(game_night).await.unwrap());
        assert!(!store.insert_game_night(clash).await.unwrap());
    }

    #[tokio::test]
    async fn unavailable_store_rejects_everything() {
        let store = MemoryPromptStore::new();
        store.set_unavailable(true);
        assert!(store.health_check().await.is_err());
        assert!(store.find_prompt(Uuid::new_v4()).await.is_err());

        store.set_unavailable(false);
        assert!(store.health_check().await.is_ok());
    }
}
