use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, DateTime, Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        BARS, EVENTS, GAME_NIGHTS, MongoBarDocument, MongoEventDocument, MongoGameNightDocument,
        MongoOptionDocument, MongoPatronDocument, MongoPromptDocument, MongoResolutionDocument,
        MongoScoreDocument, MongoSubmissionDocument, PATRONS, PROMPT_OPTIONS, PROMPTS,
        RESOLUTIONS, SCORES, SUBMISSIONS, id_str, into_entities,
    },
};
use crate::dao::{
    models::{
        AnalyticEventEntity, BarEntity, FieldUpdate, GameNightEntity, GameNightStatus,
        LeaderboardRowEntity, PatronEntity, PromptEntity, PromptOptionEntity, PromptStateUpdate,
        ResolutionEntity, ScoreEntity, SubmissionEntity,
    },
    prompt_store::PromptStore,
    storage::StorageResult,
};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

fn by_id(id: Uuid) -> Document {
    doc! { "_id": id_str(id) }
}

fn by_prompt_and_patron(prompt_id: Uuid, patron_id: Uuid) -> Document {
    doc! { "prompt_id": id_str(prompt_id), "patron_id": id_str(patron_id) }
}

#[derive(Clone)]
pub struct MongoPromptStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPromptStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes: [(&'static str, &'static str, Document, bool); 7] = [
            (GAME_NIGHTS, "game_night_code_idx", doc! { "code": 1 }, true),
            (PROMPTS, "prompt_game_night_idx", doc! { "game_night_id": 1, "created_at": 1 }, false),
            (PROMPT_OPTIONS, "option_prompt_idx", doc! { "prompt_id": 1, "position": 1 }, false),
            (PATRONS, "patron_game_night_idx", doc! { "game_night_id": 1 }, false),
            (SUBMISSIONS, "submission_prompt_patron_idx", doc! { "prompt_id": 1, "patron_id": 1 }, true),
            (SCORES, "score_prompt_patron_idx", doc! { "prompt_id": 1, "patron_id": 1 }, true),
            (SCORES, "score_game_night_idx", doc! { "game_night_id": 1 }, false),
        ];

        let database = self.database().await;
        for (collection, name, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_one_as<D, E>(&self, collection: &'static str, filter: Document) -> MongoResult<Option<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        self.collection::<D>(collection)
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })?
            .map(E::try_from)
            .transpose()
    }

    async fn find_many_as<D, E>(
        &self,
        collection: &'static str,
        filter: Document,
        sort: Document,
    ) -> MongoResult<Vec<E>>
    where
        D: DeserializeOwned + Send + Sync,
        E: TryFrom<D, Error = MongoDaoError>,
    {
        let documents: Vec<D> = self
            .collection::<D>(collection)
            .await
            .find(filter)
            .sort(sort)
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })?;

        into_entities(documents)
    }

    async fn insert<D: Serialize + Send + Sync>(
        &self,
        collection: &'static str,
        document: D,
    ) -> MongoResult<()> {
        self.collection::<D>(collection)
            .await
            .insert_one(document)
            .await
            .map_err(|source| MongoDaoError::Write { collection, source })?;
        Ok(())
    }

    /// Insert into a collection guarded by a unique index. `false` means the key already exists.
    async fn insert_unique<D: Serialize + Send + Sync>(
        &self,
        collection: &'static str,
        document: D,
    ) -> MongoResult<bool> {
        match self.collection::<D>(collection).await.insert_one(document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write { collection, source }),
        }
    }

    async fn replace<D: Serialize + Send + Sync>(
        &self,
        collection: &'static str,
        filter: Document,
        document: D,
    ) -> MongoResult<()> {
        self.collection::<D>(collection)
            .await
            .replace_one(filter, document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write { collection, source })?;
        Ok(())
    }

    async fn update(&self, collection: &'static str, filter: Document, update: Document) -> MongoResult<()> {
        self.collection::<Document>(collection)
            .await
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::Write { collection, source })?;
        Ok(())
    }

    async fn delete_many(&self, collection: &'static str, filter: Document) -> MongoResult<()> {
        self.collection::<Document>(collection)
            .await
            .delete_many(filter)
            .await
            .map_err(|source| MongoDaoError::Write { collection, source })?;
        Ok(())
    }

    async fn insert_prompt(
        &self,
        prompt: PromptEntity,
        options: Vec<PromptOptionEntity>,
    ) -> MongoResult<()> {
        // Options first: a prompt is never visible without its options.
        if !options.is_empty() {
            let documents: Vec<MongoOptionDocument> = options.into_iter().map(Into::into).collect();
            self.collection::<MongoOptionDocument>(PROMPT_OPTIONS)
                .await
                .insert_many(documents)
                .await
                .map_err(|source| MongoDaoError::Write {
                    collection: PROMPT_OPTIONS,
                    source,
                })?;
        }
        self.insert(PROMPTS, MongoPromptDocument::from(prompt)).await
    }

    async fn set_prompt_state(&self, id: Uuid, update: PromptStateUpdate) -> MongoResult<()> {
        let mut set = doc! { "state": update.state.as_str() };
        if let Some(window) = update.window {
            set.insert("opens_at", DateTime::from_system_time(window.opens_at));
            set.insert("locks_at", DateTime::from_system_time(window.locks_at));
        }
        match update.resolved_at {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(at) => {
                set.insert("resolved_at", DateTime::from_system_time(at));
            }
            FieldUpdate::Clear => {
                set.insert("resolved_at", Bson::Null);
            }
        }

        self.update(PROMPTS, by_id(id), doc! { "$set": set }).await
    }

    async fn end_game_night(&self, id: Uuid, ended_at: SystemTime) -> MongoResult<()> {
        let set = doc! {
            "status": GameNightStatus::Ended.as_str(),
            "ended_at": DateTime::from_system_time(ended_at),
        };
        self.update(GAME_NIGHTS, by_id(id), doc! { "$set": set }).await
    }

    /// Replace the whole batch inside one transaction so a failure leaves no partial scores.
    /// Transactions need the deployment to run as a replica set.
    async fn upsert_scores(&self, scores: Vec<ScoreEntity>) -> MongoResult<()> {
        let write_error = |source: MongoError| MongoDaoError::Write {
            collection: SCORES,
            source,
        };
        let (client, collection) = {
            let guard = self.inner.state.read().await;
            (
                guard.client.clone(),
                guard.database.collection::<MongoScoreDocument>(SCORES),
            )
        };

        let mut session = client.start_session().await.map_err(write_error)?;
        session.start_transaction().await.map_err(write_error)?;
        for score in scores {
            let filter = by_prompt_and_patron(score.prompt_id, score.patron_id);
            let written = collection
                .replace_one(filter, MongoScoreDocument::from(score))
                .upsert(true)
                .session(&mut session)
                .await;
            if let Err(source) = written {
                if let Err(err) = session.abort_transaction().await {
                    warn!(error = %err, "failed to abort score transaction");
                }
                return Err(write_error(source));
            }
        }
        session.commit_transaction().await.map_err(write_error)
    }

    async fn leaderboard(&self, game_night_id: Uuid) -> MongoResult<Vec<LeaderboardRowEntity>> {
        let patrons: Vec<PatronEntity> = self
            .find_many_as::<MongoPatronDocument, _>(
                PATRONS,
                doc! { "game_night_id": id_str(game_night_id) },
                doc! { "joined_at": 1 },
            )
            .await?;
        let scores: Vec<ScoreEntity> = self
            .find_many_as::<MongoScoreDocument, _>(
                SCORES,
                doc! { "game_night_id": id_str(game_night_id) },
                doc! {},
            )
            .await?;

        let mut totals: HashMap<Uuid, u64> = HashMap::new();
        for score in scores {
            *totals.entry(score.patron_id).or_default() += u64::from(score.points);
        }

        let mut rows: Vec<LeaderboardRowEntity> = patrons
            .into_iter()
            .map(|patron| LeaderboardRowEntity {
                total_points: totals.get(&patron.id).copied().unwrap_or(0),
                patron_id: patron.id,
                nickname: patron.nickname,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.nickname.cmp(&b.nickname))
        });
        Ok(rows)
    }
}

macro_rules! boxed {
    ($store:expr, |$s:ident| $body:expr) => {{
        let $s = $store.clone();
        Box::pin(async move { $body.await.map_err(Into::into) })
    }};
}

impl PromptStore for MongoPromptStore {
    fn find_bar(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BarEntity>>> {
        boxed!(self, |store| store.find_one_as::<MongoBarDocument, _>(BARS, by_id(id)))
    }

    fn find_bar_by_owner(
        &self,
        owner_user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<BarEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let bars: Vec<BarEntity> = store
                .find_many_as::<MongoBarDocument, _>(
                    BARS,
                    doc! { "owner_user_id": owner_user_id },
                    doc! { "created_at": 1 },
                )
                .await?;
            Ok(bars.into_iter().next())
        })
    }

    fn insert_bar(&self, bar: BarEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.insert(BARS, MongoBarDocument::from(bar)))
    }

    fn insert_game_night(
        &self,
        game_night: GameNightEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, |store| store
            .insert_unique(GAME_NIGHTS, MongoGameNightDocument::from(game_night)))
    }

    fn find_game_night(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameNightEntity>>> {
        boxed!(self, |store| store
            .find_one_as::<MongoGameNightDocument, _>(GAME_NIGHTS, by_id(id)))
    }

    fn find_game_night_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameNightEntity>>> {
        boxed!(self, |store| store
            .find_one_as::<MongoGameNightDocument, _>(GAME_NIGHTS, doc! { "code": code }))
    }

    fn end_game_night(
        &self,
        id: Uuid,
        ended_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.end_game_night(id, ended_at))
    }

    fn insert_prompt(
        &self,
        prompt: PromptEntity,
        options: Vec<PromptOptionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.insert_prompt(prompt, options))
    }

    fn find_prompt(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PromptEntity>>> {
        boxed!(self, |store| store.find_one_as::<MongoPromptDocument, _>(PROMPTS, by_id(id)))
    }

    fn find_prompts(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>> {
        boxed!(self, |store| store.find_many_as::<MongoPromptDocument, _>(
            PROMPTS,
            doc! { "game_night_id": id_str(game_night_id) },
            doc! { "created_at": 1 },
        ))
    }

    fn find_latest_prompt(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<PromptEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .collection::<MongoPromptDocument>(PROMPTS)
                .await
                .find_one(doc! { "game_night_id": id_str(game_night_id) })
                .sort(doc! { "created_at": -1 })
                .await
                .map_err(|source| MongoDaoError::Read {
                    collection: PROMPTS,
                    source,
                })?;
            Ok(document.map(PromptEntity::try_from).transpose()?)
        })
    }

    fn set_prompt_state(
        &self,
        id: Uuid,
        update: PromptStateUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.set_prompt_state(id, update))
    }

    fn find_options(
        &self,
        prompt_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PromptOptionEntity>>> {
        boxed!(self, |store| store.find_many_as::<MongoOptionDocument, _>(
            PROMPT_OPTIONS,
            doc! { "prompt_id": id_str(prompt_id) },
            doc! { "position": 1 },
        ))
    }

    fn insert_patron(&self, patron: PatronEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.insert(PATRONS, MongoPatronDocument::from(patron)))
    }

    fn find_patron(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PatronEntity>>> {
        boxed!(self, |store| store.find_one_as::<MongoPatronDocument, _>(PATRONS, by_id(id)))
    }

    fn find_patrons(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PatronEntity>>> {
        boxed!(self, |store| store.find_many_as::<MongoPatronDocument, _>(
            PATRONS,
            doc! { "game_night_id": id_str(game_night_id) },
            doc! { "joined_at": 1 },
        ))
    }

    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        boxed!(self, |store| store
            .insert_unique(SUBMISSIONS, MongoSubmissionDocument::from(submission)))
    }

    fn find_submissions(
        &self,
        prompt_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        boxed!(self, |store| store.find_many_as::<MongoSubmissionDocument, _>(
            SUBMISSIONS,
            doc! { "prompt_id": id_str(prompt_id) },
            doc! { "created_at": 1 },
        ))
    }

    fn upsert_resolution(
        &self,
        resolution: ResolutionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.replace(
            RESOLUTIONS,
            by_id(resolution.prompt_id),
            MongoResolutionDocument::from(resolution),
        ))
    }

    fn find_resolution(
        &self,
        prompt_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ResolutionEntity>>> {
        boxed!(self, |store| store
            .find_one_as::<MongoResolutionDocument, _>(RESOLUTIONS, by_id(prompt_id)))
    }

    fn delete_resolution(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.delete_many(RESOLUTIONS, by_id(prompt_id)))
    }

    fn upsert_scores(&self, scores: Vec<ScoreEntity>) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.upsert_scores(scores))
    }

    fn find_scores(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        boxed!(self, |store| store.find_many_as::<MongoScoreDocument, _>(
            SCORES,
            doc! { "prompt_id": id_str(prompt_id) },
            doc! {},
        ))
    }

    fn delete_scores(&self, prompt_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store
            .delete_many(SCORES, doc! { "prompt_id": id_str(prompt_id) }))
    }

    fn leaderboard(
        &self,
        game_night_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardRowEntity>>> {
        boxed!(self, |store| store.leaderboard(game_night_id))
    }

    fn record_event(&self, event: AnalyticEventEntity) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.insert(EVENTS, MongoEventDocument::from(event)))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.inner.ping())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        boxed!(self, |store| store.inner.reconnect())
    }
}
