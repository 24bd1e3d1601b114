pub mod scoring;
pub mod state_machine;
pub mod transitions;
pub mod window;

use std::{future::Future, sync::Arc, time::SystemTime};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::prompt_store::PromptStore,
    error::ServiceError,
    state::{
        scoring::ScoringRules,
        window::{Clock, SystemClock},
    },
};

#[cfg(feature = "sports-feed")]
use crate::services::feed_service::SportsFeedClient;

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, clock, configuration and per-prompt gates.
pub struct AppState {
    store: RwLock<Option<Arc<dyn PromptStore>>>,
    degraded: watch::Sender<bool>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    prompt_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    #[cfg(feature = "sports-feed")]
    feed: std::sync::OnceLock<SportsFeedClient>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            clock,
            config,
            prompt_gates: DashMap::new(),
            #[cfg(feature = "sports-feed")]
            feed: std::sync::OnceLock::new(),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn PromptStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn PromptStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn PromptStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub(crate) fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Current instant according to the injected clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Scoring constants.
    pub fn scoring(&self) -> &ScoringRules {
        self.config.scoring()
    }

    /// Play-by-play client, when one was installed at startup.
    #[cfg(feature = "sports-feed")]
    pub fn feed(&self) -> Option<&SportsFeedClient> {
        self.feed.get()
    }

    /// Install the play-by-play client. Only the first call has an effect.
    #[cfg(feature = "sports-feed")]
    pub fn install_feed(&self, client: SportsFeedClient) {
        let _ = self.feed.set(client);
    }

    /// Run `work` while holding the gate of `prompt_id`.
    ///
    /// Host transitions on the same prompt are serialized within this process; the store's
    /// idempotent writes cover concurrent callers in other processes. The configured timeout
    /// only bounds the wait for the gate: once `work` starts it always runs to completion, so a
    /// transition is never abandoned between two store writes.
    pub async fn run_gated<F, Fut, T>(&self, prompt_id: Uuid, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self
            .prompt_gates
            .entry(prompt_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let outcome = match self.config.transition_timeout() {
            Some(limit) => match timeout(limit, gate.lock()).await {
                Ok(_guard) => work().await,
                Err(_) => Err(ServiceError::Timeout),
            },
            None => {
                let _guard = gate.lock().await;
                work().await
            }
        };

        drop(gate);
        self.prompt_gates
            .remove_if(&prompt_id, |_, gate| Arc::strong_count(gate) == 1);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::prompt_store::memory::MemoryPromptStore;

    #[tokio::test]
    async fn starts_degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = state.degraded_watcher();
        state.install_store(Arc::new(MemoryPromptStore::new())).await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn waiting_for_a_busy_gate_times_out() {
        let config =
            AppConfig::default().with_transition_timeout(Some(Duration::from_millis(10)));
        let state = AppState::new(config);
        let prompt_id = Uuid::new_v4();

        let gate = Arc::new(Mutex::new(()));
        state.prompt_gates.insert(prompt_id, gate.clone());
        let held = gate.lock().await;

        let result: Result<(), ServiceError> =
            state.run_gated(prompt_id, || async { Ok(()) }).await;
        assert!(matches!(result, Err(ServiceError::Timeout)));
        drop(held);
    }

    #[tokio::test]
    async fn started_work_outlives_the_timeout() {
        let config =
            AppConfig::default().with_transition_timeout(Some(Duration::from_millis(10)));
        let state = AppState::new(config);

        let value = state
            .run_gated(Uuid::new_v4(), || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(3)
            })
            .await
            .unwrap();
        assert_eq!(value, 3);
        assert!(state.prompt_gates.is_empty());
    }

    #[tokio::test]
    async fn gate_is_released_after_work() {
        let state = AppState::new(AppConfig::default());
        let prompt_id = Uuid::new_v4();

        let value = state.run_gated(prompt_id, || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(state.prompt_gates.is_empty());
    }
}
