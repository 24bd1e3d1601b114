//! Background task keeping a storage backend installed in the shared state.
//!
//! While no healthy store is available the application stays in degraded mode and every
//! store-backed endpoint answers `503`.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{prompt_store::PromptStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

/// Try to revive an installed store after a failed health check.
///
/// Enters degraded mode on the first failed attempt and returns whether the store came back.
async fn recover(state: &SharedState, store: &Arc<dyn PromptStore>) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnected after failed health check");
                state.update_degraded(false);
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }

    false
}

/// Connect to the storage backend, then poll its health for as long as the process runs.
///
/// A store that cannot be revived is removed from the state and `connect` is retried with
/// exponential backoff.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn PromptStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = next_delay(delay);
                continue;
            }
        };

        state.install_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        loop {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
                if !recover(&state, &store).await {
                    warn!("exhausted storage reconnect attempts; dropping store");
                    state.clear_store().await;
                    break;
                }
            } else if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
        }

        sleep(delay).await;
        delay = next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::prompt_store::memory::MemoryPromptStore, state::AppState};

    #[tokio::test]
    async fn installs_store_once_connected() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryPromptStore::new();

        let task = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok(Arc::new(store) as Arc<dyn PromptStore>) }
        }));

        let mut watcher = state.degraded_watcher();
        watcher.wait_for(|degraded| !degraded).await.unwrap();
        assert!(state.store().await.is_some());
        task.abort();
    }

    #[test]
    fn backoff_is_capped() {
        let mut delay = INITIAL_DELAY;
        for _ in 0..10 {
            delay = next_delay(delay);
        }
        assert_eq!(delay, MAX_DELAY);
    }
}
