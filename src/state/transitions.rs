use std::{future::Future, sync::Arc, time::Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{models::PromptStateUpdate, prompt_store::PromptStore},
    error::ServiceError,
    state::{SharedState, state_machine::Plan},
};

/// Execute a host transition on a prompt under its gate, logging the outcome.
pub async fn run_prompt_transition<F, Fut, T>(
    state: &SharedState,
    prompt_id: Uuid,
    action: &'static str,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let started = Instant::now();
    let result = state.run_gated(prompt_id, work).await;

    match &result {
        Ok(_) => debug!(
            prompt_id = %prompt_id,
            action,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prompt transition applied"
        ),
        Err(err) => warn!(
            prompt_id = %prompt_id,
            action,
            error = %err,
            "prompt transition failed"
        ),
    }

    result
}

/// Persist a plan that needs no scoring: clear results first when required, then flip the state.
pub async fn apply_plan(
    store: &Arc<dyn PromptStore>,
    prompt_id: Uuid,
    plan: &Plan,
    now: std::time::SystemTime,
) -> Result<PromptStateUpdate, ServiceError> {
    if plan.clear_results {
        store.delete_resolution(prompt_id).await?;
        store.delete_scores(prompt_id).await?;
    }

    let update = plan.update(now);
    store.set_prompt_state(prompt_id, update).await?;
    Ok(update)
}
