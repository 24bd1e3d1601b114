//! Prompt authoring, host lifecycle transitions and patron submissions.
//!
//! Host transitions run through [`run_prompt_transition`] so that concurrent requests on the
//! same prompt are applied one at a time. Every call re-reads the prompt from the store.

use std::{sync::Arc, time::Duration};

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::HostIdentity,
    dao::{
        models::{GameNightEntity, PromptEntity, PromptKind, PromptOptionEntity, SubmissionEntity},
        prompt_store::PromptStore,
    },
    dto::{
        common::{CountdownView, OptionView, PromptSummary},
        format_system_time,
        host::{CreatePromptRequest, OpenPromptRequest},
        patron::{
            CurrentPromptResponse, MyPoints, PatronPromptView, SubmissionReceipt,
            SubmitAnswerRequest,
        },
    },
    error::ServiceError,
    services::{
        audit::{AuditKind, log_event},
        game_night_service::{ensure_active, load_game_night_by_code, load_owned_game_night},
    },
    state::{
        SharedState,
        state_machine::{PromptEvent, PromptState, PromptStateMachine},
        transitions::{apply_plan, run_prompt_transition},
    },
};

/// Most options a multiple-choice prompt keeps.
pub const MAX_OPTIONS: usize = 8;
/// Fewest options a multiple-choice prompt needs.
pub const MIN_OPTIONS: usize = 2;
const OVER_LABEL: &str = "Over";
const UNDER_LABEL: &str = "Under";

/// Load a prompt and check that `host` owns its game night.
pub(crate) async fn load_owned_prompt(
    store: &Arc<dyn PromptStore>,
    host: &HostIdentity,
    prompt_id: Uuid,
) -> Result<(PromptEntity, GameNightEntity), ServiceError> {
    let prompt = store
        .find_prompt(prompt_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("prompt `{prompt_id}` not found")))?;
    let game_night = load_owned_game_night(store, host, prompt.game_night_id).await?;
    Ok((prompt, game_night))
}

/// Option labels for a new prompt: trimmed, blanks dropped, capped at [`MAX_OPTIONS`].
fn option_labels(
    kind: PromptKind,
    options: &[String],
    over_under_line: Option<f64>,
) -> Result<Vec<String>, ServiceError> {
    match kind {
        PromptKind::MultipleChoice => {
            let labels: Vec<String> = options
                .iter()
                .map(|label| label.trim())
                .filter(|label| !label.is_empty())
                .take(MAX_OPTIONS)
                .map(str::to_owned)
                .collect();
            if labels.len() < MIN_OPTIONS {
                return Err(ServiceError::InvalidInput(format!(
                    "multiple choice prompts need at least {MIN_OPTIONS} options"
                )));
            }
            Ok(labels)
        }
        PromptKind::OverUnder => match over_under_line {
            Some(line) if line.is_finite() => Ok(vec![OVER_LABEL.into(), UNDER_LABEL.into()]),
            _ => Err(ServiceError::InvalidInput(
                "over/under prompts need a numeric line".into(),
            )),
        },
    }
}

/// Draft a prompt on one of the host's running game nights.
pub async fn create_prompt(
    state: &SharedState,
    host: &HostIdentity,
    payload: CreatePromptRequest,
) -> Result<PromptSummary, ServiceError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(ServiceError::InvalidInput("question required".into()));
    }
    let labels = option_labels(payload.kind, &payload.options, payload.over_under_line)?;

    let store = state.require_store().await?;
    let game_night = load_owned_game_night(&store, host, payload.game_night_id).await?;
    ensure_active(&game_night)?;

    let prompt = PromptEntity {
        id: Uuid::new_v4(),
        game_night_id: game_night.id,
        created_by_user_id: host.user_id.clone(),
        kind: payload.kind,
        question: question.to_owned(),
        over_under_line: match payload.kind {
            PromptKind::OverUnder => payload.over_under_line,
            PromptKind::MultipleChoice => None,
        },
        state: PromptState::Draft,
        opens_at: None,
        locks_at: None,
        resolved_at: None,
        created_at: state.now(),
    };
    let options: Vec<PromptOptionEntity> = labels
        .into_iter()
        .enumerate()
        .map(|(position, label)| PromptOptionEntity {
            id: Uuid::new_v4(),
            prompt_id: prompt.id,
            label,
            position: position as u32,
        })
        .collect();

    store.insert_prompt(prompt.clone(), options.clone()).await?;
    info!(prompt_id = %prompt.id, game_night_id = %game_night.id, "prompt created");
    log_event(
        state,
        AuditKind::PromptCreated,
        Some(&host.user_id),
        Some(game_night.id),
        json!({ "prompt_id": prompt.id, "kind": prompt.kind }),
    )
    .await;

    Ok(PromptSummary::from_entity(&prompt, &options))
}

/// Apply a host event that does not involve scoring.
async fn transition(
    state: &SharedState,
    host: &HostIdentity,
    prompt_id: Uuid,
    event: PromptEvent,
    action: &'static str,
    audit: AuditKind,
) -> Result<PromptSummary, ServiceError> {
    run_prompt_transition(state, prompt_id, action, move || async move {
        let store = state.require_store().await?;
        let (mut prompt, game_night) = load_owned_prompt(&store, host, prompt_id).await?;
        if matches!(event, PromptEvent::Open { .. } | PromptEvent::Reopen { .. }) {
            ensure_active(&game_night)?;
        }

        let plan = PromptStateMachine::new(prompt.state).plan(event)?;
        let options = store.find_options(prompt_id).await?;
        let update = apply_plan(&store, prompt_id, &plan, state.now()).await?;
        update.apply_to(&mut prompt);

        let mut payload = json!({ "prompt_id": prompt_id, "from": plan.from, "to": plan.to });
        if let Some(window) = update.window {
            payload["locks_at"] = json!(format_system_time(window.locks_at));
        }
        log_event(state, audit, Some(&host.user_id), Some(game_night.id), payload).await;
        Ok(PromptSummary::from_entity(&prompt, &options))
    })
    .await
}

/// Start the countdown of a draft prompt.
pub async fn open_prompt(
    state: &SharedState,
    host: &HostIdentity,
    prompt_id: Uuid,
    payload: OpenPromptRequest,
) -> Result<PromptSummary, ServiceError> {
    let duration = Duration::from_secs(payload.duration_secs);
    transition(
        state,
        host,
        prompt_id,
        PromptEvent::Open { duration },
        "open",
        AuditKind::PromptOpened,
    )
    .await
}

/// Stop accepting submissions.
pub async fn lock_prompt(
    state: &SharedState,
    host: &HostIdentity,
    prompt_id: Uuid,
) -> Result<PromptSummary, ServiceError> {
    transition(
        state,
        host,
        prompt_id,
        PromptEvent::Lock,
        "lock",
        AuditKind::PromptLocked,
    )
    .await
}

/// Cancel a prompt, dropping its resolution and scores.
pub async fn void_prompt(
    state: &SharedState,
    host: &HostIdentity,
    prompt_id: Uuid,
) -> Result<PromptSummary, ServiceError> {
    transition(
        state,
        host,
        prompt_id,
        PromptEvent::Void,
        "void",
        AuditKind::PromptVoided,
    )
    .await
}

/// Restart the countdown of a locked or resolved prompt, dropping its resolution and scores.
pub async fn reopen_prompt(
    state: &SharedState,
    host: &HostIdentity,
    prompt_id: Uuid,
    payload: OpenPromptRequest,
) -> Result<PromptSummary, ServiceError> {
    let duration = Duration::from_secs(payload.duration_secs);
    transition(
        state,
        host,
        prompt_id,
        PromptEvent::Reopen { duration },
        "reopen",
        AuditKind::PromptReopened,
    )
    .await
}

/// Record a patron's answer. The submission instant is taken from the server clock.
pub async fn submit_answer(
    state: &SharedState,
    code: &str,
    payload: SubmitAnswerRequest,
) -> Result<SubmissionReceipt, ServiceError> {
    let store = state.require_store().await?;
    let game_night = load_game_night_by_code(&store, code).await?;
    ensure_active(&game_night)?;

    let patron = store
        .find_patron(payload.patron_id)
        .await?
        .filter(|patron| patron.game_night_id == game_night.id)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("patron `{}` not found", payload.patron_id))
        })?;

    let prompt = store
        .find_prompt(payload.prompt_id)
        .await?
        .filter(|prompt| prompt.game_night_id == game_night.id)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("prompt `{}` not found", payload.prompt_id))
        })?;

    let now = state.now();
    if !prompt.state.accepts_submissions() {
        return Err(ServiceError::InvalidState(format!(
            "prompt is {}, answers are closed",
            prompt.state.as_str()
        )));
    }
    let window = prompt
        .window()
        .ok_or_else(|| ServiceError::InvalidState("prompt has no answer window".into()))?;
    if window.has_elapsed(now) {
        return Err(ServiceError::InvalidState("answer window has closed".into()));
    }

    let options = store.find_options(prompt.id).await?;
    if !options.iter().any(|option| option.id == payload.option_id) {
        return Err(ServiceError::InvalidInput(format!(
            "option `{}` does not belong to prompt `{}`",
            payload.option_id, prompt.id
        )));
    }

    let submission = SubmissionEntity {
        prompt_id: prompt.id,
        patron_id: patron.id,
        option_id: payload.option_id,
        created_at: now,
    };
    if !store.insert_submission(submission).await? {
        return Err(ServiceError::InvalidState(
            "an answer was already submitted for this prompt".into(),
        ));
    }

    Ok(SubmissionReceipt {
        prompt_id: prompt.id,
        option_id: payload.option_id,
        submitted_at: format_system_time(now),
        potential_points: state.scoring().speed_points(&window, now),
    })
}

/// The latest prompt of a game night as a patron sees it.
pub async fn current_prompt(
    state: &SharedState,
    code: &str,
    patron_id: Option<Uuid>,
) -> Result<CurrentPromptResponse, ServiceError> {
    let store = state.require_store().await?;
    let game_night = load_game_night_by_code(&store, code).await?;

    let prompt = match store.find_latest_prompt(game_night.id).await? {
        Some(prompt) => Some(patron_view(state, &store, prompt, patron_id).await?),
        None => None,
    };

    Ok(CurrentPromptResponse {
        code: game_night.code,
        title: game_night.title,
        status: game_night.status,
        prompt,
    })
}

async fn patron_view(
    state: &SharedState,
    store: &Arc<dyn PromptStore>,
    prompt: PromptEntity,
    patron_id: Option<Uuid>,
) -> Result<PatronPromptView, ServiceError> {
    let now = state.now();
    let options = store.find_options(prompt.id).await?;
    let countdown = prompt.window().map(|window| {
        CountdownView::new(&window, now, state.scoring(), prompt.state == PromptState::Open)
    });

    let my_option_id = match patron_id {
        Some(patron_id) => store
            .find_submissions(prompt.id)
            .await?
            .into_iter()
            .find(|submission| submission.patron_id == patron_id)
            .map(|submission| submission.option_id),
        None => None,
    };

    let (correct_option_id, my_points) = if prompt.state == PromptState::Resolved {
        let correct = store
            .find_resolution(prompt.id)
            .await?
            .map(|resolution| resolution.correct_option_id);
        let mine = match patron_id {
            Some(patron_id) => store
                .find_scores(prompt.id)
                .await?
                .into_iter()
                .find(|score| score.patron_id == patron_id)
                .map(|score| MyPoints {
                    points: score.points,
                    reason: score.reason,
                }),
            None => None,
        };
        (correct, mine)
    } else {
        (None, None)
    };

    Ok(PatronPromptView {
        id: prompt.id,
        kind: prompt.kind,
        question: prompt.question,
        over_under_line: prompt.over_under_line,
        state: prompt.state,
        options: options.iter().map(OptionView::from).collect(),
        countdown,
        my_option_id,
        correct_option_id,
        my_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_choice_labels_are_cleaned() {
        let raw: Vec<String> = ["  Lakers ", "", "Celtics", "   "]
            .into_iter()
            .map(String::from)
            .collect();
        let labels = option_labels(PromptKind::MultipleChoice, &raw, None).unwrap();
        assert_eq!(labels, vec!["Lakers", "Celtics"]);
    }

    #[test]
    fn multiple_choice_keeps_at_most_eight() {
        let raw: Vec<String> = (1..=10).map(|n| format!("Option {n}")).collect();
        let labels = option_labels(PromptKind::MultipleChoice, &raw, None).unwrap();
        assert_eq!(labels.len(), MAX_OPTIONS);
        assert_eq!(labels.last().map(String::as_str), Some("Option 8"));
    }

    #[test]
    fn multiple_choice_needs_two_options() {
        let raw = vec!["Only one".to_string(), " ".to_string()];
        assert!(matches!(
            option_labels(PromptKind::MultipleChoice, &raw, None),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn over_under_gets_fixed_labels_and_needs_a_line() {
        let labels = option_labels(PromptKind::OverUnder, &[], Some(221.5)).unwrap();
        assert_eq!(labels, vec![OVER_LABEL, UNDER_LABEL]);
        assert!(option_labels(PromptKind::OverUnder, &[], None).is_err());
        assert!(option_labels(PromptKind::OverUnder, &[], Some(f64::NAN)).is_err());
    }
}
