//! Resolution of a prompt: declare the correct option, score every submission, then mark the
//! prompt resolved.
//!
//! Writes happen in a fixed order (lock, resolution, scores, final state) so that a failure
//! part way leaves the prompt `locked` and a retry converges on the same rows.

use std::{collections::HashSet, time::SystemTime};

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::HostIdentity,
    dao::models::{PromptStateUpdate, ResolutionEntity, ScoreEntity, SubmissionEntity},
    dto::{
        common::PromptSummary,
        host::{ResolutionSummary, ResolvePromptRequest},
    },
    error::ServiceError,
    services::{
        audit::{AuditKind, log_event},
        prompt_service::load_owned_prompt,
    },
    state::{
        SharedState,
        scoring::{ScoreReason, ScoringRules},
        state_machine::{PromptEvent, PromptState, PromptStateMachine},
        transitions::run_prompt_transition,
        window::PromptWindow,
    },
};

/// One score row per submission made by a known patron of the game night.
///
/// Patrons who did not submit get no row; submissions from unknown patrons are skipped.
pub fn score_submissions(
    rules: &ScoringRules,
    window: Option<&PromptWindow>,
    patron_ids: &HashSet<Uuid>,
    submissions: &[SubmissionEntity],
    correct_option_id: Uuid,
    game_night_id: Uuid,
) -> Vec<ScoreEntity> {
    submissions
        .iter()
        .filter(|submission| patron_ids.contains(&submission.patron_id))
        .map(|submission| {
            let awarded = rules.score(
                window,
                submission.created_at,
                submission.option_id == correct_option_id,
            );
            ScoreEntity {
                prompt_id: submission.prompt_id,
                game_night_id,
                patron_id: submission.patron_id,
                points: awarded.points,
                reason: awarded.reason,
            }
        })
        .collect()
}

/// Declare the correct option of a prompt and score it. Resolving again re-scores in place.
pub async fn resolve_prompt(
    state: &SharedState,
    host: &HostIdentity,
    prompt_id: Uuid,
    payload: ResolvePromptRequest,
) -> Result<ResolutionSummary, ServiceError> {
    run_prompt_transition(state, prompt_id, "resolve", move || async move {
        let store = state.require_store().await?;
        let (prompt, game_night) = load_owned_prompt(&store, host, prompt_id).await?;

        let options = store.find_options(prompt_id).await?;
        if !options
            .iter()
            .any(|option| option.id == payload.correct_option_id)
        {
            return Err(ServiceError::InvalidInput(format!(
                "option `{}` does not belong to prompt `{prompt_id}`",
                payload.correct_option_id
            )));
        }

        let plan = PromptStateMachine::new(prompt.state).plan(PromptEvent::Resolve)?;
        let now: SystemTime = state.now();

        if plan.implicit_lock {
            debug!(prompt_id = %prompt_id, "locking open prompt before resolution");
            store
                .set_prompt_state(prompt_id, PromptStateUpdate::state_only(PromptState::Locked))
                .await?;
        }

        store
            .upsert_resolution(ResolutionEntity {
                prompt_id,
                correct_option_id: payload.correct_option_id,
                resolved_by_user_id: host.user_id.clone(),
                resolved_at: now,
            })
            .await?;

        // Re-read so the window and submissions reflect what is persisted after the lock.
        let mut prompt = store
            .find_prompt(prompt_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("prompt `{prompt_id}` not found")))?;
        let patron_ids: HashSet<Uuid> = store
            .find_patrons(game_night.id)
            .await?
            .into_iter()
            .map(|patron| patron.id)
            .collect();
        let submissions = store.find_submissions(prompt_id).await?;

        let window = prompt.window();
        let scores = score_submissions(
            state.scoring(),
            window.as_ref(),
            &patron_ids,
            &submissions,
            payload.correct_option_id,
            game_night.id,
        );
        let scored = scores.len();
        let correct = scores
            .iter()
            .filter(|score| score.reason == ScoreReason::CorrectSpeed)
            .count();
        if !scores.is_empty() {
            store.upsert_scores(scores).await?;
        }

        let update = plan.update(now);
        store.set_prompt_state(prompt_id, update).await?;
        update.apply_to(&mut prompt);

        info!(
            prompt_id = %prompt_id,
            correct_option_id = %payload.correct_option_id,
            scored,
            correct,
            "prompt resolved"
        );
        log_event(
            state,
            AuditKind::PromptResolved,
            Some(&host.user_id),
            Some(game_night.id),
            json!({
                "prompt_id": prompt_id,
                "correct_option_id": payload.correct_option_id,
                "scored": scored,
                "correct": correct,
            }),
        )
        .await;

        Ok(ResolutionSummary {
            prompt: PromptSummary::from_entity(&prompt, &options),
            correct_option_id: payload.correct_option_id,
            scored,
            correct,
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    fn t0() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_760_000_000)
    }

    fn submission(prompt_id: Uuid, patron_id: Uuid, option_id: Uuid, secs: u64) -> SubmissionEntity {
        SubmissionEntity {
            prompt_id,
            patron_id,
            option_id,
            created_at: t0() + Duration::from_secs(secs),
        }
    }

    #[test]
    fn scores_follow_the_decay_curve() {
        let prompt_id = Uuid::new_v4();
        let game_night_id = Uuid::new_v4();
        let (right, wrong) = (Uuid::new_v4(), Uuid::new_v4());
        let patrons: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let window = PromptWindow::starting_at(t0(), Duration::from_secs(30));

        let submissions = vec![
            submission(prompt_id, patrons[0], right, 3),
            submission(prompt_id, patrons[1], right, 15),
            submission(prompt_id, patrons[2], right, 29),
            submission(prompt_id, patrons[3], wrong, 4),
        ];
        let known: HashSet<Uuid> = patrons.iter().copied().collect();

        let scores = score_submissions(
            &ScoringRules::default(),
            Some(&window),
            &known,
            &submissions,
            right,
            game_night_id,
        );

        let points: Vec<(Uuid, u32, ScoreReason)> = scores
            .iter()
            .map(|score| (score.patron_id, score.points, score.reason))
            .collect();
        assert_eq!(
            points,
            vec![
                (patrons[0], 10, ScoreReason::CorrectSpeed),
                (patrons[1], 8, ScoreReason::CorrectSpeed),
                (patrons[2], 5, ScoreReason::CorrectSpeed),
                (patrons[3], 2, ScoreReason::Incorrect),
            ]
        );
        assert!(scores.iter().all(|score| score.game_night_id == game_night_id));
        assert!(!scores.iter().any(|score| score.patron_id == patrons[4]));
    }

    #[test]
    fn unknown_patrons_are_skipped() {
        let prompt_id = Uuid::new_v4();
        let option = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let window = PromptWindow::starting_at(t0(), Duration::from_secs(30));

        let scores = score_submissions(
            &ScoringRules::default(),
            Some(&window),
            &HashSet::new(),
            &[submission(prompt_id, stranger, option, 1)],
            option,
            Uuid::new_v4(),
        );
        assert!(scores.is_empty());
    }

    #[test]
    fn missing_window_scores_minimum() {
        let prompt_id = Uuid::new_v4();
        let patron = Uuid::new_v4();
        let option = Uuid::new_v4();

        let scores = score_submissions(
            &ScoringRules::default(),
            None,
            &HashSet::from([patron]),
            &[submission(prompt_id, patron, option, 1)],
            option,
            Uuid::new_v4(),
        );
        assert_eq!(scores[0].points, 5);
    }
}
