//! Fire-and-forget audit trail. Failures never reach the caller.

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{dao::models::AnalyticEventEntity, state::SharedState};

/// Kinds of events written to the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    GameNightCreated,
    GameNightEnded,
    PatronJoined,
    PromptCreated,
    PromptOpened,
    PromptReopened,
    PromptLocked,
    PromptResolved,
    PromptVoided,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::GameNightCreated => "game_night_created",
            AuditKind::GameNightEnded => "game_night_ended",
            AuditKind::PatronJoined => "patron_joined",
            AuditKind::PromptCreated => "prompt_created",
            AuditKind::PromptOpened => "prompt_opened",
            AuditKind::PromptReopened => "prompt_reopened",
            AuditKind::PromptLocked => "prompt_locked",
            AuditKind::PromptResolved => "prompt_resolved",
            AuditKind::PromptVoided => "prompt_voided",
        }
    }
}

/// Record an audit event. Storage failures are logged and swallowed.
pub async fn log_event(
    state: &SharedState,
    kind: AuditKind,
    user_id: Option<&str>,
    game_night_id: Option<Uuid>,
    payload: Value,
) {
    info!(
        kind = kind.as_str(),
        user_id = user_id.unwrap_or("-"),
        game_night_id = ?game_night_id,
        %payload,
        "audit event"
    );

    let Some(store) = state.store().await else {
        warn!(kind = kind.as_str(), "audit event dropped (degraded mode)");
        return;
    };

    let event = AnalyticEventEntity {
        id: Uuid::new_v4(),
        kind: kind.as_str().to_owned(),
        user_id: user_id.map(str::to_owned),
        game_night_id,
        payload,
        created_at: state.now(),
    };

    if let Err(err) = store.record_event(event).await {
        warn!(kind = kind.as_str(), error = %err, "failed to record audit event");
    }
}
