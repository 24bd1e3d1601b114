use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{PromptEntity, PromptKind, PromptOptionEntity},
    dto::{format_optional_time, format_system_time},
    state::{
        scoring::ScoringRules,
        state_machine::PromptState,
        window::{Countdown, PromptWindow, format_remaining},
    },
};

/// Answer choice as displayed to hosts and patrons.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct OptionView {
    pub id: Uuid,
    pub label: String,
    pub position: u32,
}

impl From<&PromptOptionEntity> for OptionView {
    fn from(option: &PromptOptionEntity) -> Self {
        Self {
            id: option.id,
            label: option.label.clone(),
            position: option.position,
        }
    }
}

/// Live countdown for an opened prompt.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct CountdownView {
    pub opens_at: String,
    pub locks_at: String,
    /// `max(locks_at - now, 0)` in milliseconds.
    pub time_remaining_ms: u64,
    /// Remaining time rendered as `m:ss`.
    pub display: String,
    /// Progress through the decay segment, between 0 and 1.
    pub decay_fraction: f64,
    /// Points a correct answer would earn right now. Only present while the prompt is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_points: Option<u32>,
}

impl CountdownView {
    /// Countdown of `window` at `now`, exposing potential points only when `open`.
    pub fn new(window: &PromptWindow, now: SystemTime, rules: &ScoringRules, open: bool) -> Self {
        let countdown = Countdown::at(Some(window), now, rules.fast_window, rules.slow_window);
        let remaining = countdown.time_remaining.unwrap_or_default();

        Self {
            opens_at: format_system_time(window.opens_at),
            locks_at: format_system_time(window.locks_at),
            time_remaining_ms: remaining.as_millis().min(u128::from(u64::MAX)) as u64,
            display: format_remaining(remaining),
            decay_fraction: countdown.decay_fraction.unwrap_or(1.0),
            potential_points: open
                .then(|| rules.potential_points(Some(window), now))
                .flatten(),
        }
    }
}

/// Prompt as returned by host endpoints.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PromptSummary {
    pub id: Uuid,
    pub game_night_id: Uuid,
    pub kind: PromptKind,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub over_under_line: Option<f64>,
    pub state: PromptState,
    pub opens_at: Option<String>,
    pub locks_at: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub options: Vec<OptionView>,
}

impl PromptSummary {
    pub fn from_entity(prompt: &PromptEntity, options: &[PromptOptionEntity]) -> Self {
        Self {
            id: prompt.id,
            game_night_id: prompt.game_night_id,
            kind: prompt.kind,
            question: prompt.question.clone(),
            over_under_line: prompt.over_under_line,
            state: prompt.state,
            opens_at: format_optional_time(prompt.opens_at),
            locks_at: format_optional_time(prompt.locks_at),
            resolved_at: format_optional_time(prompt.resolved_at),
            created_at: format_system_time(prompt.created_at),
            options: options.iter().map(OptionView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn countdown_hides_potential_points_unless_open() {
        let opens_at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let window = PromptWindow::starting_at(opens_at, Duration::from_secs(30));
        let rules = ScoringRules::default();
        let now = opens_at + Duration::from_secs(15);

        let open = CountdownView::new(&window, now, &rules, true);
        assert_eq!(open.potential_points, Some(8));
        assert_eq!(open.display, "0:15");
        assert_eq!(open.time_remaining_ms, 15_000);

        let locked = CountdownView::new(&window, now, &rules, false);
        assert_eq!(locked.potential_points, None);
    }
}
