use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dao::models::{FieldUpdate, PromptStateUpdate},
    state::window::PromptWindow,
};

/// Lifecycle states of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromptState {
    /// Created by the host, not yet visible to answers.
    Draft,
    /// Accepting submissions.
    Open,
    /// No longer accepting submissions, waiting for the host to declare the answer.
    Locked,
    /// Answer declared and scores persisted.
    Resolved,
    /// Cancelled; results cleared.
    Void,
}

impl PromptState {
    /// Whether patrons may submit answers in this state.
    pub fn accepts_submissions(self) -> bool {
        matches!(self, PromptState::Open)
    }

    /// Stored label, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            PromptState::Draft => "draft",
            PromptState::Open => "open",
            PromptState::Locked => "locked",
            PromptState::Resolved => "resolved",
            PromptState::Void => "void",
        }
    }
}

/// Host actions that drive the prompt lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptEvent {
    /// Start the countdown for a draft prompt.
    Open {
        /// Length of the answer window.
        duration: Duration,
    },
    /// Stop accepting submissions.
    Lock,
    /// Declare the correct option and score the prompt.
    Resolve,
    /// Cancel the prompt and drop any results.
    Void,
    /// Restart the countdown of a locked or resolved prompt, dropping any results.
    Reopen {
        /// Length of the new answer window.
        duration: Duration,
    },
}

/// Error returned when an event cannot be applied from the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// State the prompt was in.
    pub from: PromptState,
    /// Rejected event.
    pub event: PromptEvent,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Open and reopen need a strictly positive window.
    #[error("window duration must be positive")]
    NonPositiveDuration,
    /// The event is not allowed from the current state.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// What happens to the answer window when a transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEffect {
    /// Window left untouched.
    Keep,
    /// Fresh window starting at the transition instant.
    Restart {
        /// Length of the new window.
        duration: Duration,
    },
}

/// What happens to `resolved_at` when a transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAtEffect {
    /// Left untouched.
    Keep,
    /// Set to the transition instant.
    Stamp,
    /// Cleared.
    Clear,
}

/// A validated transition together with the side effects the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// State the prompt is currently in.
    pub from: PromptState,
    /// State the prompt ends in once every effect has been persisted.
    pub to: PromptState,
    /// Event that triggered this transition.
    pub event: PromptEvent,
    /// The prompt must be written as `Locked` before anything else happens.
    pub implicit_lock: bool,
    /// Resolution and scores must be deleted before the final state is written.
    pub clear_results: bool,
    /// Window change.
    pub window: WindowEffect,
    /// `resolved_at` change.
    pub resolved_at: ResolvedAtEffect,
}

impl Plan {
    /// Store update that performs the final state flip at `now`.
    pub fn update(&self, now: SystemTime) -> PromptStateUpdate {
        let window = match self.window {
            WindowEffect::Keep => None,
            WindowEffect::Restart { duration } => Some(PromptWindow::starting_at(now, duration)),
        };
        let resolved_at = match self.resolved_at {
            ResolvedAtEffect::Keep => FieldUpdate::Keep,
            ResolvedAtEffect::Stamp => FieldUpdate::Set(now),
            ResolvedAtEffect::Clear => FieldUpdate::Clear,
        };

        PromptStateUpdate {
            state: self.to,
            window,
            resolved_at,
        }
    }
}

/// Transition rules for a single prompt.
///
/// The machine holds no history: the persisted state is the source of truth, so callers load
/// the prompt, build a machine from its state and plan the event they want to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptStateMachine {
    state: PromptState,
}

impl Default for PromptStateMachine {
    fn default() -> Self {
        Self {
            state: PromptState::Draft,
        }
    }
}

impl PromptStateMachine {
    /// Machine positioned at `state`.
    pub fn new(state: PromptState) -> Self {
        Self { state }
    }

    /// Inspect the current state.
    pub fn state(&self) -> PromptState {
        self.state
    }

    /// Validate `event` against the current state and describe the effects it requires.
    pub fn plan(&self, event: PromptEvent) -> Result<Plan, PlanError> {
        if let PromptEvent::Open { duration } | PromptEvent::Reopen { duration } = event {
            if duration.is_zero() {
                return Err(PlanError::NonPositiveDuration);
            }
        }

        let base = Plan {
            from: self.state,
            to: self.state,
            event,
            implicit_lock: false,
            clear_results: false,
            window: WindowEffect::Keep,
            resolved_at: ResolvedAtEffect::Keep,
        };

        let plan = match (self.state, event) {
            (PromptState::Draft, PromptEvent::Open { duration }) => Plan {
                to: PromptState::Open,
                window: WindowEffect::Restart { duration },
                ..base
            },
            (PromptState::Open, PromptEvent::Lock) => Plan {
                to: PromptState::Locked,
                ..base
            },
            (PromptState::Open, PromptEvent::Resolve) => Plan {
                to: PromptState::Resolved,
                implicit_lock: true,
                resolved_at: ResolvedAtEffect::Stamp,
                ..base
            },
            (PromptState::Locked | PromptState::Resolved, PromptEvent::Resolve) => Plan {
                to: PromptState::Resolved,
                resolved_at: ResolvedAtEffect::Stamp,
                ..base
            },
            (
                PromptState::Draft | PromptState::Open | PromptState::Locked | PromptState::Resolved,
                PromptEvent::Void,
            ) => Plan {
                to: PromptState::Void,
                clear_results: true,
                resolved_at: ResolvedAtEffect::Stamp,
                ..base
            },
            (PromptState::Locked | PromptState::Resolved, PromptEvent::Reopen { duration }) => {
                Plan {
                    to: PromptState::Open,
                    clear_results: true,
                    window: WindowEffect::Restart { duration },
                    resolved_at: ResolvedAtEffect::Clear,
                    ..base
                }
            }
            (from, event) => return Err(InvalidTransition { from, event }.into()),
        };

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    const THIRTY: Duration = Duration::from_secs(30);

    fn plan(from: PromptState, event: PromptEvent) -> Plan {
        PromptStateMachine::new(from).plan(event).unwrap()
    }

    #[test]
    fn initial_state_is_draft() {
        assert_eq!(PromptStateMachine::default().state(), PromptState::Draft);
    }

    #[test]
    fn happy_path_through_prompt() {
        let open = plan(PromptState::Draft, PromptEvent::Open { duration: THIRTY });
        assert_eq!(open.to, PromptState::Open);
        assert_eq!(open.window, WindowEffect::Restart { duration: THIRTY });
        assert!(!open.clear_results);

        let lock = plan(open.to, PromptEvent::Lock);
        assert_eq!(lock.to, PromptState::Locked);
        assert_eq!(lock.window, WindowEffect::Keep);

        let resolve = plan(lock.to, PromptEvent::Resolve);
        assert_eq!(resolve.to, PromptState::Resolved);
        assert!(!resolve.implicit_lock);
        assert_eq!(resolve.resolved_at, ResolvedAtEffect::Stamp);
    }

    #[test]
    fn resolving_open_prompt_locks_first() {
        let resolve = plan(PromptState::Open, PromptEvent::Resolve);
        assert!(resolve.implicit_lock);
        assert_eq!(resolve.to, PromptState::Resolved);
    }

    #[test]
    fn re_resolving_is_allowed() {
        let again = plan(PromptState::Resolved, PromptEvent::Resolve);
        assert_eq!(again.to, PromptState::Resolved);
        assert!(!again.clear_results);
    }

    #[test]
    fn void_clears_results_from_every_live_state() {
        for from in [
            PromptState::Draft,
            PromptState::Open,
            PromptState::Locked,
            PromptState::Resolved,
        ] {
            let void = plan(from, PromptEvent::Void);
            assert_eq!(void.to, PromptState::Void);
            assert!(void.clear_results);
            assert_eq!(void.resolved_at, ResolvedAtEffect::Stamp);
        }
    }

    #[test]
    fn reopen_restarts_window_and_clears_results() {
        for from in [PromptState::Locked, PromptState::Resolved] {
            let reopen = plan(from, PromptEvent::Reopen { duration: THIRTY });
            assert_eq!(reopen.to, PromptState::Open);
            assert!(reopen.clear_results);
            assert_eq!(reopen.resolved_at, ResolvedAtEffect::Clear);
        }
    }

    #[test]
    fn update_builds_fresh_window() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        let reopen = plan(PromptState::Resolved, PromptEvent::Reopen { duration: THIRTY });
        let update = reopen.update(now);
        assert_eq!(update.state, PromptState::Open);
        assert_eq!(update.window, Some(PromptWindow::starting_at(now, THIRTY)));
        assert_eq!(update.resolved_at, FieldUpdate::Clear);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = PromptStateMachine::new(PromptState::Draft)
            .plan(PromptEvent::Open {
                duration: Duration::ZERO,
            })
            .unwrap_err();
        assert_eq!(err, PlanError::NonPositiveDuration);
    }

    #[test]
    fn invalid_transitions_return_error() {
        let cases = [
            (PromptState::Draft, PromptEvent::Lock),
            (PromptState::Draft, PromptEvent::Resolve),
            (PromptState::Open, PromptEvent::Open { duration: THIRTY }),
            (PromptState::Open, PromptEvent::Reopen { duration: THIRTY }),
            (PromptState::Locked, PromptEvent::Lock),
            (PromptState::Void, PromptEvent::Resolve),
            (PromptState::Void, PromptEvent::Void),
            (PromptState::Void, PromptEvent::Reopen { duration: THIRTY }),
        ];

        for (from, event) in cases {
            match PromptStateMachine::new(from).plan(event).unwrap_err() {
                PlanError::InvalidTransition(invalid) => {
                    assert_eq!(invalid.from, from);
                    assert_eq!(invalid.event, event);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn only_open_prompts_accept_submissions() {
        assert!(PromptState::Open.accepts_submissions());
        assert!(!PromptState::Locked.accepts_submissions());
        assert!(!PromptState::Draft.accepts_submissions());
    }
}
