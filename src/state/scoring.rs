//! Speed-based point engine shared by prompt resolution and the live "potential points"
//! indicator.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::window::PromptWindow;

/// Why a score row was awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    /// Correct answer, worth between the minimum and maximum depending on speed.
    CorrectSpeed,
    /// Wrong answer, worth the fixed consolation value.
    Incorrect,
}

impl ScoreReason {
    /// Stable tag stored alongside the score.
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreReason::CorrectSpeed => "correct_speed",
            ScoreReason::Incorrect => "incorrect",
        }
    }
}

/// Points awarded to a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardedPoints {
    /// Point value.
    pub points: u32,
    /// Reason tag.
    pub reason: ScoreReason,
}

/// Constants of the point engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    /// Points for a correct answer in the closing window (and the floor for malformed timing).
    pub min_points: u32,
    /// Points for a correct answer within the fast window.
    pub max_points: u32,
    /// Time after opening during which a correct answer earns `max_points`.
    pub fast_window: Duration,
    /// Time before the lock during which a correct answer earns `min_points`.
    pub slow_window: Duration,
    /// Consolation value for an incorrect answer, independent of timing.
    pub incorrect_points: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            min_points: 5,
            max_points: 10,
            fast_window: Duration::from_secs(5),
            slow_window: Duration::from_secs(2),
            incorrect_points: 2,
        }
    }
}

impl ScoringRules {
    /// Points for a correct submission made at `submitted_at` within `window`.
    pub fn speed_points(&self, window: &PromptWindow, submitted_at: SystemTime) -> u32 {
        if window.duration_ms() <= 0 {
            return self.min_points;
        }

        let frac = window.decay_fraction(submitted_at, self.fast_window, self.slow_window);
        let span = f64::from(self.max_points) - f64::from(self.min_points);
        let raw = (f64::from(self.max_points) - span * frac).round();
        raw.max(f64::from(self.min_points))
            .min(f64::from(self.max_points)) as u32
    }

    /// Score a submission. A correct answer without a window falls back to `min_points`.
    pub fn score(
        &self,
        window: Option<&PromptWindow>,
        submitted_at: SystemTime,
        correct: bool,
    ) -> AwardedPoints {
        if !correct {
            return AwardedPoints {
                points: self.incorrect_points,
                reason: ScoreReason::Incorrect,
            };
        }

        let points = window
            .map(|window| self.speed_points(window, submitted_at))
            .unwrap_or(self.min_points);

        AwardedPoints {
            points,
            reason: ScoreReason::CorrectSpeed,
        }
    }

    /// What a correct answer submitted at `now` would earn, or `None` when the window is unset.
    pub fn potential_points(&self, window: Option<&PromptWindow>, now: SystemTime) -> Option<u32> {
        window.map(|window| self.speed_points(window, now))
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    fn t0() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_760_000_000)
    }

    fn at(seconds: u64) -> SystemTime {
        t0() + Duration::from_secs(seconds)
    }

    fn thirty_second_window() -> PromptWindow {
        PromptWindow::starting_at(t0(), Duration::from_secs(30))
    }

    #[test]
    fn reference_scenario() {
        let rules = ScoringRules::default();
        let window = thirty_second_window();

        assert_eq!(rules.score(Some(&window), at(3), true).points, 10);
        assert_eq!(rules.score(Some(&window), at(15), true).points, 8);
        assert_eq!(rules.score(Some(&window), at(29), true).points, 5);

        let wrong = rules.score(Some(&window), at(10), false);
        assert_eq!(wrong.points, 2);
        assert_eq!(wrong.reason, ScoreReason::Incorrect);
    }

    #[test]
    fn bounds_pay_max_at_open_and_min_at_lock() {
        let rules = ScoringRules::default();
        for seconds in [7u64, 8, 20, 30, 90, 600] {
            let window = PromptWindow::starting_at(t0(), Duration::from_secs(seconds));
            assert_eq!(rules.speed_points(&window, window.opens_at), 10, "{seconds}s");
            assert_eq!(rules.speed_points(&window, window.locks_at), 5, "{seconds}s");
        }
    }

    #[test]
    fn correct_points_never_increase_with_time() {
        let rules = ScoringRules::default();
        let window = PromptWindow::starting_at(t0(), Duration::from_secs(45));
        let mut previous = u32::MAX;
        for ms in (0..=50_000u64).step_by(250) {
            let points = rules.speed_points(&window, t0() + Duration::from_millis(ms));
            assert!(points <= previous, "points rose at {ms}ms");
            assert!((5..=10).contains(&points));
            previous = points;
        }
    }

    #[test]
    fn incorrect_is_flat_regardless_of_timing() {
        let rules = ScoringRules::default();
        let window = thirty_second_window();
        for seconds in [0u64, 4, 17, 29, 120] {
            assert_eq!(rules.score(Some(&window), at(seconds), false).points, 2);
        }
        assert_eq!(rules.score(None, at(1), false).points, 2);
    }

    #[test]
    fn seven_second_window_collapses_after_fast_window() {
        let rules = ScoringRules::default();
        let window = PromptWindow::starting_at(t0(), Duration::from_secs(7));
        assert_eq!(rules.speed_points(&window, at(5)), 10);
        assert_eq!(
            rules.speed_points(&window, at(5) + Duration::from_millis(1)),
            5
        );
        assert_eq!(rules.speed_points(&window, at(6)), 5);
    }

    #[test]
    fn malformed_window_pays_floor() {
        let rules = ScoringRules::default();
        let inverted = PromptWindow {
            opens_at: at(30),
            locks_at: at(0),
        };
        assert_eq!(rules.speed_points(&inverted, at(1)), 5);
        assert_eq!(rules.score(None, at(1), true).points, 5);
    }

    #[test]
    fn potential_points_tracks_final_score() {
        let rules = ScoringRules::default();
        let window = thirty_second_window();
        for seconds in [0u64, 6, 12, 18, 24, 30] {
            assert_eq!(
                rules.potential_points(Some(&window), at(seconds)),
                Some(rules.score(Some(&window), at(seconds), true).points)
            );
        }
        assert_eq!(rules.potential_points(None, at(0)), None);
    }
}
