//! Prompt timing window: the `[opens_at, locks_at]` interval and the values derived from it at
//! a given instant (time remaining, decay fraction).

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Source of the current instant. Services never call [`SystemTime::now`] directly.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> SystemTime;
}

/// Wall clock used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to. Used to replay scoring scenarios deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: SystemTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Answer window of an opened prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptWindow {
    /// Instant the prompt started accepting answers.
    pub opens_at: SystemTime,
    /// Target instant at which the prompt stops accepting answers.
    pub locks_at: SystemTime,
}

impl PromptWindow {
    /// Window starting at `opens_at` and lasting `duration`.
    pub fn starting_at(opens_at: SystemTime, duration: Duration) -> Self {
        Self {
            opens_at,
            locks_at: opens_at + duration,
        }
    }

    /// Rebuild a window from persisted bounds. Returns `None` unless both bounds are set.
    pub fn from_bounds(opens_at: Option<SystemTime>, locks_at: Option<SystemTime>) -> Option<Self> {
        match (opens_at, locks_at) {
            (Some(opens_at), Some(locks_at)) => Some(Self { opens_at, locks_at }),
            _ => None,
        }
    }

    /// Signed length of the window in milliseconds (non-positive for malformed windows).
    pub fn duration_ms(&self) -> i128 {
        unix_millis(self.locks_at) - unix_millis(self.opens_at)
    }

    /// `max(locks_at - now, 0)`.
    pub fn time_remaining(&self, now: SystemTime) -> Duration {
        self.locks_at.duration_since(now).unwrap_or(Duration::ZERO)
    }

    /// Whether the lock target has been reached at `now`.
    pub fn has_elapsed(&self, now: SystemTime) -> bool {
        now > self.locks_at
    }

    /// Progress through the decay segment at instant `at`.
    ///
    /// `0.0` up to `opens_at + fast_window`, `1.0` from `locks_at - slow_window` onwards and
    /// linear in between. Windows too short to fit both sub-windows jump straight from `0.0`
    /// to `1.0`; malformed windows (`locks_at <= opens_at`) are fully decayed.
    pub fn decay_fraction(&self, at: SystemTime, fast_window: Duration, slow_window: Duration) -> f64 {
        let opens = unix_millis(self.opens_at);
        let locks = unix_millis(self.locks_at);
        if locks <= opens {
            return 1.0;
        }

        let start_decay = opens + fast_window.as_millis() as i128;
        let end_decay = locks - slow_window.as_millis() as i128;
        let at = unix_millis(at);

        if at <= start_decay {
            return 0.0;
        }
        if at >= end_decay {
            return 1.0;
        }

        let denom = end_decay - start_decay;
        if denom <= 0 {
            return 1.0;
        }

        ((at - start_decay) as f64 / denom as f64).clamp(0.0, 1.0)
    }
}

/// Countdown values for a prompt at a given instant. Every field is `None` when the prompt has
/// no window yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    /// Time left before the lock target.
    pub time_remaining: Option<Duration>,
    /// Decay fraction at the queried instant.
    pub decay_fraction: Option<f64>,
}

impl Countdown {
    /// Derive the countdown for a (possibly unset) window.
    pub fn at(
        window: Option<&PromptWindow>,
        now: SystemTime,
        fast_window: Duration,
        slow_window: Duration,
    ) -> Self {
        match window {
            Some(window) => Self {
                time_remaining: Some(window.time_remaining(now)),
                decay_fraction: Some(window.decay_fraction(now, fast_window, slow_window)),
            },
            None => Self {
                time_remaining: None,
                decay_fraction: None,
            },
        }
    }
}

/// Render a remaining duration as `m:ss`, truncating sub-second precision.
pub fn format_remaining(remaining: Duration) -> String {
    let total_seconds = remaining.as_secs();
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Milliseconds relative to the Unix epoch, negative for earlier instants.
pub(crate) fn unix_millis(instant: SystemTime) -> i128 {
    match instant.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i128,
        Err(err) => -(err.duration().as_millis() as i128),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: Duration = Duration::from_secs(5);
    const SLOW: Duration = Duration::from_secs(2);

    fn t0() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn at(seconds: u64) -> SystemTime {
        t0() + Duration::from_secs(seconds)
    }

    #[test]
    fn time_remaining_saturates_at_zero() {
        let window = PromptWindow::starting_at(t0(), Duration::from_secs(30));
        assert_eq!(window.time_remaining(at(10)), Duration::from_secs(20));
        assert_eq!(window.time_remaining(at(30)), Duration::ZERO);
        assert_eq!(window.time_remaining(at(45)), Duration::ZERO);
    }

    #[test]
    fn decay_fraction_is_flat_then_linear_then_flat() {
        let window = PromptWindow::starting_at(t0(), Duration::from_secs(30));
        assert_eq!(window.decay_fraction(at(0), FAST, SLOW), 0.0);
        assert_eq!(window.decay_fraction(at(5), FAST, SLOW), 0.0);
        let mid = window.decay_fraction(at(15), FAST, SLOW);
        assert!((mid - 10.0 / 23.0).abs() < 1e-9);
        assert_eq!(window.decay_fraction(at(28), FAST, SLOW), 1.0);
        assert_eq!(window.decay_fraction(at(40), FAST, SLOW), 1.0);
    }

    #[test]
    fn short_window_jumps_from_zero_to_one() {
        let window = PromptWindow::starting_at(t0(), Duration::from_secs(7));
        assert_eq!(window.decay_fraction(at(5), FAST, SLOW), 0.0);
        assert_eq!(
            window.decay_fraction(at(5) + Duration::from_millis(1), FAST, SLOW),
            1.0
        );
    }

    #[test]
    fn malformed_window_is_fully_decayed() {
        let window = PromptWindow {
            opens_at: at(10),
            locks_at: at(10),
        };
        assert_eq!(window.duration_ms(), 0);
        assert_eq!(window.decay_fraction(at(0), FAST, SLOW), 1.0);
    }

    #[test]
    fn countdown_is_unknown_without_window() {
        let countdown = Countdown::at(None, at(3), FAST, SLOW);
        assert_eq!(countdown.time_remaining, None);
        assert_eq!(countdown.decay_fraction, None);
        assert_eq!(PromptWindow::from_bounds(Some(at(0)), None), None);
    }

    #[test]
    fn formats_minutes_and_padded_seconds() {
        assert_eq!(format_remaining(Duration::from_millis(65_900)), "1:05");
        assert_eq!(format_remaining(Duration::ZERO), "0:00");
        assert_eq!(format_remaining(Duration::from_secs(600)), "10:00");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.now(), at(3));
        clock.set(at(42));
        assert_eq!(clock.now(), at(42));
    }
}
