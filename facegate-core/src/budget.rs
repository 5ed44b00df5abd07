//! Monotonic time source and per-stage deadlines.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Source of monotonic time for budget checks.
///
/// Production code uses [`MonotonicClock`]; tests substitute a clock they can
/// advance deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// `Instant::now`-backed clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A wall-clock allowance measured from a fixed start instant.
///
/// Budgets are absolute: re-checking never extends them.
#[derive(Clone, Copy)]
pub struct Budget<'c> {
    clock: &'c dyn Clock,
    start: Instant,
    limit: Duration,
}

impl<'c> Budget<'c> {
    /// Start a budget of `limit` at the clock's current instant.
    pub fn start(clock: &'c dyn Clock, limit: Duration) -> Self {
        Self {
            clock,
            start: clock.now(),
            limit,
        }
    }

    /// A budget sharing this budget's start instant but with its own limit.
    ///
    /// Used for checkpoints measured from the start of the invocation.
    pub fn checkpoint(&self, limit: Duration) -> Self {
        Self { limit, ..*self }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start)
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// `true` once strictly more than `limit` has elapsed.
    pub fn expired(&self) -> bool {
        self.elapsed() > self.limit
    }
}

impl fmt::Debug for Budget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Budget")
            .field("elapsed", &self.elapsed())
            .field("limit", &self.limit)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::SteppingClock;
    use super::*;

    #[test]
    fn budget_expires_only_after_limit_is_exceeded() {
        let clock = SteppingClock::new(Duration::from_millis(10));
        let budget = Budget::start(&clock, Duration::from_millis(20));
        assert!(!budget.expired()); // 10ms
        assert!(!budget.expired()); // 20ms, not strictly greater
        assert!(budget.expired()); // 30ms
    }

    #[test]
    fn checkpoint_shares_start_instant() {
        let clock = SteppingClock::new(Duration::from_millis(5));
        let total = Budget::start(&clock, Duration::from_secs(10));
        let early = total.checkpoint(Duration::from_millis(1));
        assert!(early.expired());
        assert!(!total.expired());
        assert_eq!(early.limit(), Duration::from_millis(1));
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock;
        let budget = Budget::start(&clock, Duration::from_secs(60));
        let first = budget.elapsed();
        let second = budget.elapsed();
        assert!(second >= first);
        assert!(!budget.expired());
    }
}
