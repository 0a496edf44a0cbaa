//! Serialized-mutation controller (spec.md §4.6, component C9):
//! debounce/throttle/queue strategies that coalesce repeated calls into
//! one transaction.
//!
//! No teacher counterpart exists for client-mutation batching; this is
//! built fresh per spec.md §4.6's table, against an injectable [`Clock`]
//! (rather than `std::time::Instant` directly) so strategy timing is
//! deterministic in tests without real sleeps — the one place this crate
//! trades the "no timers" framing of spec.md §5 for testability, exactly as
//! SPEC_FULL.md §4.6 calls for.

use std::time::{Duration, Instant};

/// A source of "now", abstracted so strategies can be driven by a fake
/// clock in tests.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The real wall clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually advanced clock for tests.
pub struct FakeClock {
    now: std::cell::Cell<Instant>,
}

impl FakeClock {
    pub fn new(start: Instant) -> Self {
        FakeClock { now: std::cell::Cell::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Which strategy governs when a new transaction opens and when the
/// pending one persists (spec.md §4.6's table).
#[derive(Clone, Copy, Debug)]
pub enum Strategy {
    Debounce { wait: Duration, leading: bool, trailing: bool },
    Throttle { wait: Duration, leading: bool, trailing: bool },
    Queue { wait: Option<Duration> },
}

impl Strategy {
    pub fn debounce(wait: Duration) -> Self {
        Strategy::Debounce { wait, leading: false, trailing: true }
    }

    pub fn throttle(wait: Duration) -> Self {
        Strategy::Throttle { wait, leading: true, trailing: true }
    }

    pub fn queue(wait: Option<Duration>) -> Self {
        Strategy::Queue { wait }
    }
}

/// Decision returned by [`SerializedMutationController::call`]: whether the
/// caller's mutation merged into the still-open transaction, and whether
/// the controller wants to persist right now.
#[derive(Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call opened or joined the window; no persist yet.
    Merged,
    /// The call's window closed immediately (e.g. `queue` with no wait) —
    /// the caller should persist now.
    PersistNow,
}

/// Tracks one strategy's window state across repeated calls, independent
/// of any particular transaction type — callers pair this with their own
/// `Transaction<T>` (kept open across calls) and persist it when `call`
/// or `poll` returns a persist signal.
pub struct SerializedMutationController<'c> {
    strategy: Strategy,
    clock: &'c dyn Clock,
    window_opened_at: Option<Instant>,
    last_call_at: Option<Instant>,
    has_open_transaction: bool,
}

impl<'c> SerializedMutationController<'c> {
    pub fn new(strategy: Strategy, clock: &'c dyn Clock) -> Self {
        SerializedMutationController { strategy, clock, window_opened_at: None, last_call_at: None, has_open_transaction: false }
    }

    pub fn has_open_transaction(&self) -> bool {
        self.has_open_transaction
    }

    /// Registers one incoming mutation call. Returns whether a new
    /// transaction should be opened by the caller (first call in a window)
    /// via `opened_new`, and whether this call itself should trigger an
    /// immediate persist (`queue` with no wait, and no transaction is
    /// currently pending).
    pub fn call(&mut self) -> (bool, CallOutcome) {
        let now = self.clock.now();
        let opened_new = !self.has_open_transaction;
        if opened_new {
            self.window_opened_at = Some(now);
            self.has_open_transaction = true;
        }
        self.last_call_at = Some(now);

        let outcome = match self.strategy {
            Strategy::Queue { wait: None } if opened_new => CallOutcome::PersistNow,
            _ => CallOutcome::Merged,
        };
        (opened_new, outcome)
    }

    /// Checked periodically (or before a new call) to see whether the
    /// currently open window has expired and should persist now.
    ///
    /// - `debounce`: expires `wait` after the *last* call.
    /// - `throttle`: expires `wait` after the window *opened*.
    /// - `queue(Some(wait))`: behaves like throttle's periodic trigger.
    pub fn should_persist_now(&self) -> bool {
        if !self.has_open_transaction {
            return false;
        }
        let now = self.clock.now();
        match self.strategy {
            Strategy::Debounce { wait, .. } => self.last_call_at.map(|t| now.duration_since(t) >= wait).unwrap_or(false),
            Strategy::Throttle { wait, .. } | Strategy::Queue { wait: Some(wait) } => {
                self.window_opened_at.map(|t| now.duration_since(t) >= wait).unwrap_or(false)
            }
            Strategy::Queue { wait: None } => true,
        }
    }

    /// Marks the current window as persisted; the next `call` opens a new
    /// transaction.
    pub fn settle(&mut self) {
        self.has_open_transaction = false;
        self.window_opened_at = None;
        self.last_call_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_waits_for_idle_window_after_last_call() {
        let clock = FakeClock::new(Instant::now());
        let mut ctrl = SerializedMutationController::new(Strategy::debounce(Duration::from_millis(50)), &clock);

        let (opened, _) = ctrl.call();
        assert!(opened);
        clock.advance(Duration::from_millis(20));
        let (opened, _) = ctrl.call();
        assert!(!opened, "second call within the window joins the same transaction");
        assert!(!ctrl.should_persist_now());

        clock.advance(Duration::from_millis(60));
        assert!(ctrl.should_persist_now(), "idle past `wait` since the last call triggers persist");
    }

    #[test]
    fn throttle_persists_periodically_from_window_open() {
        let clock = FakeClock::new(Instant::now());
        let mut ctrl = SerializedMutationController::new(Strategy::throttle(Duration::from_millis(50)), &clock);
        ctrl.call();
        clock.advance(Duration::from_millis(30));
        ctrl.call();
        assert!(!ctrl.should_persist_now());
        clock.advance(Duration::from_millis(30));
        assert!(ctrl.should_persist_now(), "elapsed since window OPEN, not last call");
    }

    #[test]
    fn queue_with_no_wait_persists_on_first_call() {
        let clock = FakeClock::new(Instant::now());
        let mut ctrl = SerializedMutationController::new(Strategy::queue(None), &clock);
        let (opened, outcome) = ctrl.call();
        assert!(opened);
        assert_eq!(outcome, CallOutcome::PersistNow);

        let (opened_again, outcome_again) = ctrl.call();
        assert!(!opened_again, "a pending queue tx absorbs follow-on calls");
        assert_eq!(outcome_again, CallOutcome::Merged);
    }

    #[test]
    fn settle_reopens_window_on_next_call() {
        let clock = FakeClock::new(Instant::now());
        let mut ctrl = SerializedMutationController::new(Strategy::debounce(Duration::from_millis(10)), &clock);
        ctrl.call();
        ctrl.settle();
        assert!(!ctrl.has_open_transaction());
        let (opened, _) = ctrl.call();
        assert!(opened);
    }
}
