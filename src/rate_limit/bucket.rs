use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Balance units per whole token. Refilling at `capacity` tokens per hour
/// then adds exactly `capacity` units per elapsed nanosecond.
const UNITS_PER_TOKEN: u128 = 3_600 * 1_000_000_000;

/// Source of monotonic time for bucket refills.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used to drive refills deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, instant: Instant) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct BucketState {
    units: u128,
    last_refill: Instant,
}

/// Token bucket refilled continuously at `capacity` tokens per hour.
///
/// Capacity is fixed at construction. The balance is kept as an integer count
/// of token-nanosecond units, so repeated partial refills never drift below a
/// whole token. Balance and refill timestamp sit behind a per-bucket mutex so
/// refill-then-consume is atomic for callers sharing this bucket, while other
/// buckets stay uncontended.
pub struct TokenBucket {
    capacity: u64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// New bucket, starting full.
    pub fn new(capacity: u64, now: Instant) -> Self {
        Self {
            capacity,
            state: Mutex::new(BucketState {
                units: capacity as u128 * UNITS_PER_TOKEN,
                last_refill: now,
            }),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Refill for the time elapsed since the last attempt, then take one token.
    ///
    /// Returns true if a token was consumed. A denial leaves the balance as
    /// refilled; it never goes negative.
    pub fn try_consume(&self, now: Instant) -> bool {
        let mut state = self.lock();
        self.refill(&mut state, now);

        if state.units >= UNITS_PER_TOKEN {
            state.units -= UNITS_PER_TOKEN;
            true
        } else {
            false
        }
    }

    /// Tokens available at `now`, after refill bookkeeping.
    pub fn available(&self, now: Instant) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state, now);
        state.units as f64 / UNITS_PER_TOKEN as f64
    }

    /// True if the bucket would hold its full capacity at `now`.
    ///
    /// Read-only: does not advance the refill timestamp.
    pub fn is_full(&self, now: Instant) -> bool {
        let state = self.lock();
        self.units_at(&state, now) >= self.max_units()
    }

    /// Time since the bucket was last touched.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.lock().last_refill)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        // A regressing clock contributes nothing and must not rewind the timestamp
        if now < state.last_refill {
            warn!(
                capacity = self.capacity,
                "Clock moved backwards, skipping bucket refill"
            );
            return;
        }
        state.units = self.units_at(state, now);
        state.last_refill = now;
    }

    /// Balance the bucket would hold at `now`; a `now` before the last refill adds nothing.
    fn units_at(&self, state: &BucketState, now: Instant) -> u128 {
        let elapsed = now.saturating_duration_since(state.last_refill).as_nanos();
        let added = elapsed.saturating_mul(self.capacity as u128);
        state.units.saturating_add(added).min(self.max_units())
    }

    fn max_units(&self) -> u128 {
        self.capacity as u128 * UNITS_PER_TOKEN
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
