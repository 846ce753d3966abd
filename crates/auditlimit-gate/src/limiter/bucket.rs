//! Continuous-refill token bucket.
//!
//! `capacity` tokens regenerate linearly over `refill_period`, so a caller
//! idle for a whole period is back at full budget and a steady caller is
//! spaced `refill_period / capacity` apart. Refill, check and consume happen
//! under one per-bucket lock.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Tolerance for floating-point refill error when checking for a whole token
const TOKEN_EPSILON: f64 = 1e-9;

/// Outcome of [`TokenBucket::try_acquire`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquire {
    /// One token consumed
    Granted { remaining: f64 },
    /// Not enough tokens; both values are read at the attempted instant
    Denied {
        available: f64,
        retry_after: Duration,
    },
}

impl Acquire {
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquire::Granted { .. })
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Rate accounting for a single visitor key
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_period: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket. A zero capacity is raised to one.
    pub fn new(capacity: u32, refill_period: Duration, now: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_period,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: now,
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_period(&self) -> Duration {
        self.refill_period
    }

    /// Refill up to `now` and report the available (fractional) tokens.
    pub fn refill_and_peek(&self, now: Instant) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state, now);
        state.tokens
    }

    /// Consume one token if available after refilling to `now`.
    pub fn try_consume(&self, now: Instant) -> bool {
        self.try_acquire(now).is_granted()
    }

    /// Like [`try_consume`](Self::try_consume), but on denial also reports
    /// the tokens seen and the wait until one whole token is available.
    pub fn try_acquire(&self, now: Instant) -> Acquire {
        let mut state = self.state.lock();
        self.refill(&mut state, now);

        if state.tokens + TOKEN_EPSILON >= 1.0 {
            state.tokens = (state.tokens - 1.0).max(0.0);
            Acquire::Granted {
                remaining: state.tokens,
            }
        } else {
            Acquire::Denied {
                available: state.tokens,
                retry_after: self.wait_time(state.tokens),
            }
        }
    }

    /// Time until `available` grows to one token: the deficit times the
    /// per-token interval. Rounded up to the nanosecond so a caller waiting
    /// exactly this long finds a whole token.
    pub fn wait_time(&self, available: f64) -> Duration {
        let deficit = (1.0 - available).max(0.0);
        let nanos = self.refill_period.as_nanos() as f64 * deficit / f64::from(self.capacity);
        Duration::from_nanos(nanos.ceil() as u64)
    }

    /// True when the bucket is full at `now`, i.e. indistinguishable from a
    /// freshly created one.
    pub fn is_full_at(&self, now: Instant) -> bool {
        self.refill_and_peek(now) + TOKEN_EPSILON >= f64::from(self.capacity)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        // An earlier `now` (caller raced the lock) adds nothing and never
        // moves last_refill backwards.
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed.is_zero() {
            return;
        }

        let capacity = f64::from(self.capacity);
        let period = self.refill_period.as_secs_f64();
        let added = if period > 0.0 {
            elapsed.as_secs_f64() * capacity / period
        } else {
            capacity
        };

        state.tokens = (state.tokens + added).min(capacity);
        state.last_refill = now;
    }
}
