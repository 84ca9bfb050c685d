//! Host time and bounded-polling primitives.
//!
//! Hardware bring-up code is full of "spin until a status bit flips" loops
//! and fixed settle delays. Both are expressed here against a [`HostClock`]
//! so production uses the monotonic host clock while unit tests drive the
//! sequencers deterministically through [`FakeHostClock`] with no real
//! sleeps.

#![forbid(unsafe_code)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic host time source plus a blocking delay.
pub trait HostClock: Send + Sync {
    /// Monotonic time since an arbitrary epoch.
    fn now(&self) -> Duration;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Production clock backed by [`Instant`] and [`std::thread::sleep`].
pub struct StdHostClock {
    epoch: Instant,
}

impl StdHostClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for StdHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdHostClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests: `sleep` advances the reported time instead
/// of blocking, and tests can advance it explicitly.
#[derive(Default)]
pub struct FakeHostClock {
    now: Mutex<Duration>,
}

impl FakeHostClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    /// Total time slept/advanced so far.
    pub fn elapsed(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}

impl HostClock for FakeHostClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A bounded poll expired without the condition becoming true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollExpired {
    /// Number of polls performed before giving up.
    pub polls: u32,
}

/// Bounded retry-with-backoff loop.
///
/// Replaces open-coded busy-wait loops: the condition is evaluated at most
/// `max_polls` times with `backoff` slept between attempts (none after the
/// last). The poll count is reported on success so tests can assert exactly
/// when a simulated status bit flipped.
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    pub max_polls: u32,
    pub backoff: Duration,
}

impl PollBudget {
    pub const fn new(max_polls: u32, backoff: Duration) -> Self {
        Self { max_polls, backoff }
    }

    /// Polls `ready` until it reports `true`, returning the number of polls
    /// taken (1-based). `Err(Ok(PollExpired))`-style nesting is avoided by
    /// letting the condition's own error type flow out unchanged.
    pub fn poll_until<E>(
        &self,
        clock: &dyn HostClock,
        mut ready: impl FnMut() -> Result<bool, E>,
    ) -> Result<Result<u32, PollExpired>, E> {
        for poll in 1..=self.max_polls {
            if ready()? {
                return Ok(Ok(poll));
            }
            if poll < self.max_polls && !self.backoff.is_zero() {
                clock.sleep(self.backoff);
            }
        }
        Ok(Err(PollExpired { polls: self.max_polls }))
    }
}
