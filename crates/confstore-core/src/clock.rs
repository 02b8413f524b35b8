//! Time sources.
//!
//! Version ids and change-log row keys are derived from ticks, so every
//! clock hands out strictly increasing tick values even when the wall clock
//! stalls or steps backwards.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Timestamp;

/// Ticks are 100ns units.
pub const TICKS_PER_MILLI: i64 = 10_000;

/// A source of wall-clock time and monotonic ticks.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;

    /// A tick value strictly greater than every value previously returned
    /// by this clock.
    fn next_ticks(&self) -> i64;
}

/// Raises a candidate tick so it is strictly above the last one handed out.
#[derive(Debug, Default)]
struct TickCounter {
    last: AtomicI64,
}

impl TickCounter {
    fn next(&self, candidate: i64) -> i64 {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = candidate.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

/// The system wall clock.
#[derive(Debug, Default)]
pub struct SystemClock {
    ticks: TickCounter,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shareable instance.
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }

    fn wall_nanos() -> i128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i128)
            .unwrap_or(0)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis((Self::wall_nanos() / 1_000_000) as i64)
    }

    fn next_ticks(&self) -> i64 {
        self.ticks.next((Self::wall_nanos() / 100) as i64)
    }
}

/// A manually driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
    ticks: TickCounter,
}

impl ManualClock {
    /// Start at the given time.
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.as_millis()),
            ticks: TickCounter::default(),
        }
    }

    /// Move time forward.
    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::AcqRel);
    }

    /// Jump to an absolute time.
    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.as_millis(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::Acquire))
    }

    fn next_ticks(&self) -> i64 {
        self.ticks.next(self.now().as_ticks())
    }
}
