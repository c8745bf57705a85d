//! # Clocks
//!
//! Lock maturity is a comparison against "now", so where "now" comes from
//! is an injected dependency. Production uses [`SystemClock`]; tests crank
//! a [`ManualClock`] by hand.
//!
//! Timestamps are whole seconds since the Unix epoch, the same resolution
//! a block timestamp has.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// A source of the current time in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time that never goes backwards.
///
/// If the host clock steps back (NTP correction, manual change) we keep
/// returning the highest value seen so far. A lock that has matured stays
/// matured.
#[derive(Debug, Default)]
pub struct SystemClock {
    high_water: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        let wall = Utc::now().timestamp().max(0) as u64;
        let previous = self.high_water.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, timestamp: u64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
