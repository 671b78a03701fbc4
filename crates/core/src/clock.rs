// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that provides the current wall time.
///
/// Session expiry and download-token validity are all epoch-seconds math,
/// so the trait exposes seconds rather than `Instant`.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch, with sub-second precision.
    fn epoch_secs(&self) -> f64;

    /// Seconds since the Unix epoch, truncated.
    fn epoch_secs_u64(&self) -> u64 {
        self.epoch_secs() as u64
    }
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    secs: Arc<Mutex<f64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { secs: Arc::new(Mutex::new(1_000_000.0)) }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        *self.secs.lock() += duration.as_secs_f64();
    }

    /// Set the clock to a specific epoch time
    pub fn set_epoch_secs(&self, secs: f64) {
        *self.secs.lock() = secs;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn epoch_secs(&self) -> f64 {
        *self.secs.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
