// SPDX-License-Identifier: MIT

use chrono::Utc;

/// Source of "now" in epoch milliseconds. Injected into the caching layers
/// so expiration can be tested without wall-clock sleeps.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time source used outside of tests.
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
