/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Wall-clock timestamps on the tick grid.
//!
//! The external timing reference fires once per second (PPS), so every
//! scheduling decision is made in whole seconds.  The microsecond part is only
//! kept so the tick handler can measure how far a tick landed from the second
//! boundary.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const USEC_PER_SEC: u32 = 1_000_000;

// ── Timestamp ─────────────────────────────────────────────────────────────────

/// A wall-clock instant with microsecond resolution.
///
/// Ordering is lexicographic on `(sec, usec)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub sec: u64,
    pub usec: u32,
}

impl Timestamp {
    /// A timestamp exactly on the second boundary.
    pub const fn from_secs(sec: u64) -> Self {
        Self { sec, usec: 0 }
    }

    /// Build a timestamp from seconds and microseconds, normalising an
    /// overflowing microsecond count into the seconds field.
    pub fn new(sec: u64, usec: u32) -> Self {
        Self {
            sec: sec + u64::from(usec / USEC_PER_SEC),
            usec: usec % USEC_PER_SEC,
        }
    }

    /// Current system time.  Falls back to the epoch if the clock is set
    /// before 1970.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(t: SystemTime) -> Self {
        let d = t.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            sec: d.as_secs(),
            usec: d.subsec_micros(),
        }
    }

    /// Round to the nearest whole second.
    ///
    /// A PPS-triggered tick is delivered a few milliseconds after (or, with an
    /// early timer, before) the second boundary it marks.
    pub fn round_to_sec(self) -> Self {
        if self.usec >= USEC_PER_SEC / 2 {
            Self::from_secs(self.sec + 1)
        } else {
            Self::from_secs(self.sec)
        }
    }

    /// Distance in microseconds from the nearest second boundary.
    pub fn jitter_us(self) -> u32 {
        self.usec.min(USEC_PER_SEC - self.usec)
    }

    pub fn add_secs(self, secs: u64) -> Self {
        Self {
            sec: self.sec.saturating_add(secs),
            usec: self.usec,
        }
    }

    /// Whole seconds by which `self` lies before `other`; zero if it does not.
    pub fn secs_before(self, other: Timestamp) -> u64 {
        other.sec.saturating_sub(self.sec)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.sec, self.usec)
    }
}

// ── Phase grid ────────────────────────────────────────────────────────────────

/// Next point of the periodic grid anchored at `prev` that lies strictly after
/// `max(prev, now)`.
///
/// `prev` is itself a grid point (the last scheduled execution), so the
/// result is always `prev + k * period` for some `k >= 1`, however many ticks
/// were skipped in between.  `period` must be non-zero.
pub fn next_on_grid(prev: Timestamp, now: Timestamp, period: u64) -> Timestamp {
    debug_assert!(period > 0, "next_on_grid called with a zero period");
    let period = period.max(1);
    let base = prev.sec.max(now.sec);
    let offset = (base - prev.sec) % period;
    Timestamp::from_secs(base + (period - offset))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
