// SPDX-License-Identifier: MPL-2.0
//! Per-stream playback clock and wall-clock pacing.
//!
//! Every [`TimedStream`](super::stream::TimedStream) owns a [`StreamClock`]
//! that turns raw container timestamps into a monotonic position and the
//! duration of the last decoded unit. The pacer converts that duration into
//! real sleep time against a wall-clock baseline.
//!
//! # Pacing
//!
//! ```text
//!   baseline        baseline + delay
//!      │◀──── delay ────▶│
//!      │     now ─▶ sleep │  baseline += delay
//!      │                  │ now ─▶ baseline = now (behind schedule)
//! ```

use crate::config::{JITTER_TOLERANCE_MS, MAX_UNIT_DURATION_MS, MIN_PACE_MS};
use crate::player::time_units::TimeBase;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Reference instant all wall-clock readings are measured from.
static REFERENCE_INSTANT: OnceLock<Instant> = OnceLock::new();

/// Source of wall-clock time for the pacer.
pub trait WallClock {
    /// Milliseconds elapsed on a monotonic clock.
    fn now_ms(&self) -> i64;

    /// Blocks the calling thread for `ms` milliseconds.
    fn sleep_ms(&self, ms: i64);
}

/// Monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> i64 {
        let reference = REFERENCE_INSTANT.get_or_init(Instant::now);
        Instant::now().duration_since(*reference).as_millis() as i64
    }

    #[allow(clippy::cast_sign_loss)]
    fn sleep_ms(&self, ms: i64) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
    }
}

/// Normalized timing state of one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamClock {
    position_ms: i64,
    duration_ms: i64,
    /// Wall-clock time the last paced unit was due; `None` after a seek.
    baseline_ms: Option<i64>,
}

impl StreamClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position in milliseconds.
    #[must_use]
    pub fn position_ms(&self) -> i64 {
        self.position_ms
    }

    /// Duration of the last decoded unit, within `[0, 1000]`.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    #[must_use]
    pub fn baseline_ms(&self) -> Option<i64> {
        self.baseline_ms
    }

    /// Feeds the decode timestamp of a newly read unit.
    ///
    /// A missing timestamp counts as 0. Backward jumps within the jitter
    /// tolerance leave the position untouched.
    pub fn observe(&mut self, raw: Option<i64>, time_base: TimeBase) {
        let ts = raw.map_or(0, |ticks| time_base.to_ms(ticks));
        self.observe_ms(ts);
    }

    /// Same as [`observe`](Self::observe) with a timestamp already in ms.
    pub fn observe_ms(&mut self, ts: i64) {
        self.duration_ms = (ts - self.position_ms).clamp(0, MAX_UNIT_DURATION_MS);
        if ts > self.position_ms || ts + JITTER_TOLERANCE_MS < self.position_ms {
            self.position_ms = ts;
        }
    }

    /// Forgets the pacing baseline so the next [`pace`](Self::pace) starts fresh.
    pub fn invalidate(&mut self) {
        self.baseline_ms = None;
    }

    /// Sleeps until the last unit's duration has elapsed since the previous unit.
    ///
    /// Returns the number of milliseconds slept. When the schedule is already
    /// missed (or there is no baseline yet) the baseline snaps to now and no
    /// sleep happens, so accumulated lag is dropped rather than caught up.
    pub fn pace(&mut self, wall: &impl WallClock) -> i64 {
        let delay = self.duration_ms.max(MIN_PACE_MS);
        let now = wall.now_ms();
        match self.baseline_ms {
            Some(baseline) if now < baseline + delay => {
                let wait = (baseline + delay - now).min(delay);
                wall.sleep_ms(wait);
                self.baseline_ms = Some(baseline + delay);
                wait
            }
            _ => {
                self.baseline_ms = Some(now);
                0
            }
        }
    }
}

/// Audio position minus video position.
#[must_use]
pub fn drift_ms(audio: &StreamClock, video: &StreamClock) -> i64 {
    audio.position_ms() - video.position_ms()
}
