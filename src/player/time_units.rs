// SPDX-License-Identifier: MPL-2.0
//! Time unit conversion utilities for playback.
//!
//! Container timestamps are expressed in a per-stream time base
//! (`numerator / denominator` seconds per tick). The player works in
//! whole milliseconds everywhere else.

/// Milliseconds per second.
pub const MILLIS_PER_SECOND: i64 = 1_000;

/// A stream time base: `num / den` seconds per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    #[must_use]
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Ticks to milliseconds in this time base.
    #[must_use]
    pub fn to_ms(self, ticks: i64) -> i64 {
        ticks_to_ms(ticks, self.num, self.den)
    }

    /// Milliseconds to ticks in this time base.
    #[must_use]
    pub fn from_ms(self, ms: i64) -> i64 {
        ms_to_ticks(ms, self.num, self.den)
    }
}

impl From<ffmpeg_next::Rational> for TimeBase {
    fn from(rational: ffmpeg_next::Rational) -> Self {
        Self::new(rational.numerator(), rational.denominator())
    }
}

/// Converts a timestamp in `num/den` time base ticks to milliseconds.
///
/// A zero denominator yields 0.
///
/// # Examples
///
/// ```
/// use fbplay::player::time_units::ticks_to_ms;
///
/// assert_eq!(ticks_to_ms(90_000, 1, 90_000), 1_000);
/// assert_eq!(ticks_to_ms(3, 1, 25), 120);
/// ```
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn ticks_to_ms(ticks: i64, num: i32, den: i32) -> i64 {
    if den == 0 {
        return 0;
    }
    let scaled = i128::from(ticks) * i128::from(num) * i128::from(MILLIS_PER_SECOND);
    (scaled / i128::from(den)) as i64
}

/// Converts milliseconds to `num/den` time base ticks.
///
/// A zero numerator yields 0.
///
/// # Examples
///
/// ```
/// use fbplay::player::time_units::ms_to_ticks;
///
/// assert_eq!(ms_to_ticks(1_000, 1, 90_000), 90_000);
/// ```
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub fn ms_to_ticks(ms: i64, num: i32, den: i32) -> i64 {
    if num == 0 {
        return 0;
    }
    let scaled = i128::from(ms) * i128::from(den);
    (scaled / (i128::from(num) * i128::from(MILLIS_PER_SECOND))) as i64
}

/// Splits a position into `(minutes, seconds, tenths)` for display.
#[must_use]
pub fn split_position(ms: i64) -> (i64, i64, i64) {
    let ms = ms.max(0);
    let tenths = ms / 100;
    (tenths / 600, (tenths / 10) % 60, tenths % 10)
}

/// Position as a permille of the duration, or 0 when the duration is unknown.
#[must_use]
pub fn permille(position_ms: i64, duration_ms: i64) -> i64 {
    if duration_ms <= 0 {
        return 0;
    }
    let value = i128::from(position_ms.max(0)) * 1000 / i128::from(duration_ms);
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_to_ms_uses_time_base() {
        assert_eq!(ticks_to_ms(0, 1, 1000), 0);
        assert_eq!(ticks_to_ms(1500, 1, 1000), 1500);
        assert_eq!(ticks_to_ms(45_000, 1, 90_000), 500);
        assert_eq!(ticks_to_ms(1001, 1001, 30_000), 33);
    }

    #[test]
    fn ticks_to_ms_handles_degenerate_time_base() {
        assert_eq!(ticks_to_ms(1234, 1, 0), 0);
    }

    #[test]
    fn ms_to_ticks_inverts_time_base() {
        assert_eq!(ms_to_ticks(2_000, 1, 44_100), 88_200);
        assert_eq!(ms_to_ticks(40, 1, 25), 1);
        assert_eq!(ms_to_ticks(10, 0, 25), 0);
    }

    #[test]
    fn large_timestamps_do_not_overflow() {
        // 24 hours at a 90 kHz clock
        let ticks = 24 * 3600 * 90_000_i64;
        assert_eq!(ticks_to_ms(ticks, 1, 90_000), 86_400_000);
    }

    #[test]
    fn time_base_round_trips_whole_ticks() {
        let tb = TimeBase::new(1, 90_000);
        assert_eq!(tb.to_ms(tb.from_ms(1_000)), 1_000);
        assert_eq!(
            TimeBase::from(ffmpeg_next::Rational::new(1, 48_000)),
            TimeBase::new(1, 48_000)
        );
    }

    #[test]
    fn split_position_formats_minutes_seconds_tenths() {
        assert_eq!(split_position(0), (0, 0, 0));
        assert_eq!(split_position(61_250), (1, 1, 2));
        assert_eq!(split_position(3_599_999), (59, 59, 9));
        assert_eq!(split_position(-5), (0, 0, 0));
    }

    #[test]
    fn permille_of_unknown_duration_is_zero() {
        assert_eq!(permille(5000, 0), 0);
        assert_eq!(permille(500, 1000), 500);
        assert_eq!(permille(1000, 1000), 1000);
    }
}
