//! Duration helpers for frame and sample arithmetic
//!
//! All clock math in kinema is done on `std::time::Duration` (nanosecond
//! integer precision), so splitting an interval across several ticks never
//! drifts from handling it in one step.

use std::time::Duration;

/// Frame rate assumed when a stream reports no usable rate
pub const FALLBACK_FRAME_RATE: f64 = 29.97;

/// Duration of one frame for a rational frame rate `num / den`.
///
/// Falls back to [`FALLBACK_FRAME_RATE`] when either term is zero.
pub fn frame_interval(num: u32, den: u32) -> Duration {
    if num == 0 || den == 0 {
        return Duration::from_secs_f64(1.0 / FALLBACK_FRAME_RATE);
    }
    // den/num seconds, computed in nanoseconds to stay exact for integer rates
    let nanos = (den as u128 * 1_000_000_000) / num as u128;
    Duration::from_nanos(nanos as u64)
}

/// Wall-clock duration covered by `frames` sample frames at `sample_rate`
pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = (frames as u128 * 1_000_000_000) / sample_rate as u128;
    Duration::from_nanos(nanos as u64)
}

/// Number of whole sample frames that fit in `duration` at `sample_rate`
pub fn duration_to_frames(duration: Duration, sample_rate: u32) -> u64 {
    ((duration.as_nanos() * sample_rate as u128) / 1_000_000_000) as u64
}

/// Scale a duration by a positive multiplier, saturating on overflow
pub fn scale_duration(duration: Duration, factor: f64) -> Duration {
    if factor == 1.0 {
        return duration;
    }
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
