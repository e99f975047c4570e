//! Frame pacing for video sinks
//!
//! Converts wall-clock ticks into a count of frames that are due. Elapsed
//! time accumulates across ticks and only whole frame intervals are
//! consumed, the remainder carrying over, so one tick of `3 * interval`
//! and three ticks of `interval` leave the pacer in the same state.

use std::time::Duration;

/// Counts frames that are due for presentation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramePacer {
    frame_interval: Duration,
    /// Wall time accumulated toward the next frame, always `< frame_interval`
    elapsed: Duration,
    /// Frames due for presentation (the oldest of which are dropped)
    pending: u64,
}

impl FramePacer {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            elapsed: Duration::ZERO,
            pending: 0,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Change the frame interval, keeping the counters
    pub fn set_frame_interval(&mut self, frame_interval: Duration) {
        self.frame_interval = frame_interval;
        if !frame_interval.is_zero() && self.elapsed >= frame_interval {
            self.elapsed = nanos_to_duration(self.elapsed.as_nanos() % frame_interval.as_nanos());
        }
    }

    /// Accumulate `delta` of wall time; returns how many more frames became due
    pub fn advance(&mut self, delta: Duration) -> u64 {
        if self.frame_interval.is_zero() {
            return 0;
        }
        // Any two durations sum without overflow in u128 nanoseconds
        let interval = self.frame_interval.as_nanos();
        let elapsed = self.elapsed.as_nanos() + delta.as_nanos();
        let frames = u64::try_from(elapsed / interval).unwrap_or(u64::MAX);
        self.elapsed = nanos_to_duration(elapsed % interval);
        self.pending = self.pending.saturating_add(frames);
        frames
    }

    /// Frames currently due
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Consume one due frame
    pub fn consume(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Make the next available frame due immediately
    pub fn start(&mut self) {
        self.elapsed = Duration::ZERO;
        self.pending = 1;
    }

    /// Nothing due, no time accumulated
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.pending = 0;
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    Duration::new((nanos / 1_000_000_000) as u64, (nanos % 1_000_000_000) as u32)
}
