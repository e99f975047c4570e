//! Playback engine
//!
//! A [`Source`] owns the decoder and a background decode thread that fans
//! packets out to every attached [`VideoSink`] and [`AudioSink`]. The host
//! drives time by calling [`Source::update`] (or [`Source::advance`]) from
//! its frame loop; audio output pulls chunks from its sink on its own
//! thread.
//!
//! Locks are always taken in the order transport, registry, sink queue. The
//! decode thread never takes the transport lock.

pub mod audio_sink;
pub mod pacing;
pub mod source;
pub mod video_sink;

pub use audio_sink::AudioSink;
pub use pacing::FramePacer;
pub use source::{DecodeStats, Source};
pub use video_sink::VideoSink;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
///
/// Every structure guarded here stays consistent between statements, so a
/// panic elsewhere never leaves it half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
