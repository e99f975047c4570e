//! Audio sink: pull-based PCM delivery
//!
//! An audio output thread calls [`AudioSink::pull_next_chunk`] whenever it
//! needs more samples. The pull blocks (polling, without holding any lock)
//! until a chunk is queued, and gives up once no more data can arrive: the
//! source was stopped or seeked, reached or is draining to the end of the
//! stream, or went away.
//!
//! The sink keeps a running drift estimate: wall time spent between pulls
//! is subtracted, the duration of every delivered chunk is added. A
//! positive drift means the output has been handed audio ahead of the wall
//! clock. The drift and the offset correction threshold are exposed for the
//! output to act on; the sink itself never inserts or skips samples.

use crate::media::{SharedAudioPacket, StreamInfo};
use crate::playback::lock;
use crate::playback::source::{Source, SourceShared};
use kinema_common::PlaybackState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;
use uuid::Uuid;

struct AudioSinkInner {
    source: Weak<SourceShared>,
    /// Source is loaded with an audio stream
    active: bool,
    queue: VecDeque<SharedAudioPacket>,
    sample_rate: u32,
    channel_count: u16,
    offset_correction: Duration,
    played_samples: u64,
    /// Delivered audio minus elapsed wall time, in nanoseconds
    drift_nanos: i128,
    /// Wall clock mark for drift accounting
    clock: Instant,
}

impl AudioSinkInner {
    fn enter(&mut self, state: PlaybackState) {
        match state {
            PlaybackState::Playing => self.clock = Instant::now(),
            PlaybackState::Stopped => self.clear(),
            PlaybackState::Paused => {}
        }
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.played_samples = 0;
        self.drift_nanos = 0;
    }

    fn account_wall_time(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.clock);
        self.clock = now;
        self.drift_nanos -= elapsed.as_nanos() as i128;
    }

    fn pop(&mut self) -> Option<SharedAudioPacket> {
        let chunk = self.queue.pop_front()?;
        self.account_wall_time();
        self.drift_nanos += chunk.duration(self.sample_rate).as_nanos() as i128;
        self.played_samples += chunk.sample_count() as u64;
        Some(chunk)
    }
}

/// Registry-side half of an audio sink
pub(crate) struct AudioSinkCore {
    id: Uuid,
    inner: Mutex<AudioSinkInner>,
}

impl AudioSinkCore {
    fn new(offset_correction: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Mutex::new(AudioSinkInner {
                source: Weak::new(),
                active: false,
                queue: VecDeque::new(),
                sample_rate: 0,
                channel_count: 0,
                offset_correction,
                played_samples: 0,
                drift_nanos: 0,
                clock: Instant::now(),
            }),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Attach to `source` in its current `state`
    pub(crate) fn bind(&self, source: Weak<SourceShared>, info: Option<&StreamInfo>, state: PlaybackState) {
        lock(&self.inner).source = source;
        self.prime(info, state);
    }

    /// Pick up stream properties after a (re)load and apply entry behaviour
    pub(crate) fn prime(&self, info: Option<&StreamInfo>, state: PlaybackState) {
        let audio = info.and_then(|info| info.audio);
        let mut inner = lock(&self.inner);
        inner.active = audio.is_some();
        inner.sample_rate = audio.map(|a| a.sample_rate).unwrap_or(0);
        inner.channel_count = audio.map(|a| a.channel_count).unwrap_or(0);
        inner.enter(state);
    }

    pub(crate) fn detach_source(&self) {
        let mut inner = lock(&self.inner);
        inner.source = Weak::new();
        inner.active = false;
        inner.clear();
    }

    pub(crate) fn push(&self, packet: SharedAudioPacket) {
        lock(&self.inner).queue.push_back(packet);
    }

    pub(crate) fn queued_len(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    pub(crate) fn state_changed(&self, _previous: PlaybackState, next: PlaybackState) {
        lock(&self.inner).enter(next);
    }

    fn detach(&self) {
        let source = std::mem::take(&mut lock(&self.inner).source);
        if let Some(shared) = source.upgrade() {
            shared.remove_audio_sink(self.id);
        }
    }
}

/// Consumer of a source's audio
///
/// Share it with the output thread behind an `Arc`; dropping the last
/// handle detaches it from its source.
pub struct AudioSink {
    core: Arc<AudioSinkCore>,
}

impl AudioSink {
    /// Attach a new sink to `source`
    pub fn new(source: &Source) -> Self {
        let core = Arc::new(AudioSinkCore::new(source.audio_offset_correction()));
        source.attach_audio_sink(&core);
        Self { core }
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// Block until the next chunk is available.
    ///
    /// Returns `None` without waiting if the source has no audio, and
    /// returns `None` once waiting is pointless: the source was stopped or
    /// seeked, reached the end of the stream, or was dropped.
    ///
    /// A source that is draining (its decoder has finished) counts as ended
    /// for this sink as soon as the queue is empty, without waiting for
    /// [`Source::update`] to raise the end-of-stream flag.
    pub fn pull_next_chunk(&self) -> Option<SharedAudioPacket> {
        let (shared, epoch) = {
            let inner = lock(&self.core.inner);
            if !inner.active {
                return None;
            }
            let shared = inner.source.upgrade()?;
            let epoch = shared.stop_epoch();
            (shared, epoch)
        };
        let poll = shared.config().audio_poll();

        loop {
            if let Some(chunk) = lock(&self.core.inner).pop() {
                return Some(chunk);
            }

            let interrupted = shared.stop_epoch() != epoch || shared.is_end_of_stream();
            let detached = lock(&self.core.inner).source.strong_count() == 0;
            if interrupted || detached {
                lock(&self.core.inner).account_wall_time();
                trace!("Audio pull on sink {} interrupted", self.core.id);
                return None;
            }

            if shared.is_draining() {
                // Nothing more will be queued: end here rather than wait for
                // the end-of-stream flag. The last chunk may have landed after
                // the empty check above.
                let mut inner = lock(&self.core.inner);
                let chunk = inner.pop();
                if chunk.is_none() {
                    inner.account_wall_time();
                }
                return chunk;
            }

            thread::sleep(poll);
        }
    }

    /// Take the next chunk if one is queued, without waiting
    pub fn try_pull_next_chunk(&self) -> Option<SharedAudioPacket> {
        let mut inner = lock(&self.core.inner);
        if !inner.active {
            return None;
        }
        inner.pop()
    }

    pub fn queued_len(&self) -> usize {
        self.core.queued_len()
    }

    /// Sample rate of delivered chunks; zero without audio
    pub fn sample_rate(&self) -> u32 {
        lock(&self.core.inner).sample_rate
    }

    /// Channels per delivered frame (1 or 2); zero without audio
    pub fn channel_count(&self) -> u16 {
        lock(&self.core.inner).channel_count
    }

    /// Playback rate the output should play chunks at
    pub fn playback_rate(&self) -> f64 {
        self.core_source().map(|s| s.playback_rate()).unwrap_or(1.0)
    }

    /// Drift beyond which the output should resynchronize
    pub fn offset_correction(&self) -> Duration {
        lock(&self.core.inner).offset_correction
    }

    pub fn set_offset_correction(&self, correction: Duration) {
        lock(&self.core.inner).offset_correction = correction;
    }

    /// Audio delivered minus wall time elapsed, in seconds
    pub fn drift(&self) -> f64 {
        lock(&self.core.inner).drift_nanos as f64 / 1_000_000_000.0
    }

    /// Samples per channel delivered since playback started
    pub fn played_sample_count(&self) -> u64 {
        lock(&self.core.inner).played_samples
    }

    /// Whether the source this sink was attached to still exists
    pub fn is_attached(&self) -> bool {
        self.core_source().is_some()
    }

    fn core_source(&self) -> Option<Arc<SourceShared>> {
        lock(&self.core.inner).source.upgrade()
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        self.core.detach();
    }
}
