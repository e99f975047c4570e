//! Video sink: paced frame presentation
//!
//! A video sink holds the packets the source delivered to it and, on every
//! tick, advances by however many frame intervals of playback time have
//! elapsed. When it falls behind it drops the overdue frames and keeps only
//! the newest due one as its current frame. Frames are never presented
//! early: a zero-length tick never makes a new frame due.
//!
//! Entering Playing from Stopped (or attaching to a source that is playing
//! or paused) makes the first available frame due immediately. Entering
//! Stopped empties the queue and zeroes the counters; the last presented
//! frame is kept for display.

use crate::media::{StreamInfo, VideoPacket, SharedVideoPacket};
use crate::playback::lock;
use crate::playback::pacing::FramePacer;
use crate::playback::source::{Source, SourceShared};
use kinema_common::PlaybackState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::trace;
use uuid::Uuid;

struct VideoSinkInner {
    source: Weak<SourceShared>,
    /// Source is loaded with a video stream
    active: bool,
    queue: VecDeque<SharedVideoPacket>,
    pacer: FramePacer,
    played_frames: u64,
    dropped_frames: u64,
    last_frame: Option<VideoPacket>,
}

impl VideoSinkInner {
    fn enter(&mut self, state: PlaybackState) {
        match state {
            PlaybackState::Stopped => self.clear(),
            PlaybackState::Playing | PlaybackState::Paused => {
                self.pacer.start();
                self.played_frames = 0;
                self.dropped_frames = 0;
            }
        }
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.pacer.reset();
        self.played_frames = 0;
        self.dropped_frames = 0;
    }

    /// Pop every due frame, dropping all but the newest
    fn present_due(&mut self) {
        while self.pacer.pending() > 0 {
            let Some(packet) = self.queue.pop_front() else {
                break;
            };
            self.played_frames += 1;

            if self.pacer.pending() > 1 {
                self.pacer.consume();
                self.dropped_frames += 1;
                trace!("Dropped late frame at {:?}", packet.presentation_time());
                continue;
            }

            self.pacer.consume();
            self.last_frame = Some((*packet).clone());
            break;
        }
    }
}

/// Registry-side half of a video sink
pub(crate) struct VideoSinkCore {
    id: Uuid,
    inner: Mutex<VideoSinkInner>,
}

impl VideoSinkCore {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Mutex::new(VideoSinkInner {
                source: Weak::new(),
                active: false,
                queue: VecDeque::new(),
                pacer: FramePacer::default(),
                played_frames: 0,
                dropped_frames: 0,
                last_frame: None,
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
        let video = info.and_then(|info| info.video);
        let mut inner = lock(&self.inner);
        inner.active = video.is_some();
        inner.pacer.set_frame_interval(video.map(|v| v.frame_interval).unwrap_or(Duration::ZERO));
        inner.last_frame = None;
        inner.enter(state);
    }

    pub(crate) fn detach_source(&self) {
        let mut inner = lock(&self.inner);
        inner.source = Weak::new();
        inner.active = false;
        inner.clear();
    }

    pub(crate) fn push(&self, packet: SharedVideoPacket) {
        lock(&self.inner).queue.push_back(packet);
    }

    pub(crate) fn queued_len(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    pub(crate) fn state_changed(&self, previous: PlaybackState, next: PlaybackState) {
        let mut inner = lock(&self.inner);
        match next {
            PlaybackState::Playing if previous == PlaybackState::Stopped => inner.enter(PlaybackState::Playing),
            PlaybackState::Stopped => inner.clear(),
            _ => {}
        }
    }

    /// Advance by `delta` of playback time with the source in `state`
    pub(crate) fn tick(&self, delta: Duration, state: PlaybackState) {
        let mut inner = lock(&self.inner);
        if !inner.active {
            return;
        }
        if state == PlaybackState::Playing {
            inner.pacer.advance(delta);
        }
        inner.present_due();
    }

    fn source(&self) -> Option<Arc<SourceShared>> {
        lock(&self.inner).source.upgrade()
    }

    fn detach(&self) {
        let source = std::mem::take(&mut lock(&self.inner).source);
        if let Some(shared) = source.upgrade() {
            shared.remove_video_sink(self.id);
        }
    }
}

/// Consumer of a source's video frames
///
/// Dropping the sink detaches it from its source.
pub struct VideoSink {
    core: Arc<VideoSinkCore>,
}

impl VideoSink {
    /// Attach a new sink to `source`
    pub fn new(source: &Source) -> Self {
        let core = Arc::new(VideoSinkCore::new());
        source.attach_video_sink(&core);
        Self { core }
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// Advance this sink alone by `delta` of wall time.
    ///
    /// [`Source::update`] already ticks every attached sink; use this only
    /// for sinks paced independently of the source's update loop.
    pub fn tick(&self, delta: Duration) {
        let Some(shared) = self.core.source() else {
            return;
        };
        let delta = kinema_common::time::scale_duration(delta, shared.playback_rate());
        self.core.tick(delta, shared.state());
    }

    /// Copy of the most recently presented frame
    pub fn last_frame(&self) -> Option<VideoPacket> {
        lock(&self.core.inner).last_frame.clone()
    }

    /// Borrow the most recently presented frame without copying it.
    ///
    /// The sink stays locked while `f` runs: `f` must not call into this
    /// sink or its source (`update`, `advance` and the transport controls
    /// lock every sink and would deadlock).
    pub fn with_last_frame<R>(&self, f: impl FnOnce(Option<&VideoPacket>) -> R) -> R {
        let inner = lock(&self.core.inner);
        f(inner.last_frame.as_ref())
    }

    /// Frames consumed since playback started, dropped ones included
    pub fn played_frame_count(&self) -> u64 {
        lock(&self.core.inner).played_frames
    }

    /// Frames skipped to catch up since playback started
    pub fn dropped_frame_count(&self) -> u64 {
        lock(&self.core.inner).dropped_frames
    }

    pub fn queued_len(&self) -> usize {
        self.core.queued_len()
    }

    pub fn frame_interval(&self) -> Duration {
        lock(&self.core.inner).pacer.frame_interval()
    }

    /// Whether the source this sink was attached to still exists
    pub fn is_attached(&self) -> bool {
        self.core.source().is_some()
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        self.core.detach();
    }
}
