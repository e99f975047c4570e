//! Media source: decoder ownership, decode thread, transport state machine
//!
//! The source is the single owner of the decoder. While a resource is
//! loaded a background decode thread reads units and fans each converted
//! packet out to every attached sink of the matching kind, pausing whenever
//! all sinks are full (backpressure) or the decoder has hit the end of the
//! resource.
//!
//! **State machine:**
//! - Stopped → Playing (`play`), Playing → Paused (`pause`), Paused → Playing (`play`)
//! - Playing | Paused → Stopped (`stop`), which also rewinds to the start
//! - Every transition is broadcast to every attached sink before the new
//!   state becomes visible
//!
//! **Seek protocol** (`seek`): stop the decode thread, remember whether we
//! were playing, force Stopped (flushing every sink queue and waking blocked
//! audio pulls), reposition and flush the decoder per stream, restart the
//! decode thread, resume playing if we were. Units that predate the target
//! are decoded and skipped.
//!
//! **End of stream:** when the decoder runs dry the source starts draining.
//! Once every relevant sink queue has been consumed while playing (or the
//! offset passes a known duration), `update` stops playback and raises the
//! end-of-stream flag.
//!
//! Control operations are serialized by the transport lock, which is held
//! for the whole of a seek; the decode thread never takes it.

use crate::error::{Error, Result};
use crate::media::{
    AudioPacket, DecodedAudio, DecodedUnit, DecodedVideo, MediaDecoder, MediaOpener, StreamInfo,
    StreamSelection, VideoPacket,
};
use crate::playback::audio_sink::AudioSinkCore;
use crate::playback::lock;
use crate::playback::video_sink::VideoSinkCore;
use kinema_common::time::scale_duration;
use kinema_common::{PlaybackConfig, PlaybackState};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Counters maintained by the decode thread since the last load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Video packets delivered to the sink registry
    pub video_packets: u64,
    /// Audio packets delivered to the sink registry
    pub audio_packets: u64,
    /// Units the decoder could not decode or convert
    pub failed_units: u64,
    /// Units discarded for predating a seek target
    pub skipped_units: u64,
}

#[derive(Debug, Default)]
struct DecodeCounters {
    video_packets: AtomicU64,
    audio_packets: AtomicU64,
    failed_units: AtomicU64,
    skipped_units: AtomicU64,
}

impl DecodeCounters {
    fn snapshot(&self) -> DecodeStats {
        DecodeStats {
            video_packets: self.video_packets.load(Ordering::Relaxed),
            audio_packets: self.audio_packets.load(Ordering::Relaxed),
            failed_units: self.failed_units.load(Ordering::Relaxed),
            skipped_units: self.skipped_units.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.video_packets.store(0, Ordering::Relaxed);
        self.audio_packets.store(0, Ordering::Relaxed);
        self.failed_units.store(0, Ordering::Relaxed);
        self.skipped_units.store(0, Ordering::Relaxed);
    }
}

/// Sinks attached to a source
#[derive(Default)]
pub(crate) struct SinkRegistry {
    video: Vec<Arc<VideoSinkCore>>,
    audio: Vec<Arc<AudioSinkCore>>,
}

/// State shared between the source handle, its decode thread and its sinks
pub(crate) struct SourceShared {
    config: PlaybackConfig,
    registry: Mutex<SinkRegistry>,
    decoder: Mutex<Option<Box<dyn MediaDecoder>>>,

    /// `PlaybackState` as u8; written only under the transport lock
    state: AtomicU8,
    /// Public end-of-stream flag
    end_of_stream: AtomicBool,
    /// Decoder has returned its last unit; sinks are consuming what is left
    draining: AtomicBool,
    /// Decode thread keeps running while set
    decode_running: AtomicBool,
    /// Bumped on every forced transition into Stopped to wake blocked pulls
    stop_epoch: AtomicU64,

    has_video: AtomicBool,
    has_audio: AtomicBool,
    /// f64 bits
    playback_rate: AtomicU64,

    counters: DecodeCounters,
}

impl SourceShared {
    fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(SinkRegistry::default()),
            decoder: Mutex::new(None),
            state: AtomicU8::new(PlaybackState::Stopped.as_u8()),
            end_of_stream: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            decode_running: AtomicBool::new(false),
            stop_epoch: AtomicU64::new(0),
            has_video: AtomicBool::new(false),
            has_audio: AtomicBool::new(false),
            playback_rate: AtomicU64::new(1.0f64.to_bits()),
            counters: DecodeCounters::default(),
        }
    }

    pub(crate) fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlaybackState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn is_end_of_stream(&self) -> bool {
        self.end_of_stream.load(Ordering::Acquire)
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub(crate) fn stop_epoch(&self) -> u64 {
        self.stop_epoch.load(Ordering::Acquire)
    }

    pub(crate) fn playback_rate(&self) -> f64 {
        f64::from_bits(self.playback_rate.load(Ordering::Acquire))
    }

    fn has_video(&self) -> bool {
        self.has_video.load(Ordering::Acquire)
    }

    fn has_audio(&self) -> bool {
        self.has_audio.load(Ordering::Acquire)
    }

    pub(crate) fn remove_video_sink(&self, id: Uuid) {
        let mut registry = lock(&self.registry);
        registry.video.retain(|sink| sink.id() != id);
        debug!("Video sink {} detached ({} remaining)", id, registry.video.len());
    }

    pub(crate) fn remove_audio_sink(&self, id: Uuid) {
        let mut registry = lock(&self.registry);
        registry.audio.retain(|sink| sink.id() != id);
        debug!("Audio sink {} detached ({} remaining)", id, registry.audio.len());
    }

    /// Every attached sink of every present stream kind holds at least
    /// `queue_depth` packets. Vacuously true with no sinks.
    fn sinks_full(&self) -> bool {
        let depth = self.config.queue_depth;
        let registry = lock(&self.registry);
        let video_full = !self.has_video() || registry.video.iter().all(|s| s.queued_len() >= depth);
        let audio_full = !self.has_audio() || registry.audio.iter().all(|s| s.queued_len() >= depth);
        video_full && audio_full
    }

    /// No attached sink of a present stream kind has anything queued
    fn sinks_drained(&self) -> bool {
        let registry = lock(&self.registry);
        let video_empty = !self.has_video() || registry.video.iter().all(|s| s.queued_len() == 0);
        let audio_empty = !self.has_audio() || registry.audio.iter().all(|s| s.queued_len() == 0);
        video_empty && audio_empty
    }

    fn broadcast(&self, previous: PlaybackState, next: PlaybackState) {
        let registry = lock(&self.registry);
        for sink in &registry.video {
            sink.state_changed(previous, next);
        }
        for sink in &registry.audio {
            sink.state_changed(previous, next);
        }
    }

    /// Forced transition into Stopped: wake blocked pulls, flush every sink
    fn enter_stopped(&self, previous: PlaybackState) {
        self.stop_epoch.fetch_add(1, Ordering::AcqRel);
        self.broadcast(previous, PlaybackState::Stopped);
        self.set_state(PlaybackState::Stopped);
    }

    /// Hand stream properties to every sink after a load or unload
    fn prime_sinks(&self, info: Option<&StreamInfo>, state: PlaybackState) {
        let registry = lock(&self.registry);
        for sink in &registry.video {
            sink.prime(info, state);
        }
        for sink in &registry.audio {
            sink.prime(info, state);
        }
    }

    fn stop_decode_thread(&self, transport: &mut Transport) {
        self.decode_running.store(false, Ordering::Release);
        if let Some(handle) = transport.decode_thread.take() {
            match handle.join() {
                Ok(()) => trace!("Decode thread joined"),
                Err(e) => error!("Decode thread panicked: {:?}", e),
            }
        }
    }

    fn start_decode_thread(self: &Arc<Self>, transport: &mut Transport, skip: SeekSkip) -> Result<()> {
        if transport.decode_thread.is_some() || lock(&self.decoder).is_none() {
            return Ok(());
        }

        self.decode_running.store(true, Ordering::Release);
        let shared = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("kinema-decode".to_string())
            .spawn(move || decode_loop(shared, skip))
            .map_err(|e| {
                self.decode_running.store(false, Ordering::Release);
                Error::Internal(format!("Failed to spawn decode thread: {}", e))
            })?;

        transport.decode_thread = Some(handle);
        Ok(())
    }

    /// Reposition and flush the decoder, then restart decoding at `offset`.
    ///
    /// The decode thread must already be stopped.
    fn reposition(self: &Arc<Self>, transport: &mut Transport, offset: Duration) {
        let Some(info) = transport.info.clone() else {
            return;
        };

        {
            let mut decoder = lock(&self.decoder);
            if let Some(decoder) = decoder.as_mut() {
                for kind in info.kinds() {
                    if let Err(e) = decoder.seek(kind, offset) {
                        warn!("Failed to reposition {:?} stream to {:?}: {}", kind, offset, e);
                    }
                    decoder.flush_buffers(kind);
                }
            }
        }

        transport.playing_offset = offset;
        self.draining.store(false, Ordering::Release);

        let skip = SeekSkip {
            video: Some(offset).filter(|_| info.has_video()),
            audio: Some(offset).filter(|_| info.has_audio()),
            sample_rate: info.audio.map(|a| a.sample_rate).unwrap_or(0),
        };
        if let Err(e) = self.start_decode_thread(transport, skip) {
            error!("{}", e);
        }
    }

    fn deliver_video(&self, video: DecodedVideo, skip: &mut SeekSkip) {
        if !self.has_video() {
            return;
        }
        if let Some(target) = skip.video {
            if video.presentation_time < target {
                self.counters.skipped_units.fetch_add(1, Ordering::Relaxed);
                trace!("Skipping video unit at {:?} (seeking to {:?})", video.presentation_time, target);
                return;
            }
            skip.video = None;
        }

        let packet = match VideoPacket::new(video.pixels, video.width, video.height, video.presentation_time) {
            Ok(packet) => Arc::new(packet),
            Err(e) => {
                self.counters.failed_units.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping video unit: {}", e);
                return;
            }
        };

        let registry = lock(&self.registry);
        for sink in &registry.video {
            sink.push(Arc::clone(&packet));
        }
        self.counters.video_packets.fetch_add(1, Ordering::Relaxed);
    }

    fn deliver_audio(&self, audio: DecodedAudio, skip: &mut SeekSkip) {
        if !self.has_audio() {
            return;
        }
        let audio = match skip.audio {
            Some(target) => match audio.trim_before(target, skip.sample_rate) {
                Some(trimmed) => {
                    skip.audio = None;
                    trimmed
                }
                None => {
                    self.counters.skipped_units.fetch_add(1, Ordering::Relaxed);
                    trace!("Skipping audio unit before {:?}", target);
                    return;
                }
            },
            None => audio,
        };

        let packet = match AudioPacket::new(audio.samples, audio.channel_count, audio.presentation_time) {
            Ok(packet) => Arc::new(packet),
            Err(e) => {
                self.counters.failed_units.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping audio unit: {}", e);
                return;
            }
        };

        let registry = lock(&self.registry);
        for sink in &registry.audio {
            sink.push(Arc::clone(&packet));
        }
        self.counters.audio_packets.fetch_add(1, Ordering::Relaxed);
    }
}

/// Seek target still to be reached, per stream
#[derive(Debug, Clone, Copy, Default)]
struct SeekSkip {
    video: Option<Duration>,
    audio: Option<Duration>,
    sample_rate: u32,
}

/// Decode thread main loop
fn decode_loop(shared: Arc<SourceShared>, mut skip: SeekSkip) {
    debug!("Decode thread started");
    let idle = shared.config.decode_idle();

    while shared.decode_running.load(Ordering::Acquire) {
        if shared.is_draining() || shared.sinks_full() {
            thread::sleep(idle);
            continue;
        }

        let unit = {
            let mut decoder = lock(&shared.decoder);
            match decoder.as_mut() {
                Some(decoder) => decoder.read_next_unit(),
                None => break,
            }
        };

        match unit {
            Ok(DecodedUnit::Video(video)) => shared.deliver_video(video, &mut skip),
            Ok(DecodedUnit::Audio(audio)) => shared.deliver_audio(audio, &mut skip),
            Ok(DecodedUnit::EndOfStream) => {
                shared.draining.store(true, Ordering::Release);
                debug!("Decoder reached end of stream, draining sink queues");
            }
            Err(e) => {
                shared.counters.failed_units.fetch_add(1, Ordering::Relaxed);
                debug!("Skipping undecodable unit: {}", e);
            }
        }
    }

    debug!("Decode thread exiting");
}

/// Fields serialized by the transport lock
struct Transport {
    resource: Option<PathBuf>,
    info: Option<StreamInfo>,
    playing_offset: Duration,
    last_update: Instant,
    decode_thread: Option<JoinHandle<()>>,
}

/// A loadable media source with transport controls
///
/// Sinks attach with [`VideoSink::new`](crate::VideoSink::new) and
/// [`AudioSink::new`](crate::AudioSink::new) and may outlive the source;
/// dropping the source stops decoding and leaves its sinks inert.
pub struct Source {
    shared: Arc<SourceShared>,
    transport: Mutex<Transport>,
    opener: Arc<dyn MediaOpener>,
}

impl Source {
    /// Create an unloaded source with default playback parameters
    pub fn new(opener: Arc<dyn MediaOpener>) -> Self {
        Self::build(opener, PlaybackConfig::default())
    }

    /// Create an unloaded source with explicit playback parameters
    pub fn with_config(opener: Arc<dyn MediaOpener>, config: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(opener, config))
    }

    fn build(opener: Arc<dyn MediaOpener>, config: PlaybackConfig) -> Self {
        Self {
            shared: Arc::new(SourceShared::new(config)),
            transport: Mutex::new(Transport {
                resource: None,
                info: None,
                playing_offset: Duration::ZERO,
                last_update: Instant::now(),
                decode_thread: None,
            }),
            opener,
        }
    }

    fn lock_transport(&self) -> MutexGuard<'_, Transport> {
        lock(&self.transport)
    }

    /// Open `resource`, replacing whatever was loaded.
    ///
    /// On failure the source is left unloaded; attached sinks stay
    /// registered but receive nothing until a later load succeeds.
    pub fn load(&self, resource: impl AsRef<Path>, enable_video: bool, enable_audio: bool) -> Result<()> {
        let resource = resource.as_ref();
        let mut transport = self.lock_transport();
        self.unload_locked(&mut transport);

        let selection = StreamSelection {
            video: enable_video,
            audio: enable_audio,
        };

        let decoder = match self.opener.open(resource, selection) {
            Ok(decoder) => decoder,
            Err(e) => {
                warn!("Failed to load {}: {}", resource.display(), e);
                return Err(match e {
                    Error::Load(msg) => Error::Load(msg),
                    other => Error::Load(format!("{}: {}", resource.display(), other)),
                });
            }
        };

        let info = decoder.info().clone().restricted_to(selection);
        if !info.has_video() && !info.has_audio() {
            warn!("Failed to load {}: no decodable stream", resource.display());
            return Err(Error::Load(format!("{}: no decodable stream", resource.display())));
        }

        self.shared.has_video.store(info.has_video(), Ordering::Release);
        self.shared.has_audio.store(info.has_audio(), Ordering::Release);
        self.shared.counters.reset();
        *lock(&self.shared.decoder) = Some(decoder);

        transport.resource = Some(resource.to_path_buf());
        transport.info = Some(info.clone());
        transport.playing_offset = Duration::ZERO;
        transport.last_update = Instant::now();

        self.shared.prime_sinks(Some(&info), PlaybackState::Stopped);

        if let Err(e) = self.shared.start_decode_thread(&mut transport, SeekSkip::default()) {
            self.unload_locked(&mut transport);
            return Err(e);
        }

        info!(
            "Loaded {} (video: {:?}, audio: {:?}, duration: {:?})",
            resource.display(),
            info.video,
            info.audio,
            info.duration
        );
        Ok(())
    }

    fn unload_locked(&self, transport: &mut Transport) {
        self.shared.stop_decode_thread(transport);

        let previous = self.shared.state();
        if previous != PlaybackState::Stopped {
            self.shared.enter_stopped(previous);
        }

        if lock(&self.shared.decoder).take().is_some() {
            if let Some(resource) = &transport.resource {
                debug!("Closed {}", resource.display());
            }
        }

        transport.resource = None;
        transport.info = None;
        transport.playing_offset = Duration::ZERO;
        self.shared.has_video.store(false, Ordering::Release);
        self.shared.has_audio.store(false, Ordering::Release);
        self.shared.draining.store(false, Ordering::Release);
        self.shared.end_of_stream.store(false, Ordering::Release);
        self.shared.prime_sinks(None, PlaybackState::Stopped);
    }

    /// Start or resume playback. No-op when nothing is loaded or already playing.
    pub fn play(&self) {
        let mut transport = self.lock_transport();
        self.play_locked(&mut transport);
    }

    fn play_locked(&self, transport: &mut Transport) {
        if transport.info.is_none() {
            debug!("Play ignored: nothing loaded");
            return;
        }
        let previous = self.shared.state();
        if previous == PlaybackState::Playing {
            return;
        }

        self.shared.end_of_stream.store(false, Ordering::Release);
        transport.last_update = Instant::now();
        self.shared.broadcast(previous, PlaybackState::Playing);
        self.shared.set_state(PlaybackState::Playing);
        let verb = if previous == PlaybackState::Paused {
            "resumed"
        } else {
            "started"
        };
        info!("Playback {} at {:?}", verb, transport.playing_offset);
    }

    /// Pause playback. No-op unless playing.
    pub fn pause(&self) {
        let _transport = self.lock_transport();
        if self.shared.state() != PlaybackState::Playing {
            return;
        }
        self.shared.broadcast(PlaybackState::Playing, PlaybackState::Paused);
        self.shared.set_state(PlaybackState::Paused);
        info!("Playback paused");
    }

    /// Stop playback and rewind to the start. No-op when already stopped.
    pub fn stop(&self) {
        let mut transport = self.lock_transport();
        self.stop_locked(&mut transport);
    }

    fn stop_locked(&self, transport: &mut Transport) {
        let previous = self.shared.state();
        if previous == PlaybackState::Stopped {
            return;
        }

        self.shared.stop_decode_thread(transport);
        self.shared.enter_stopped(previous);
        self.shared.end_of_stream.store(false, Ordering::Release);
        self.shared.reposition(transport, Duration::ZERO);
        info!("Playback stopped");
    }

    /// Reposition playback to `offset`.
    ///
    /// Playback resumes if it was playing; a paused source ends up stopped
    /// at `offset`. Seeking past a known duration stops and rewinds, raising
    /// the end-of-stream flag.
    pub fn seek(&self, offset: Duration) {
        let mut transport = self.lock_transport();
        let Some(duration) = transport.info.as_ref().map(|info| info.duration) else {
            debug!("Seek ignored: nothing loaded");
            return;
        };

        if duration.is_some_and(|d| offset > d) {
            info!("Seek to {:?} is past the end ({:?}), stopping", offset, duration);
            self.shared.stop_decode_thread(&mut transport);
            self.shared.enter_stopped(self.shared.state());
            self.shared.reposition(&mut transport, Duration::ZERO);
            self.shared.end_of_stream.store(true, Ordering::Release);
            return;
        }

        self.shared.stop_decode_thread(&mut transport);
        let previous = self.shared.state();
        let was_playing = previous == PlaybackState::Playing;
        // Flush even when already stopped: queued packets predate the seek
        self.shared.enter_stopped(previous);

        self.shared.end_of_stream.store(false, Ordering::Release);
        self.shared.reposition(&mut transport, offset);

        if was_playing {
            self.play_locked(&mut transport);
        }
        debug!("Seeked to {:?}", offset);
    }

    /// Advance the playback clock by the wall time since the previous call.
    ///
    /// Call this once per frame from the host loop.
    pub fn update(&self) {
        let mut transport = self.lock_transport();
        let now = Instant::now();
        let delta = now.saturating_duration_since(transport.last_update);
        transport.last_update = now;
        self.advance_locked(&mut transport, delta);
    }

    /// Advance the playback clock by an explicit `delta` of wall time
    pub fn advance(&self, delta: Duration) {
        let mut transport = self.lock_transport();
        transport.last_update = Instant::now();
        self.advance_locked(&mut transport, delta);
    }

    fn advance_locked(&self, transport: &mut Transport, delta: Duration) {
        let Some(duration) = transport.info.as_ref().map(|info| info.duration) else {
            return;
        };

        let past_end = duration.is_some_and(|d| transport.playing_offset > d);
        let drained = self.shared.state() == PlaybackState::Playing
            && self.shared.is_draining()
            && self.shared.sinks_drained();
        if past_end || drained {
            info!("End of stream at {:?}", transport.playing_offset);
            self.stop_locked(transport);
            self.shared.end_of_stream.store(true, Ordering::Release);
        }

        let state = self.shared.state();
        let delta = scale_duration(delta, self.shared.playback_rate());
        if state == PlaybackState::Playing {
            transport.playing_offset = transport.playing_offset.saturating_add(delta);
        }

        let registry = lock(&self.shared.registry);
        for sink in &registry.video {
            sink.tick(delta, state);
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Current playback position
    pub fn playing_offset(&self) -> Duration {
        self.lock_transport().playing_offset
    }

    /// Total duration, when the container reports one
    pub fn duration(&self) -> Option<Duration> {
        self.lock_transport().info.as_ref().and_then(|info| info.duration)
    }

    /// Set when playback stopped by reaching the end of the resource
    pub fn is_end_of_stream(&self) -> bool {
        self.shared.is_end_of_stream()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_transport().info.is_some()
    }

    /// Path of the loaded resource
    pub fn resource(&self) -> Option<PathBuf> {
        self.lock_transport().resource.clone()
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.lock_transport().info.clone()
    }

    pub fn has_video(&self) -> bool {
        self.shared.has_video()
    }

    pub fn has_audio(&self) -> bool {
        self.shared.has_audio()
    }

    /// Native video size as (width, height)
    pub fn video_size(&self) -> Option<(u32, u32)> {
        self.lock_transport()
            .info
            .as_ref()
            .and_then(|info| info.video)
            .map(|video| (video.width, video.height))
    }

    /// Duration of one video frame; zero without video
    pub fn frame_interval(&self) -> Duration {
        self.lock_transport()
            .info
            .as_ref()
            .and_then(|info| info.video)
            .map(|video| video.frame_interval)
            .unwrap_or(Duration::ZERO)
    }

    /// Audio sample rate; zero without audio
    pub fn audio_sample_rate(&self) -> u32 {
        self.lock_transport()
            .info
            .as_ref()
            .and_then(|info| info.audio)
            .map(|audio| audio.sample_rate)
            .unwrap_or(0)
    }

    /// Delivered audio channel count (1 or 2); zero without audio
    pub fn audio_channel_count(&self) -> u16 {
        self.lock_transport()
            .info
            .as_ref()
            .and_then(|info| info.audio)
            .map(|audio| audio.channel_count)
            .unwrap_or(0)
    }

    /// Multiplier applied to wall time before it advances playback
    pub fn playback_rate(&self) -> f64 {
        self.shared.playback_rate()
    }

    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Playback rate must be a positive number, got {}",
                rate
            )));
        }
        self.shared.playback_rate.store(rate.to_bits(), Ordering::Release);
        debug!("Playback rate set to {}", rate);
        Ok(())
    }

    pub fn video_sink_count(&self) -> usize {
        lock(&self.shared.registry).video.len()
    }

    pub fn audio_sink_count(&self) -> usize {
        lock(&self.shared.registry).audio.len()
    }

    /// Decode thread counters since the last load
    pub fn decode_stats(&self) -> DecodeStats {
        self.shared.counters.snapshot()
    }

    /// Default offset correction for newly attached audio sinks
    pub fn audio_offset_correction(&self) -> Duration {
        self.shared.config.audio_offset_correction()
    }

    pub(crate) fn attach_video_sink(&self, sink: &Arc<VideoSinkCore>) {
        let transport = self.lock_transport();
        sink.bind(Arc::downgrade(&self.shared), transport.info.as_ref(), self.shared.state());
        let mut registry = lock(&self.shared.registry);
        registry.video.push(Arc::clone(sink));
        debug!("Video sink {} attached ({} total)", sink.id(), registry.video.len());
    }

    pub(crate) fn attach_audio_sink(&self, sink: &Arc<AudioSinkCore>) {
        let transport = self.lock_transport();
        sink.bind(Arc::downgrade(&self.shared), transport.info.as_ref(), self.shared.state());
        let mut registry = lock(&self.shared.registry);
        registry.audio.push(Arc::clone(sink));
        debug!("Audio sink {} attached ({} total)", sink.id(), registry.audio.len());
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        let transport = self.transport.get_mut().unwrap_or_else(PoisonError::into_inner);
        self.shared.stop_decode_thread(transport);

        let previous = self.shared.state();
        if previous != PlaybackState::Stopped {
            self.shared.enter_stopped(previous);
        }
        self.shared.stop_epoch.fetch_add(1, Ordering::AcqRel);
        lock(&self.shared.decoder).take();

        let mut registry = lock(&self.shared.registry);
        for sink in registry.video.drain(..) {
            sink.detach_source();
        }
        for sink in registry.audio.drain(..) {
            sink.detach_source();
        }
        debug!("Source released");
    }
}
