//! Decode collaborator contract
//!
//! A [`MediaOpener`] turns a resource path into a [`MediaDecoder`]. The
//! decoder is driven exclusively by the source: its decode thread pulls
//! units with [`MediaDecoder::read_next_unit`], and seek repositions it
//! (with the decode thread stopped) through [`MediaDecoder::seek`] and
//! [`MediaDecoder::flush_buffers`]. Closing a decoder is dropping it.
//!
//! Decoders are responsible for format conversion: video units arrive as
//! RGBA8 at the stream's native size, audio units as interleaved S16 at the
//! stream's native rate, mono kept mono and everything else stereo.

use crate::error::Result;
use kinema_common::time::frames_to_duration;
use std::path::Path;
use std::time::Duration;

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

/// Which stream kinds the caller wants decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSelection {
    pub video: bool,
    pub audio: bool,
}

impl StreamSelection {
    pub const ALL: StreamSelection = StreamSelection {
        video: true,
        audio: true,
    };

    pub fn allows(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Video => self.video,
            StreamKind::Audio => self.audio,
        }
    }
}

/// Properties of the selected video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Duration of one frame at the stream's average frame rate
    pub frame_interval: Duration,
}

/// Properties of the selected audio stream after conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    /// 1 for mono sources, 2 otherwise
    pub channel_count: u16,
}

/// What an opened resource provides
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamInfo {
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
    /// Container duration, when the container reports one
    pub duration: Option<Duration>,
}

impl StreamInfo {
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Video => self.has_video(),
            StreamKind::Audio => self.has_audio(),
        }
    }

    /// Stream kinds present, in seek order
    pub fn kinds(&self) -> impl Iterator<Item = StreamKind> + '_ {
        [StreamKind::Video, StreamKind::Audio]
            .into_iter()
            .filter(move |kind| self.has(*kind))
    }

    /// Drop the stream kinds `selection` does not allow
    pub fn restricted_to(mut self, selection: StreamSelection) -> Self {
        if !selection.video {
            self.video = None;
        }
        if !selection.audio {
            self.audio = None;
        }
        self
    }
}

/// A converted video frame straight out of the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVideo {
    pub presentation_time: Duration,
    pub width: u32,
    pub height: u32,
    /// RGBA8, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

/// A converted audio chunk straight out of the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    pub presentation_time: Duration,
    pub channel_count: u16,
    /// Interleaved S16
    pub samples: Vec<i16>,
}

impl DecodedAudio {
    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.samples.len() / self.channel_count as usize
    }

    /// Timestamp just past the last sample frame
    pub fn end_time(&self, sample_rate: u32) -> Duration {
        self.presentation_time + frames_to_duration(self.frame_count() as u64, sample_rate)
    }

    /// Discard the samples that predate `target`.
    ///
    /// Returns `None` when the whole chunk lies before `target`. A chunk that
    /// straddles `target` loses its leading samples and is re-stamped at
    /// `target`.
    pub fn trim_before(mut self, target: Duration, sample_rate: u32) -> Option<Self> {
        if self.presentation_time >= target {
            return Some(self);
        }
        if self.end_time(sample_rate) <= target {
            return None;
        }

        // Round to the nearest frame: timestamps derived from frame counts
        // truncate to whole nanoseconds
        let gap = target - self.presentation_time;
        let skip = ((gap.as_nanos() * sample_rate as u128 + 500_000_000) / 1_000_000_000) as usize;
        let skip = skip.min(self.frame_count());
        if skip == self.frame_count() {
            return None;
        }

        self.samples.drain(..skip * self.channel_count as usize);
        self.presentation_time = target;
        Some(self)
    }
}

/// One result of pulling from the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedUnit {
    Video(DecodedVideo),
    Audio(DecodedAudio),
    /// The read cursor hit the end of the resource (or an unrecoverable
    /// read failure)
    EndOfStream,
}

/// An open, positioned decoder for one resource
///
/// `read_next_unit` returning `Err` means the unit could not be decoded and
/// was skipped; the caller keeps reading.
pub trait MediaDecoder: Send {
    /// Stream properties discovered at open time
    fn info(&self) -> &StreamInfo;

    /// Decode the next unit in container order
    fn read_next_unit(&mut self) -> Result<DecodedUnit>;

    /// Reposition `stream` at or before `position` (key-frame granularity)
    fn seek(&mut self, stream: StreamKind, position: Duration) -> Result<()>;

    /// Discard codec state buffered for `stream`
    fn flush_buffers(&mut self, stream: StreamKind);
}

/// Opens resources into decoders
pub trait MediaOpener: Send + Sync {
    fn open(&self, resource: &Path, selection: StreamSelection) -> Result<Box<dyn MediaDecoder>>;
}
