//! Deterministic in-memory media
//!
//! `SyntheticOpener` produces decoders for generated content: RGBA test
//! pattern frames and sine-tone PCM, interleaved in presentation order like
//! a muxed container. It needs no files or codecs, so it backs the
//! `--synthetic` CLI mode, the benches, and most of the playback tests.
//!
//! Each frame's first pixel encodes its frame index (little-endian in R, G,
//! B), recoverable with [`pattern_frame_index`]. Seeks snap down to the
//! nearest key frame (video) or chunk boundary (audio) the way a real
//! demuxer repositions coarsely.

use crate::error::{Error, Result};
use crate::media::decoder::{
    AudioStreamInfo, DecodedAudio, DecodedUnit, DecodedVideo, MediaDecoder, MediaOpener,
    StreamInfo, StreamKind, StreamSelection, VideoStreamInfo,
};
use crate::media::packet::BYTES_PER_PIXEL;
use kinema_common::time::{duration_to_frames, frame_interval, frames_to_duration};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

/// Generated video stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticVideo {
    pub width: u32,
    pub height: u32,
    /// Frame rate as `num / den` frames per second
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    /// Frames between seekable key frames
    pub keyframe_interval: u64,
}

impl Default for SyntheticVideo {
    fn default() -> Self {
        Self {
            width: 64,
            height: 36,
            frame_rate_num: 30,
            frame_rate_den: 1,
            keyframe_interval: 12,
        }
    }
}

/// Generated audio stream parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticAudio {
    pub sample_rate: u32,
    /// 1 stays mono; anything else is delivered as stereo
    pub channel_count: u16,
    /// Sample frames per decoded chunk
    pub chunk_frames: u64,
    pub tone_hz: f32,
}

impl Default for SyntheticAudio {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channel_count: 2,
            chunk_frames: 1024,
            tone_hz: 440.0,
        }
    }
}

/// Description of a generated resource
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMedia {
    pub duration: Duration,
    pub video: Option<SyntheticVideo>,
    pub audio: Option<SyntheticAudio>,
    /// Whether the container reports `duration`
    pub duration_known: bool,
    /// Every n-th read fails to decode and its unit is lost
    pub fail_every: Option<u64>,
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            video: Some(SyntheticVideo::default()),
            audio: Some(SyntheticAudio::default()),
            duration_known: true,
            fail_every: None,
        }
    }
}

impl SyntheticMedia {
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_video(mut self, video: SyntheticVideo) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_audio(mut self, audio: SyntheticAudio) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn without_video(mut self) -> Self {
        self.video = None;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.audio = None;
        self
    }

    pub fn with_unknown_duration(mut self) -> Self {
        self.duration_known = false;
        self
    }

    pub fn with_failures_every(mut self, reads: u64) -> Self {
        self.fail_every = Some(reads);
        self
    }

    /// Number of video frames starting before `duration`
    pub fn video_frame_count(&self) -> u64 {
        let Some(video) = &self.video else {
            return 0;
        };
        let mut count = 0;
        while video_pts(video, count) < self.duration {
            count += 1;
        }
        count
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            video: self.video.map(|v| VideoStreamInfo {
                width: v.width,
                height: v.height,
                frame_interval: frame_interval(v.frame_rate_num, v.frame_rate_den),
            }),
            audio: self.audio.map(|a| AudioStreamInfo {
                sample_rate: a.sample_rate,
                channel_count: output_channels(a.channel_count),
            }),
            duration: self.duration_known.then_some(self.duration),
        }
    }
}

/// Opens every resource path as the same generated media
#[derive(Debug, Clone, Default)]
pub struct SyntheticOpener {
    media: SyntheticMedia,
}

impl SyntheticOpener {
    pub fn new(media: SyntheticMedia) -> Self {
        Self { media }
    }
}

impl MediaOpener for SyntheticOpener {
    fn open(&self, resource: &Path, selection: StreamSelection) -> Result<Box<dyn MediaDecoder>> {
        let info = self.media.info().restricted_to(selection);
        if !info.has_video() && !info.has_audio() {
            return Err(Error::Load(format!(
                "{}: no decodable stream for the requested selection",
                resource.display()
            )));
        }
        if let Some(video) = &self.media.video {
            if video.width == 0 || video.height == 0 {
                return Err(Error::Load(format!("{}: empty video dimensions", resource.display())));
            }
        }

        debug!(
            "Opened synthetic media {} ({:?}, video: {}, audio: {})",
            resource.display(),
            self.media.duration,
            info.has_video(),
            info.has_audio()
        );

        Ok(Box::new(SyntheticDecoder {
            media: self.media.clone(),
            info,
            next_frame: 0,
            next_sample: 0,
            reads: 0,
        }))
    }
}

/// Decoder over [`SyntheticMedia`]
#[derive(Debug)]
pub struct SyntheticDecoder {
    media: SyntheticMedia,
    info: StreamInfo,
    next_frame: u64,
    next_sample: u64,
    reads: u64,
}

impl SyntheticDecoder {
    fn next_video_pts(&self) -> Option<Duration> {
        self.info.video?;
        let video = self.media.video.as_ref()?;
        let pts = video_pts(video, self.next_frame);
        (pts < self.media.duration).then_some(pts)
    }

    fn next_audio_pts(&self) -> Option<Duration> {
        let audio = self.info.audio?;
        let pts = frames_to_duration(self.next_sample, audio.sample_rate);
        (pts < self.media.duration).then_some(pts)
    }

    fn decode_video(&mut self, pts: Duration) -> DecodedUnit {
        let Some(video) = self.media.video else {
            return DecodedUnit::EndOfStream;
        };
        let index = self.next_frame;
        self.next_frame += 1;
        DecodedUnit::Video(DecodedVideo {
            presentation_time: pts,
            width: video.width,
            height: video.height,
            pixels: test_pattern(video.width, video.height, index),
        })
    }

    fn decode_audio(&mut self, pts: Duration) -> DecodedUnit {
        let (Some(audio), Some(info)) = (self.media.audio, self.info.audio) else {
            return DecodedUnit::EndOfStream;
        };
        let total = duration_to_frames(self.media.duration, info.sample_rate);
        let frames = audio.chunk_frames.min(total.saturating_sub(self.next_sample)).max(1);
        let channels = info.channel_count as usize;

        let mut samples = Vec::with_capacity(frames as usize * channels);
        for n in 0..frames {
            let t = (self.next_sample + n) as f32 / info.sample_rate as f32;
            let value = ((t * audio.tone_hz * std::f32::consts::TAU).sin() * 0.25 * i16::MAX as f32) as i16;
            samples.extend(std::iter::repeat(value).take(channels));
        }
        self.next_sample += frames;

        DecodedUnit::Audio(DecodedAudio {
            presentation_time: pts,
            channel_count: info.channel_count,
            samples,
        })
    }
}

impl MediaDecoder for SyntheticDecoder {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn read_next_unit(&mut self) -> Result<DecodedUnit> {
        self.reads += 1;

        // Interleave by timestamp, video first on ties
        let unit = match (self.next_video_pts(), self.next_audio_pts()) {
            (Some(v), Some(a)) if v <= a => self.decode_video(v),
            (Some(_), Some(a)) => self.decode_audio(a),
            (Some(v), None) => self.decode_video(v),
            (None, Some(a)) => self.decode_audio(a),
            (None, None) => return Ok(DecodedUnit::EndOfStream),
        };

        if let Some(every) = self.media.fail_every {
            if every > 0 && self.reads % every == 0 {
                return Err(Error::Decode(format!("injected failure on read {}", self.reads)));
            }
        }
        Ok(unit)
    }

    fn seek(&mut self, stream: StreamKind, position: Duration) -> Result<()> {
        match stream {
            StreamKind::Video => {
                let video = self
                    .media
                    .video
                    .ok_or_else(|| Error::Seek("no video stream".to_string()))?;
                let index = position.as_nanos() * video.frame_rate_num as u128
                    / (video.frame_rate_den.max(1) as u128 * 1_000_000_000);
                let index = index as u64;
                let keyframe = video.keyframe_interval.max(1);
                self.next_frame = index - index % keyframe;
                trace!("Synthetic video seek to {:?} -> frame {}", position, self.next_frame);
            }
            StreamKind::Audio => {
                let (audio, info) = self
                    .media
                    .audio
                    .zip(self.info.audio)
                    .ok_or_else(|| Error::Seek("no audio stream".to_string()))?;
                let frame = duration_to_frames(position, info.sample_rate);
                let chunk = audio.chunk_frames.max(1);
                self.next_sample = frame - frame % chunk;
                trace!("Synthetic audio seek to {:?} -> sample {}", position, self.next_sample);
            }
        }
        Ok(())
    }

    fn flush_buffers(&mut self, _stream: StreamKind) {}
}

fn output_channels(channels: u16) -> u16 {
    if channels == 1 {
        1
    } else {
        2
    }
}

fn video_pts(video: &SyntheticVideo, index: u64) -> Duration {
    if video.frame_rate_num == 0 || video.frame_rate_den == 0 {
        return frame_interval(0, 0) * index as u32;
    }
    let nanos = index as u128 * video.frame_rate_den as u128 * 1_000_000_000 / video.frame_rate_num as u128;
    Duration::from_nanos(nanos as u64)
}

/// RGBA gradient with the frame index stamped into the first pixel
pub fn test_pattern(width: u32, height: u32, index: u64) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                (index % 256) as u8,
                255,
            ]);
        }
    }
    if pixels.len() >= BYTES_PER_PIXEL {
        let bytes = (index as u32).to_le_bytes();
        pixels[..3].copy_from_slice(&bytes[..3]);
    }
    pixels
}

/// Frame index stamped by [`test_pattern`]
pub fn pattern_frame_index(pixels: &[u8]) -> Option<u32> {
    if pixels.len() < BYTES_PER_PIXEL {
        return None;
    }
    Some(u32::from_le_bytes([pixels[0], pixels[1], pixels[2], 0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(media: SyntheticMedia) -> Box<dyn MediaDecoder> {
        SyntheticOpener::new(media)
            .open(Path::new("synthetic"), StreamSelection::ALL)
            .unwrap()
    }

    fn drain(decoder: &mut dyn MediaDecoder) -> Vec<DecodedUnit> {
        let mut units = Vec::new();
        loop {
            match decoder.read_next_unit() {
                Ok(DecodedUnit::EndOfStream) => return units,
                Ok(unit) => units.push(unit),
                Err(_) => {}
            }
        }
    }

    #[test]
    fn test_units_interleave_in_presentation_order() {
        let mut decoder = open(SyntheticMedia::default().with_duration(Duration::from_millis(500)));
        let mut last = Duration::ZERO;
        for unit in drain(decoder.as_mut()) {
            let pts = match unit {
                DecodedUnit::Video(v) => v.presentation_time,
                DecodedUnit::Audio(a) => a.presentation_time,
                DecodedUnit::EndOfStream => unreachable!(),
            };
            assert!(pts >= last);
            last = pts;
        }
    }

    #[test]
    fn test_video_frame_count_matches_duration() {
        let media = SyntheticMedia::default()
            .without_audio()
            .with_duration(Duration::from_millis(300))
            .with_video(SyntheticVideo {
                frame_rate_num: 10,
                ..SyntheticVideo::default()
            });
        assert_eq!(media.video_frame_count(), 3);

        let mut decoder = open(media);
        let frames = drain(decoder.as_mut());
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_audio_covers_duration_exactly() {
        let mut decoder = open(
            SyntheticMedia::default()
                .without_video()
                .with_duration(Duration::from_millis(100)),
        );
        let frames: usize = drain(decoder.as_mut())
            .into_iter()
            .map(|unit| match unit {
                DecodedUnit::Audio(a) => a.frame_count(),
                _ => 0,
            })
            .sum();
        assert_eq!(frames, 4800);
    }

    #[test]
    fn test_pattern_carries_frame_index() {
        let pixels = test_pattern(8, 8, 70_000);
        assert_eq!(pixels.len(), 8 * 8 * 4);
        assert_eq!(pattern_frame_index(&pixels), Some(70_000));
    }

    #[test]
    fn test_video_seek_snaps_to_keyframe() {
        let mut decoder = open(SyntheticMedia::default().without_audio());
        decoder.seek(StreamKind::Video, Duration::from_secs(1)).unwrap();

        match decoder.read_next_unit().unwrap() {
            // 30 fps, key frames every 12: frame 30 snaps to 24
            DecodedUnit::Video(v) => assert_eq!(pattern_frame_index(&v.pixels), Some(24)),
            other => panic!("expected video, got {:?}", other),
        }
    }

    #[test]
    fn test_injected_failures_lose_units() {
        let media = SyntheticMedia::default()
            .without_audio()
            .with_duration(Duration::from_secs(1))
            .with_failures_every(3);
        let total = media.video_frame_count() as usize;
        let mut decoder = open(media);

        assert_eq!(drain(decoder.as_mut()).len(), total - total / 3);
    }

    #[test]
    fn test_selection_without_streams_fails_to_open() {
        let result = SyntheticOpener::new(SyntheticMedia::default().without_audio()).open(
            Path::new("synthetic"),
            StreamSelection {
                video: false,
                audio: true,
            },
        );
        assert!(matches!(result, Err(Error::Load(_))));
    }

    #[test]
    fn test_unknown_duration_not_reported() {
        let decoder = open(SyntheticMedia::default().with_unknown_duration());
        assert_eq!(decoder.info().duration, None);
    }
}
