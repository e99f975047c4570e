//! Decoded, format-converted packets ready for presentation
//!
//! Packets are immutable after construction. The source shares one
//! `Arc<VideoPacket>` / `Arc<AudioPacket>` between every sink queue it fans
//! out to; a video sink keeps a private deep copy (`Clone`) of the frame it
//! presents, so advancing or dropping one sink never invalidates what another
//! sink still holds.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Bytes per pixel of the fixed RGBA8 pixel format
pub const BYTES_PER_PIXEL: usize = 4;

/// Packet shared between sink queues
pub type SharedVideoPacket = Arc<VideoPacket>;

/// Packet shared between sink queues
pub type SharedAudioPacket = Arc<AudioPacket>;

/// One decoded video frame in RGBA8 layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPacket {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    presentation_time: Duration,
}

impl VideoPacket {
    /// Wrap an RGBA8 pixel buffer, validating its size against the dimensions
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, presentation_time: Duration) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if width == 0 || height == 0 {
            return Err(Error::Decode(format!("Empty video frame ({}x{})", width, height)));
        }
        if pixels.len() != expected {
            return Err(Error::Decode(format!(
                "Pixel buffer is {} bytes, expected {} for {}x{} RGBA",
                pixels.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
            presentation_time,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stream timestamp of this frame
    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }
}

/// One chunk of decoded audio as interleaved signed 16-bit PCM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    samples: Vec<i16>,
    channel_count: u16,
    presentation_time: Duration,
}

impl AudioPacket {
    /// Wrap interleaved samples; the buffer must hold whole frames
    pub fn new(samples: Vec<i16>, channel_count: u16, presentation_time: Duration) -> Result<Self> {
        if channel_count == 0 {
            return Err(Error::Decode("Audio packet with zero channels".to_string()));
        }
        if samples.is_empty() {
            return Err(Error::Decode("Audio packet with no samples".to_string()));
        }
        if samples.len() % channel_count as usize != 0 {
            return Err(Error::Decode(format!(
                "{} samples is not a whole number of {}-channel frames",
                samples.len(),
                channel_count
            )));
        }
        Ok(Self {
            samples,
            channel_count,
            presentation_time,
        })
    }

    /// Interleaved samples: [c0, c1, .., c0, c1, ..]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Number of samples per channel
    pub fn sample_count(&self) -> usize {
        self.samples.len() / self.channel_count as usize
    }

    /// Stream timestamp of the first sample frame
    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }

    /// Playback duration at `sample_rate`
    pub fn duration(&self, sample_rate: u32) -> Duration {
        kinema_common::time::frames_to_duration(self.sample_count() as u64, sample_rate)
    }
}
