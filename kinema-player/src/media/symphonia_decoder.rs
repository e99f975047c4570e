//! Audio decoding using symphonia
//!
//! Opens audio files (WAV, MP3, FLAC, AAC/MP4, Vorbis) and decodes them
//! packet by packet into interleaved S16. Mono sources stay mono; every
//! other layout is delivered as stereo, downmixing sources with more than
//! two channels. No resampling is done: units carry the stream's native
//! sample rate.
//!
//! This backend has no video support; opening a resource with audio
//! deselected fails.

use crate::error::{Error, Result};
use crate::media::decoder::{
    AudioStreamInfo, DecodedAudio, DecodedUnit, MediaDecoder, MediaOpener, StreamInfo, StreamKind,
    StreamSelection,
};
use kinema_common::time::frames_to_duration;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecRegistry, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, info, trace, warn};

/// Get the shared codec registry
fn codec_registry() -> &'static CodecRegistry {
    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<symphonia::default::codecs::MpaDecoder>();
        registry.register_all::<symphonia::default::codecs::PcmDecoder>();
        registry.register_all::<symphonia::default::codecs::VorbisDecoder>();
        registry.register_all::<symphonia::default::codecs::FlacDecoder>();
        registry.register_all::<symphonia::default::codecs::AdpcmDecoder>();
        registry.register_all::<symphonia::default::codecs::AacDecoder>();
        info!("Symphonia codec registry initialized");
        registry
    })
}

/// Build the codec registry ahead of the first load.
///
/// Calling this is optional; the registry is built lazily otherwise.
pub fn initialize() {
    codec_registry();
}

/// Opens audio files through symphonia's probe
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaOpener;

impl SymphoniaOpener {
    pub fn new() -> Self {
        Self
    }
}

impl MediaOpener for SymphoniaOpener {
    fn open(&self, resource: &Path, selection: StreamSelection) -> Result<Box<dyn MediaDecoder>> {
        if !selection.audio {
            return Err(Error::Load(format!(
                "{}: no decodable stream (only audio is supported)",
                resource.display()
            )));
        }

        debug!("Opening {}", resource.display());

        let file = File::open(resource)
            .map_err(|e| Error::Load(format!("Failed to open file {}: {}", resource.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext) = resource.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Load(format!("Failed to probe {}: {}", resource.display(), e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
            .ok_or_else(|| Error::Load(format!("{}: no audio track found", resource.display())))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Load("Sample rate not found".to_string()))?;
        let source_channels = params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::Load("Channel count not found".to_string()))?;
        let channel_count = if source_channels == 1 { 1 } else { 2 };

        let decoder = codec_registry()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Load(format!("Failed to create decoder: {}", e)))?;

        let duration = params.n_frames.map(|frames| match params.time_base {
            Some(tb) => time_to_duration(tb.calc_time(frames)),
            None => frames_to_duration(frames, sample_rate),
        });

        debug!(
            "Audio format: sample_rate={}, channels={} (delivered as {}), duration={:?}",
            sample_rate, source_channels, channel_count, duration
        );

        Ok(Box::new(SymphoniaDecoder {
            format,
            decoder,
            track_id,
            time_base: params.time_base,
            info: StreamInfo {
                video: None,
                audio: Some(AudioStreamInfo {
                    sample_rate,
                    channel_count,
                }),
                duration,
            },
        }))
    }
}

/// Packet-at-a-time decoder over one symphonia audio track
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    info: StreamInfo,
}

impl SymphoniaDecoder {
    fn sample_rate(&self) -> u32 {
        self.info.audio.map(|a| a.sample_rate).unwrap_or(0)
    }

    fn timestamp_to_duration(&self, ts: u64) -> Duration {
        match self.time_base {
            Some(tb) => time_to_duration(tb.calc_time(ts)),
            None => frames_to_duration(ts, self.sample_rate()),
        }
    }
}

impl MediaDecoder for SymphoniaDecoder {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn read_next_unit(&mut self) -> Result<DecodedUnit> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    debug!("Reached end of stream");
                    return Ok(DecodedUnit::EndOfStream);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    warn!("Error reading packet, treating as end of stream: {}", e);
                    return Ok(DecodedUnit::EndOfStream);
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let presentation_time = self.timestamp_to_duration(packet.ts());

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    return Err(Error::Decode("Decoder reset required".to_string()));
                }
                Err(e) => return Err(Error::Decode(e.to_string())),
            };

            if decoded.frames() == 0 {
                trace!("Skipping empty packet at {:?}", presentation_time);
                continue;
            }

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            let samples = remix_to_output(buffer.samples(), spec.channels.count());
            let channel_count = if spec.channels.count() == 1 { 1 } else { 2 };

            return Ok(DecodedUnit::Audio(DecodedAudio {
                presentation_time,
                channel_count,
                samples,
            }));
        }
    }

    fn seek(&mut self, stream: StreamKind, position: Duration) -> Result<()> {
        if stream != StreamKind::Audio {
            return Ok(());
        }

        let seek_to = SeekTo::Time {
            time: Time {
                seconds: position.as_secs(),
                frac: position.subsec_nanos() as f64 / 1_000_000_000.0,
            },
            track_id: Some(self.track_id),
        };

        let seeked = self
            .format
            .seek(SeekMode::Coarse, seek_to)
            .map_err(|e| Error::Seek(format!("Failed to seek to {:?}: {}", position, e)))?;

        trace!("Seeked to ts {} (requested {:?})", seeked.actual_ts, position);
        Ok(())
    }

    fn flush_buffers(&mut self, stream: StreamKind) {
        if stream == StreamKind::Audio {
            self.decoder.reset();
        }
    }
}

fn time_to_duration(time: Time) -> Duration {
    Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac.clamp(0.0, 1.0))
}

/// Keep mono and stereo as-is; fold wider layouts into stereo by averaging
/// even channels into left and odd channels into right
fn remix_to_output(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 2 {
        return samples.to_vec();
    }

    let left_count = (channels + 1) / 2;
    let right_count = channels / 2;
    let mut out = Vec::with_capacity(samples.len() / channels * 2);
    for frame in samples.chunks_exact(channels) {
        let mut left = 0i32;
        let mut right = 0i32;
        for (ch, &sample) in frame.iter().enumerate() {
            if ch % 2 == 0 {
                left += sample as i32;
            } else {
                right += sample as i32;
            }
        }
        out.push((left / left_count as i32) as i16);
        out.push((right / right_count as i32) as i16);
    }
    out
}
