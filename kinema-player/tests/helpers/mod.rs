//! Test helper modules for kinema-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - Synthetic media presets with known frame and chunk timing
//! - GatedOpener: a decoder that produces nothing until its gate opens
//! - WAV fixture generation for the symphonia backend
//! - Polling helper for conditions reached by the decode thread

#![allow(dead_code)]

pub mod audio_generator;
pub mod gated;

pub use audio_generator::{generate_sine_wav, TEST_SAMPLE_RATE};
pub use gated::GatedOpener;

use kinema_player::media::{SyntheticAudio, SyntheticMedia, SyntheticOpener, SyntheticVideo};
use kinema_player::Source;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Frame interval of [`video_media`]: 25 fps
pub const FRAME: Duration = Duration::from_millis(40);

/// Default wait for decode-thread progress
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `condition` every millisecond until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Video-only media at 25 fps, key frame every 10 frames
pub fn video_media(duration: Duration) -> SyntheticMedia {
    SyntheticMedia::default()
        .without_audio()
        .with_duration(duration)
        .with_video(SyntheticVideo {
            width: 16,
            height: 8,
            frame_rate_num: 25,
            frame_rate_den: 1,
            keyframe_interval: 10,
        })
}

/// Audio-only stereo media at 48 kHz in 1024-frame chunks
pub fn audio_media(duration: Duration) -> SyntheticMedia {
    SyntheticMedia::default()
        .without_video()
        .with_duration(duration)
        .with_audio(SyntheticAudio::default())
}

/// Video (25 fps) and audio (48 kHz) together
pub fn av_media(duration: Duration) -> SyntheticMedia {
    let video = video_media(duration).video.expect("video preset");
    audio_media(duration).with_video(video)
}

pub fn synthetic_source(media: SyntheticMedia) -> Source {
    Source::new(Arc::new(SyntheticOpener::new(media)))
}
