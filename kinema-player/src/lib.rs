//! # Kinema Player Library (kinema-player)
//!
//! Real-time media playback orchestration.
//!
//! **Purpose:** Open a media resource, decode it on a background thread,
//! and fan decoded packets out to any number of independently paced video
//! and audio consumers, with play/pause/stop/seek transport control.
//!
//! **Architecture:** one decode thread per [`Source`], bounded per-sink
//! packet queues for backpressure, frame pacing driven by the host's update
//! loop, and a blocking pull interface for audio output threads. Decoding
//! goes through the [`media::MediaOpener`] contract, backed by symphonia for
//! audio files or by generated synthetic media.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kinema_player::media::{SyntheticMedia, SyntheticOpener};
//! use kinema_player::{Source, VideoSink};
//!
//! let source = Source::new(Arc::new(SyntheticOpener::new(SyntheticMedia::default())));
//! let sink = VideoSink::new(&source);
//! source.load("synthetic", true, true)?;
//! source.play();
//! loop {
//!     source.update();
//!     if let Some(frame) = sink.last_frame() {
//!         // draw frame.pixels()
//!         let _ = frame;
//!     }
//!     std::thread::sleep(Duration::from_millis(16));
//! #   break;
//! }
//! # Ok::<(), kinema_player::Error>(())
//! ```

pub mod error;
pub mod media;
pub mod playback;

pub use error::{Error, Result};
pub use kinema_common::PlaybackState;
pub use playback::{AudioSink, DecodeStats, Source, VideoSink};
