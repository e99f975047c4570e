//! Decoding and packet types
//!
//! The playback engine only sees the [`MediaOpener`] / [`MediaDecoder`]
//! contract; `symphonia_decoder` and `synthetic` are the two backends.

pub mod decoder;
pub mod packet;
pub mod symphonia_decoder;
pub mod synthetic;

pub use decoder::{
    AudioStreamInfo, DecodedAudio, DecodedUnit, DecodedVideo, MediaDecoder, MediaOpener, StreamInfo,
    StreamKind, StreamSelection, VideoStreamInfo,
};
pub use packet::{AudioPacket, SharedAudioPacket, SharedVideoPacket, VideoPacket};
pub use symphonia_decoder::SymphoniaOpener;
pub use synthetic::{SyntheticAudio, SyntheticMedia, SyntheticOpener, SyntheticVideo};
