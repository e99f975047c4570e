//! Integration tests for the blocking audio pull interface

mod helpers;

use helpers::{audio_media, synthetic_source, wait_until, GatedOpener, TIMEOUT};
use kinema_common::PlaybackConfig;
use kinema_player::media::{SyntheticAudio, SyntheticMedia, SyntheticOpener};
use kinema_player::{AudioSink, PlaybackState, Source};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pull until the sink gives up, returning (chunks, sample frames)
fn drain(sink: &AudioSink) -> (usize, u64) {
    let mut chunks = 0;
    let mut frames = 0;
    while let Some(chunk) = sink.pull_next_chunk() {
        chunks += 1;
        frames += chunk.sample_count() as u64;
    }
    (chunks, frames)
}

#[test]
fn test_chunks_arrive_in_presentation_order() {
    let source = synthetic_source(audio_media(Duration::from_secs(2)));
    let sink = AudioSink::new(&source);
    source.load("tone", true, true).unwrap();
    source.play();

    let first = sink.pull_next_chunk().unwrap();
    assert_eq!(first.presentation_time(), Duration::ZERO);
    assert_eq!(first.sample_count(), 1024);
    assert_eq!(first.channel_count(), 2);
    assert_eq!(sink.sample_rate(), 48_000);
    assert_eq!(sink.channel_count(), 2);

    let mut previous = first.presentation_time();
    for _ in 0..20 {
        let chunk = sink.pull_next_chunk().unwrap();
        assert!(chunk.presentation_time() > previous);
        previous = chunk.presentation_time();
    }
    assert_eq!(sink.played_sample_count(), 21 * 1024);
}

#[test]
fn test_pull_without_audio_returns_immediately() {
    let source = synthetic_source(audio_media(Duration::from_secs(1)));
    let sink = AudioSink::new(&source);

    assert!(sink.try_pull_next_chunk().is_none());
    assert!(sink.pull_next_chunk().is_none());
    assert_eq!(sink.sample_rate(), 0);
}

#[test]
fn test_stop_wakes_blocked_pull() {
    let opener = GatedOpener::new(audio_media(Duration::from_secs(10)));
    let source = Source::new(Arc::new(opener.clone()));
    let sink = Arc::new(AudioSink::new(&source));
    source.load("tone", true, true).unwrap();
    assert!(wait_until(TIMEOUT, || sink.queued_len() == 5));
    opener.close_gate();
    source.play();

    let (tx, rx) = mpsc::channel();
    let puller = Arc::clone(&sink);
    let handle = thread::spawn(move || {
        let _ = tx.send(drain(&puller));
    });

    // Queue exhausted and nothing decoding: the pull blocks
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    source.stop();
    let (chunks, _) = rx.recv_timeout(TIMEOUT).expect("pull still blocked after stop");
    assert!(chunks >= 5);
    handle.join().unwrap();
}

#[test]
fn test_pull_returns_none_at_end_of_stream() {
    // 4800 frames: four full chunks and one of 704
    let source = synthetic_source(audio_media(Duration::from_millis(100)));
    let sink = AudioSink::new(&source);
    source.load("tone", true, true).unwrap();
    source.play();

    let (chunks, frames) = drain(&sink);

    assert_eq!(chunks, 5);
    assert_eq!(frames, 4800);
}

#[test]
fn test_pull_ends_while_draining_before_end_of_stream_flag() {
    let source = synthetic_source(audio_media(Duration::from_millis(100)));
    let sink = AudioSink::new(&source);
    source.load("tone", true, true).unwrap();
    source.play();

    drain(&sink);

    // Nothing has called update yet, so the flag is still down
    assert!(!source.is_end_of_stream());
    assert_eq!(source.state(), PlaybackState::Playing);
    assert!(sink.pull_next_chunk().is_none());

    source.advance(Duration::ZERO);
    assert!(source.is_end_of_stream());
}

#[test]
fn test_dropping_source_wakes_blocked_pull() {
    let opener = GatedOpener::new(audio_media(Duration::from_secs(10)));
    let source = Source::new(Arc::new(opener.clone()));
    let sink = Arc::new(AudioSink::new(&source));
    source.load("tone", true, true).unwrap();
    assert!(wait_until(TIMEOUT, || sink.queued_len() == 5));
    opener.close_gate();
    source.play();

    let (tx, rx) = mpsc::channel();
    let puller = Arc::clone(&sink);
    let handle = thread::spawn(move || {
        let _ = tx.send(drain(&puller));
    });
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    drop(source);
    assert!(rx.recv_timeout(TIMEOUT).is_ok());
    handle.join().unwrap();
    assert!(!sink.is_attached());
}

#[test]
fn test_drift_tracks_delivery_against_wall_time() {
    let source = synthetic_source(audio_media(Duration::from_secs(10)));
    let sink = AudioSink::new(&source);
    source.load("tone", true, true).unwrap();
    assert!(wait_until(TIMEOUT, || sink.queued_len() == 5));
    source.play();

    // Five chunks of ~21ms handed over almost instantly
    for _ in 0..5 {
        sink.pull_next_chunk().unwrap();
    }
    let ahead = sink.drift();
    assert!(ahead > 0.05, "drift {} should be well ahead", ahead);

    thread::sleep(Duration::from_millis(100));
    assert!(wait_until(TIMEOUT, || sink.queued_len() > 0));
    sink.try_pull_next_chunk().unwrap();

    assert!(sink.drift() < ahead);
}

#[test]
fn test_offset_correction_defaults_from_config() {
    let config = PlaybackConfig {
        audio_offset_correction_ms: 120,
        ..PlaybackConfig::default()
    };
    let opener = Arc::new(SyntheticOpener::new(audio_media(Duration::from_secs(1))));
    let source = Source::with_config(opener, config).unwrap();
    let sink = AudioSink::new(&source);
    assert_eq!(sink.offset_correction(), Duration::from_millis(120));

    sink.set_offset_correction(Duration::from_millis(50));
    assert_eq!(sink.offset_correction(), Duration::from_millis(50));
}

#[test]
fn test_mono_stays_mono() {
    let media = SyntheticMedia::default()
        .without_video()
        .with_duration(Duration::from_secs(1))
        .with_audio(SyntheticAudio {
            channel_count: 1,
            ..SyntheticAudio::default()
        });
    let source = synthetic_source(media);
    let sink = AudioSink::new(&source);
    source.load("tone", true, true).unwrap();
    source.play();

    let chunk = sink.pull_next_chunk().unwrap();
    assert_eq!(sink.channel_count(), 1);
    assert_eq!(chunk.channel_count(), 1);
    assert_eq!(chunk.samples().len(), chunk.sample_count());
}

#[test]
fn test_playback_rate_is_visible_to_output() {
    let source = synthetic_source(audio_media(Duration::from_secs(1)));
    let sink = AudioSink::new(&source);
    assert_eq!(sink.playback_rate(), 1.0);

    source.set_playback_rate(1.5).unwrap();
    assert_eq!(sink.playback_rate(), 1.5);
}

#[test]
fn test_stop_resets_sink_counters() {
    let source = synthetic_source(audio_media(Duration::from_secs(5)));
    let sink = AudioSink::new(&source);
    source.load("tone", true, true).unwrap();
    source.play();
    sink.pull_next_chunk().unwrap();
    assert_eq!(sink.played_sample_count(), 1024);

    source.stop();

    assert_eq!(sink.played_sample_count(), 0);
    assert_eq!(sink.drift(), 0.0);
}
