//! Integration tests for video sink pacing
//!
//! Frames carry their index in the first pixel (see
//! `media::synthetic::test_pattern`), so tests can tell exactly which frame
//! a sink is presenting.

mod helpers;

use helpers::{av_media, synthetic_source, video_media, wait_until, GatedOpener, FRAME, TIMEOUT};
use kinema_player::media::synthetic::pattern_frame_index;
use kinema_player::{PlaybackState, Source, VideoSink};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn last_index(sink: &VideoSink) -> Option<u32> {
    sink.with_last_frame(|frame| frame.and_then(|f| pattern_frame_index(f.pixels())))
}

fn loaded(duration: Duration) -> (Source, VideoSink) {
    let source = synthetic_source(video_media(duration));
    let sink = VideoSink::new(&source);
    source.load("clip", true, true).unwrap();
    assert!(wait_until(TIMEOUT, || sink.queued_len() == 5));
    (source, sink)
}

#[test]
fn test_first_update_after_play_presents_first_frame() {
    let (source, sink) = loaded(Duration::from_secs(10));
    assert!(sink.last_frame().is_none());

    source.play();
    source.advance(Duration::ZERO);

    assert_eq!(sink.played_frame_count(), 1);
    assert_eq!(last_index(&sink), Some(0));
    let frame = sink.last_frame().unwrap();
    assert_eq!(frame.presentation_time(), Duration::ZERO);
    assert_eq!((frame.width(), frame.height()), (16, 8));
}

#[test]
fn test_one_interval_after_play_presents_second_frame() {
    let (source, sink) = loaded(Duration::from_secs(10));

    source.play();
    source.advance(FRAME);

    // Frame 0 was due at play time, frame 1 one interval later
    assert_eq!(sink.played_frame_count(), 2);
    assert_eq!(sink.dropped_frame_count(), 1);
    assert_eq!(last_index(&sink), Some(1));
}

#[test]
fn test_zero_ticks_never_advance() {
    let (source, sink) = loaded(Duration::from_secs(10));
    source.play();
    source.advance(Duration::ZERO);
    assert!(wait_until(TIMEOUT, || sink.queued_len() == 5));

    for _ in 0..10 {
        source.advance(Duration::ZERO);
    }

    assert_eq!(sink.played_frame_count(), 1);
    assert_eq!(sink.queued_len(), 5);
    assert_eq!(last_index(&sink), Some(0));
}

#[test]
fn test_split_ticks_match_single_tick() {
    let source = synthetic_source(video_media(Duration::from_secs(10)));
    let whole = VideoSink::new(&source);
    let split = VideoSink::new(&source);
    source.load("clip", true, true).unwrap();
    assert!(wait_until(TIMEOUT, || whole.queued_len() == 5 && split.queued_len() == 5));
    source.play();

    whole.tick(FRAME * 3);
    for _ in 0..6 {
        split.tick(FRAME / 2);
    }

    assert_eq!(whole.played_frame_count(), 4);
    assert_eq!(split.played_frame_count(), 4);
    assert_eq!(last_index(&whole), Some(3));
    assert_eq!(last_index(&split), Some(3));
}

#[test]
fn test_late_frames_are_dropped_to_catch_up() {
    let (source, sink) = loaded(Duration::from_secs(10));
    source.play();

    // Eleven frames due with five queued: all five are overdue
    source.advance(FRAME * 10);
    assert_eq!(sink.played_frame_count(), 5);
    assert_eq!(sink.dropped_frame_count(), 5);
    assert!(sink.last_frame().is_none());

    // As the decoder refills, the remaining overdue frames are dropped and
    // frame 10 is presented
    assert!(wait_until(TIMEOUT, || {
        source.advance(Duration::ZERO);
        sink.last_frame().is_some()
    }));
    assert_eq!(last_index(&sink), Some(10));
    assert_eq!(sink.played_frame_count(), 11);
}

#[test]
fn test_pause_holds_current_frame() {
    let (source, sink) = loaded(Duration::from_secs(10));
    source.play();
    source.advance(Duration::ZERO);

    source.pause();
    source.advance(FRAME * 5);
    assert_eq!(sink.played_frame_count(), 1);
    assert_eq!(last_index(&sink), Some(0));

    source.play();
    source.advance(FRAME);
    assert_eq!(sink.played_frame_count(), 2);
    assert_eq!(last_index(&sink), Some(1));
}

#[test]
fn test_stop_flushes_every_sink() {
    let opener = GatedOpener::new(video_media(Duration::from_secs(10)));
    let source = Source::new(Arc::new(opener.clone()));
    let first = VideoSink::new(&source);
    let second = VideoSink::new(&source);
    source.load("clip", true, true).unwrap();
    assert!(wait_until(TIMEOUT, || first.queued_len() == 5 && second.queued_len() == 5));

    source.play();
    source.advance(Duration::ZERO);
    opener.close_gate();
    source.stop();

    assert_eq!(source.state(), PlaybackState::Stopped);
    assert_eq!(first.queued_len(), 0);
    assert_eq!(second.queued_len(), 0);
    assert_eq!(first.played_frame_count(), 0);
    assert_eq!(second.played_frame_count(), 0);

    // Stop rewound the decoder: playback restarts at frame 0
    opener.open_gate();
    assert!(wait_until(TIMEOUT, || first.queued_len() == 5));
    source.play();
    source.advance(Duration::ZERO);
    assert_eq!(last_index(&first), Some(0));
}

#[test]
fn test_sink_attached_while_playing_presents_immediately() {
    let (source, _first) = loaded(Duration::from_secs(10));
    source.play();

    let late = VideoSink::new(&source);
    assert!(wait_until(TIMEOUT, || late.queued_len() >= 1));
    source.advance(Duration::ZERO);

    assert_eq!(late.played_frame_count(), 1);
    assert!(late.last_frame().is_some());
}

#[test]
fn test_production_pauses_when_sinks_are_full() {
    // Audio is decoded too, but with no audio sink attached only the video
    // queue throttles production
    let source = synthetic_source(av_media(Duration::from_secs(10)));
    let sink = VideoSink::new(&source);
    source.load("clip", true, true).unwrap();
    assert!(wait_until(TIMEOUT, || sink.queued_len() == 5));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(sink.queued_len(), 5);
    assert_eq!(source.decode_stats().video_packets, 5);
}

#[test]
fn test_presented_frame_survives_sink_queue_flush() {
    let (source, sink) = loaded(Duration::from_secs(10));
    source.play();
    source.advance(Duration::ZERO);
    let before = sink.last_frame().unwrap();

    source.stop();

    assert_eq!(sink.last_frame().unwrap(), before);
}
