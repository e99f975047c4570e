//! Kinema Player (kinema-player) - Main entry point
//!
//! Headless playback driver: loads a resource (or synthetic media), attaches
//! one video sink and one audio sink drained by a null output thread, drives
//! the source's update loop at roughly 60 Hz for a fixed time or until the
//! end of the stream, and prints a playback report.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use kinema_common::{KinemaConfig, LoggingConfig, PlaybackState};
use kinema_player::media::{MediaOpener, SymphoniaOpener, SyntheticMedia, SyntheticOpener};
use kinema_player::{AudioSink, DecodeStats, Source, VideoSink};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Update loop period
const FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Command-line arguments for kinema-player
#[derive(Parser, Debug)]
#[command(name = "kinema-player")]
#[command(about = "Headless media playback driver")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
struct Args {
    /// Media file to play (optional with --synthetic)
    resource: Option<PathBuf>,

    /// Play generated test media instead of a file
    #[arg(long)]
    synthetic: bool,

    /// Do not decode video
    #[arg(long)]
    no_video: bool,

    /// Do not decode audio
    #[arg(long)]
    no_audio: bool,

    /// Seek to this position (seconds) before playing
    #[arg(long)]
    seek: Option<f64>,

    /// Seconds of wall time to play for
    #[arg(long, default_value = "5")]
    run_for: f64,

    /// Playback rate multiplier
    #[arg(long, default_value = "1.0")]
    rate: f64,

    /// Configuration file (defaults to $KINEMA_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

/// Summary printed when the run ends
#[derive(Debug, Serialize)]
struct PlaybackReport {
    resource: String,
    state: PlaybackState,
    end_of_stream: bool,
    playing_offset_secs: f64,
    duration_secs: Option<f64>,
    video_frames_played: u64,
    video_frames_dropped: u64,
    last_frame_secs: Option<f64>,
    audio_chunks: u64,
    audio_samples: u64,
    audio_drift_secs: f64,
    decode: DecodeStats,
}

impl PlaybackReport {
    fn print_text(&self) {
        println!("resource:        {}", self.resource);
        println!("state:           {}", self.state);
        println!("end of stream:   {}", self.end_of_stream);
        match self.duration_secs {
            Some(duration) => println!("position:        {:.3}s / {:.3}s", self.playing_offset_secs, duration),
            None => println!("position:        {:.3}s", self.playing_offset_secs),
        }
        println!(
            "video:           {} frames played, {} dropped, last at {}",
            self.video_frames_played,
            self.video_frames_dropped,
            self.last_frame_secs
                .map(|s| format!("{:.3}s", s))
                .unwrap_or_else(|| "-".to_string())
        );
        println!(
            "audio:           {} chunks, {} samples, drift {:+.3}s",
            self.audio_chunks, self.audio_samples, self.audio_drift_secs
        );
        println!(
            "decode:          {} video, {} audio, {} failed, {} skipped",
            self.decode.video_packets, self.decode.audio_packets, self.decode.failed_units, self.decode.skipped_units
        );
    }
}

/// Drains an audio sink on its own thread, discarding the samples
struct NullAudioOutput {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<(u64, u64)>,
}

impl NullAudioOutput {
    fn spawn(sink: Arc<AudioSink>, idle: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("kinema-audio-out".to_string())
            .spawn(move || {
                let mut chunks = 0u64;
                let mut samples = 0u64;
                while !stop_flag.load(Ordering::Acquire) {
                    match sink.pull_next_chunk() {
                        Some(chunk) => {
                            chunks += 1;
                            samples += chunk.sample_count() as u64;
                        }
                        None => thread::sleep(idle),
                    }
                }
                (chunks, samples)
            })
            .context("Failed to spawn audio output thread")?;
        Ok(Self { stop, handle })
    }

    /// Signal the thread; it exits after its current pull returns
    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn join(self) -> (u64, u64) {
        self.signal_stop();
        self.handle.join().unwrap_or_default()
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("kinema_player={level},kinema_common={level}", level = logging.level).into()
    });

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("--{} must be a non-negative number of seconds", flag))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = KinemaConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(
        "Starting kinema-player {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let run_for = seconds(args.run_for, "run-for")?;
    let seek = args.seek.map(|s| seconds(s, "seek")).transpose()?;

    let (opener, resource): (Arc<dyn MediaOpener>, PathBuf) = if args.synthetic {
        (
            Arc::new(SyntheticOpener::new(SyntheticMedia::default())),
            args.resource.clone().unwrap_or_else(|| PathBuf::from("synthetic")),
        )
    } else {
        let Some(resource) = args.resource.clone() else {
            bail!("A media file is required unless --synthetic is given");
        };
        kinema_player::media::symphonia_decoder::initialize();
        (Arc::new(SymphoniaOpener::new()), resource)
    };

    let source = Source::with_config(opener, config.playback.clone()).context("Invalid playback configuration")?;
    source.set_playback_rate(args.rate).context("Invalid --rate")?;
    source
        .load(&resource, !args.no_video, !args.no_audio)
        .with_context(|| format!("Failed to load {}", resource.display()))?;

    let video = source.has_video().then(|| VideoSink::new(&source));
    let audio_output = if source.has_audio() {
        let sink = Arc::new(AudioSink::new(&source));
        Some((Arc::clone(&sink), NullAudioOutput::spawn(sink, config.playback.audio_poll())?))
    } else {
        None
    };

    if let Some(offset) = seek {
        source.seek(offset);
    }
    source.play();

    let started = Instant::now();
    while started.elapsed() < run_for && !source.is_end_of_stream() {
        thread::sleep(FRAME_PERIOD);
        source.update();
    }
    debug!("Update loop finished after {:?}", started.elapsed());

    // Snapshot before stopping; stop rewinds and zeroes sink counters
    let state = source.state();
    let end_of_stream = source.is_end_of_stream();
    let playing_offset = source.playing_offset();
    let (frames_played, frames_dropped, last_frame) = match &video {
        Some(sink) => (
            sink.played_frame_count(),
            sink.dropped_frame_count(),
            sink.last_frame().map(|f| f.presentation_time().as_secs_f64()),
        ),
        None => (0, 0, None),
    };
    let drift = audio_output.as_ref().map(|(sink, _)| sink.drift()).unwrap_or(0.0);

    let (audio_chunks, audio_samples) = match audio_output {
        Some((_, output)) => {
            output.signal_stop();
            source.stop();
            output.join()
        }
        None => {
            source.stop();
            (0, 0)
        }
    };

    let report = PlaybackReport {
        resource: resource.display().to_string(),
        state,
        end_of_stream,
        playing_offset_secs: playing_offset.as_secs_f64(),
        duration_secs: source.duration().map(|d| d.as_secs_f64()),
        video_frames_played: frames_played,
        video_frames_dropped: frames_dropped,
        last_frame_secs: last_frame,
        audio_chunks,
        audio_samples,
        audio_drift_secs: drift,
        decode: source.decode_stats(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_text();
    }

    info!("kinema-player finished");
    Ok(())
}
