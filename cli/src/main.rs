//! emucore - headless driver for the execution core
//!
//! Runs a synthetic engine (sine tone plus a scrolling test pattern) through
//! the full core: paced emulation loop, audio ring and renderer, video
//! handoff and render thread. Prints frame, audio and video statistics.
//!
//! # Usage
//!
//! ```bash
//! emucore --seconds 5
//! emucore --rate 4 --no-video
//! emucore --config my-config.toml --log emucore=debug
//! ```

mod headless;
mod synthetic;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use emucore::{AudioRenderer, CoreConfig, EmulatorCore, Game, GameType, config};
use tracing::info;
use tracing_subscriber::EnvFilter;

use headless::{AudioDrain, CountingPresenter};
use synthetic::SyntheticBridge;

#[derive(Parser)]
#[command(name = "emucore")]
#[command(author, version, about = "Headless driver for the emucore execution core")]
struct Args {
    /// How long to run, in seconds of wall-clock time
    #[arg(long, default_value = "3")]
    seconds: f64,

    /// Playback rate (1.0 is native speed)
    #[arg(long, default_value = "1.0")]
    rate: f64,

    /// Config file (default: config.toml in the platform config dir)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable the audio pipeline
    #[arg(long)]
    no_audio: bool,

    /// Disable the video pipeline
    #[arg(long)]
    no_video: bool,

    /// Log filter, e.g. `debug` or `emucore=trace` (default: RUST_LOG, then info)
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// Play through the default audio device instead of a headless drain
    #[cfg(feature = "cpal-output")]
    #[arg(long)]
    device: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log {
        Some(filter) => EnvFilter::try_new(filter).context("invalid --log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !args.seconds.is_finite() || args.seconds <= 0.0 {
        bail!("--seconds must be positive");
    }

    let mut config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    apply_flags(&mut config, &args);

    let game_path = std::env::temp_dir().join("emucore-synthetic.bin");
    let game = Game::new(game_path, GameType::from("synthetic"));
    let core = EmulatorCore::new(SyntheticBridge::new(), game, config)?;

    if !core.set_rate(args.rate) {
        bail!("--rate must be a positive number, got {}", args.rate);
    }

    let presenter = CountingPresenter::default();
    core.set_presenter(Box::new(presenter.clone()));

    let renderer = core
        .take_audio_renderer()
        .context("audio renderer already taken")?;
    let mut sink = AudioSink::open(&core, renderer, &args)?;

    if !core.start() {
        bail!("emulation failed to start");
    }
    info!("Running for {:.1}s at {}x", args.seconds, args.rate);

    let began = Instant::now();
    let run_for = Duration::from_secs_f64(args.seconds);
    while began.elapsed() < run_for {
        thread::sleep(Duration::from_millis(100).min(run_for.saturating_sub(began.elapsed())));
        sink.poll(&core)?;
    }

    core.stop();
    let elapsed = began.elapsed();
    let audible_frames = sink.audible_frames();
    drop(sink);

    let frames = core.frame_stats();
    let audio = core.audio_stats();
    let video = core.video_stats();
    let engine_frames = core.with_bridge(|bridge| bridge.frames());

    println!("Ran {:.2}s at {}x", elapsed.as_secs_f64(), core.rate());
    println!(
        "  frames:  {} run ({:.1}/s), {} skipped, {} with video, engine at {}",
        frames.frames_run,
        frames.frames_run as f64 / elapsed.as_secs_f64(),
        frames.frames_skipped,
        frames.frames_with_video,
        engine_frames
    );
    println!(
        "  audio:   {} blocks, {} underruns, {} conversion errors, {} bytes written, {} dropped",
        audio.blocks_rendered,
        audio.underruns,
        audio.conversion_errors,
        audio.bytes_written,
        audio.bytes_dropped
    );
    if let Some(frames) = audible_frames {
        println!("           {} frames audible at the drain", frames);
    }
    println!(
        "  video:   {} published, {} dropped, {} redundant, {} presented, {} errors",
        video.frames_published,
        video.frames_dropped,
        video.redundant_skipped,
        video.frames_presented,
        video.render_errors
    );
    match presenter.last_size() {
        Some((width, height)) => println!(
            "           {} frames at the presenter, last {}x{}",
            presenter.presented(),
            width,
            height
        ),
        None => println!("           {} frames at the presenter", presenter.presented()),
    }

    Ok(())
}

fn apply_flags(config: &mut CoreConfig, args: &Args) {
    if args.no_audio {
        config.audio.enabled = false;
    }
    if args.no_video {
        config.video.enabled = false;
    }
}

/// Where rendered audio goes for this run
enum AudioSink {
    Headless(AudioDrain),
    #[cfg(feature = "cpal-output")]
    Device(emucore::audio::AudioOutput),
}

impl AudioSink {
    #[cfg_attr(not(feature = "cpal-output"), allow(unused_variables))]
    fn open(
        core: &EmulatorCore<SyntheticBridge>,
        renderer: AudioRenderer,
        args: &Args,
    ) -> Result<Self> {
        #[cfg(feature = "cpal-output")]
        if args.device {
            let output = emucore::audio::AudioOutput::new(renderer)?;
            core.with_audio(|audio| audio.reconfigure(output.format()))?;
            info!("Playing through the default device at {:?}", output.format());
            return Ok(AudioSink::Device(output));
        }

        let block_frames = core.with_audio(|audio| audio.preferred_block_frames());
        Ok(AudioSink::Headless(AudioDrain::spawn(renderer, block_frames)?))
    }

    /// Reopen a lost device and point the pipeline at its format
    #[cfg(feature = "cpal-output")]
    fn poll(&mut self, core: &EmulatorCore<SyntheticBridge>) -> Result<()> {
        if let AudioSink::Device(output) = self
            && output.needs_rebuild()
        {
            let format = output.rebuild()?;
            core.with_audio(|audio| audio.reconfigure(format))?;
            tracing::warn!("Audio device changed, now {:?}", format);
        }
        Ok(())
    }

    #[cfg(not(feature = "cpal-output"))]
    fn poll(&mut self, _core: &EmulatorCore<SyntheticBridge>) -> Result<()> {
        Ok(())
    }

    fn audible_frames(&self) -> Option<u64> {
        match self {
            AudioSink::Headless(drain) => Some(drain.audible_frames()),
            #[cfg(feature = "cpal-output")]
            AudioSink::Device(_) => None,
        }
    }
}
