//! The emulation engine boundary

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::audio::{AudioFormat, AudioSink};
use crate::input::GameType;
use crate::video::{VideoFormat, VideoSink};

use super::CheatType;

/// A loaded game as the core sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub path: PathBuf,
    pub game_type: GameType,
    /// Battery/SRAM save, persisted on pause and stop
    pub save_path: PathBuf,
}

impl Game {
    /// Game whose save lives next to it with a `.sav` extension
    pub fn new(path: impl Into<PathBuf>, game_type: GameType) -> Self {
        let path = path.into();
        let save_path = path.with_extension("sav");
        Self {
            path,
            game_type,
            save_path,
        }
    }

    pub fn with_save_path(mut self, save_path: impl Into<PathBuf>) -> Self {
        self.save_path = save_path.into();
        self
    }
}

/// Requests a bridge may raise from inside `run_frame`.
///
/// Both are flags consumed by the emulation loop after the frame returns.
#[derive(Debug, Default)]
pub struct BridgeEvents {
    save_requested: AtomicBool,
    quit_requested: AtomicBool,
}

impl BridgeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// The game wrote its save memory; persist it after this frame
    pub fn request_save(&self) {
        self.save_requested.store(true, Ordering::Release);
    }

    /// The game asked to power off
    pub fn emulation_did_quit(&self) {
        self.quit_requested.store(true, Ordering::Release);
    }

    pub(super) fn take_save_request(&self) -> bool {
        self.save_requested.swap(false, Ordering::AcqRel)
    }

    pub(super) fn take_quit_request(&self) -> bool {
        self.quit_requested.swap(false, Ordering::AcqRel)
    }
}

/// Outputs available to the bridge while it runs one frame
pub struct FrameSinks<'a> {
    pub audio: &'a mut dyn AudioSink,
    pub video: &'a mut dyn VideoSink,
    pub events: &'a BridgeEvents,
}

/// The engine that executes the emulated machine.
///
/// Every method is called from one thread at a time: either the emulation
/// thread between frames or a caller holding the core's emulation lock.
pub trait EmulatorBridge: Send + 'static {
    /// Native length of one emulated frame
    fn frame_duration(&self) -> Duration;

    fn audio_format(&self) -> AudioFormat;

    fn video_format(&self) -> VideoFormat;

    fn start(&mut self, game: &Path) -> anyhow::Result<()>;

    fn stop(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Advance exactly one frame. Audio goes to `sinks.audio`; when
    /// `process_video` is set, one complete frame goes to `sinks.video`.
    fn run_frame(&mut self, process_video: bool, sinks: &mut FrameSinks<'_>);

    fn activate_input(&mut self, input: i32, value: f64);

    fn deactivate_input(&mut self, input: i32);

    fn reset_inputs(&mut self);

    fn save_state(&mut self, path: &Path) -> anyhow::Result<()>;

    fn load_state(&mut self, path: &Path) -> anyhow::Result<()>;

    fn save_game_save(&mut self, path: &Path) -> anyhow::Result<()>;

    fn load_game_save(&mut self, path: &Path) -> anyhow::Result<()>;

    /// Queue one code line. Returns false if the engine rejects it.
    fn add_cheat_code(&mut self, code: &str, cheat_type: &CheatType) -> bool;

    fn reset_cheats(&mut self);

    /// Apply the queued codes
    fn update_cheats(&mut self);
}
