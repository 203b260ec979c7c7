//! Shared test utilities for integration and unit tests

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};

use crate::audio::AudioFormat;
use crate::config::CoreConfig;
use crate::emulator::{
    CheatType, CoreObserver, EmulationState, EmulatorBridge, FrameSinks, FrameStats, ManualClock,
};
use crate::input::{
    ActivationEvent, AnyInput, ControllerId, GameType, Input, InputReceiver, InputType,
};
use crate::video::{FramePresenter, PixelFormat, RenderedFrame, VideoError, VideoFormat};

/// Poll `condition` every millisecond until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Config with real-time priority off so tests never touch the scheduler
pub fn test_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.scheduler.realtime_priority = false;
    config
}

// ============================================================================
// Video
// ============================================================================

/// Presenter that keeps every frame it receives
#[derive(Clone, Default)]
pub struct RecordingPresenter {
    frames: Arc<Mutex<Vec<RenderedFrame>>>,
}

impl RecordingPresenter {
    pub fn frames(&self) -> Vec<RenderedFrame> {
        self.frames.lock().unwrap().clone()
    }
}

impl FramePresenter for RecordingPresenter {
    fn present(&mut self, frame: &RenderedFrame) -> Result<(), VideoError> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

// ============================================================================
// Input
// ============================================================================

/// Small NES-like set of game inputs; the bridge id is the discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestGameInput {
    A = 0,
    B = 1,
    Start = 2,
}

impl Input for TestGameInput {
    fn identifier(&self) -> &str {
        match self {
            TestGameInput::A => "a",
            TestGameInput::B => "b",
            TestGameInput::Start => "start",
        }
    }

    fn int_value(&self) -> Option<i32> {
        Some(*self as i32)
    }

    fn input_type(&self) -> InputType {
        InputType::Game(GameType::Nes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverEvent {
    Activated {
        input: AnyInput,
        value: f64,
        sustained: bool,
    },
    Deactivated(AnyInput),
}

impl ReceiverEvent {
    pub fn activated(input: AnyInput, value: f64, sustained: bool) -> Self {
        ReceiverEvent::Activated {
            input,
            value,
            sustained,
        }
    }
}

#[derive(Default)]
pub struct RecordingReceiver {
    events: Mutex<Vec<ReceiverEvent>>,
}

impl RecordingReceiver {
    pub fn take_events(&self) -> Vec<ReceiverEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl InputReceiver for RecordingReceiver {
    fn did_activate(&self, event: ActivationEvent<'_>) {
        self.events.lock().unwrap().push(ReceiverEvent::activated(
            event.input.clone(),
            event.value,
            event.sustained,
        ));
    }

    fn did_deactivate(&self, _controller: ControllerId, input: &AnyInput) {
        self.events
            .lock()
            .unwrap()
            .push(ReceiverEvent::Deactivated(input.clone()));
    }
}

// ============================================================================
// Emulator
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    Start(PathBuf),
    Stop,
    Pause,
    Resume,
    ActivateInput(i32, f64),
    DeactivateInput(i32),
    ResetInputs,
    SaveState(PathBuf),
    LoadState(PathBuf),
    SaveGame(PathBuf),
    LoadGame(PathBuf),
    AddCheat(String),
    ResetCheats,
    UpdateCheats,
}

/// Scriptable bridge: 60 Hz frames, 48 kHz stereo audio, 4x4 RGBA video.
///
/// Cheat lines containing `bad` are rejected.
pub struct MockBridge {
    pub frame_duration: Duration,
    pub audio_format: AudioFormat,
    pub video_format: VideoFormat,
    pub calls: Vec<BridgeCall>,
    /// `process_video` of every frame run
    pub frames: Vec<bool>,
    /// Codes live in the engine after the last `update_cheats`
    pub applied_cheats: Vec<String>,
    pub fail_start: bool,
    queued_cheats: Vec<String>,
    clock: Option<Arc<ManualClock>>,
    overrun: Option<(usize, Duration)>,
    quit_after: Option<usize>,
    save_request_after: Option<usize>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self {
            frame_duration: Duration::from_nanos(16_666_667),
            audio_format: AudioFormat::new(48_000, 2),
            video_format: VideoFormat::new(PixelFormat::Rgba8, 4, 4),
            calls: Vec::new(),
            frames: Vec::new(),
            applied_cheats: Vec::new(),
            fail_start: false,
            queued_cheats: Vec::new(),
            clock: None,
            overrun: None,
            quit_after: None,
            save_request_after: None,
        }
    }

    /// While running frame `index` (0-based), move `clock` forward by `by`
    pub fn with_overrun(mut self, clock: Arc<ManualClock>, index: usize, by: Duration) -> Self {
        self.clock = Some(clock);
        self.overrun = Some((index, by));
        self
    }

    pub fn with_quit_after(mut self, frames: usize) -> Self {
        self.quit_after = Some(frames);
        self
    }

    pub fn with_save_request_after(mut self, frames: usize) -> Self {
        self.save_request_after = Some(frames);
        self
    }

    pub fn input_calls(&self) -> Vec<BridgeCall> {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    BridgeCall::ActivateInput(..)
                        | BridgeCall::DeactivateInput(_)
                        | BridgeCall::ResetInputs
                )
            })
            .cloned()
            .collect()
    }

    pub fn position(&self, call: &BridgeCall) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }
}

impl EmulatorBridge for MockBridge {
    fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    fn audio_format(&self) -> AudioFormat {
        self.audio_format
    }

    fn video_format(&self) -> VideoFormat {
        self.video_format
    }

    fn start(&mut self, game: &Path) -> anyhow::Result<()> {
        if self.fail_start {
            bail!("cannot open {}", game.display());
        }
        self.calls.push(BridgeCall::Start(game.to_path_buf()));
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.push(BridgeCall::Stop);
    }

    fn pause(&mut self) {
        self.calls.push(BridgeCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.push(BridgeCall::Resume);
    }

    fn run_frame(&mut self, process_video: bool, sinks: &mut FrameSinks<'_>) {
        let index = self.frames.len();
        self.frames.push(process_video);

        let samples = self.audio_format.frames_for(self.frame_duration) * self.audio_format.channels as usize;
        sinks.audio.write_samples(&vec![1000i16; samples]);

        if process_video {
            sinks.video.video_buffer().fill(index as u8);
            sinks.video.did_update_video_buffer();
        }

        if let Some((at, by)) = self.overrun
            && at == index
            && let Some(clock) = &self.clock
        {
            clock.advance(by);
        }
        if self.save_request_after == Some(index + 1) {
            sinks.events.request_save();
        }
        if self.quit_after == Some(index + 1) {
            sinks.events.emulation_did_quit();
        }
    }

    fn activate_input(&mut self, input: i32, value: f64) {
        self.calls.push(BridgeCall::ActivateInput(input, value));
    }

    fn deactivate_input(&mut self, input: i32) {
        self.calls.push(BridgeCall::DeactivateInput(input));
    }

    fn reset_inputs(&mut self) {
        self.calls.push(BridgeCall::ResetInputs);
    }

    fn save_state(&mut self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, b"state").with_context(|| format!("writing {}", path.display()))?;
        self.calls.push(BridgeCall::SaveState(path.to_path_buf()));
        Ok(())
    }

    fn load_state(&mut self, path: &Path) -> anyhow::Result<()> {
        self.calls.push(BridgeCall::LoadState(path.to_path_buf()));
        Ok(())
    }

    fn save_game_save(&mut self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, b"sram").with_context(|| format!("writing {}", path.display()))?;
        self.calls.push(BridgeCall::SaveGame(path.to_path_buf()));
        Ok(())
    }

    fn load_game_save(&mut self, path: &Path) -> anyhow::Result<()> {
        self.calls.push(BridgeCall::LoadGame(path.to_path_buf()));
        Ok(())
    }

    fn add_cheat_code(&mut self, code: &str, _cheat_type: &CheatType) -> bool {
        self.calls.push(BridgeCall::AddCheat(code.to_string()));
        if code.contains("bad") {
            return false;
        }
        self.queued_cheats.push(code.to_string());
        true
    }

    fn reset_cheats(&mut self) {
        self.calls.push(BridgeCall::ResetCheats);
        self.queued_cheats.clear();
    }

    fn update_cheats(&mut self) {
        self.calls.push(BridgeCall::UpdateCheats);
        self.applied_cheats = self.queued_cheats.clone();
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<EmulationState>>,
    saves: AtomicUsize,
    last_frame: Mutex<FrameStats>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<EmulationState> {
        self.states.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> FrameStats {
        *self.last_frame.lock().unwrap()
    }
}

impl CoreObserver for RecordingObserver {
    fn state_did_change(&self, state: EmulationState) {
        self.states.lock().unwrap().push(state);
    }

    fn did_update_frame(&self, stats: &FrameStats) {
        *self.last_frame.lock().unwrap() = *stats;
    }

    fn did_save(&self) {
        self.saves.fetch_add(1, Ordering::SeqCst);
    }
}
