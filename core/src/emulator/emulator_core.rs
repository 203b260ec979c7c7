use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use super::cheats::CheatSet;
use super::game_loop;
use super::receiver::{CoreInputReceiver, InputCommand, InputState};
use super::state::StateCell;
use super::{
    BridgeEvents, Cheat, CheatError, Clock, CoreError, CoreObserver, EmulationState,
    EmulatorBridge, FrameSinks, FrameStats, Game, SaveState, SaveStateError, SystemClock,
};
use crate::audio::{AudioPipeline, AudioRenderer, AudioStats};
use crate::config::CoreConfig;
use crate::input::{GameControllerState, InputMapping, ReceiverHandle};
use crate::sync::{Parker, Semaphore};
use crate::video::{FilterChain, FramePresenter, VideoPipeline, VideoStats, Viewport};

fn recover<'a, T>(result: std::sync::LockResult<MutexGuard<'a, T>>, what: &str) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|e| {
        warn!("{} lock poisoned, recovering", what);
        e.into_inner()
    })
}

/// Everything the loop thread touches per frame, behind one lock
pub(super) struct Emulation<B> {
    pub bridge: B,
    pub audio: AudioPipeline,
    pub video: VideoPipeline,
    pub cheats: CheatSet,
    pub inputs: InputState,
    pub commands: Receiver<InputCommand>,
    pub stats: FrameStats,
}

impl<B: EmulatorBridge> Emulation<B> {
    pub fn drain_inputs(&mut self) {
        let Emulation {
            bridge,
            inputs,
            commands,
            ..
        } = self;
        inputs.drain(commands, bridge);
    }
}

pub(super) struct CoreInner<B> {
    pub game: Game,
    pub config: CoreConfig,
    pub frame_duration: Duration,
    pub state: StateCell,
    pub handshake: Semaphore,
    pub parker: Parker,
    pub clock: Arc<dyn Clock>,
    pub events: BridgeEvents,
    /// Serializes start/stop/pause/resume
    transition: Mutex<()>,
    emulation: Mutex<Emulation<B>>,
    rate_bits: AtomicU64,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
    observers: Mutex<Vec<Weak<dyn CoreObserver>>>,
    receiver: Arc<CoreInputReceiver>,
    audio_renderer: Mutex<Option<AudioRenderer>>,
}

impl<B: EmulatorBridge> CoreInner<B> {
    pub fn emulation(&self) -> MutexGuard<'_, Emulation<B>> {
        recover(self.emulation.lock(), "emulation")
    }

    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Acquire))
    }

    /// Run one bridge frame and count it
    pub fn step_frame(&self, emulation: &mut Emulation<B>, process_video: bool, skipped: bool) {
        let Emulation {
            bridge,
            audio,
            video,
            inputs,
            stats,
            ..
        } = emulation;

        let mut sinks = FrameSinks {
            audio,
            video,
            events: &self.events,
        };
        bridge.run_frame(process_video, &mut sinks);
        inputs.tick(bridge);

        stats.frames_run += 1;
        if skipped {
            stats.frames_skipped += 1;
        }
        if process_video {
            stats.frames_with_video += 1;
        }
    }

    pub fn save_locked(&self, emulation: &mut Emulation<B>) -> Result<(), CoreError> {
        emulation.bridge.save_game_save(&self.game.save_path)?;
        Ok(())
    }

    fn observers(&self) -> Vec<Arc<dyn CoreObserver>> {
        let mut observers = recover(self.observers.lock(), "observers");
        observers.retain(|o| o.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn notify_frame(&self, stats: &FrameStats) {
        for observer in self.observers() {
            observer.did_update_frame(stats);
        }
    }

    pub fn notify_saved(&self) {
        for observer in self.observers() {
            observer.did_save();
        }
    }

    fn notify_state(&self, state: EmulationState) {
        info!("Emulation {}", state);
        for observer in self.observers() {
            observer.state_did_change(state);
        }
    }

    /// Spawn the loop thread and wait until it is running
    fn launch_loop(self: &Arc<Self>) -> bool {
        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("emulation".into())
            .spawn(move || game_loop::run(inner));

        match spawned {
            Ok(handle) => {
                *recover(self.loop_thread.lock(), "loop thread") = Some(handle);
                self.handshake.wait();
                true
            }
            Err(e) => {
                error!("Failed to spawn emulation thread: {}", e);
                false
            }
        }
    }

    /// Wake the loop thread, wait for its exit signal and join it.
    /// The state must already be something other than Running.
    fn halt_loop(&self) {
        self.parker.unpark();
        self.handshake.wait();
        let handle = recover(self.loop_thread.lock(), "loop thread").take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("Emulation thread panicked");
        }
    }

    pub fn start(self: &Arc<Self>) -> bool {
        let _transition = recover(self.transition.lock(), "transition");
        if self.state.get() != EmulationState::Stopped {
            return false;
        }

        {
            let mut emulation = self.emulation();
            if let Err(e) = emulation.bridge.start(&self.game.path) {
                error!("Failed to start {}: {:#}", self.game.path.display(), e);
                return false;
            }
            if self.game.save_path.exists()
                && let Err(e) = emulation.bridge.load_game_save(&self.game.save_path)
            {
                warn!("Failed to load game save {}: {:#}", self.game.save_path.display(), e);
            }
            let Emulation { bridge, cheats, .. } = &mut *emulation;
            if !cheats.active().is_empty() {
                cheats.reapply(bridge);
            }
            emulation.audio.start();
        }

        self.state.set(EmulationState::Running);
        if !self.launch_loop() {
            self.state.set(EmulationState::Stopped);
            let mut emulation = self.emulation();
            emulation.audio.stop();
            emulation.bridge.stop();
            return false;
        }

        self.notify_state(EmulationState::Running);
        true
    }

    pub fn stop(&self) -> bool {
        let _transition = recover(self.transition.lock(), "transition");
        let previous = self.state.get();
        if previous == EmulationState::Stopped {
            return false;
        }

        self.state.set(EmulationState::Stopped);
        if previous == EmulationState::Running {
            self.halt_loop();
        }

        let saved = {
            let mut emulation = self.emulation();
            let saved = self.save_before_halting(&mut emulation);
            emulation.audio.stop();
            emulation.bridge.stop();
            emulation.inputs.clear();
            saved
        };

        if saved {
            self.notify_saved();
        }
        self.notify_state(EmulationState::Stopped);
        true
    }

    pub fn pause(&self) -> bool {
        let _transition = recover(self.transition.lock(), "transition");
        if self.state.get() != EmulationState::Running {
            return false;
        }

        self.state.set(EmulationState::Paused);
        self.halt_loop();

        let saved = {
            let mut emulation = self.emulation();
            let saved = self.save_before_halting(&mut emulation);
            emulation.audio.stop();
            emulation.bridge.pause();
            saved
        };

        if saved {
            self.notify_saved();
        }
        self.notify_state(EmulationState::Paused);
        true
    }

    pub fn resume(self: &Arc<Self>) -> bool {
        let _transition = recover(self.transition.lock(), "transition");
        if self.state.get() != EmulationState::Paused {
            return false;
        }

        {
            let mut emulation = self.emulation();
            emulation.bridge.resume();
            emulation.audio.start();
        }

        self.state.set(EmulationState::Running);
        if !self.launch_loop() {
            self.state.set(EmulationState::Paused);
            let mut emulation = self.emulation();
            emulation.audio.stop();
            emulation.bridge.pause();
            return false;
        }

        self.notify_state(EmulationState::Running);
        true
    }

    fn save_before_halting(&self, emulation: &mut Emulation<B>) -> bool {
        match self.save_locked(emulation) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save game: {:#}", e);
                false
            }
        }
    }
}

/// Drives an [`EmulatorBridge`] on a dedicated real-time thread.
///
/// Owns the audio and video pipelines the bridge writes into, the active
/// cheats, and the input receiver that controllers feed. Dropping the core
/// stops it.
pub struct EmulatorCore<B: EmulatorBridge> {
    inner: Arc<CoreInner<B>>,
}

impl<B: EmulatorBridge> EmulatorCore<B> {
    pub fn new(bridge: B, game: Game, config: CoreConfig) -> Result<Self, CoreError> {
        Self::with_clock(bridge, game, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        bridge: B,
        game: Game,
        config: CoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        let frame_duration = bridge.frame_duration();
        if frame_duration.is_zero() {
            return Err(CoreError::InvalidFrameDuration);
        }

        let (audio, renderer) = AudioPipeline::new(bridge.audio_format(), frame_duration, &config.audio)?;
        let video = VideoPipeline::new(bridge.video_format(), &config.video)?;

        let (commands_tx, commands) = mpsc::channel();
        let receiver = Arc::new(CoreInputReceiver::new(game.game_type.clone(), commands_tx));

        info!(
            "Core created for {} ({}): {:?} per frame, audio {}",
            game.path.display(),
            game.game_type,
            frame_duration,
            audio.native_format()
        );

        let inner = CoreInner {
            game,
            config,
            frame_duration,
            state: StateCell::new(EmulationState::Stopped),
            handshake: Semaphore::new(0),
            parker: Parker::new(),
            clock,
            events: BridgeEvents::new(),
            transition: Mutex::new(()),
            emulation: Mutex::new(Emulation {
                bridge,
                audio,
                video,
                cheats: CheatSet::default(),
                inputs: InputState::default(),
                commands,
                stats: FrameStats::default(),
            }),
            rate_bits: AtomicU64::new(1.0f64.to_bits()),
            loop_thread: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            receiver,
            audio_renderer: Mutex::new(Some(renderer)),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn game(&self) -> &Game {
        &self.inner.game
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn state(&self) -> EmulationState {
        self.inner.state.get()
    }

    pub fn frame_duration(&self) -> Duration {
        self.inner.frame_duration
    }

    /// Begin a session. Blocks until the loop thread is running.
    ///
    /// Returns `false` unless the core was stopped, or if the bridge fails to start.
    pub fn start(&self) -> bool {
        self.inner.start()
    }

    /// End the session, saving the game first. Valid from Running or Paused.
    pub fn stop(&self) -> bool {
        self.inner.stop()
    }

    /// Halt the loop, save, and mute audio. Valid only from Running.
    pub fn pause(&self) -> bool {
        self.inner.pause()
    }

    pub fn resume(&self) -> bool {
        self.inner.resume()
    }

    pub fn rate(&self) -> f64 {
        self.inner.rate()
    }

    /// Set the playback speed (1.0 is native). Non-positive or non-finite
    /// rates are rejected.
    pub fn set_rate(&self, rate: f64) -> bool {
        if !rate.is_finite() || rate <= 0.0 {
            warn!("Ignoring invalid emulation rate {}", rate);
            return false;
        }
        self.inner.rate_bits.store(rate.to_bits(), Ordering::Release);
        self.inner.emulation().audio.set_rate(rate);
        true
    }

    /// Hardware half of the audio pipeline. Available once.
    pub fn take_audio_renderer(&self) -> Option<AudioRenderer> {
        recover(self.inner.audio_renderer.lock(), "audio renderer").take()
    }

    /// Feed this controller's inputs to the bridge, translated by `mapping`.
    /// Only inputs of the game's type reach the bridge.
    pub fn attach_controller(
        &self,
        controller: &GameControllerState,
        mapping: Option<Arc<dyn InputMapping>>,
    ) -> ReceiverHandle {
        controller.add_receiver(&self.inner.receiver, mapping)
    }

    pub fn add_observer<O: CoreObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<dyn CoreObserver> = Arc::downgrade(observer) as Weak<O>;
        recover(self.inner.observers.lock(), "observers").push(weak);
    }

    /// Persist the game save now
    pub fn save(&self) -> Result<(), CoreError> {
        if self.state() == EmulationState::Stopped {
            return Err(CoreError::NotRunning);
        }
        self.inner.save_locked(&mut self.inner.emulation())?;
        self.inner.notify_saved();
        Ok(())
    }

    pub fn save_state(&self, path: &Path) -> Result<SaveState, SaveStateError> {
        if self.state() == EmulationState::Stopped {
            return Err(SaveStateError::NotRunning);
        }
        self.inner.emulation().bridge.save_state(path)?;
        Ok(SaveState::new(path, self.inner.game.game_type.clone()))
    }

    /// Restore `state`, then reapply cheats and re-press held inputs
    pub fn load_state(&self, state: &SaveState) -> Result<(), SaveStateError> {
        if self.state() == EmulationState::Stopped {
            return Err(SaveStateError::NotRunning);
        }
        if state.game_type != self.inner.game.game_type {
            return Err(SaveStateError::WrongGameType);
        }
        if !state.path.exists() {
            return Err(SaveStateError::DoesNotExist(state.path.clone()));
        }

        let mut emulation = self.inner.emulation();
        emulation.drain_inputs();
        emulation.bridge.load_state(&state.path)?;

        let Emulation {
            bridge,
            cheats,
            inputs,
            ..
        } = &mut *emulation;
        cheats.reapply(bridge);
        bridge.reset_inputs();
        inputs.reactivate_held(bridge);
        Ok(())
    }

    pub fn activate_cheat(&self, cheat: &Cheat) -> Result<(), CheatError> {
        if self.state() == EmulationState::Stopped {
            return Err(CheatError::NotRunning);
        }
        let mut emulation = self.inner.emulation();
        let Emulation { bridge, cheats, .. } = &mut *emulation;
        cheats.activate(bridge, cheat)
    }

    /// Returns whether the cheat was active
    pub fn deactivate_cheat(&self, cheat: &Cheat) -> bool {
        if self.state() == EmulationState::Stopped {
            return false;
        }
        let mut emulation = self.inner.emulation();
        let Emulation { bridge, cheats, .. } = &mut *emulation;
        cheats.deactivate(bridge, cheat)
    }

    pub fn active_cheats(&self) -> Vec<Cheat> {
        self.inner.emulation().cheats.active().to_vec()
    }

    pub fn set_presenter(&self, presenter: Box<dyn FramePresenter>) {
        self.inner.emulation().video.set_presenter(presenter);
    }

    pub fn set_viewport(&self, viewport: Option<Viewport>) {
        self.inner.emulation().video.set_viewport(viewport);
    }

    pub fn set_filter_chain(&self, filters: FilterChain) {
        self.inner.emulation().video.set_filter_chain(filters);
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.inner.emulation().stats
    }

    pub fn audio_stats(&self) -> AudioStats {
        self.inner.emulation().audio.stats()
    }

    pub fn video_stats(&self) -> VideoStats {
        self.inner.emulation().video.stats()
    }

    /// Run `f` against the bridge between frames
    pub fn with_bridge<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.inner.emulation().bridge)
    }

    /// Run `f` against the audio pipeline between frames
    pub fn with_audio<R>(&self, f: impl FnOnce(&mut AudioPipeline) -> R) -> R {
        f(&mut self.inner.emulation().audio)
    }
}

impl<B: EmulatorBridge> Drop for EmulatorCore<B> {
    fn drop(&mut self) {
        self.inner.stop();
    }
}
