use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::input::GameType;

/// Lifecycle of an emulation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EmulationState {
    Stopped = 0,
    Running = 1,
    Paused = 2,
}

impl EmulationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EmulationState::Running,
            2 => EmulationState::Paused,
            _ => EmulationState::Stopped,
        }
    }
}

impl fmt::Display for EmulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EmulationState::Stopped => "stopped",
            EmulationState::Running => "running",
            EmulationState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Atomic cell read by the loop thread at every iteration boundary
#[derive(Debug)]
pub(super) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: EmulationState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> EmulationState {
        EmulationState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: EmulationState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Frame counters since the core was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Every bridge frame, skipped ones included
    pub frames_run: u64,
    /// Frames run without video to catch up with wall-clock time
    pub frames_skipped: u64,
    pub frames_with_video: u64,
}

/// A save state file; its contents belong to the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveState {
    pub path: PathBuf,
    pub game_type: GameType,
}

impl SaveState {
    pub fn new(path: &Path, game_type: GameType) -> Self {
        Self {
            path: path.to_path_buf(),
            game_type,
        }
    }
}

/// UI-side observer of the core.
///
/// Frame and save callbacks may arrive on the emulation thread; calling
/// `start`/`stop`/`pause`/`resume` from inside one deadlocks.
pub trait CoreObserver: Send + Sync {
    fn state_did_change(&self, _state: EmulationState) {}

    /// Called from the emulation thread after every loop iteration
    fn did_update_frame(&self, _stats: &FrameStats) {}

    fn did_save(&self) {}
}
