//! emucore - Real-time execution core for emulator front-ends
//!
//! This crate sits between a front-end and an emulation engine. It paces the
//! engine frame by frame and hands its audio and video to the hardware side
//! without ever blocking the emulation thread.
//!
//! # Architecture
//!
//! - [`EmulatorCore`] - Lifecycle, pacing loop, save states and cheats around an [`EmulatorBridge`]
//! - [`AudioPipeline`] / [`AudioRenderer`] - Native PCM ring and the hardware callback that drains it
//! - [`VideoPipeline`] - Back/front buffer handoff to a dedicated render thread
//! - [`GameControllerState`] - Per-controller activation state with mapped receivers
//! - [`RingBuffer`] - Lock-free SPSC byte queue shared by the audio halves

pub mod audio;
pub mod config;
pub mod emulator;
pub mod input;
#[cfg(test)]
mod integration;
pub mod ring_buffer;
pub mod sync;
#[cfg(test)]
pub mod test_utils;
pub mod video;

// Re-export the scheduler surface
pub use emulator::{
    BridgeEvents, Cheat, CheatError, CheatType, Clock, CoreError, CoreObserver, EmulationState,
    EmulatorBridge, EmulatorCore, FrameSinks, FrameStats, Game, ManualClock, SaveState,
    SaveStateError, SystemClock,
};

// Re-export pipeline types
pub use audio::{AudioError, AudioFormat, AudioPipeline, AudioRenderer, AudioSink, AudioStats};
pub use ring_buffer::RingBuffer;
pub use video::{
    FramePresenter, PixelFormat, RenderedFrame, VideoError, VideoFormat, VideoPipeline, VideoSink,
    VideoStats, Viewport,
};

// Re-export input types
pub use input::{
    AnyInput, ControllerId, ControllerInputType, GameControllerInputMapping, GameControllerState,
    GameType, Input, InputMapping, InputReceiver, InputType, StandardInput,
};

// Re-export configuration
pub use config::{AudioConfig, CoreConfig, SchedulerConfig, VideoConfig};
