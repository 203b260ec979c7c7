//! Emulation scheduler
//!
//! [`EmulatorCore`] runs an [`EmulatorBridge`] on a dedicated thread, one
//! bridge frame per tick, paced against absolute deadlines.
//!
//! ```text
//! UI thread                        Emulation Thread
//!     │                                 │
//! [start] ──spawn──────────────────►[handshake.signal]
//! [handshake.wait]◄─────────────────────┤
//!     │                            ┌─►[drain input commands]
//!     │                            │  [bridge.run_frame(video?)]
//!     │                            │  [catch up if behind (rate 1.0)]
//!     │                            └──[clock.wait_until(deadline)]
//! [pause/stop] ──state, unpark─────►[exit, handshake.signal]
//! [handshake.wait, join]
//! [save game, mute audio, bridge.pause/stop]
//! ```

mod bridge;
mod cheats;
mod clock;
mod emulator_core;
mod error;
mod game_loop;
mod priority;
mod receiver;
mod state;

pub use bridge::{BridgeEvents, EmulatorBridge, FrameSinks, Game};
pub use cheats::{Cheat, CheatError, CheatType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use emulator_core::EmulatorCore;
pub use error::{CoreError, SaveStateError};
pub use priority::{PriorityResult, request_realtime};
pub use state::{CoreObserver, EmulationState, FrameStats, SaveState};
