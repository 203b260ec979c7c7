//! Controller input state and mapping
//!
//! Each physical controller owns a [`GameControllerState`]. Receivers (an
//! emulator core, a menu) register with an optional [`InputMapping`] that
//! translates controller inputs into their own namespace.
//!
//! ```text
//! device event ─► GameControllerState ─┬─ mapping A ─► receiver A
//!                 activated / sustained └─ (none)   ─► receiver B
//! ```

mod any_input;
mod mapping;
mod standard;
mod state;
mod types;

pub use any_input::{AnyInput, Input};
pub use mapping::{GameControllerInputMapping, InputMapping, MappingError};
pub use standard::StandardInput;
pub use state::{ActivationEvent, ControllerId, GameControllerState, InputReceiver, ReceiverHandle};
pub use types::{ControllerInputType, GameType, InputType};
