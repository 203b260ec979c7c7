//! Controller input → bridge input, applied on the emulation thread

use std::sync::mpsc::{Receiver, Sender};

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::EmulatorBridge;
use crate::input::{ActivationEvent, AnyInput, ControllerId, GameType, Input, InputReceiver, InputType};

/// Frames a sustained input stays released before it is pressed again
const REACTIVATION_DELAY_FRAMES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum InputCommand {
    Activate { id: i32, value: f64, restart: bool },
    Deactivate { id: i32 },
}

/// Registered on controllers; forwards inputs of the core's game type to the loop thread
pub(super) struct CoreInputReceiver {
    game_type: InputType,
    commands: Sender<InputCommand>,
}

impl CoreInputReceiver {
    pub fn new(game_type: GameType, commands: Sender<InputCommand>) -> Self {
        Self {
            game_type: InputType::Game(game_type),
            commands,
        }
    }

    fn bridge_id(&self, input: &AnyInput) -> Option<i32> {
        if input.input_type() != self.game_type {
            return None;
        }
        let id = input.int_value();
        if id.is_none() {
            debug!("Game input {:?} has no bridge id", input);
        }
        id
    }

    fn send(&self, command: InputCommand) {
        // Fails only once the core is gone
        if self.commands.send(command).is_err() {
            trace!("Dropping {:?}, core shut down", command);
        }
    }
}

impl InputReceiver for CoreInputReceiver {
    fn did_activate(&self, event: ActivationEvent<'_>) {
        let Some(id) = self.bridge_id(event.input) else {
            return;
        };
        // Pressing a held button again must look like a fresh press to the game
        let restart = event.sustained && !event.input.is_continuous();
        self.send(InputCommand::Activate {
            id,
            value: event.value,
            restart,
        });
    }

    fn did_deactivate(&self, _controller: ControllerId, input: &AnyInput) {
        if let Some(id) = self.bridge_id(input) {
            self.send(InputCommand::Deactivate { id });
        }
    }
}

#[derive(Debug)]
struct Reactivation {
    id: i32,
    value: f64,
    frames_left: u32,
}

/// Inputs as the bridge currently sees them
#[derive(Debug, Default)]
pub(super) struct InputState {
    held: HashMap<i32, f64>,
    pending: SmallVec<[Reactivation; 4]>,
}

impl InputState {
    pub fn drain<B: EmulatorBridge + ?Sized>(&mut self, commands: &Receiver<InputCommand>, bridge: &mut B) {
        while let Ok(command) = commands.try_recv() {
            self.apply(command, bridge);
        }
    }

    fn apply<B: EmulatorBridge + ?Sized>(&mut self, command: InputCommand, bridge: &mut B) {
        match command {
            InputCommand::Activate { id, value, restart } => {
                self.held.insert(id, value);
                if restart {
                    bridge.deactivate_input(id);
                    self.pending.push(Reactivation {
                        id,
                        value,
                        frames_left: REACTIVATION_DELAY_FRAMES,
                    });
                } else {
                    bridge.activate_input(id, value);
                }
            }
            InputCommand::Deactivate { id } => {
                self.held.remove(&id);
                self.pending.retain(|r| r.id != id);
                bridge.deactivate_input(id);
            }
        }
    }

    /// Count down one frame; re-press inputs whose delay elapsed
    pub fn tick<B: EmulatorBridge + ?Sized>(&mut self, bridge: &mut B) {
        for reactivation in &mut self.pending {
            reactivation.frames_left = reactivation.frames_left.saturating_sub(1);
        }
        self.pending.retain(|r| {
            if r.frames_left == 0 {
                bridge.activate_input(r.id, r.value);
                false
            } else {
                true
            }
        });
    }

    /// Press every held input again, after the bridge reset its inputs
    pub fn reactivate_held<B: EmulatorBridge + ?Sized>(&mut self, bridge: &mut B) {
        self.pending.clear();
        for (&id, &value) in &self.held {
            bridge.activate_input(id, value);
        }
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.pending.clear();
    }
}
