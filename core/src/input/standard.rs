use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ControllerInputType, Input, InputType, MappingError};

/// Inputs of a generic gamepad, roughly from most to least common
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StandardInput {
    Menu,
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    LeftThumbstickUp,
    LeftThumbstickDown,
    LeftThumbstickLeft,
    LeftThumbstickRight,
    RightThumbstickUp,
    RightThumbstickDown,
    RightThumbstickLeft,
    RightThumbstickRight,
    L1,
    L2,
    L3,
    R1,
    R2,
    R3,
    // Common game inputs that few controllers have
    Start,
    Select,
}

impl StandardInput {
    pub const ALL: [StandardInput; 25] = [
        StandardInput::Menu,
        StandardInput::Up,
        StandardInput::Down,
        StandardInput::Left,
        StandardInput::Right,
        StandardInput::A,
        StandardInput::B,
        StandardInput::X,
        StandardInput::Y,
        StandardInput::LeftThumbstickUp,
        StandardInput::LeftThumbstickDown,
        StandardInput::LeftThumbstickLeft,
        StandardInput::LeftThumbstickRight,
        StandardInput::RightThumbstickUp,
        StandardInput::RightThumbstickDown,
        StandardInput::RightThumbstickLeft,
        StandardInput::RightThumbstickRight,
        StandardInput::L1,
        StandardInput::L2,
        StandardInput::L3,
        StandardInput::R1,
        StandardInput::R2,
        StandardInput::R3,
        StandardInput::Start,
        StandardInput::Select,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            StandardInput::Menu => "menu",
            StandardInput::Up => "up",
            StandardInput::Down => "down",
            StandardInput::Left => "left",
            StandardInput::Right => "right",
            StandardInput::A => "a",
            StandardInput::B => "b",
            StandardInput::X => "x",
            StandardInput::Y => "y",
            StandardInput::LeftThumbstickUp => "leftThumbstickUp",
            StandardInput::LeftThumbstickDown => "leftThumbstickDown",
            StandardInput::LeftThumbstickLeft => "leftThumbstickLeft",
            StandardInput::LeftThumbstickRight => "leftThumbstickRight",
            StandardInput::RightThumbstickUp => "rightThumbstickUp",
            StandardInput::RightThumbstickDown => "rightThumbstickDown",
            StandardInput::RightThumbstickLeft => "rightThumbstickLeft",
            StandardInput::RightThumbstickRight => "rightThumbstickRight",
            StandardInput::L1 => "l1",
            StandardInput::L2 => "l2",
            StandardInput::L3 => "l3",
            StandardInput::R1 => "r1",
            StandardInput::R2 => "r2",
            StandardInput::R3 => "r3",
            StandardInput::Start => "start",
            StandardInput::Select => "select",
        }
    }
}

impl Input for StandardInput {
    fn identifier(&self) -> &str {
        self.as_str()
    }

    fn input_type(&self) -> InputType {
        InputType::Controller(ControllerInputType::Standard)
    }

    fn is_continuous(&self) -> bool {
        matches!(
            self,
            StandardInput::LeftThumbstickUp
                | StandardInput::LeftThumbstickDown
                | StandardInput::LeftThumbstickLeft
                | StandardInput::LeftThumbstickRight
                | StandardInput::RightThumbstickUp
                | StandardInput::RightThumbstickDown
                | StandardInput::RightThumbstickLeft
                | StandardInput::RightThumbstickRight
        )
    }
}

impl FromStr for StandardInput {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StandardInput::ALL
            .into_iter()
            .find(|input| input.as_str() == s)
            .ok_or_else(|| MappingError::UnknownInput(s.to_string()))
    }
}

impl fmt::Display for StandardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
