//! Namespaces for inputs: which machine, which kind of controller

use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MappingError;

/// Emulated machine family
///
/// Identity is the text name, so `Custom("nes")` is the same type as `Nes`.
/// Prefer `GameType::from(name)`, which picks the built-in variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameType {
    Nes,
    Snes,
    Gbc,
    Gba,
    N64,
    Ds,
    Genesis,
    Custom(String),
}

impl GameType {
    pub fn as_str(&self) -> &str {
        match self {
            GameType::Nes => "nes",
            GameType::Snes => "snes",
            GameType::Gbc => "gbc",
            GameType::Gba => "gba",
            GameType::N64 => "n64",
            GameType::Ds => "ds",
            GameType::Genesis => "genesis",
            GameType::Custom(name) => name,
        }
    }
}

impl PartialEq for GameType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for GameType {}

impl Hash for GameType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl From<&str> for GameType {
    fn from(value: &str) -> Self {
        match value {
            "nes" => GameType::Nes,
            "snes" => GameType::Snes,
            "gbc" => GameType::Gbc,
            "gba" => GameType::Gba,
            "n64" => GameType::N64,
            "ds" => GameType::Ds,
            "genesis" => GameType::Genesis,
            other => GameType::Custom(other.to_string()),
        }
    }
}

impl From<String> for GameType {
    fn from(value: String) -> Self {
        GameType::from(value.as_str())
    }
}

impl From<GameType> for String {
    fn from(value: GameType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for GameType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(GameType::from(s))
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical controller family
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControllerInputType {
    Standard,
    Keyboard,
    Mfi,
    Custom(String),
}

impl ControllerInputType {
    pub fn as_str(&self) -> &str {
        match self {
            ControllerInputType::Standard => "standard",
            ControllerInputType::Keyboard => "keyboard",
            ControllerInputType::Mfi => "mfi",
            ControllerInputType::Custom(name) => name,
        }
    }
}

impl From<&str> for ControllerInputType {
    fn from(value: &str) -> Self {
        match value {
            "standard" => ControllerInputType::Standard,
            "keyboard" => ControllerInputType::Keyboard,
            "mfi" => ControllerInputType::Mfi,
            other => ControllerInputType::Custom(other.to_string()),
        }
    }
}

impl From<String> for ControllerInputType {
    fn from(value: String) -> Self {
        ControllerInputType::from(value.as_str())
    }
}

impl From<ControllerInputType> for String {
    fn from(value: ControllerInputType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for ControllerInputType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ControllerInputType::from(s))
    }
}

impl fmt::Display for ControllerInputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace of an input: a physical controller's or an emulated machine's
///
/// Text form is `controller/<type>` or `game/<type>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InputType {
    Controller(ControllerInputType),
    Game(GameType),
}

impl FromStr for InputType {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some(("controller", name)) if !name.is_empty() => {
                Ok(InputType::Controller(ControllerInputType::from(name)))
            }
            Some(("game", name)) if !name.is_empty() => Ok(InputType::Game(GameType::from(name))),
            _ => Err(MappingError::InvalidInputType(s.to_string())),
        }
    }
}

impl TryFrom<String> for InputType {
    type Error = MappingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InputType> for String {
    fn from(value: InputType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputType::Controller(kind) => write!(f, "controller/{kind}"),
            InputType::Game(kind) => write!(f, "game/{kind}"),
        }
    }
}
