//! Cheat bookkeeping with reapply-all consistency

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::EmulatorBridge;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheatError {
    #[error("cheat contains no codes")]
    Empty,
    #[error("invalid cheat code {code:?}")]
    InvalidCode { code: String },
    #[error("cheats need a running or paused core")]
    NotRunning,
}

/// Cheat device format, passed through to the bridge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheatType {
    ActionReplay,
    GameGenie,
    GameShark,
    CodeBreaker,
    Custom(String),
}

impl CheatType {
    pub fn as_str(&self) -> &str {
        match self {
            CheatType::ActionReplay => "actionReplay",
            CheatType::GameGenie => "gameGenie",
            CheatType::GameShark => "gameShark",
            CheatType::CodeBreaker => "codeBreaker",
            CheatType::Custom(name) => name,
        }
    }
}

impl From<&str> for CheatType {
    fn from(value: &str) -> Self {
        match value {
            "actionReplay" => CheatType::ActionReplay,
            "gameGenie" => CheatType::GameGenie,
            "gameShark" => CheatType::GameShark,
            "codeBreaker" => CheatType::CodeBreaker,
            other => CheatType::Custom(other.to_string()),
        }
    }
}

impl From<String> for CheatType {
    fn from(value: String) -> Self {
        CheatType::from(value.as_str())
    }
}

impl From<CheatType> for String {
    fn from(value: CheatType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CheatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cheat; `code` may hold several newline-separated code lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cheat {
    pub code: String,
    #[serde(rename = "type")]
    pub cheat_type: CheatType,
}

impl Cheat {
    pub fn new(code: impl Into<String>, cheat_type: CheatType) -> Self {
        Self {
            code: code.into(),
            cheat_type,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.code.lines().map(str::trim).filter(|line| !line.is_empty())
    }
}

/// Active cheats, keyed by code. The bridge always mirrors exactly this set.
#[derive(Debug, Default)]
pub(super) struct CheatSet {
    active: Vec<Cheat>,
}

impl CheatSet {
    pub fn active(&self) -> &[Cheat] {
        &self.active
    }

    /// All-or-nothing: if any line is rejected the active set is unchanged.
    pub fn activate<B: EmulatorBridge + ?Sized>(
        &mut self,
        bridge: &mut B,
        cheat: &Cheat,
    ) -> Result<(), CheatError> {
        if cheat.lines().next().is_none() {
            return Err(CheatError::Empty);
        }

        let rejected = cheat
            .lines()
            .find(|line| !bridge.add_cheat_code(line, &cheat.cheat_type))
            .map(str::to_string);

        if rejected.is_none() {
            match self.active.iter_mut().find(|c| c.code == cheat.code) {
                Some(existing) => existing.cheat_type = cheat.cheat_type.clone(),
                None => self.active.push(cheat.clone()),
            }
        }

        // Lines accepted before a rejected one are already queued in the bridge
        self.reapply(bridge);

        match rejected {
            Some(code) => {
                debug!("Rejected cheat line {:?} ({})", code, cheat.cheat_type);
                Err(CheatError::InvalidCode { code })
            }
            None => Ok(()),
        }
    }

    /// Returns whether the cheat was active.
    pub fn deactivate<B: EmulatorBridge + ?Sized>(&mut self, bridge: &mut B, cheat: &Cheat) -> bool {
        let before = self.active.len();
        self.active.retain(|c| c.code != cheat.code);
        let removed = self.active.len() != before;
        if removed {
            self.reapply(bridge);
        }
        removed
    }

    pub fn reapply<B: EmulatorBridge + ?Sized>(&self, bridge: &mut B) {
        bridge.reset_cheats();
        for cheat in &self.active {
            for line in cheat.lines() {
                if !bridge.add_cheat_code(line, &cheat.cheat_type) {
                    warn!("Previously accepted cheat line {:?} rejected on reapply", line);
                }
            }
        }
        bridge.update_cheats();
    }
}
