use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{AnyInput, ControllerInputType, Input, InputType};

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read mapping {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write mapping {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse mapping {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize mapping: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid input type: {0:?}")]
    InvalidInputType(String),
    #[error("unknown input: {0:?}")]
    UnknownInput(String),
    #[error("mapping expects {expected} inputs, got {found}")]
    TypeMismatch { expected: InputType, found: InputType },
}

/// Translates controller inputs into another namespace
pub trait InputMapping: Send + Sync {
    fn controller_input_type(&self) -> &ControllerInputType;

    /// `None` means the input is dropped for this receiver.
    fn input_for(&self, controller_input: &AnyInput) -> Option<AnyInput>;
}

fn default_ignores_unmapped() -> bool {
    true
}

/// Persistable table from one controller type's inputs to target inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameControllerInputMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub controller_input_type: ControllerInputType,
    /// Unmapped inputs are dropped instead of passed through unchanged
    #[serde(default = "default_ignores_unmapped")]
    pub ignores_unmapped_inputs: bool,
    #[serde(default)]
    mappings: HashMap<String, AnyInput>,
}

impl GameControllerInputMapping {
    pub fn new(controller_input_type: ControllerInputType) -> Self {
        Self {
            name: None,
            controller_input_type,
            ignores_unmapped_inputs: true,
            mappings: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn check_type<I: Input + ?Sized>(&self, controller_input: &I) -> Result<(), MappingError> {
        let expected = InputType::Controller(self.controller_input_type.clone());
        let found = controller_input.input_type();
        if found == expected {
            Ok(())
        } else {
            Err(MappingError::TypeMismatch { expected, found })
        }
    }

    /// Map `controller_input` to `input`, or remove its entry when `input` is `None`.
    pub fn set<C, I>(&mut self, controller_input: &C, input: Option<&I>) -> Result<(), MappingError>
    where
        C: Input + ?Sized,
        I: Input + ?Sized,
    {
        self.check_type(controller_input)?;
        let key = controller_input.identifier().to_string();
        match input {
            Some(input) => {
                self.mappings.insert(key, AnyInput::from_input(input));
            }
            None => {
                self.mappings.remove(&key);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Controller inputs with an entry, as inputs of this mapping's controller type
    pub fn mapped_inputs(&self) -> Vec<AnyInput> {
        let input_type = InputType::Controller(self.controller_input_type.clone());
        let mut inputs: Vec<AnyInput> = self
            .mappings
            .keys()
            .map(|identifier| AnyInput::new(identifier.clone(), input_type.clone()))
            .collect();
        inputs.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        inputs
    }

    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let contents = fs::read_to_string(path).map_err(|source| MappingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| MappingError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), MappingError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| MappingError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| MappingError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl InputMapping for GameControllerInputMapping {
    fn controller_input_type(&self) -> &ControllerInputType {
        &self.controller_input_type
    }

    fn input_for(&self, controller_input: &AnyInput) -> Option<AnyInput> {
        if let Err(err) = self.check_type(controller_input) {
            debug!("Mapping {:?} skipped input: {}", self.name, err);
            return None;
        }

        match self.mappings.get(controller_input.identifier()) {
            Some(mapped) => Some(mapped.clone()),
            None if self.ignores_unmapped_inputs => None,
            None => Some(controller_input.clone()),
        }
    }
}
