use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::InputType;

/// A logical button or axis within an [`InputType`] namespace
pub trait Input {
    fn identifier(&self) -> &str;

    /// Numeric id understood by the bridge, for game inputs
    fn int_value(&self) -> Option<i32> {
        None
    }

    fn input_type(&self) -> InputType;

    /// Analog inputs (thumbsticks) report a changing value while held
    fn is_continuous(&self) -> bool {
        false
    }
}

/// Type-erased input used as a set/map key.
///
/// Equality and hashing consider only the namespace and identifier.
#[derive(Clone, Serialize, Deserialize)]
pub struct AnyInput {
    identifier: String,
    #[serde(rename = "type")]
    input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    continuous: bool,
}

impl AnyInput {
    pub fn new(identifier: impl Into<String>, input_type: InputType) -> Self {
        Self {
            identifier: identifier.into(),
            input_type,
            value: None,
            continuous: false,
        }
    }

    pub fn with_int_value(mut self, value: i32) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn from_input<I: Input + ?Sized>(input: &I) -> Self {
        Self {
            identifier: input.identifier().to_string(),
            input_type: input.input_type(),
            value: input.int_value(),
            continuous: input.is_continuous(),
        }
    }
}

impl Input for AnyInput {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn int_value(&self) -> Option<i32> {
        self.value
    }

    fn input_type(&self) -> InputType {
        self.input_type.clone()
    }

    fn is_continuous(&self) -> bool {
        self.continuous
    }
}

impl PartialEq for AnyInput {
    fn eq(&self, other: &Self) -> bool {
        self.input_type == other.input_type && self.identifier == other.identifier
    }
}

impl Eq for AnyInput {}

impl Hash for AnyInput {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.input_type.hash(state);
        self.identifier.hash(state);
    }
}

impl fmt::Debug for AnyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.input_type, self.identifier)
    }
}

impl fmt::Display for AnyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}
