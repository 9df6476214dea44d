use crate::binding::Direction;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Invalid dimension '{token}' in shape '{shape}'")]
    InvalidDimension { shape: String, token: String },

    #[error("Unknown tensor type '{0}' (expected float32, int32 or uint8)")]
    UnknownDType(String),

    #[error("Empty tensor name in '{0}'")]
    EmptyName(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Invalid {direction} count: {count} (expected 1..={max})")]
    InvalidCount {
        direction: Direction,
        count: usize,
        max: usize,
    },

    #[error("Mismatched {direction} counts: ({shapes},{types},{names})")]
    CountMismatch {
        direction: Direction,
        shapes: usize,
        types: usize,
        names: usize,
    },

    #[error("Duplicate {direction} name '{name}'")]
    DuplicateName { direction: Direction, name: String },

    #[error("{direction} '{name}' has shape {shape}, too large to address")]
    ShapeOverflow {
        direction: Direction,
        name: String,
        shape: String,
    },
}
