use crate::errors::DescriptorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LIST_SEPARATOR: char = ',';
const DIM_SEPARATOR: char = ':';

/// Element type of a tensor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Int32,
    UInt8,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Int32 => "int32",
            DType::UInt8 => "uint8",
        }
    }

    /// Size of one element in bytes.
    pub fn size_of(&self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            DType::UInt8 => 1,
        }
    }
}

impl FromStr for DType {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "float32" => Ok(DType::Float32),
            "int32" => Ok(DType::Int32),
            "uint8" => Ok(DType::UInt8),
            other => Err(DescriptorError::UnknownDType(other.to_string())),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape and element type of one model input or output.
///
/// `dims` keep the host ordering, innermost dimension first: a batch of one
/// 224x224 RGB frame is `3:224:224:1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDescriptor {
    pub dims: Vec<usize>,
    pub dtype: DType,
}

impl TensorDescriptor {
    pub fn new(dims: Vec<usize>, dtype: DType) -> Self {
        Self { dims, dtype }
    }

    /// Outermost-first shape, as used by `ndarray` (`[1, 224, 224, 3]`).
    pub fn array_shape(&self) -> Vec<usize> {
        self.dims.iter().rev().copied().collect()
    }

    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Size of the whole tensor in bytes; `None` when it does not fit in
    /// `usize`.
    pub fn byte_len(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(self.dtype.size_of(), |acc, &dim| acc.checked_mul(dim))
    }
}

impl fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", format_shape(&self.dims), self.dtype)
    }
}

fn parse_shape(shape: &str) -> Result<Vec<usize>, DescriptorError> {
    shape
        .split(DIM_SEPARATOR)
        .map(|token| match token.trim().parse::<usize>() {
            Ok(dim) if dim > 0 => Ok(dim),
            _ => Err(DescriptorError::InvalidDimension {
                shape: shape.to_string(),
                token: token.to_string(),
            }),
        })
        .collect()
}

/// Parse `"3:224:224:1,1:100:1"` into one dimension vector per tensor.
pub fn parse_shapes(shapes: &str) -> Result<Vec<Vec<usize>>, DescriptorError> {
    shapes.split(LIST_SEPARATOR).map(parse_shape).collect()
}

/// Parse `"uint8,float32"`; any token outside {float32, int32, uint8} fails.
pub fn parse_dtypes(types: &str) -> Result<Vec<DType>, DescriptorError> {
    types.split(LIST_SEPARATOR).map(DType::from_str).collect()
}

pub fn parse_names(names: &str) -> Result<Vec<String>, DescriptorError> {
    names
        .split(LIST_SEPARATOR)
        .map(|token| {
            let name = token.trim();
            if name.is_empty() {
                Err(DescriptorError::EmptyName(names.to_string()))
            } else {
                Ok(name.to_string())
            }
        })
        .collect()
}

/// Inverse of a single shape entry of [`parse_shapes`].
pub fn format_shape(dims: &[usize]) -> String {
    dims.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(":")
}
