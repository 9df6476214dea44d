use crate::descriptor::DType;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Dynamic-rank tensor tagged with its element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I32(ArrayD<i32>),
    U8(ArrayD<u8>),
}

impl Tensor {
    pub fn dtype(&self) -> DType {
        match self {
            Tensor::F32(_) => DType::Float32,
            Tensor::I32(_) => DType::Int32,
            Tensor::U8(_) => DType::UInt8,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::I32(a) => a.shape(),
            Tensor::U8(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Tensor::F32(a) => a.len(),
            Tensor::I32(a) => a.len(),
            Tensor::U8(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element-wise conversion; float to integer truncates toward zero and
    /// saturates at the target range.
    pub fn cast(&self, dtype: DType) -> Tensor {
        match (self, dtype) {
            (Tensor::F32(a), DType::Float32) => Tensor::F32(a.clone()),
            (Tensor::F32(a), DType::Int32) => Tensor::I32(a.mapv(|v| v as i32)),
            (Tensor::F32(a), DType::UInt8) => Tensor::U8(a.mapv(|v| v as u8)),
            (Tensor::I32(a), DType::Float32) => Tensor::F32(a.mapv(|v| v as f32)),
            (Tensor::I32(a), DType::Int32) => Tensor::I32(a.clone()),
            (Tensor::I32(a), DType::UInt8) => Tensor::U8(a.mapv(|v| v.clamp(0, 255) as u8)),
            (Tensor::U8(a), DType::Float32) => Tensor::F32(a.mapv(f32::from)),
            (Tensor::U8(a), DType::Int32) => Tensor::I32(a.mapv(i32::from)),
            (Tensor::U8(a), DType::UInt8) => Tensor::U8(a.clone()),
        }
    }

    /// All elements as `f32`, in logical (row-major) order.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Tensor::F32(a) => a.iter().copied().collect(),
            Tensor::I32(a) => a.iter().map(|&v| v as f32).collect(),
            Tensor::U8(a) => a.iter().map(|&v| f32::from(v)).collect(),
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Tensor::F32(a) => Some(a),
            _ => None,
        }
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(array: ArrayD<f32>) -> Self {
        Tensor::F32(array)
    }
}

impl From<ArrayD<i32>> for Tensor {
    fn from(array: ArrayD<i32>) -> Self {
        Tensor::I32(array)
    }
}

impl From<ArrayD<u8>> for Tensor {
    fn from(array: ArrayD<u8>) -> Self {
        Tensor::U8(array)
    }
}
