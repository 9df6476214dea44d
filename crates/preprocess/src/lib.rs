pub mod cpu;

use schema::{Tensor, TensorDescriptor};

pub use cpu::CpuPreProcessor;

/// Per-channel mean subtracted from each pixel before division by `scale`.
///
/// The defaults are the BGR statistics the bundled detection models were
/// trained with; a model trained on different data needs its own values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub scale: [f32; 3],
}

impl Normalization {
    pub const BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];
    pub const BGR_SCALE: [f32; 3] = [57.375, 57.12, 58.395];
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mean: Self::BGR_MEAN,
            scale: Self::BGR_SCALE,
        }
    }
}

/// Trait for frame preprocessing implementations
pub trait Preprocess {
    /// Turn one interleaved (HWC) frame into the normalized `[1, C, H, W]`
    /// `f32` tensor a model slot described by `descriptor` expects.
    fn preprocess(&self, frame: &Tensor, descriptor: &TensorDescriptor)
    -> anyhow::Result<Tensor>;
}
