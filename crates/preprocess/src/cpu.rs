use crate::{Normalization, Preprocess};
use common::span;
use ndarray::{Array, IxDyn};
use schema::{Tensor, TensorDescriptor};

const CHANNELS: usize = 3;

/// Frame geometry derived from an input descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameLayout {
    height: usize,
    width: usize,
    channels: usize,
}

impl FrameLayout {
    /// Descriptor dims are innermost-first: `C:W:H[:N]`.
    fn from_descriptor(descriptor: &TensorDescriptor) -> anyhow::Result<Self> {
        match descriptor.dims.as_slice() {
            [channels, width, height, ..] => Ok(Self {
                height: *height,
                width: *width,
                channels: *channels,
            }),
            dims => anyhow::bail!(
                "Input descriptor {:?} has rank {}, expected at least C:W:H",
                dims,
                dims.len()
            ),
        }
    }

    fn spatial(&self) -> usize {
        self.height * self.width
    }
}

#[derive(Debug, Clone, Default)]
pub struct CpuPreProcessor {
    normalization: Normalization,
}

impl CpuPreProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalization(normalization: Normalization) -> Self {
        Self { normalization }
    }

    fn normalize(&self, pixels: &[f32], layout: FrameLayout) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let spatial = layout.spatial();
        let mut output = vec![0.0f32; layout.channels * spatial];
        let Normalization { mean, scale } = self.normalization;

        for (i, px) in pixels.chunks_exact(layout.channels).enumerate() {
            for (c, value) in px.iter().enumerate() {
                output[c * spatial + i] = (value - mean[c]) / scale[c];
            }
        }

        Ok(Array::from_shape_vec(
            IxDyn(&[1, layout.channels, layout.height, layout.width]),
            output,
        )?)
    }
}

impl Preprocess for CpuPreProcessor {
    #[tracing::instrument(skip_all, fields(dims = ?descriptor.dims))]
    fn preprocess(
        &self,
        frame: &Tensor,
        descriptor: &TensorDescriptor,
    ) -> anyhow::Result<Tensor> {
        let layout = FrameLayout::from_descriptor(descriptor)?;
        if layout.channels != CHANNELS {
            anyhow::bail!(
                "Normalization expects {} channels, descriptor has {}",
                CHANNELS,
                layout.channels
            );
        }

        let expected = descriptor.element_count();
        if frame.len() != expected {
            anyhow::bail!(
                "Frame size mismatch: descriptor {} expects {} elements, got {}",
                descriptor,
                expected,
                frame.len()
            );
        }

        tracing::trace!(
            height = layout.height,
            width = layout.width,
            dtype = %frame.dtype(),
            "Normalizing frame"
        );

        // Only the first image of a batched slot is fed to the model.
        let pixels = frame.to_f32_vec();
        let image = &pixels[..layout.spatial() * layout.channels];

        Ok(Tensor::F32(self.normalize(image, layout)?))
    }
}
