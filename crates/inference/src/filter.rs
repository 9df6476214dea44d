use crate::{
    backend::{InferenceBackend, ModelArtifacts, RemoteBackend},
    config::{BackendKind, FilterConfig},
    errors::FilterError,
    processing::post::{
        Detection, PostProcessConfig, PostProcessor, RawDetectionBatch, to_output_tensors,
    },
};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use preprocess::{CpuPreProcessor, Preprocess};
use schema::{DType, ModelBinding, Tensor, TensorDescriptor};
use std::time::Instant;

/// Outputs a detection head must declare: classes, scores, boxes.
pub const DETECTION_OUTPUTS: usize = 3;

struct FilterMetrics {
    duration: Histogram<f64>,
    frames: Counter<u64>,
    failed: Counter<u64>,
    detections: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> FilterMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.001, 0.002, 0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.5, 1.0, 2.0,
    ];
    FilterMetrics {
        duration: meter
            .f64_histogram("filter_invoke_duration_seconds")
            .with_description("Time to process a single frame (preprocess + infer + postprocess)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        frames: meter
            .u64_counter("filter_frames_total")
            .with_description("Total frames processed")
            .build(),
        failed: meter
            .u64_counter("filter_frames_failed_total")
            .with_description("Total frames whose invoke call failed")
            .build(),
        detections: meter
            .u64_counter("filter_detections_total")
            .with_description("Total detections produced")
            .build(),
    }
}

/// Object-detection stage of a host media pipeline.
///
/// Holds the immutable [`ModelBinding`] and one backend session. Every
/// [`invoke`](Self::invoke) runs preprocessing, one forward pass and
/// postprocessing on the calling thread; `&mut self` keeps calls on one
/// instance serialized.
pub struct DetectionFilter<B: InferenceBackend> {
    binding: ModelBinding,
    backend: B,
    preprocessor: CpuPreProcessor,
    postprocessor: PostProcessor,
    metrics: FilterMetrics,
}

impl DetectionFilter<Box<dyn InferenceBackend>> {
    /// Load the model artifacts and open the backend the config selects.
    pub fn open(config: &FilterConfig) -> Result<Self, FilterError> {
        let artifacts = ModelArtifacts::load(&config.model_path)?;

        let backend: Box<dyn InferenceBackend> = match &config.backend {
            BackendKind::Remote(addr) => {
                tracing::info!(addr = %addr, "Opening remote inference session");
                Box::new(RemoteBackend::connect(addr.as_str(), &artifacts)?)
            }
            BackendKind::Local => local_backend(&artifacts, config)?,
        };

        Self::new(config.binding.clone(), backend, config.postprocess)
    }
}

#[cfg(feature = "ort-backend")]
fn local_backend(
    artifacts: &ModelArtifacts,
    config: &FilterConfig,
) -> Result<Box<dyn InferenceBackend>, FilterError> {
    use crate::backend::{
        LocalBackend,
        ort::{ExecutionProvider, OrtExecutor},
    };

    tracing::info!(model_path = %config.model_path.display(), "Opening local inference session");
    let executor = OrtExecutor::from_artifacts(
        artifacts,
        config.binding.outputs(),
        ExecutionProvider::Cpu,
    )?;
    Ok(Box::new(LocalBackend::new(executor)))
}

#[cfg(not(feature = "ort-backend"))]
fn local_backend(
    _artifacts: &ModelArtifacts,
    _config: &FilterConfig,
) -> Result<Box<dyn InferenceBackend>, FilterError> {
    Err(FilterError::Config(
        "Local execution needs the 'ort-backend' feature; configure a remote backend instead"
            .to_string(),
    ))
}

impl<B: InferenceBackend> DetectionFilter<B> {
    pub fn new(
        binding: ModelBinding,
        backend: B,
        postprocess: PostProcessConfig,
    ) -> Result<Self, FilterError> {
        if binding.outputs().len() < DETECTION_OUTPUTS {
            return Err(FilterError::Config(format!(
                "Detection head needs {} outputs (classes, scores, boxes), {} declared",
                DETECTION_OUTPUTS,
                binding.outputs().len()
            )));
        }

        tracing::info!(
            inputs = ?binding.input_names().collect::<Vec<_>>(),
            outputs = ?binding.output_names().collect::<Vec<_>>(),
            threshold = postprocess.confidence_threshold,
            order = ?postprocess.order,
            "Detection filter ready"
        );

        Ok(Self {
            binding,
            backend,
            preprocessor: CpuPreProcessor::new(),
            postprocessor: PostProcessor::new(postprocess),
            metrics: init_metrics("filter"),
        })
    }

    /// Declared inputs (shape innermost-first plus dtype), in binding order.
    pub fn input_dims(&self) -> Vec<TensorDescriptor> {
        self.binding.input_descriptors()
    }

    pub fn output_dims(&self) -> Vec<TensorDescriptor> {
        self.binding.output_descriptors()
    }

    /// Detect objects in one frame (one tensor per declared input).
    pub fn invoke(&mut self, frames: &[Tensor]) -> Result<Vec<Detection>, FilterError> {
        let start = Instant::now();
        match self.process_frame(frames) {
            Ok(detections) => {
                self.metrics
                    .duration
                    .record(start.elapsed().as_secs_f64(), &[]);
                self.metrics.frames.add(1, &[]);
                self.metrics.detections.add(detections.len() as u64, &[]);
                Ok(detections)
            }
            Err(e) => {
                self.metrics.failed.add(1, &[]);
                tracing::warn!(error = %e, "Frame processing failed");
                Err(e)
            }
        }
    }

    /// Host tensor contract: survivors as `[classes, scores, boxes]` in the
    /// declared dtypes of the first three outputs.
    pub fn invoke_tensors(&mut self, frames: &[Tensor]) -> Result<Vec<Tensor>, FilterError> {
        let detections = self.invoke(frames)?;
        to_output_tensors(&detections, self.head_dtypes())
    }

    fn head_dtypes(&self) -> [DType; DETECTION_OUTPUTS] {
        let outputs = self.binding.outputs();
        [
            outputs[0].descriptor.dtype,
            outputs[1].descriptor.dtype,
            outputs[2].descriptor.dtype,
        ]
    }

    #[tracing::instrument(skip_all)]
    fn process_frame(&mut self, frames: &[Tensor]) -> Result<Vec<Detection>, FilterError> {
        let inputs = self.binding.inputs();
        if frames.len() != inputs.len() {
            return Err(FilterError::Preprocess(format!(
                "Expected {} input tensors, got {}",
                inputs.len(),
                frames.len()
            )));
        }

        for (slot, frame) in inputs.iter().zip(frames) {
            let tensor = self
                .preprocessor
                .preprocess(frame, &slot.descriptor)
                .map_err(|e| FilterError::Preprocess(format!("{}: {:#}", slot.name, e)))?;
            self.backend.bind(&slot.name, tensor)?;
        }

        {
            let _s = common::span!("run");
            self.backend.run()?;
        }

        let produced = self.backend.num_outputs();
        if produced < self.binding.outputs().len() {
            return Err(FilterError::MalformedOutput(format!(
                "Model produced {} outputs, {} declared",
                produced,
                self.binding.outputs().len()
            )));
        }

        let [classes, scores, bboxes] = self.head_dtypes();
        let batch = RawDetectionBatch::from_outputs(
            &self.backend.output(0)?.cast(classes),
            &self.backend.output(1)?.cast(scores),
            &self.backend.output(2)?.cast(bboxes),
        )?;

        Ok(self.postprocessor.process(&batch))
    }
}
