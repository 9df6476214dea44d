use super::{Executor, ModelArtifacts};
use crate::errors::BackendError;
use ort::{
    session::{Session, SessionInputValue, builder::GraphOptimizationLevel},
    value::{DynValue, TensorRef},
};
use schema::{Tensor, TensorSlot};

#[derive(Debug, Clone, Copy)]
pub enum ExecutionProvider {
    Cpu,
    Cuda,
}

fn ort_error(err: impl std::fmt::Display) -> BackendError {
    BackendError::Execution(err.to_string())
}

/// Runs the kernel module in-process with ONNX Runtime.
///
/// The kernel module must be a serialized ONNX (or ORT-format) graph with its
/// weights embedded; the parameter blob is not consumed by this executor.
/// With no output slots given, every graph output is returned in order.
pub struct OrtExecutor {
    session: Session,
    output_names: Vec<String>,
}

impl OrtExecutor {
    pub fn from_artifacts(
        artifacts: &ModelArtifacts,
        outputs: &[TensorSlot],
        provider: ExecutionProvider,
    ) -> Result<Self, BackendError> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()
            .map_err(ort_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_error)?
            .with_intra_threads(4)
            .map_err(ort_error)?;

        match provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder
                    .with_execution_providers([
                        ort::execution_providers::CUDAExecutionProvider::default()
                            .with_device_id(0)
                            .build()
                            .error_on_failure(),
                    ])
                    .map_err(ort_error)?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        if !artifacts.params.is_empty() {
            tracing::debug!(
                params_bytes = artifacts.params.len(),
                "Parameter blob ignored, weights come from the kernel module"
            );
        }

        let session = builder
            .commit_from_memory(&artifacts.kernel)
            .map_err(ort_error)?;

        tracing::info!(kernel_bytes = artifacts.kernel.len(), "ONNX Runtime session ready");
        Ok(Self {
            session,
            output_names: outputs.iter().map(|s| s.name.clone()).collect(),
        })
    }
}

impl Executor for OrtExecutor {
    fn execute(&mut self, inputs: &[(String, Tensor)]) -> Result<Vec<Tensor>, BackendError> {
        let mut values: Vec<(String, SessionInputValue<'_>)> = Vec::with_capacity(inputs.len());
        for (name, tensor) in inputs {
            let value: SessionInputValue<'_> = match tensor {
                Tensor::F32(a) => TensorRef::from_array_view(a.view()).map_err(ort_error)?.into(),
                Tensor::I32(a) => TensorRef::from_array_view(a.view()).map_err(ort_error)?.into(),
                Tensor::U8(a) => TensorRef::from_array_view(a.view()).map_err(ort_error)?.into(),
            };
            values.push((name.clone(), value));
        }

        let outputs = self.session.run(values).map_err(ort_error)?;

        if self.output_names.is_empty() {
            return (0..outputs.len()).map(|i| extract(&outputs[i])).collect();
        }
        let mut results = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            results.push(extract(named_output(outputs.get(name.as_str()), name)?)?);
        }
        Ok(results)
    }
}

/// Configured output names come from the host, not the graph.
fn named_output<V>(value: Option<V>, name: &str) -> Result<V, BackendError> {
    value.ok_or_else(|| BackendError::Execution(format!("Model has no output '{}'", name)))
}

fn extract(value: &DynValue) -> Result<Tensor, BackendError> {
    if let Ok(a) = value.try_extract_array::<f32>() {
        Ok(Tensor::F32(a.into_owned()))
    } else if let Ok(a) = value.try_extract_array::<i64>() {
        Ok(Tensor::I32(a.mapv(|v| v as i32)))
    } else if let Ok(a) = value.try_extract_array::<i32>() {
        Ok(Tensor::I32(a.into_owned()))
    } else {
        Ok(Tensor::U8(
            value.try_extract_array::<u8>().map_err(ort_error)?.into_owned(),
        ))
    }
}
