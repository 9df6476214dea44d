use super::{Executor, InferenceBackend, bind_input, output_at};
use crate::errors::BackendError;
use schema::Tensor;

/// In-process backend: runs the wrapped [`Executor`] on the calling thread.
pub struct LocalBackend<E> {
    executor: E,
    inputs: Vec<(String, Tensor)>,
    outputs: Vec<Tensor>,
}

impl<E: Executor> LocalBackend<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> InferenceBackend for LocalBackend<E> {
    fn bind(&mut self, name: &str, tensor: Tensor) -> Result<(), BackendError> {
        bind_input(&mut self.inputs, name, tensor);
        Ok(())
    }

    fn run(&mut self) -> Result<(), BackendError> {
        if self.inputs.is_empty() {
            return Err(BackendError::NoInputs);
        }
        // A failed pass must not leave the previous frame's outputs readable.
        self.outputs.clear();
        self.outputs = self.executor.execute(&self.inputs)?;
        tracing::trace!(outputs = self.outputs.len(), "Local forward pass complete");
        Ok(())
    }

    fn output(&self, index: usize) -> Result<&Tensor, BackendError> {
        output_at(&self.outputs, index)
    }

    fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}
