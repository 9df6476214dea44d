use crate::errors::BackendError;
use schema::Tensor;

pub mod artifacts;
pub mod local;
#[cfg(feature = "ort-backend")]
pub mod ort;
pub mod remote;
pub mod wire;

pub use artifacts::ModelArtifacts;
pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// An execution session for one compiled model.
///
/// Inputs bound with [`bind`](Self::bind) stay bound until replaced.
/// [`run`](Self::run) performs exactly one blocking forward pass; the outputs
/// it produces are readable through [`output`](Self::output) until the next
/// `run` replaces them. Nothing is retried.
pub trait InferenceBackend {
    fn bind(&mut self, name: &str, tensor: Tensor) -> Result<(), BackendError>;

    fn run(&mut self) -> Result<(), BackendError>;

    fn output(&self, index: usize) -> Result<&Tensor, BackendError>;

    /// Number of outputs produced by the last `run` (0 before the first).
    fn num_outputs(&self) -> usize;
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn bind(&mut self, name: &str, tensor: Tensor) -> Result<(), BackendError> {
        (**self).bind(name, tensor)
    }

    fn run(&mut self) -> Result<(), BackendError> {
        (**self).run()
    }

    fn output(&self, index: usize) -> Result<&Tensor, BackendError> {
        (**self).output(index)
    }

    fn num_outputs(&self) -> usize {
        (**self).num_outputs()
    }
}

/// One forward pass over named inputs, producing outputs in model order.
///
/// Implemented by whatever actually runs the compiled graph; wrapped by
/// [`LocalBackend`] in-process and by the remote server per connection.
pub trait Executor {
    fn execute(&mut self, inputs: &[(String, Tensor)]) -> Result<Vec<Tensor>, BackendError>;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(&mut self, inputs: &[(String, Tensor)]) -> Result<Vec<Tensor>, BackendError> {
        (**self).execute(inputs)
    }
}

/// Insert or replace a named input, keeping first-bind order.
pub(crate) fn bind_input(inputs: &mut Vec<(String, Tensor)>, name: &str, tensor: Tensor) {
    match inputs.iter_mut().find(|(bound, _)| bound == name) {
        Some(slot) => slot.1 = tensor,
        None => inputs.push((name.to_string(), tensor)),
    }
}

pub(crate) fn output_at(outputs: &[Tensor], index: usize) -> Result<&Tensor, BackendError> {
    outputs.get(index).ok_or(BackendError::OutputIndex {
        index,
        available: outputs.len(),
    })
}
