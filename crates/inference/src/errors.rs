use schema::{BindingError, DescriptorError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the execution session. Fatal for the frame being processed.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Cannot read model artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed model artifact: {0}")]
    MalformedArtifact(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote session error: {0}")]
    Remote(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("No inputs bound before run()")]
    NoInputs,

    #[error("Output {index} not available ({available} outputs from last run)")]
    OutputIndex { index: usize, available: usize },
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Protocol(err.to_string())
    }
}

impl From<ndarray::ShapeError> for BackendError {
    fn from(err: ndarray::ShapeError) -> Self {
        BackendError::Execution(err.to_string())
    }
}

/// Errors surfaced by the detection filter.
///
/// `Config` only occurs while the filter is being built; every other
/// variant aborts the current `invoke` call and leaves the filter usable.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

impl FilterError {
    /// True for failures raised while constructing the filter.
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            FilterError::Config(_) | FilterError::Descriptor(_) | FilterError::Binding(_)
        )
    }
}
