pub mod backend;
pub mod config;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod processing;
pub mod server;

// Re-export commonly used types for convenience
pub use backend::{Executor, InferenceBackend, LocalBackend, ModelArtifacts, RemoteBackend};
pub use config::{BackendKind, FilterConfig, ServerConfig};
pub use errors::{BackendError, FilterError};
pub use filter::DetectionFilter;
pub use processing::post::{
    BoundingBox, Detection, PostProcessConfig, PostProcessor, RawDetectionBatch, SuppressionOrder,
};
