use crate::errors::BackendError;
use std::fs;
use std::path::{Path, PathBuf};

pub const KERNEL_FILE: &str = "mod.so";
pub const GRAPH_FILE: &str = "mod.json";
pub const PARAMS_FILE: &str = "mod.params";

/// The three files a compiled model is deployed as, read into memory once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    /// Compiled kernel module, opaque to this crate.
    pub kernel: Vec<u8>,
    /// Graph topology descriptor (JSON).
    pub graph: String,
    /// Serialized parameter blob.
    pub params: Vec<u8>,
}

fn read_artifact(dir: &Path, file: &str) -> Result<Vec<u8>, BackendError> {
    let path: PathBuf = dir.join(file);
    fs::read(&path).map_err(|source| BackendError::Artifact { path, source })
}

impl ModelArtifacts {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, BackendError> {
        let dir = dir.as_ref();
        tracing::info!(model_path = %dir.display(), "Loading model artifacts");

        let kernel = read_artifact(dir, KERNEL_FILE)?;
        let graph = String::from_utf8(read_artifact(dir, GRAPH_FILE)?)
            .map_err(|e| BackendError::MalformedArtifact(format!("{}: {}", GRAPH_FILE, e)))?;
        let params = read_artifact(dir, PARAMS_FILE)?;

        let artifacts = Self {
            kernel,
            graph,
            params,
        };
        artifacts.validate()?;

        tracing::debug!(
            kernel_bytes = artifacts.kernel.len(),
            graph_bytes = artifacts.graph.len(),
            params_bytes = artifacts.params.len(),
            "Model artifacts loaded"
        );
        Ok(artifacts)
    }

    /// The graph descriptor must at least be a JSON object.
    pub fn validate(&self) -> Result<(), BackendError> {
        let graph: serde_json::Value = serde_json::from_str(&self.graph)
            .map_err(|e| BackendError::MalformedArtifact(format!("{}: {}", GRAPH_FILE, e)))?;
        if !graph.is_object() {
            return Err(BackendError::MalformedArtifact(format!(
                "{}: expected a JSON object",
                GRAPH_FILE
            )));
        }
        Ok(())
    }
}
