//! Framing for the remote execution session.
//!
//! Every message is a 4-byte big-endian length followed by that many bytes
//! of JSON. Artifact blobs travel base64-encoded.

use crate::backend::ModelArtifacts;
use crate::errors::BackendError;
use schema::Tensor;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::io::{self, Read, Write};

pub const MAX_MESSAGE_LEN: usize = 512 * 1024 * 1024;

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    #[serde(with = "base64_bytes")]
    pub kernel: Vec<u8>,
    pub graph: String,
    #[serde(with = "base64_bytes")]
    pub params: Vec<u8>,
}

impl From<&ModelArtifacts> for LoadRequest {
    fn from(artifacts: &ModelArtifacts) -> Self {
        Self {
            kernel: artifacts.kernel.clone(),
            graph: artifacts.graph.clone(),
            params: artifacts.params.clone(),
        }
    }
}

impl From<LoadRequest> for ModelArtifacts {
    fn from(request: LoadRequest) -> Self {
        Self {
            kernel: request.kernel,
            graph: request.graph,
            params: request.params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Load(LoadRequest),
    Run { inputs: Vec<(String, Tensor)> },
}

/// Borrowing twin of [`Request::Run`] so bound inputs are not cloned to send.
#[derive(Serialize)]
pub(crate) enum RequestRef<'a> {
    Run { inputs: &'a [(String, Tensor)] },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Loaded,
    Outputs(Vec<Tensor>),
    Error(String),
}

pub fn write_message<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    message: &T,
) -> Result<(), BackendError> {
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_MESSAGE_LEN {
        return Err(BackendError::Protocol(format!(
            "Message of {} bytes exceeds limit of {}",
            body.len(),
            MAX_MESSAGE_LEN
        )));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Read one message; `Ok(None)` when the peer closed cleanly before a header.
pub fn read_message<R: Read, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<Option<T>, BackendError> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(BackendError::Protocol(format!(
            "Incoming message of {} bytes exceeds limit of {}",
            len, MAX_MESSAGE_LEN
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(serde_json::from_slice(&body)?))
}
