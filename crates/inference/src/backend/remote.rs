use super::wire::{self, LoadRequest, Request, RequestRef, Response};
use super::{InferenceBackend, ModelArtifacts, bind_input, output_at};
use crate::errors::BackendError;
use schema::Tensor;
use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

/// Backend whose session lives in an `inference-server` process.
///
/// Each `run()` is one synchronous round trip. There is no timeout: a server
/// that never answers blocks the caller. After a transport or framing error
/// the stream position is unknown, so the session refuses further runs.
pub struct RemoteBackend {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: String,
    broken: Option<String>,
    inputs: Vec<(String, Tensor)>,
    outputs: Vec<Tensor>,
}

impl RemoteBackend {
    /// Connect and upload the model; returns once the server has loaded it.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        artifacts: &ModelArtifacts,
    ) -> Result<Self, BackendError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        tracing::info!(peer = %peer, "Connected to remote inference session");

        let mut backend = Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            peer,
            broken: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };

        wire::write_message(
            &mut backend.writer,
            &Request::Load(LoadRequest::from(artifacts)),
        )?;
        match backend.receive()? {
            Response::Loaded => {
                tracing::info!(peer = %backend.peer, "Remote model loaded");
                Ok(backend)
            }
            other => Err(unexpected(other)),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    fn round_trip(&mut self) -> Result<Response, BackendError> {
        let _s = common::span_debug!("remote_round_trip");
        wire::write_message(
            &mut self.writer,
            &RequestRef::Run {
                inputs: &self.inputs,
            },
        )?;
        self.receive()
    }

    fn receive(&mut self) -> Result<Response, BackendError> {
        wire::read_message(&mut self.reader)?.ok_or_else(|| {
            BackendError::Protocol(format!("Session closed by {}", self.peer))
        })
    }
}

fn unexpected(response: Response) -> BackendError {
    match response {
        Response::Error(message) => BackendError::Remote(message),
        other => BackendError::Protocol(format!("Unexpected response: {:?}", other)),
    }
}

impl InferenceBackend for RemoteBackend {
    fn bind(&mut self, name: &str, tensor: Tensor) -> Result<(), BackendError> {
        bind_input(&mut self.inputs, name, tensor);
        Ok(())
    }

    fn run(&mut self) -> Result<(), BackendError> {
        if self.inputs.is_empty() {
            return Err(BackendError::NoInputs);
        }
        if let Some(cause) = &self.broken {
            return Err(BackendError::Protocol(format!(
                "Session with {} is unusable after: {}",
                self.peer, cause
            )));
        }
        self.outputs.clear();

        let response = match self.round_trip() {
            Ok(response) => response,
            Err(e) => {
                if matches!(e, BackendError::Io(_) | BackendError::Protocol(_)) {
                    tracing::error!(peer = %self.peer, error = %e, "Remote session broken");
                    self.broken = Some(e.to_string());
                }
                return Err(e);
            }
        };

        match response {
            Response::Outputs(outputs) => {
                tracing::trace!(
                    peer = %self.peer,
                    outputs = outputs.len(),
                    "Remote forward pass complete"
                );
                self.outputs = outputs;
                Ok(())
            }
            other => Err(unexpected(other)),
        }
    }

    fn output(&self, index: usize) -> Result<&Tensor, BackendError> {
        output_at(&self.outputs, index)
    }

    fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}
