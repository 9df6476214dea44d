use crate::backend::wire::{self, Request, Response};
use crate::backend::{Executor, ModelArtifacts};
use crate::errors::BackendError;
use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Accept remote sessions forever, one thread per connection.
///
/// `factory` turns the artifacts a client uploads into an executor; it runs on
/// the connection's thread and its failure is reported back to that client.
pub fn serve<F, E>(listener: TcpListener, factory: F) -> Result<(), BackendError>
where
    F: Fn(ModelArtifacts) -> Result<E, BackendError> + Send + Sync + 'static,
    E: Executor,
{
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "Inference server listening");

    let factory = Arc::new(factory);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let factory = Arc::clone(&factory);
        thread::spawn(move || {
            let peer = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            let _span = tracing::info_span!("session", peer = %peer).entered();

            match handle_connection(stream, factory.as_ref()) {
                Ok(runs) => tracing::info!(runs, "Session closed"),
                Err(e) => tracing::error!(error = %e, "Session aborted"),
            }
        });
    }
    Ok(())
}

/// Serve one client until it disconnects; returns the number of passes run.
pub fn handle_connection<F, E>(stream: TcpStream, factory: &F) -> Result<u64, BackendError>
where
    F: Fn(ModelArtifacts) -> Result<E, BackendError>,
    E: Executor,
{
    stream.set_nodelay(true)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    let mut executor: Option<E> = None;
    let mut runs = 0u64;

    while let Some(request) = wire::read_message::<_, Request>(&mut reader)? {
        let response = match request {
            Request::Load(load) => {
                let artifacts = ModelArtifacts::from(load);
                match artifacts.validate().and_then(|_| factory(artifacts)) {
                    Ok(loaded) => {
                        tracing::info!("Model loaded for session");
                        executor = Some(loaded);
                        Response::Loaded
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to load model");
                        Response::Error(e.to_string())
                    }
                }
            }
            Request::Run { inputs } => match executor.as_mut() {
                None => Response::Error("No model loaded".to_string()),
                Some(executor) => {
                    let _span = tracing::debug_span!("remote_run").entered();
                    match executor.execute(&inputs) {
                        Ok(outputs) => {
                            runs += 1;
                            Response::Outputs(outputs)
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Forward pass failed");
                            Response::Error(e.to_string())
                        }
                    }
                }
            },
        };
        wire::write_message(&mut writer, &response)?;
    }

    Ok(runs)
}
