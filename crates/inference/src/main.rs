use common::TelemetryGuard;
use inference::{ServerConfig, logging::setup_logging, server};
use std::net::TcpListener;

#[cfg(feature = "ort-backend")]
use inference::backend::ort::{ExecutionProvider, OrtExecutor};

// The OTLP exporters need a Tokio runtime; the server itself is blocking.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    let telemetry = config
        .otel_endpoint
        .as_ref()
        .map(|endpoint| TelemetryGuard::init("inference-server", endpoint, config.environment))
        .transpose()?;

    if telemetry.is_none() {
        setup_logging(&config);
    }

    tracing::info!(config = ?config, "Loaded configuration");

    let listener = TcpListener::bind(&config.listen_addr)?;
    run(listener, &config)
}

#[cfg(feature = "ort-backend")]
fn run(listener: TcpListener, config: &ServerConfig) -> anyhow::Result<()> {
    let provider = if config.use_cuda {
        ExecutionProvider::Cuda
    } else {
        ExecutionProvider::Cpu
    };

    // Output names are not part of the upload, so the executor reads every
    // graph output in declaration order.
    server::serve(listener, move |artifacts| {
        OrtExecutor::from_artifacts(&artifacts, &[], provider)
    })?;
    Ok(())
}

#[cfg(not(feature = "ort-backend"))]
fn run(_listener: TcpListener, _config: &ServerConfig) -> anyhow::Result<()> {
    anyhow::bail!(
        "inference-server was built without an executor; rebuild with --features ort-backend"
    )
}
