use crate::config::Environment;
use opentelemetry::global;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError};

/// Initialize the tracing subscriber: pretty output for development,
/// JSON for production.
///
/// Filtering follows `RUST_LOG` (defaults to "info"). Does nothing when the
/// embedding process already installed a global subscriber.
pub fn setup_logging(environment: Environment) {
    if let Err(e) = init_subscriber(environment, "default") {
        tracing::debug!(error = %e, "Global subscriber already installed");
    }
}

/// Install the global subscriber with a span bridge to whatever tracer
/// provider is registered globally (a no-op provider until one is set).
pub(crate) fn init_subscriber(
    environment: Environment,
    tracer_name: &str,
) -> Result<(), TryInitError> {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(global::tracer(tracer_name.to_string()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init(),
    }
}
