use crate::errors::FilterError;
use crate::processing::post::{PostProcessConfig, SuppressionOrder};
use schema::{ModelBinding, SlotSpec, parse_dtypes, parse_names, parse_shapes};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub use common::Environment;

/// Number of mandatory positional arguments handed over by the host.
pub const POSITIONAL_ARGS: usize = 7;

/// Where forward passes run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process executor.
    Local,
    /// `host:port` of an `inference-server`.
    Remote(String),
}

/// The textual configuration exactly as the host supplies it.
#[derive(Debug, Clone, Default)]
pub struct RawFilterArgs {
    pub model_path: String,
    pub input_shapes: String,
    pub input_types: String,
    pub output_shapes: String,
    pub output_types: String,
    pub input_names: String,
    pub output_names: String,
}

impl RawFilterArgs {
    fn parse(self) -> Result<(PathBuf, ModelBinding), FilterError> {
        let inputs = SlotSpec {
            shapes: parse_shapes(&self.input_shapes)?,
            dtypes: parse_dtypes(&self.input_types)?,
            names: parse_names(&self.input_names)?,
        };
        let outputs = SlotSpec {
            shapes: parse_shapes(&self.output_shapes)?,
            dtypes: parse_dtypes(&self.output_types)?,
            names: parse_names(&self.output_names)?,
        };
        Ok((
            PathBuf::from(self.model_path),
            ModelBinding::new(inputs, outputs)?,
        ))
    }
}

/// Validated configuration of one detection filter instance.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub environment: Environment,
    pub model_path: PathBuf,
    pub binding: ModelBinding,
    pub postprocess: PostProcessConfig,
    pub backend: BackendKind,
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, FilterError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| FilterError::Config(format!("{} '{}': {}", name, value, e)))
}

fn backend_from(remote: Option<String>) -> BackendKind {
    match remote {
        Some(addr) if !addr.trim().is_empty() => BackendKind::Remote(addr.trim().to_string()),
        _ => BackendKind::Local,
    }
}

impl FilterConfig {
    pub fn new(args: RawFilterArgs) -> Result<Self, FilterError> {
        let (model_path, binding) = args.parse()?;
        Ok(Self {
            environment: Environment::Development,
            model_path,
            binding,
            postprocess: PostProcessConfig::default(),
            backend: BackendKind::Local,
        })
    }

    /// Build from the host's positional arguments:
    /// `model_path, input_shapes, input_types, output_shapes, output_types,
    /// input_names, output_names[, confidence_threshold[, remote_addr]]`.
    pub fn from_positional<S: AsRef<str>>(args: &[S]) -> Result<Self, FilterError> {
        if args.len() < POSITIONAL_ARGS {
            return Err(FilterError::Config(format!(
                "Expected {} positional arguments, got {}",
                POSITIONAL_ARGS,
                args.len()
            )));
        }
        let arg = |i: usize| args[i].as_ref().to_string();

        let mut config = Self::new(RawFilterArgs {
            model_path: arg(0),
            input_shapes: arg(1),
            input_types: arg(2),
            output_shapes: arg(3),
            output_types: arg(4),
            input_names: arg(5),
            output_names: arg(6),
        })?;

        if let Some(threshold) = args.get(7) {
            config.postprocess.confidence_threshold =
                parse_value("confidence threshold", threshold.as_ref())?;
        }
        config.backend = backend_from(args.get(8).map(|a| a.as_ref().to_string()));

        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, FilterError> {
        let required = |key: &str| {
            env::var(key).map_err(|_| FilterError::Config(format!("{} is not set", key)))
        };

        let mut config = Self::new(RawFilterArgs {
            model_path: required("MODEL_PATH")?,
            input_shapes: required("INPUT_SHAPES")?,
            input_types: required("INPUT_TYPES")?,
            output_shapes: required("OUTPUT_SHAPES")?,
            output_types: required("OUTPUT_TYPES")?,
            input_names: required("INPUT_NAMES")?,
            output_names: required("OUTPUT_NAMES")?,
        })?;

        config.environment = Environment::from_env();

        if let Ok(v) = env::var("CONFIDENCE_THRESHOLD") {
            config.postprocess.confidence_threshold = parse_value("CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Ok(v) = env::var("MAX_CANDIDATES") {
            config.postprocess.max_candidates = Some(parse_value("MAX_CANDIDATES", &v)?);
        }
        if let Ok(v) = env::var("NMS_ORDER") {
            config.postprocess.order = v.parse::<SuppressionOrder>()?;
        }
        config.backend = backend_from(env::var("INFERENCE_REMOTE").ok());

        Ok(config)
    }
}

/// Configuration of the `inference-server` binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub environment: Environment,
    pub listen_addr: String,
    pub otel_endpoint: Option<String>,
    pub use_cuda: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            environment: Environment::from_env(),
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:9090".to_string()),
            otel_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            use_cuda: env::var("USE_CUDA")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{BindingError, DType, DescriptorError};
    use serial_test::serial;

    const SSD_ARGS: [&str; POSITIONAL_ARGS] = [
        "/models/ssd",
        "3:300:300:1",
        "uint8",
        "1:100:1,1:100:1,4:100:1",
        "float32,float32,float32",
        "image_tensor",
        "detection_classes,detection_scores,detection_boxes",
    ];

    #[test]
    fn test_from_positional_builds_binding() {
        let config = FilterConfig::from_positional(&SSD_ARGS).unwrap();

        assert_eq!(config.model_path, PathBuf::from("/models/ssd"));
        assert_eq!(config.binding.inputs().len(), 1);
        assert_eq!(config.binding.inputs()[0].descriptor.dtype, DType::UInt8);
        assert_eq!(config.binding.outputs()[2].descriptor.dims, vec![4, 100, 1]);
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.postprocess.confidence_threshold, 0.0);
        assert_eq!(config.postprocess.order, SuppressionOrder::Ascending);
    }

    #[test]
    fn test_optional_positional_overrides() {
        let mut args: Vec<&str> = SSD_ARGS.to_vec();
        args.push("0.25");
        args.push("10.0.0.2:9090");

        let config = FilterConfig::from_positional(&args).unwrap();
        assert_eq!(config.postprocess.confidence_threshold, 0.25);
        assert_eq!(config.backend, BackendKind::Remote("10.0.0.2:9090".to_string()));

        args[7] = "high";
        assert!(matches!(
            FilterConfig::from_positional(&args),
            Err(FilterError::Config(_))
        ));
    }

    #[test]
    fn test_missing_positional_arguments() {
        let err = FilterConfig::from_positional(&SSD_ARGS[..5]).unwrap_err();
        assert!(err.is_initialization());
    }

    #[test]
    fn test_unknown_dtype_fails_construction() {
        let mut args = SSD_ARGS;
        args[4] = "float32,float16,float32";
        match FilterConfig::from_positional(&args).unwrap_err() {
            FilterError::Descriptor(DescriptorError::UnknownDType(t)) => assert_eq!(t, "float16"),
            other => panic!("Expected unknown dtype, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_output_counts_fail_construction() {
        let mut args = SSD_ARGS;
        args[6] = "detection_classes,detection_scores";
        let err = FilterConfig::from_positional(&args).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Binding(BindingError::CountMismatch { .. })
        ));
        assert!(err.is_initialization());
    }

    #[test]
    fn test_too_many_inputs_fail_construction() {
        let mut args = SSD_ARGS;
        args[1] = "1,1,1,1,1";
        args[2] = "uint8,uint8,uint8,uint8,uint8";
        args[5] = "a,b,c,d,e";
        assert!(matches!(
            FilterConfig::from_positional(&args),
            Err(FilterError::Binding(BindingError::InvalidCount { count: 5, .. }))
        ));
    }

    fn set_filter_env() {
        let keys = [
            "MODEL_PATH",
            "INPUT_SHAPES",
            "INPUT_TYPES",
            "OUTPUT_SHAPES",
            "OUTPUT_TYPES",
            "INPUT_NAMES",
            "OUTPUT_NAMES",
        ];
        for (key, value) in keys.iter().zip(SSD_ARGS) {
            // SAFETY: env tests are serialized
            unsafe { env::set_var(key, value) };
        }
    }

    fn clear_filter_env() {
        for key in [
            "MODEL_PATH",
            "INPUT_SHAPES",
            "INPUT_TYPES",
            "OUTPUT_SHAPES",
            "OUTPUT_TYPES",
            "INPUT_NAMES",
            "OUTPUT_NAMES",
            "CONFIDENCE_THRESHOLD",
            "MAX_CANDIDATES",
            "NMS_ORDER",
            "INFERENCE_REMOTE",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_filter_env();
        set_filter_env();
        unsafe {
            env::set_var("CONFIDENCE_THRESHOLD", "0.4");
            env::set_var("MAX_CANDIDATES", "3");
            env::set_var("NMS_ORDER", "descending");
            env::set_var("INFERENCE_REMOTE", "gpu-box:9090");
        }

        let config = FilterConfig::from_env().unwrap();
        assert_eq!(config.postprocess.confidence_threshold, 0.4);
        assert_eq!(config.postprocess.max_candidates, Some(3));
        assert_eq!(config.postprocess.order, SuppressionOrder::Descending);
        assert_eq!(config.backend, BackendKind::Remote("gpu-box:9090".to_string()));

        clear_filter_env();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_model_path() {
        clear_filter_env();
        assert!(matches!(
            FilterConfig::from_env(),
            Err(FilterError::Config(msg)) if msg.contains("MODEL_PATH")
        ));
    }
}
