use inference::backend::artifacts::{GRAPH_FILE, KERNEL_FILE, PARAMS_FILE};
use inference::{
    BackendError, BackendKind, DetectionFilter, Executor, FilterConfig, FilterError,
    SuppressionOrder, server,
};
use ndarray::{Array, IxDyn};
use schema::{DType, Tensor, TensorDescriptor};
use std::fs;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::thread;
use tempfile::tempdir;

/// Detection head with three boxes: A and B overlap (IoU 0.68), C is apart.
struct ThreeBoxHead;

impl Executor for ThreeBoxHead {
    fn execute(&mut self, inputs: &[(String, Tensor)]) -> Result<Vec<Tensor>, BackendError> {
        let (name, image) = &inputs[0];
        if name != "image_tensor"
            || image.shape() != &[1, 3, 8, 8]
            || image.dtype() != DType::Float32
        {
            return Err(BackendError::Execution(format!(
                "unexpected input {} {:?}",
                name,
                image.shape()
            )));
        }

        let classes = Array::from_shape_vec(IxDyn(&[1, 3, 1]), vec![1.0f32, 2.0, 3.0])?;
        let scores = Array::from_shape_vec(IxDyn(&[1, 3, 1]), vec![0.9f32, 0.8, 0.6])?;
        let boxes = Array::from_shape_vec(
            IxDyn(&[1, 3, 4]),
            vec![
                0.0f32, 0.0, 10.0, 10.0, //
                1.0, 1.0, 10.0, 10.0, //
                50.0, 50.0, 10.0, 10.0,
            ],
        )?;
        Ok(vec![Tensor::F32(classes), Tensor::F32(scores), Tensor::F32(boxes)])
    }
}

fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || server::serve(listener, |_| Ok(ThreeBoxHead)));
    addr
}

fn write_model(dir: &Path) {
    fs::write(dir.join(KERNEL_FILE), b"\x7fELF-kernel").unwrap();
    fs::write(dir.join(GRAPH_FILE), r#"{"nodes": [], "heads": [0, 1, 2]}"#).unwrap();
    fs::write(dir.join(PARAMS_FILE), [0u8; 32]).unwrap();
}

fn positional(model: &Path, extra: &[String]) -> Vec<String> {
    let mut args: Vec<String> = [
        model.to_string_lossy().as_ref(),
        "3:8:8:1",
        "uint8",
        "1:3:1,1:3:1,4:3:1",
        "int32,float32,float32",
        "image_tensor",
        "detection_classes,detection_scores,detection_boxes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend_from_slice(extra);
    args
}

fn frame() -> Tensor {
    Tensor::U8(Array::from_shape_fn(IxDyn(&[1, 8, 8, 3]), |idx| {
        (idx[1] * 8 + idx[2]) as u8
    }))
}

#[test]
fn test_end_to_end_over_remote_session() {
    let model = tempdir().unwrap();
    write_model(model.path());
    let addr = spawn_server();

    let args = positional(model.path(), &["0.5".to_string(), addr.to_string()]);
    let mut config = FilterConfig::from_positional(&args).unwrap();
    assert_eq!(config.backend, BackendKind::Remote(addr.to_string()));

    config.postprocess.order = SuppressionOrder::Descending;
    let mut filter = DetectionFilter::open(&config).unwrap();
    assert_eq!(
        filter.input_dims(),
        vec![TensorDescriptor::new(vec![3, 8, 8, 1], DType::UInt8)]
    );
    let output_types: Vec<DType> = filter.output_dims().iter().map(|d| d.dtype).collect();
    assert_eq!(output_types, vec![DType::Int32, DType::Float32, DType::Float32]);

    let detections = filter.invoke(&[frame()]).unwrap();
    let summary: Vec<(i32, f32)> = detections
        .iter()
        .map(|d| (d.class_id, d.probability))
        .collect();
    assert_eq!(summary, vec![(1, 0.9), (3, 0.6)]);

    let outputs = filter.invoke_tensors(&[frame()]).unwrap();
    assert_eq!(outputs[0].dtype(), DType::Int32);
    assert_eq!(outputs[0].to_f32_vec(), vec![1.0, 3.0]);
    assert_eq!(outputs[2].shape(), &[1, 2, 4]);
    assert_eq!(
        outputs[2].to_f32_vec(),
        vec![0.0, 0.0, 10.0, 10.0, 50.0, 50.0, 10.0, 10.0]
    );
}

#[test]
fn test_default_order_lets_lower_score_suppress() {
    let model = tempdir().unwrap();
    write_model(model.path());
    let addr = spawn_server();

    let args = positional(model.path(), &["0.5".to_string(), addr.to_string()]);
    let config = FilterConfig::from_positional(&args).unwrap();
    let mut filter = DetectionFilter::open(&config).unwrap();

    let probabilities: Vec<f32> = filter
        .invoke(&[frame()])
        .unwrap()
        .iter()
        .map(|d| d.probability)
        .collect();
    assert_eq!(probabilities, vec![0.8, 0.6]);
}

#[test]
fn test_missing_artifacts_fail_open() {
    let model = tempdir().unwrap();
    let args = positional(model.path(), &["0.5".to_string(), "127.0.0.1:1".to_string()]);
    let config = FilterConfig::from_positional(&args).unwrap();

    match DetectionFilter::open(&config) {
        Err(FilterError::Backend(BackendError::Artifact { path, .. })) => {
            assert!(path.ends_with(KERNEL_FILE));
        }
        Err(other) => panic!("Expected artifact error, got {other:?}"),
        Ok(_) => panic!("Expected open to fail"),
    }
}

#[test]
fn test_wrong_frame_size_fails_only_that_frame() {
    let model = tempdir().unwrap();
    write_model(model.path());
    let addr = spawn_server();

    let args = positional(model.path(), &["0.5".to_string(), addr.to_string()]);
    let config = FilterConfig::from_positional(&args).unwrap();
    let mut filter = DetectionFilter::open(&config).unwrap();

    let small = Tensor::U8(Array::zeros(IxDyn(&[1, 4, 4, 3])));
    assert!(matches!(
        filter.invoke(&[small]),
        Err(FilterError::Preprocess(_))
    ));
    assert_eq!(filter.invoke(&[frame()]).unwrap().len(), 2);
}
