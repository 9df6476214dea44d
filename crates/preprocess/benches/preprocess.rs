use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ndarray::{Array, IxDyn};
use preprocess::{CpuPreProcessor, Preprocess};
use schema::{DType, Tensor, TensorDescriptor};

/// Gradient pattern so the normalization does not run on constant data
fn create_test_frame(width: usize, height: usize) -> Tensor {
    let mut pixels = vec![0u8; width * height * 3];
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * 3;
            pixels[idx] = (x % 256) as u8;
            pixels[idx + 1] = (y % 256) as u8;
            pixels[idx + 2] = ((x + y) % 256) as u8;
        }
    }
    Tensor::U8(Array::from_shape_vec(IxDyn(&[1, height, width, 3]), pixels).unwrap())
}

fn benchmark_cpu_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_preprocess");

    let resolutions = [(300, 300), (640, 480), (1280, 720)];
    let preprocessor = CpuPreProcessor::new();

    for (width, height) in resolutions.iter() {
        let frame = create_test_frame(*width, *height);
        let descriptor = TensorDescriptor::new(vec![3, *width, *height, 1], DType::UInt8);

        group.bench_with_input(
            BenchmarkId::new("normalize_nchw", format!("{}x{}", width, height)),
            &(frame, descriptor),
            |b, (frame, descriptor)| {
                b.iter(|| {
                    preprocessor
                        .preprocess(black_box(frame), black_box(descriptor))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_cpu_preprocess);
criterion_main!(benches);
