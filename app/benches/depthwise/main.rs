use criterion::{Criterion, criterion_group, criterion_main};
use quant_depthwise::{
    ComputeBackend, ConvShape, DepthwiseAlgorithm, DepthwiseConvolution, DepthwiseOptions,
    ReorderType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Inputs {
    src: Vec<u8>,
    weights: Vec<i8>,
    bias: Vec<i32>,
    scale: Vec<f32>,
}

fn make_inputs(shape: &ConvShape) -> Inputs {
    let mut rng = StdRng::seed_from_u64(42);
    Inputs {
        src: (0..shape.src_len()).map(|_| rng.r#gen()).collect(),
        weights: (0..shape.weights_len()).map(|_| rng.r#gen()).collect(),
        bias: (0..shape.channels).map(|_| rng.gen_range(-256..256)).collect(),
        scale: (0..shape.channels).map(|_| 1. / 2048.).collect(),
    }
}

fn bench_shape(c: &mut Criterion, name: &str, shape: ConvShape) {
    let inputs = make_inputs(&shape);
    let configurations = [
        ("direct", DepthwiseAlgorithm::Direct, None),
        ("widened r0", DepthwiseAlgorithm::Widened, Some(ReorderType::PixelMajor)),
        ("widened r1", DepthwiseAlgorithm::Widened, Some(ReorderType::ChannelBlocked)),
        ("paired r0", DepthwiseAlgorithm::Paired, Some(ReorderType::PixelMajor)),
        ("paired r1", DepthwiseAlgorithm::Paired, Some(ReorderType::ChannelBlocked)),
    ];
    for backend in [ComputeBackend::Auto, ComputeBackend::Scalar(8)] {
        for (label, algorithm, reorder) in configurations {
            let mut options = DepthwiseOptions::default()
                .with_algorithm(algorithm)
                .with_backend(backend);
            if let Some(reorder) = reorder {
                options = options.with_reorder(reorder);
            }
            let Ok(conv) = DepthwiseConvolution::new(
                shape,
                &inputs.weights,
                &inputs.bias,
                &inputs.scale,
                options,
            ) else {
                continue;
            };
            let mut dst = vec![0u8; shape.dst_len()];
            c.bench_function(
                &format!("{name}: {label} {:?}", conv.backend()),
                |b| {
                    b.iter(|| {
                        conv.run(&inputs.src, 128, &mut dst, 128).unwrap();
                    })
                },
            );
        }
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    bench_shape(
        c,
        "3x3 s1 56x56x128",
        ConvShape::new(56, 56, 128, 3, 3).with_padding(1, 1, 1, 1),
    );
    bench_shape(
        c,
        "3x3 s2 112x112x32",
        ConvShape::new(112, 112, 32, 3, 3)
            .with_stride(2, 2)
            .with_padding(0, 0, 1, 1),
    );
    bench_shape(
        c,
        "5x5 s1 28x28x72",
        ConvShape::new(28, 28, 72, 5, 5).with_padding(2, 2, 2, 2),
    );
    bench_shape(
        c,
        "7x7 s1 14x14x19",
        ConvShape::new(14, 14, 19, 7, 7).with_padding(3, 3, 3, 3),
    );
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
