use std::time::Instant;

use quant_depthwise::{
    ConvShape, DepthwiseAlgorithm, DepthwiseConvolution, DepthwiseOptions, ThreadingPolicy,
};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

fn main() {
    env_logger::init();

    let shape = ConvShape::new(112, 112, 96, 3, 3)
        .with_stride(2, 2)
        .with_padding(0, 0, 1, 1);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let src: Vec<u8> = (0..shape.src_len()).map(|_| rng.r#gen()).collect();
    let weights: Vec<i8> = (0..shape.weights_len()).map(|_| rng.r#gen()).collect();
    let bias: Vec<i32> = (0..shape.channels).map(|_| rng.gen_range(-512..512)).collect();
    let scale: Vec<f32> = (0..shape.channels)
        .map(|_| rng.gen_range(0.5f32..2.0) / 4096.)
        .collect();

    let mut reference: Option<Vec<u8>> = None;

    for algorithm in [
        DepthwiseAlgorithm::Direct,
        DepthwiseAlgorithm::Widened,
        DepthwiseAlgorithm::Paired,
    ] {
        let options = DepthwiseOptions::default()
            .with_algorithm(algorithm)
            .with_threading_policy(ThreadingPolicy::Adaptive);
        let conv = match DepthwiseConvolution::new(shape, &weights, &bias, &scale, options) {
            Ok(conv) => conv,
            Err(err) => {
                log::warn!("{algorithm:?} is not available: {err}");
                continue;
            }
        };
        let mut dst = vec![0u8; shape.dst_len()];

        let start_time = Instant::now();
        conv.run(&src, 128, &mut dst, 128).unwrap();
        let elapsed_time = start_time.elapsed();

        println!(
            "{:?} on {:?}: {:.2?}, output {}x{}x{}",
            conv.variant(),
            conv.backend(),
            elapsed_time,
            shape.dst_h(),
            shape.dst_w(),
            shape.channels
        );

        match &reference {
            None => reference = Some(dst),
            Some(reference) => {
                let mismatches = reference.iter().zip(dst.iter()).filter(|(a, b)| a != b).count();
                println!("  mismatches against first variant: {mismatches}");
            }
        }
    }
}
