#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quant_depthwise::{
    ComputeBackend, ConvShape, DepthwiseAlgorithm, DepthwiseConvolution, DepthwiseError,
    DepthwiseOptions, ReorderType,
};

#[derive(Clone, Debug, Arbitrary)]
pub struct Input {
    pub src_h: u8,
    pub src_w: u8,
    pub channels: u8,
    pub kernel_y: u8,
    pub kernel_x: u8,
    pub stride_y: u8,
    pub stride_x: u8,
    pub padding: [u8; 4],
    pub dilation: [u8; 2],
    pub macro_rows: u8,
    pub src_zero: u8,
    pub dst_zero: u8,
    pub seed: u32,
}

fuzz_target!(|data: Input| {
    let shape = ConvShape::new(
        data.src_h as usize % 24 + 1,
        data.src_w as usize % 24 + 1,
        data.channels as usize % 40 + 1,
        data.kernel_y as usize % 7 + 1,
        data.kernel_x as usize % 7 + 1,
    )
    .with_stride(
        data.stride_y as usize % 3 + 1,
        data.stride_x as usize % 3 + 1,
    )
    .with_padding(
        data.padding[0] as usize % 4,
        data.padding[1] as usize % 4,
        data.padding[2] as usize % 4,
        data.padding[3] as usize % 4,
    )
    .with_dilation(
        data.dilation[0] as usize % 3 + 1,
        data.dilation[1] as usize % 3 + 1,
    );
    if shape.validate().is_err() {
        return;
    }

    let mut state = data.seed | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    let src: Vec<u8> = (0..shape.src_len()).map(|_| next() as u8).collect();
    let weights: Vec<i8> = (0..shape.weights_len()).map(|_| next() as i8).collect();
    let bias: Vec<i32> = (0..shape.channels)
        .map(|_| (next() % 4096) as i32 - 2048)
        .collect();
    let scale: Vec<f32> = (0..shape.channels)
        .map(|_| 1. / (shape.kernel_area() as f32 * (64 + next() % 192) as f32))
        .collect();

    let macro_rows = match data.macro_rows % 4 {
        0 => None,
        rows => Some(rows as usize),
    };

    let mut expected: Option<Vec<u8>> = None;
    for algorithm in [
        DepthwiseAlgorithm::Direct,
        DepthwiseAlgorithm::Widened,
        DepthwiseAlgorithm::Paired,
    ] {
        for reorder in [ReorderType::PixelMajor, ReorderType::ChannelBlocked] {
            for backend in [
                ComputeBackend::Auto,
                ComputeBackend::Scalar(4),
                #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
                ComputeBackend::Sse41,
                #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
                ComputeBackend::Avx2,
            ] {
                let mut options = DepthwiseOptions::default()
                    .with_algorithm(algorithm)
                    .with_reorder(reorder)
                    .with_backend(backend);
                if let Some(rows) = macro_rows {
                    options = options.with_macro_rows(rows);
                }
                let conv = match DepthwiseConvolution::new(shape, &weights, &bias, &scale, options)
                {
                    Ok(conv) => conv,
                    Err(DepthwiseError::UnsupportedAlgorithm(_))
                    | Err(DepthwiseError::UnsupportedBackend(_)) => continue,
                    Err(err) => panic!("{err}"),
                };
                let mut dst = vec![0u8; shape.dst_len()];
                conv.run(&src, data.src_zero, &mut dst, data.dst_zero)
                    .unwrap();
                match &expected {
                    None => expected = Some(dst),
                    Some(expected) => assert_eq!(
                        expected,
                        &dst,
                        "{shape:?} {:?} on {:?}",
                        conv.variant(),
                        conv.backend()
                    ),
                }
            }
        }
    }
});
