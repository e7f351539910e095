/*
 * Copyright (c) Radzivon Bartoshyk. All rights reserved.
 *
 * Redistribution and use in source and binary forms, with or without modification,
 * are permitted provided that the following conditions are met:
 *
 * 1.  Redistributions of source code must retain the above copyright notice, this
 * list of conditions and the following disclaimer.
 *
 * 2.  Redistributions in binary form must reproduce the above copyright notice,
 * this list of conditions and the following disclaimer in the documentation
 * and/or other materials provided with the distribution.
 *
 * 3.  Neither the name of the copyright holder nor the names of its
 * contributors may be used to endorse or promote products derived from
 * this software without specific prior written permission.
 *
 * THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
 * AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
 * IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
 * DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
 * FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
 * DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
 * SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
 * CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
 * OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
 * OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.
 */
use crate::conv_shape::{ConvShape, TensorType};
use crate::depthwise_error::{DepthwiseBufferMismatch, DepthwiseError};
use crate::dispatch::{KernelDispatch, bind_kernels, resolve_backend};
use crate::kernel_params::KernelParams;
use crate::layout::LayoutParams;
use crate::options::{ComputeBackend, DepthwiseOptions};
use crate::ring_buffer::RowRingBuffer;
use crate::variant::DepthwiseVariant;
use crate::weights::{RepackedWeights, pad_channels};
use rayon::prelude::*;
use std::sync::Mutex;

/// 8-bit quantized depthwise convolution over NHWC tensors.
///
/// Construction validates the shape, picks a variant and an instruction set,
/// and repacks the weights. The object is immutable afterwards and can be
/// shared between threads; every worker brings its own [RowRingBuffer].
///
/// # Examples
///
/// ```
/// use quant_depthwise::{ConvShape, DepthwiseConvolution, DepthwiseOptions};
///
/// let shape = ConvShape::new(5, 5, 1, 3, 3).with_padding(1, 1, 1, 1);
/// let conv = DepthwiseConvolution::new(
///     shape,
///     &[1i8; 9],
///     &[0],
///     &[1.0],
///     DepthwiseOptions::default(),
/// )
/// .unwrap();
/// let mut dst = vec![0u8; 25];
/// conv.run(&[1u8; 25], 0, &mut dst, 0).unwrap();
/// assert_eq!(dst[0], 4);
/// assert_eq!(dst[12], 9);
/// ```
pub struct DepthwiseConvolution {
    shape: ConvShape,
    options: DepthwiseOptions,
    variant: DepthwiseVariant,
    backend: ComputeBackend,
    layout: LayoutParams,
    weights: RepackedWeights,
    bias: Vec<i32>,
    norm: Vec<f32>,
    kernels: KernelDispatch,
    /// Rings of finished `run` workers, reused by later calls
    rings: Mutex<Vec<RowRingBuffer>>,
}

fn check_len(buffer: &'static str, expected: usize, slice_len: usize) -> Result<(), DepthwiseError> {
    if expected != slice_len {
        return Err(DepthwiseError::BufferMismatch(DepthwiseBufferMismatch {
            buffer,
            expected,
            slice_len,
        }));
    }
    Ok(())
}

impl DepthwiseConvolution {
    /// Creates a convolution.
    ///
    /// `weights` are laid out `[kernel_y][kernel_x][channels]`, `bias` and
    /// `scale` hold one value per channel with quantization folded in.
    pub fn new(
        shape: ConvShape,
        weights: &[i8],
        bias: &[i32],
        scale: &[f32],
        options: DepthwiseOptions,
    ) -> Result<DepthwiseConvolution, DepthwiseError> {
        shape.validate()?;
        if shape.dst_type != TensorType::U8 {
            return Err(DepthwiseError::UnsupportedDestination(shape.dst_type));
        }
        check_len("weights", shape.weights_len(), weights.len())?;
        check_len("bias", shape.channels, bias.len())?;
        check_len("scale", shape.channels, scale.len())?;

        let backend = resolve_backend(options.backend)?;
        let variant = DepthwiseVariant::select(&shape, &options, backend.lanes())?;
        let layout = LayoutParams::new(&shape, variant, backend.lanes(), options.macro_rows);
        let repacked = RepackedWeights::new(&shape, &layout, variant, weights)?;
        let bias = pad_channels(bias, layout.buf_c)?;
        let norm = pad_channels(scale, layout.buf_c)?;

        log::debug!(
            "depthwise {}x{}x{} kernel {}x{} stride {}x{}: {:?} on {:?}, ring {}x{} i32, macro rows {}",
            shape.src_h,
            shape.src_w,
            shape.channels,
            shape.kernel_y,
            shape.kernel_x,
            shape.stride_y,
            shape.stride_x,
            variant,
            backend,
            layout.buf_h,
            layout.row_stride,
            layout.macro_h
        );

        Ok(DepthwiseConvolution {
            shape,
            options,
            variant,
            backend,
            layout,
            weights: repacked,
            bias,
            norm,
            kernels: bind_kernels(backend, variant),
            rings: Mutex::new(Vec::new()),
        })
    }

    #[inline]
    pub fn shape(&self) -> &ConvShape {
        &self.shape
    }

    #[inline]
    pub fn variant(&self) -> DepthwiseVariant {
        self.variant
    }

    /// Resolved instruction set, never [ComputeBackend::Auto]
    #[inline]
    pub fn backend(&self) -> ComputeBackend {
        self.backend
    }

    #[inline]
    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    /// Allocates a ring buffer matching this convolution.
    /// Direct variants get an empty one.
    pub fn create_buffer(&self) -> Result<RowRingBuffer, DepthwiseError> {
        RowRingBuffer::new(&self.shape, &self.layout)
    }

    /// A cached ring or a freshly allocated one
    fn take_buffer(&self) -> Result<RowRingBuffer, DepthwiseError> {
        let cached = self.rings.lock().ok().and_then(|mut rings| rings.pop());
        match cached {
            Some(buf) => Ok(buf),
            None => self.create_buffer(),
        }
    }

    fn recycle_buffer(&self, buf: RowRingBuffer) {
        if let Ok(mut rings) = self.rings.lock() {
            rings.push(buf);
        }
    }

    fn params_i8(&self) -> KernelParams<'_, i8> {
        let weights: &[i8] = match &self.weights {
            RepackedWeights::Direct(weights) => weights,
            RepackedWeights::Packed(_) => &[],
        };
        KernelParams {
            shape: &self.shape,
            layout: &self.layout,
            weights,
            bias: &self.bias,
            norm: &self.norm,
        }
    }

    fn params_i32(&self) -> KernelParams<'_, i32> {
        let weights: &[i32] = match &self.weights {
            RepackedWeights::Packed(weights) => weights,
            RepackedWeights::Direct(_) => &[],
        };
        KernelParams {
            shape: &self.shape,
            layout: &self.layout,
            weights,
            bias: &self.bias,
            norm: &self.norm,
        }
    }

    fn check_rows(&self, dy_beg: usize, dy_end: usize) -> Result<(), DepthwiseError> {
        if dy_beg >= dy_end || dy_end > self.shape.dst_h() {
            return Err(DepthwiseError::InvalidRowRange(dy_beg, dy_end));
        }
        Ok(())
    }

    fn check_buffer(&self, buf: &RowRingBuffer) -> Result<(), DepthwiseError> {
        if !buf.matches(&self.shape, &self.layout) {
            return Err(DepthwiseError::RingLayoutMismatch);
        }
        Ok(())
    }

    /// Rows `[dy_beg, dy_end)` of one image, `dst` starts at row `dy_beg`
    fn execute_rows(
        &self,
        src: &[u8],
        src_zero: u8,
        dst: &mut [u8],
        dst_zero: u8,
        dy_beg: usize,
        dy_end: usize,
        buf: &mut RowRingBuffer,
    ) -> Result<(), DepthwiseError> {
        match self.kernels {
            KernelDispatch::Direct(kernel) => {
                kernel(&self.params_i8(), src, src_zero, dst, dst_zero, dy_beg, dy_end);
            }
            KernelDispatch::Buffered {
                preprocess,
                convolve,
            } => {
                let params = self.params_i32();
                let row_len = self.shape.dst_w() * self.shape.channels;
                buf.reset();
                let mut dy = dy_beg;
                while dy < dy_end {
                    let end = (dy + self.layout.macro_h).min(dy_end);
                    let fresh = buf.claim(self.layout.source_window(dy, end))?;
                    if !fresh.is_empty() {
                        preprocess(&params, src, src_zero, buf.data_mut(), fresh.start, fresh.end);
                    }
                    let rows = &mut dst[(dy - dy_beg) * row_len..(end - dy_beg) * row_len];
                    convolve(&params, buf.data(), rows, dst_zero, dy, end);
                    dy = end;
                }
            }
        }
        Ok(())
    }

    /// Convolves a batch of images.
    ///
    /// `src` holds one or more source images back to back and `dst` the same
    /// count of destination images. Rows are spread over threads according to
    /// the threading policy, each worker preprocessing into its own ring.
    pub fn run(
        &self,
        src: &[u8],
        src_zero: u8,
        dst: &mut [u8],
        dst_zero: u8,
    ) -> Result<(), DepthwiseError> {
        let src_image = self.shape.src_len();
        let dst_image = self.shape.dst_len();
        if src.is_empty() || src.len() % src_image != 0 {
            return Err(DepthwiseError::BufferMismatch(DepthwiseBufferMismatch {
                buffer: "src",
                expected: src_image,
                slice_len: src.len(),
            }));
        }
        let batch = src.len() / src_image;
        check_len("dst", batch * dst_image, dst.len())?;

        let dst_h = self.shape.dst_h();
        let dst_w = self.shape.dst_w();
        let row_len = dst_w * self.shape.channels;
        let pool = self.options.threading_policy.get_pool(dst_h, dst_w)?;

        match pool {
            None => {
                let mut buf = self.take_buffer()?;
                for (src, dst) in src
                    .chunks_exact(src_image)
                    .zip(dst.chunks_exact_mut(dst_image))
                {
                    self.execute_rows(src, src_zero, dst, dst_zero, 0, dst_h, &mut buf)?;
                }
                self.recycle_buffer(buf);
                Ok(())
            }
            Some(pool) => {
                let rows_per_task = dst_h.div_ceil(pool.current_num_threads());
                pool.install(|| {
                    src.par_chunks_exact(src_image)
                        .zip(dst.par_chunks_exact_mut(dst_image))
                        .try_for_each(|(src, dst)| {
                            dst.par_chunks_mut(rows_per_task * row_len)
                                .enumerate()
                                .try_for_each(|(task, rows)| {
                                    let dy_beg = task * rows_per_task;
                                    let dy_end = dy_beg + rows.len() / row_len;
                                    let mut buf = self.take_buffer()?;
                                    let result = self.execute_rows(
                                        src, src_zero, rows, dst_zero, dy_beg, dy_end, &mut buf,
                                    );
                                    self.recycle_buffer(buf);
                                    result
                                })
                        })
                })
            }
        }
    }

    /// Convolves output rows `[dy_beg, dy_end)` of a single image on the
    /// calling thread. `dst` is the whole destination image.
    pub fn run_rows(
        &self,
        src: &[u8],
        src_zero: u8,
        dst: &mut [u8],
        dst_zero: u8,
        dy_beg: usize,
        dy_end: usize,
        buf: &mut RowRingBuffer,
    ) -> Result<(), DepthwiseError> {
        check_len("src", self.shape.src_len(), src.len())?;
        check_len("dst", self.shape.dst_len(), dst.len())?;
        self.check_rows(dy_beg, dy_end)?;
        self.check_buffer(buf)?;
        let row_len = self.shape.dst_w() * self.shape.channels;
        self.execute_rows(
            src,
            src_zero,
            &mut dst[dy_beg * row_len..dy_end * row_len],
            dst_zero,
            dy_beg,
            dy_end,
            buf,
        )
    }

    /// Fills `buf` with every source row output rows `[dy_beg, dy_end)` read
    pub fn preprocess_rows(
        &self,
        src: &[u8],
        src_zero: u8,
        dy_beg: usize,
        dy_end: usize,
        buf: &mut RowRingBuffer,
    ) -> Result<(), DepthwiseError> {
        let KernelDispatch::Buffered { preprocess, .. } = self.kernels else {
            return Err(DepthwiseError::NoRowBuffer);
        };
        check_len("src", self.shape.src_len(), src.len())?;
        self.check_rows(dy_beg, dy_end)?;
        self.check_buffer(buf)?;
        buf.reset();
        let window = buf.claim(self.layout.source_window(dy_beg, dy_end))?;
        preprocess(
            &self.params_i32(),
            src,
            src_zero,
            buf.data_mut(),
            window.start,
            window.end,
        );
        Ok(())
    }

    /// Convolves output rows `[dy_beg, dy_end)` from rows already held by `buf`.
    /// `dst` is the whole destination image.
    pub fn convolve_rows(
        &self,
        buf: &RowRingBuffer,
        dst: &mut [u8],
        dst_zero: u8,
        dy_beg: usize,
        dy_end: usize,
    ) -> Result<(), DepthwiseError> {
        let KernelDispatch::Buffered { convolve, .. } = self.kernels else {
            return Err(DepthwiseError::NoRowBuffer);
        };
        check_len("dst", self.shape.dst_len(), dst.len())?;
        self.check_rows(dy_beg, dy_end)?;
        self.check_buffer(buf)?;
        let window = self.layout.source_window(dy_beg, dy_end);
        if !buf.holds(&window) {
            return Err(DepthwiseError::RowsNotPreprocessed(window.start, window.end));
        }
        let row_len = self.shape.dst_w() * self.shape.channels;
        convolve(
            &self.params_i32(),
            buf.data(),
            &mut dst[dy_beg * row_len..dy_end * row_len],
            dst_zero,
            dy_beg,
            dy_end,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DepthwiseAlgorithm, ReorderType};
    use crate::reference::Case;
    use crate::requantize::requantize;
    use crate::threading_policy::ThreadingPolicy;

    /// Every backend compiled in, those the CPU lacks are skipped at construction
    fn backends() -> Vec<ComputeBackend> {
        vec![
            ComputeBackend::Auto,
            ComputeBackend::Scalar(4),
            ComputeBackend::Scalar(16),
            #[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "sse"))]
            ComputeBackend::Sse41,
            #[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "avx"))]
            ComputeBackend::Avx2,
            #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
            ComputeBackend::Neon,
        ]
    }

    fn option_grid() -> Vec<DepthwiseOptions> {
        let mut grid = Vec::new();
        for algorithm in [
            DepthwiseAlgorithm::Direct,
            DepthwiseAlgorithm::Widened,
            DepthwiseAlgorithm::Paired,
        ] {
            for reorder in [
                None,
                Some(ReorderType::PixelMajor),
                Some(ReorderType::ChannelBlocked),
            ] {
                for macro_rows in [None, Some(1), Some(3)] {
                    for backend in backends() {
                        grid.push(DepthwiseOptions {
                            algorithm,
                            reorder,
                            macro_rows,
                            threading_policy: ThreadingPolicy::Single,
                            backend,
                        });
                    }
                }
            }
        }
        grid
    }

    fn build(case: &Case, options: DepthwiseOptions) -> Result<DepthwiseConvolution, DepthwiseError> {
        DepthwiseConvolution::new(case.shape, &case.weights, &case.bias, &case.scale, options)
    }

    fn convolve(conv: &DepthwiseConvolution, case: &Case) -> Vec<u8> {
        let mut dst = vec![0u8; case.shape.dst_len()];
        conv.run(&case.src, case.src_zero, &mut dst, case.dst_zero)
            .unwrap();
        dst
    }

    fn check_all_variants(case: &Case) {
        let expected = case.expected();
        for options in option_grid() {
            let conv = match build(case, options) {
                Ok(conv) => conv,
                Err(DepthwiseError::UnsupportedAlgorithm(_))
                | Err(DepthwiseError::UnsupportedBackend(_)) => continue,
                Err(error) => panic!("{error}"),
            };
            let dst = convolve(&conv, case);
            assert_eq!(
                dst,
                expected,
                "{:?} {:?} on {:?} with {:?}",
                case.shape,
                conv.variant(),
                conv.backend(),
                options
            );
        }
    }

    #[test]
    fn all_ones_with_same_padding() {
        let shape = ConvShape::new(5, 5, 1, 3, 3).with_padding(1, 1, 1, 1);
        let case = Case {
            shape,
            src: vec![1; 25],
            weights: vec![1; 9],
            bias: vec![0],
            scale: vec![1.0],
            src_zero: 0,
            dst_zero: 0,
        };
        #[rustfmt::skip]
        let expected = vec![
            4, 6, 6, 6, 4,
            6, 9, 9, 9, 6,
            6, 9, 9, 9, 6,
            6, 9, 9, 9, 6,
            4, 6, 6, 6, 4,
        ];
        assert_eq!(case.expected(), expected);
        check_all_variants(&case);
    }

    #[test]
    fn variants_agree_on_3x3() {
        let shapes = [
            ConvShape::new(9, 11, 8, 3, 3).with_padding(1, 1, 1, 1),
            ConvShape::new(12, 7, 5, 3, 3).with_padding(1, 1, 1, 1).with_stride(2, 2),
            ConvShape::new(8, 9, 19, 3, 3).with_stride(1, 2),
            ConvShape::new(7, 10, 3, 3, 3).with_padding(0, 1, 2, 0).with_stride(2, 1),
            ConvShape::new(6, 6, 33, 3, 3).with_padding(1, 0, 1, 1),
        ];
        for (seed, shape) in shapes.into_iter().enumerate() {
            check_all_variants(&Case::random(shape, seed as u64));
        }
    }

    #[test]
    fn variants_agree_on_generic_kernels() {
        let shapes = [
            ConvShape::new(10, 9, 6, 5, 5).with_padding(2, 2, 2, 2),
            ConvShape::new(11, 12, 4, 2, 3).with_padding(1, 0, 0, 2),
            ConvShape::new(9, 8, 7, 4, 2).with_stride(3, 2).with_padding(2, 1, 1, 0),
            ConvShape::new(6, 13, 17, 1, 5).with_padding(0, 2, 0, 2),
            ConvShape::new(8, 8, 12, 7, 1).with_padding(3, 0, 3, 0).with_stride(2, 1),
            ConvShape::new(13, 5, 2, 3, 3).with_dilation(2, 1).with_padding(2, 1, 2, 1),
            ConvShape::new(10, 10, 9, 3, 2).with_dilation(3, 2).with_stride(1, 2),
        ];
        for (seed, shape) in shapes.into_iter().enumerate() {
            check_all_variants(&Case::random(shape, 100 + seed as u64));
        }
    }

    #[test]
    fn fully_padded_corner_uses_zero_point() {
        let shape = ConvShape::new(3, 3, 2, 3, 3).with_padding(2, 2, 2, 2);
        let case = Case::random(shape, 7);
        let expected = case.expected();
        // the top left output sees nothing but its bottom right tap
        let sum_zero = |c: usize| -> i32 {
            (0..9)
                .map(|k| case.weights[k * 2 + c] as i32 * case.src_zero as i32)
                .sum()
        };
        let corner = |c: usize| {
            sum_zero(c) - case.weights[8 * 2 + c] as i32 * case.src_zero as i32
                + case.weights[8 * 2 + c] as i32 * case.src[c] as i32
        };
        for c in 0..2 {
            assert_eq!(
                expected[c],
                requantize(corner(c), case.bias[c], case.scale[c], case.dst_zero as i32)
            );
        }
        check_all_variants(&case);
    }

    #[test]
    fn largest_kernel_saturates_bias() {
        use crate::conv_shape::MAX_KERNEL_AREA;
        // a single output whose receptive field is one pixel and the padding
        let shape = ConvShape::new(1, 1, 1, 1, MAX_KERNEL_AREA)
            .with_padding(0, 0, 0, MAX_KERNEL_AREA - 1);
        assert_eq!(shape.dst_len(), 1);
        for (weight, bias, expected) in [(-128i8, -2000, 0u8), (127, i32::MAX, 255)] {
            let case = Case {
                shape,
                src: vec![255],
                weights: vec![weight; MAX_KERNEL_AREA],
                bias: vec![bias],
                scale: vec![0.5],
                src_zero: 255,
                dst_zero: 0,
            };
            assert_eq!(case.expected(), vec![expected]);
            for algorithm in [DepthwiseAlgorithm::Direct, DepthwiseAlgorithm::Widened] {
                for backend in backends() {
                    let options = DepthwiseOptions::default()
                        .with_algorithm(algorithm)
                        .with_backend(backend);
                    let conv = match build(&case, options) {
                        Ok(conv) => conv,
                        Err(DepthwiseError::UnsupportedBackend(_)) => continue,
                        Err(error) => panic!("{error}"),
                    };
                    assert_eq!(
                        convolve(&conv, &case),
                        vec![expected],
                        "{:?} on {:?}",
                        conv.variant(),
                        conv.backend()
                    );
                }
            }
        }
    }

    #[test]
    fn channel_tail_does_not_leak() {
        let shape = ConvShape::new(4, 16, 17, 3, 3).with_padding(1, 1, 1, 1);
        let case = Case::random(shape, 21);
        let expected = case.expected();
        for options in option_grid() {
            let Ok(conv) = build(&case, options) else {
                continue;
            };
            let mut dst = vec![0xABu8; shape.dst_len() + 64];
            conv.run(
                &case.src,
                case.src_zero,
                &mut dst[..shape.dst_len()],
                case.dst_zero,
            )
            .unwrap();
            assert_eq!(&dst[..shape.dst_len()], &expected[..]);
            assert!(dst[shape.dst_len()..].iter().all(|&x| x == 0xAB));
        }
    }

    #[test]
    fn ring_wraps_on_tall_images() {
        let shapes = [
            ConvShape::new(70, 6, 5, 3, 3).with_padding(1, 1, 1, 1),
            ConvShape::new(61, 5, 4, 5, 3).with_padding(2, 1, 2, 1),
            ConvShape::new(57, 4, 3, 4, 1).with_stride(3, 1).with_padding(1, 0, 2, 0),
        ];
        for (seed, shape) in shapes.into_iter().enumerate() {
            let case = Case::random(shape, 300 + seed as u64);
            let expected = case.expected();
            for algorithm in [DepthwiseAlgorithm::Widened, DepthwiseAlgorithm::Paired] {
                let options = DepthwiseOptions::default()
                    .with_algorithm(algorithm)
                    .with_macro_rows(2)
                    .with_backend(ComputeBackend::Scalar(4));
                let conv = build(&case, options).unwrap();
                assert!(conv.layout().buf_h < shape.src_h);
                assert_eq!(convolve(&conv, &case), expected);
            }
        }
    }

    #[test]
    fn explicit_row_api_matches_run() {
        let shape = ConvShape::new(12, 9, 6, 3, 3).with_padding(1, 1, 1, 1);
        let case = Case::random(shape, 42);
        let expected = case.expected();
        for algorithm in [DepthwiseAlgorithm::Widened, DepthwiseAlgorithm::Paired] {
            let options = DepthwiseOptions::default()
                .with_algorithm(algorithm)
                .with_macro_rows(4);
            let conv = build(&case, options).unwrap();
            let mut buf = conv.create_buffer().unwrap();
            let mut dst = vec![0u8; shape.dst_len()];
            for dy in (0..shape.dst_h()).step_by(4) {
                let end = (dy + 4).min(shape.dst_h());
                conv.preprocess_rows(&case.src, case.src_zero, dy, end, &mut buf)
                    .unwrap();
                conv.convolve_rows(&buf, &mut dst, case.dst_zero, dy, end)
                    .unwrap();
            }
            assert_eq!(dst, expected);

            let mut partial = vec![0u8; shape.dst_len()];
            conv.run_rows(&case.src, case.src_zero, &mut partial, case.dst_zero, 5, 9, &mut buf)
                .unwrap();
            let row_len = shape.dst_w() * shape.channels;
            assert_eq!(&partial[5 * row_len..9 * row_len], &expected[5 * row_len..9 * row_len]);
            assert!(partial[..5 * row_len].iter().all(|&x| x == 0));
        }
    }

    #[test]
    fn convolving_unprepared_rows_fails() {
        let shape = ConvShape::new(12, 9, 6, 3, 3).with_padding(1, 1, 1, 1);
        let case = Case::random(shape, 43);
        let options = DepthwiseOptions::default()
            .with_algorithm(DepthwiseAlgorithm::Widened)
            .with_macro_rows(4);
        let conv = build(&case, options).unwrap();
        let mut buf = conv.create_buffer().unwrap();
        let mut dst = vec![0u8; shape.dst_len()];
        assert_eq!(
            conv.convolve_rows(&buf, &mut dst, 0, 0, 2),
            Err(DepthwiseError::RowsNotPreprocessed(0, 4))
        );
        conv.preprocess_rows(&case.src, case.src_zero, 0, 2, &mut buf)
            .unwrap();
        assert_eq!(
            conv.convolve_rows(&buf, &mut dst, 0, 1, 3),
            Err(DepthwiseError::RowsNotPreprocessed(1, 5))
        );
        assert_eq!(
            conv.preprocess_rows(&case.src, case.src_zero, 0, 12, &mut buf),
            Err(DepthwiseError::RingCapacityExceeded(14, 8))
        );
        assert_eq!(
            conv.convolve_rows(&buf, &mut dst, 0, 3, 3),
            Err(DepthwiseError::InvalidRowRange(3, 3))
        );
    }

    #[test]
    fn direct_has_no_row_buffer() {
        let shape = ConvShape::new(6, 6, 3, 3, 3);
        let case = Case::random(shape, 44);
        let options = DepthwiseOptions::default().with_algorithm(DepthwiseAlgorithm::Direct);
        let conv = build(&case, options).unwrap();
        let mut buf = conv.create_buffer().unwrap();
        assert_eq!(buf.rows(), 0);
        assert_eq!(
            conv.preprocess_rows(&case.src, case.src_zero, 0, 2, &mut buf),
            Err(DepthwiseError::NoRowBuffer)
        );
        let mut dst = vec![0u8; shape.dst_len()];
        conv.run_rows(&case.src, case.src_zero, &mut dst, case.dst_zero, 0, 4, &mut buf)
            .unwrap();
        assert_eq!(dst, case.expected());
    }

    #[test]
    fn foreign_buffer_is_rejected() {
        let small = Case::random(ConvShape::new(6, 6, 3, 3, 3), 45);
        let large = Case::random(ConvShape::new(6, 40, 3, 3, 3), 46);
        let options = DepthwiseOptions::default().with_algorithm(DepthwiseAlgorithm::Paired);
        let small_conv = build(&small, options).unwrap();
        let large_conv = build(&large, options).unwrap();
        let mut buf = large_conv.create_buffer().unwrap();
        assert_eq!(
            small_conv.preprocess_rows(&small.src, 0, 0, 1, &mut buf),
            Err(DepthwiseError::RingLayoutMismatch)
        );
    }

    #[test]
    fn ring_of_same_geometry_other_layout_is_rejected() {
        let shape = ConvShape::new(8, 8, 8, 3, 3);
        let case = Case::random(shape, 47);
        let widened = DepthwiseOptions::default()
            .with_algorithm(DepthwiseAlgorithm::Widened)
            .with_backend(ComputeBackend::Scalar(4))
            .with_macro_rows(8);
        let pixel_major = build(&case, widened.with_reorder(ReorderType::PixelMajor)).unwrap();
        let blocked = build(&case, widened.with_reorder(ReorderType::ChannelBlocked)).unwrap();
        assert_eq!(pixel_major.layout().ring_len(), blocked.layout().ring_len());

        let dst_h = shape.dst_h();
        let mut buf = pixel_major.create_buffer().unwrap();
        pixel_major
            .preprocess_rows(&case.src, case.src_zero, 0, dst_h, &mut buf)
            .unwrap();
        let mut dst = vec![0u8; shape.dst_len()];
        assert_eq!(
            blocked.convolve_rows(&buf, &mut dst, case.dst_zero, 0, dst_h),
            Err(DepthwiseError::RingLayoutMismatch)
        );
        pixel_major
            .convolve_rows(&buf, &mut dst, case.dst_zero, 0, dst_h)
            .unwrap();
        assert_eq!(dst, case.expected());

        let padded = Case::random(shape.with_padding(0, 1, 0, 1).with_stride(1, 2), 48);
        let other = build(&padded, widened.with_reorder(ReorderType::PixelMajor)).unwrap();
        assert_eq!(
            other.convolve_rows(&buf, &mut vec![0u8; padded.shape.dst_len()], 0, 0, 1),
            Err(DepthwiseError::RingLayoutMismatch)
        );
    }

    #[test]
    fn threads_and_batches() {
        let shape = ConvShape::new(23, 17, 10, 3, 3).with_padding(1, 1, 1, 1);
        let first = Case::random(shape, 50);
        let second = Case {
            src: Case::random(shape, 51).src,
            ..Case::random(shape, 50)
        };
        let mut src = first.src.clone();
        src.extend_from_slice(&second.src);
        let mut expected = first.expected();
        expected.extend_from_slice(&second.expected());

        for policy in [
            ThreadingPolicy::Single,
            ThreadingPolicy::Fixed(3),
            ThreadingPolicy::Fixed(64),
        ] {
            for algorithm in [
                DepthwiseAlgorithm::Direct,
                DepthwiseAlgorithm::Widened,
                DepthwiseAlgorithm::Paired,
            ] {
                let options = DepthwiseOptions::default()
                    .with_algorithm(algorithm)
                    .with_threading_policy(policy)
                    .with_macro_rows(3);
                let conv = build(&first, options).unwrap();
                let mut dst = vec![0u8; expected.len()];
                conv.run(&src, first.src_zero, &mut dst, first.dst_zero)
                    .unwrap();
                assert_eq!(dst, expected, "{policy:?} {algorithm:?}");
            }
        }
    }

    #[test]
    fn repeated_runs_reuse_worker_rings() {
        let shape = ConvShape::new(40, 12, 6, 3, 3).with_padding(1, 1, 1, 1);
        let case = Case::random(shape, 61);
        let expected = case.expected();
        for policy in [ThreadingPolicy::Single, ThreadingPolicy::Fixed(4)] {
            let options = DepthwiseOptions::default()
                .with_algorithm(DepthwiseAlgorithm::Paired)
                .with_threading_policy(policy)
                .with_macro_rows(3);
            let conv = build(&case, options).unwrap();
            assert_eq!(convolve(&conv, &case), expected);
            let cached = conv.rings.lock().unwrap().len();
            assert!(cached >= 1);
            for _ in 0..3 {
                assert_eq!(convolve(&conv, &case), expected);
            }
            let limit = policy.thread_count(shape.dst_h(), shape.dst_w());
            let after = conv.rings.lock().unwrap().len();
            assert!(after >= cached && after <= limit, "{after} rings for {limit} workers");
            let ring = conv.rings.lock().unwrap()[0].clone();
            assert!(ring.matches(conv.shape(), conv.layout()));
        }
    }

    #[test]
    fn rejects_bad_arguments() {
        let shape = ConvShape::new(6, 6, 3, 3, 3);
        let case = Case::random(shape, 60);
        let f32_shape = shape.with_dst_type(crate::conv_shape::TensorType::F32);
        assert_eq!(
            DepthwiseConvolution::new(
                f32_shape,
                &case.weights,
                &case.bias,
                &case.scale,
                DepthwiseOptions::default()
            )
            .err(),
            Some(DepthwiseError::UnsupportedDestination(
                crate::conv_shape::TensorType::F32
            ))
        );
        assert_eq!(
            DepthwiseConvolution::new(
                shape,
                &case.weights[1..],
                &case.bias,
                &case.scale,
                DepthwiseOptions::default()
            )
            .err()
            .map(|x| x.code()),
            Some(4)
        );
        let conv = build(&case, DepthwiseOptions::default()).unwrap();
        let mut dst = vec![0u8; shape.dst_len()];
        assert!(conv.run(&case.src[1..], 0, &mut dst, 0).is_err());
        assert!(conv.run(&[], 0, &mut dst, 0).is_err());
        let mut short = vec![0u8; shape.dst_len() - 1];
        assert!(conv.run(&case.src, 0, &mut short, 0).is_err());
    }
}
