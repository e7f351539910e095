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
use crate::execution_unit::ExecutionUnit;
use crate::kernel_params::KernelParams;
use crate::paired::{convolve_paired, convolve_paired_3x3};
use crate::preprocess::{preprocess_paired, preprocess_widened};
use crate::widened::{convolve_widened, convolve_widened_3x3};

pub(crate) const WIDENED_R0: u8 = 0;
pub(crate) const WIDENED_R1: u8 = 1;
pub(crate) const WIDENED_3X3_R1: u8 = 2;
pub(crate) const PAIRED_R0: u8 = 3;
pub(crate) const PAIRED_R1: u8 = 4;
pub(crate) const PAIRED_3X3_R1: u8 = 5;

/// Ring rows contributing to `R` output rows that read the same slots.
///
/// Slot `i` is logical row `first + i * step` and multiplies weight row `i`
/// of the set starting at `weights[r]` for output row `r`.
#[derive(Copy, Clone, Debug)]
pub(crate) struct TapRows<const R: usize> {
    pub(crate) first: usize,
    pub(crate) step: usize,
    pub(crate) count: usize,
    /// Weight rows per channel block in blocked weight layouts
    pub(crate) weight_rows: usize,
    pub(crate) weights: [usize; R],
}

#[inline(always)]
unsafe fn block_r0<U: ExecutionUnit, const R: usize, const X: usize, const B: usize>(
    params: &KernelParams<'_, i32>,
    buf: *const i32,
    taps: &TapRows<R>,
    dx: usize,
    c: usize,
) -> [[[U::Vi32; B]; X]; R] {
    unsafe {
        let layout = params.layout;
        let kernel_x = params.shape.kernel_x;
        let stride_x = params.shape.stride_x;
        let buf_c = layout.buf_c;
        let f = U::LANES;
        let weights = params.weights.as_ptr();
        let mut acc = [[[U::zeros(); B]; X]; R];

        for i in 0..taps.count {
            let row = buf.add(layout.slot(taps.first + i * taps.step));
            for kx in 0..kernel_x {
                for b in 0..B {
                    let cc = c + b * f;
                    let mut w = [U::zeros(); R];
                    for (w, &set) in w.iter_mut().zip(taps.weights.iter()) {
                        *w = U::load_i32(weights.add(set + (i * kernel_x + kx) * buf_c + cc));
                    }
                    for x in 0..X {
                        let s = U::load_i32(row.add(((dx + x) * stride_x + kx) * buf_c + cc));
                        for r in 0..R {
                            acc[r][x][b] = U::madd(acc[r][x][b], s, w[r]);
                        }
                    }
                }
            }
        }
        acc
    }
}

#[inline(always)]
unsafe fn columns_r0<U: ExecutionUnit, const R: usize, const X: usize>(
    params: &KernelParams<'_, i32>,
    buf: *const i32,
    taps: &TapRows<R>,
    dx: usize,
    dst: &[*mut u8; R],
    dst_zero: U::Vi32,
) {
    unsafe {
        let channels = params.shape.channels;
        let f = U::LANES;
        let mut c = 0usize;
        while c + 4 * f <= channels {
            let acc = block_r0::<U, R, X, 4>(params, buf, taps, dx, c);
            store_r0::<U, R, X, 4>(params, &acc, dst, dx, c, f, dst_zero);
            c += 4 * f;
        }
        while c < channels {
            let last = (channels - c).min(f);
            let acc = block_r0::<U, R, X, 1>(params, buf, taps, dx, c);
            store_r0::<U, R, X, 1>(params, &acc, dst, dx, c, last, dst_zero);
            c += f;
        }
    }
}

#[inline(always)]
unsafe fn store_r0<U: ExecutionUnit, const R: usize, const X: usize, const B: usize>(
    params: &KernelParams<'_, i32>,
    acc: &[[[U::Vi32; B]; X]; R],
    dst: &[*mut u8; R],
    dx: usize,
    c: usize,
    last: usize,
    dst_zero: U::Vi32,
) {
    unsafe {
        let channels = params.shape.channels;
        let f = U::LANES;
        for b in 0..B {
            let cc = c + b * f;
            let count = if b + 1 == B { last } else { f };
            let bias = U::load_i32(params.bias.as_ptr().add(cc));
            let norm = U::load_f32(params.norm.as_ptr().add(cc));
            for r in 0..R {
                for x in 0..X {
                    U::store_u8_part(
                        dst[r].add((dx + x) * channels + cc),
                        acc[r][x][b],
                        bias,
                        norm,
                        dst_zero,
                        count,
                    );
                }
            }
        }
    }
}

/// Whole output rows over a pixel-major ring, two columns at a time
#[inline(always)]
pub(crate) unsafe fn convolve_rows_r0<U: ExecutionUnit, const R: usize>(
    params: &KernelParams<'_, i32>,
    buf: *const i32,
    taps: &TapRows<R>,
    dst: &[*mut u8; R],
    dst_zero: U::Vi32,
) {
    unsafe {
        let dst_w = params.shape.dst_w();
        let mut dx = 0usize;
        while dx + 2 <= dst_w {
            columns_r0::<U, R, 2>(params, buf, taps, dx, dst, dst_zero);
            dx += 2;
        }
        if dx < dst_w {
            columns_r0::<U, R, 1>(params, buf, taps, dx, dst, dst_zero);
        }
    }
}

#[inline(always)]
unsafe fn block_r1<U: ExecutionUnit, const R: usize, const X: usize>(
    params: &KernelParams<'_, i32>,
    buf: *const i32,
    taps: &TapRows<R>,
    cb: usize,
    dx: usize,
) -> [[U::Vi32; X]; R] {
    unsafe {
        let layout = params.layout;
        let kernel_x = params.shape.kernel_x;
        let stride_x = params.shape.stride_x;
        let f = U::LANES;
        let weights = params.weights.as_ptr();
        let block = cb * layout.buf_w * f;
        let mut acc = [[U::zeros(); X]; R];

        for i in 0..taps.count {
            let row = buf.add(layout.slot(taps.first + i * taps.step) + block);
            let w_row = (cb * taps.weight_rows + i) * kernel_x;
            for kx in 0..kernel_x {
                let mut w = [U::zeros(); R];
                for (w, &set) in w.iter_mut().zip(taps.weights.iter()) {
                    *w = U::load_i32(weights.add(set + (w_row + kx) * f));
                }
                for x in 0..X {
                    let s = U::load_i32(row.add(((dx + x) * stride_x + kx) * f));
                    for r in 0..R {
                        acc[r][x] = U::madd(acc[r][x], s, w[r]);
                    }
                }
            }
        }
        acc
    }
}

/// Stores `X` adjacent columns of `R` rows for one channel block
#[inline(always)]
pub(crate) unsafe fn store_columns<U: ExecutionUnit, const R: usize, const X: usize>(
    acc: &[[U::Vi32; X]; R],
    dst: &[*mut u8; R],
    channels: usize,
    dx: usize,
    c: usize,
    count: usize,
    bias: U::Vi32,
    norm: U::Vf32,
    dst_zero: U::Vi32,
) {
    unsafe {
        for r in 0..R {
            for x in 0..X {
                U::store_u8_part(
                    dst[r].add((dx + x) * channels + c),
                    acc[r][x],
                    bias,
                    norm,
                    dst_zero,
                    count,
                );
            }
        }
    }
}

/// Whole output rows over a channel-blocked ring, columns by 4, 2 and 1
#[inline(always)]
pub(crate) unsafe fn convolve_rows_r1<U: ExecutionUnit, const R: usize>(
    params: &KernelParams<'_, i32>,
    buf: *const i32,
    taps: &TapRows<R>,
    dst: &[*mut u8; R],
    dst_zero: U::Vi32,
) {
    unsafe {
        let channels = params.shape.channels;
        let dst_w = params.shape.dst_w();
        let f = U::LANES;
        for cb in 0..params.layout.buf_c / f {
            let c = cb * f;
            let count = (channels - c).min(f);
            let bias = U::load_i32(params.bias.as_ptr().add(c));
            let norm = U::load_f32(params.norm.as_ptr().add(c));
            let mut dx = 0usize;
            while dx + 4 <= dst_w {
                let acc = block_r1::<U, R, 4>(params, buf, taps, cb, dx);
                store_columns::<U, R, 4>(&acc, dst, channels, dx, c, count, bias, norm, dst_zero);
                dx += 4;
            }
            if dx + 2 <= dst_w {
                let acc = block_r1::<U, R, 2>(params, buf, taps, cb, dx);
                store_columns::<U, R, 2>(&acc, dst, channels, dx, c, count, bias, norm, dst_zero);
                dx += 2;
            }
            if dx < dst_w {
                let acc = block_r1::<U, R, 1>(params, buf, taps, cb, dx);
                store_columns::<U, R, 1>(&acc, dst, channels, dx, c, count, bias, norm, dst_zero);
            }
        }
    }
}

#[inline(always)]
pub(crate) unsafe fn depthwise_preprocess<U: ExecutionUnit, const KIND: u8>(
    params: &KernelParams<'_, i32>,
    src: &[u8],
    src_zero: u8,
    buf: &mut [i32],
    by_beg: usize,
    by_end: usize,
) {
    unsafe {
        match KIND {
            WIDENED_R0 => preprocess_widened::<U, false>(params, src, src_zero, buf, by_beg, by_end),
            WIDENED_R1 | WIDENED_3X3_R1 => {
                preprocess_widened::<U, true>(params, src, src_zero, buf, by_beg, by_end)
            }
            PAIRED_R0 => preprocess_paired::<U, false>(params, src, src_zero, buf, by_beg, by_end),
            PAIRED_R1 | PAIRED_3X3_R1 => {
                preprocess_paired::<U, true>(params, src, src_zero, buf, by_beg, by_end)
            }
            _ => unreachable!("unknown buffered kernel {KIND}"),
        }
    }
}

#[inline(always)]
pub(crate) unsafe fn depthwise_convolve<U: ExecutionUnit, const KIND: u8>(
    params: &KernelParams<'_, i32>,
    buf: &[i32],
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        debug_assert!(buf.len() >= params.layout.ring_len());
        debug_assert!(dst.len() >= (dy_end - dy_beg) * params.shape.dst_w() * params.shape.channels);
        match KIND {
            WIDENED_R0 => convolve_widened::<U, false>(params, buf, dst, dst_zero, dy_beg, dy_end),
            WIDENED_R1 => convolve_widened::<U, true>(params, buf, dst, dst_zero, dy_beg, dy_end),
            WIDENED_3X3_R1 => convolve_widened_3x3::<U>(params, buf, dst, dst_zero, dy_beg, dy_end),
            PAIRED_R0 => convolve_paired::<U, false>(params, buf, dst, dst_zero, dy_beg, dy_end),
            PAIRED_R1 => convolve_paired::<U, true>(params, buf, dst, dst_zero, dy_beg, dy_end),
            PAIRED_3X3_R1 => convolve_paired_3x3::<U>(params, buf, dst, dst_zero, dy_beg, dy_end),
            _ => unreachable!("unknown buffered kernel {KIND}"),
        }
    }
}
