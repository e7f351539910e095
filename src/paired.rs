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
use crate::buffered::{TapRows, convolve_rows_r0, convolve_rows_r1, store_columns};
use crate::execution_unit::ExecutionUnit;
use crate::kernel_params::KernelParams;

#[inline(always)]
unsafe fn paired_rows<U: ExecutionUnit, const BLOCKED: bool, const R: usize>(
    params: &KernelParams<'_, i32>,
    buf: &[i32],
    taps: &TapRows<R>,
    dst: &[*mut u8; R],
    dst_zero: U::Vi32,
) {
    unsafe {
        if BLOCKED {
            convolve_rows_r1::<U, R>(params, buf.as_ptr(), taps, dst, dst_zero);
        } else {
            convolve_rows_r0::<U, R>(params, buf.as_ptr(), taps, dst, dst_zero);
        }
    }
}

/// Generic kernel over pair-packed rows.
///
/// An output row starting at an even logical row walks slots `base, base + 2, ..`
/// with the aligned weight set, an odd start walks `base - 1, base + 1, ..` with
/// the shifted set. With unit vertical stride an even row and its successor
/// read the very same slots and are computed together.
#[inline(always)]
pub(crate) unsafe fn convolve_paired<U: ExecutionUnit, const BLOCKED: bool>(
    params: &KernelParams<'_, i32>,
    buf: &[i32],
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        let shape = params.shape;
        let layout = params.layout;
        let row_len = shape.dst_w() * shape.channels;
        let dst_zero = U::splat(dst_zero as i32);
        let pairs = layout.pair_rows;
        let aligned_pairs = shape.kernel_y.div_ceil(2);
        let shifted = layout.weight_set_stride;
        let dst = dst.as_mut_ptr();

        let mut dy = dy_beg;
        while dy < dy_end {
            let base = dy * shape.stride_y;
            let dst_row = dst.add((dy - dy_beg) * row_len);
            if base % 2 == 0 && shape.stride_y == 1 && dy + 1 < dy_end {
                let taps = TapRows::<2> {
                    first: base,
                    step: 2,
                    count: pairs,
                    weight_rows: pairs,
                    weights: [0, shifted],
                };
                paired_rows::<U, BLOCKED, 2>(
                    params,
                    buf,
                    &taps,
                    &[dst_row, dst_row.add(row_len)],
                    dst_zero,
                );
                dy += 2;
                continue;
            }
            let taps = if base % 2 == 0 {
                TapRows::<1> {
                    first: base,
                    step: 2,
                    count: aligned_pairs,
                    weight_rows: pairs,
                    weights: [0],
                }
            } else {
                TapRows::<1> {
                    first: base - 1,
                    step: 2,
                    count: pairs,
                    weight_rows: pairs,
                    weights: [shifted],
                }
            };
            paired_rows::<U, BLOCKED, 1>(params, buf, &taps, &[dst_row], dst_zero);
            dy += 1;
        }
    }
}

/// Pair weights of one 3x3 channel block, `[pair][kx]`
type PairWeights<V> = [[V; 3]; 2];

/// `R` output rows reading the same two slots, each with its own weight set
#[inline(always)]
unsafe fn block_3x3<U: ExecutionUnit, const R: usize, const X: usize>(
    slots: &[*const i32; 2],
    x0: usize,
    weights: &[&PairWeights<U::Vi32>; R],
) -> [[U::Vi32; X]; R] {
    unsafe {
        let f = U::LANES;
        let mut acc = [[U::zeros(); X]; R];
        for (p, slot) in slots.iter().enumerate() {
            for k in 0..X + 2 {
                let s = U::load_i32(slot.add((x0 + k) * f));
                for (acc, set) in acc.iter_mut().zip(weights.iter()) {
                    for (x, acc) in acc.iter_mut().enumerate() {
                        if k < x || k - x >= 3 {
                            continue;
                        }
                        *acc = U::madd(*acc, s, set[p][k - x]);
                    }
                }
            }
        }
        acc
    }
}

#[inline(always)]
unsafe fn row_3x3<U: ExecutionUnit, const R: usize>(
    slots: &[*const i32; 2],
    weights: &[&PairWeights<U::Vi32>; R],
    dst: &[*mut u8; R],
    channels: usize,
    dst_w: usize,
    stride_x: usize,
    c: usize,
    count: usize,
    bias: U::Vi32,
    norm: U::Vf32,
    dst_zero: U::Vi32,
) {
    unsafe {
        let mut dx = 0usize;
        if stride_x == 1 {
            while dx + 2 <= dst_w {
                let acc = block_3x3::<U, R, 2>(slots, dx, weights);
                store_columns::<U, R, 2>(&acc, dst, channels, dx, c, count, bias, norm, dst_zero);
                dx += 2;
            }
        }
        while dx < dst_w {
            let acc = block_3x3::<U, R, 1>(slots, dx * stride_x, weights);
            store_columns::<U, R, 1>(&acc, dst, channels, dx, c, count, bias, norm, dst_zero);
            dx += 1;
        }
    }
}

/// 3x3 kernel over a channel-blocked pair-packed ring.
///
/// Only the aligned pair (w0, w1) and the shifted pair (w1, w2) are loaded,
/// (w2, 0) and (0, w0) are derived from them with half shifts.
#[inline(always)]
pub(crate) unsafe fn convolve_paired_3x3<U: ExecutionUnit>(
    params: &KernelParams<'_, i32>,
    buf: &[i32],
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        let shape = params.shape;
        let layout = params.layout;
        let channels = shape.channels;
        let dst_w = shape.dst_w();
        let row_len = dst_w * channels;
        let f = U::LANES;
        let dst_zero = U::splat(dst_zero as i32);
        let buf = buf.as_ptr();
        let dst = dst.as_mut_ptr();
        let pairs = layout.pair_rows;
        debug_assert_eq!(pairs, 2);

        for cb in 0..layout.buf_c / f {
            let c = cb * f;
            let count = (channels - c).min(f);
            let bias = U::load_i32(params.bias.as_ptr().add(c));
            let norm = U::load_f32(params.norm.as_ptr().add(c));

            let first_pair = params.weights.as_ptr().add(cb * pairs * 3 * f);
            let second_pair = params
                .weights
                .as_ptr()
                .add(layout.weight_set_stride + (cb * pairs + 1) * 3 * f);
            let mut aligned: PairWeights<U::Vi32> = [[U::zeros(); 3]; 2];
            let mut shifted: PairWeights<U::Vi32> = [[U::zeros(); 3]; 2];
            for kx in 0..3 {
                aligned[0][kx] = U::load_i32(first_pair.add(kx * f));
                shifted[1][kx] = U::load_i32(second_pair.add(kx * f));
                aligned[1][kx] = U::shift_down(shifted[1][kx]);
                shifted[0][kx] = U::shift_up(aligned[0][kx]);
            }
            let block = cb * layout.buf_w * f;

            let mut dy = dy_beg;
            while dy < dy_end {
                let base = dy * shape.stride_y;
                let first = base & !1;
                let slots = [
                    buf.add(layout.slot(first) + block),
                    buf.add(layout.slot(first + 2) + block),
                ];
                let dst_row = dst.add((dy - dy_beg) * row_len);
                if base % 2 == 0 && shape.stride_y == 1 && dy + 1 < dy_end {
                    row_3x3::<U, 2>(
                        &slots,
                        &[&aligned, &shifted],
                        &[dst_row, dst_row.add(row_len)],
                        channels,
                        dst_w,
                        shape.stride_x,
                        c,
                        count,
                        bias,
                        norm,
                        dst_zero,
                    );
                    dy += 2;
                } else {
                    let set = if base % 2 == 0 { &aligned } else { &shifted };
                    row_3x3::<U, 1>(
                        &slots,
                        &[set],
                        &[dst_row],
                        channels,
                        dst_w,
                        shape.stride_x,
                        c,
                        count,
                        bias,
                        norm,
                        dst_zero,
                    );
                    dy += 1;
                }
            }
        }
    }
}
