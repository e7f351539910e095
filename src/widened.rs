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

/// Generic kernel over i32 widened rows, one ring row per kernel row
#[inline(always)]
pub(crate) unsafe fn convolve_widened<U: ExecutionUnit, const BLOCKED: bool>(
    params: &KernelParams<'_, i32>,
    buf: &[i32],
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        let shape = params.shape;
        let row_len = shape.dst_w() * shape.channels;
        let dst_zero = U::splat(dst_zero as i32);
        for dy in dy_beg..dy_end {
            let taps = TapRows::<1> {
                first: dy * shape.stride_y,
                step: 1,
                count: shape.kernel_y,
                weight_rows: shape.kernel_y,
                weights: [0],
            };
            let dst_row = [dst.as_mut_ptr().add((dy - dy_beg) * row_len)];
            if BLOCKED {
                convolve_rows_r1::<U, 1>(params, buf.as_ptr(), &taps, &dst_row, dst_zero);
            } else {
                convolve_rows_r0::<U, 1>(params, buf.as_ptr(), &taps, &dst_row, dst_zero);
            }
        }
    }
}

/// `R` output rows over `R + 2` ring rows and `X` columns over `X + 2` ring
/// columns starting at `x0`. Several columns need unit horizontal stride.
#[inline(always)]
unsafe fn block_3x3<U: ExecutionUnit, const R: usize, const X: usize>(
    rows: &[*const i32; 4],
    x0: usize,
    weights: &[U::Vi32; 9],
) -> [[U::Vi32; X]; R] {
    unsafe {
        let f = U::LANES;
        let mut acc = [[U::zeros(); X]; R];
        for (sr, row) in rows.iter().enumerate().take(R + 2) {
            for k in 0..X + 2 {
                let s = U::load_i32(row.add((x0 + k) * f));
                for (r, acc) in acc.iter_mut().enumerate() {
                    if sr < r || sr - r >= 3 {
                        continue;
                    }
                    let ky = sr - r;
                    for (x, acc) in acc.iter_mut().enumerate() {
                        if k < x || k - x >= 3 {
                            continue;
                        }
                        *acc = U::madd(*acc, s, weights[ky * 3 + k - x]);
                    }
                }
            }
        }
        acc
    }
}

#[inline(always)]
unsafe fn row_3x3<U: ExecutionUnit, const R: usize>(
    rows: &[*const i32; 4],
    weights: &[U::Vi32; 9],
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
                let acc = block_3x3::<U, R, 2>(rows, dx, weights);
                store_columns::<U, R, 2>(&acc, dst, channels, dx, c, count, bias, norm, dst_zero);
                dx += 2;
            }
        }
        while dx < dst_w {
            let acc = block_3x3::<U, R, 1>(rows, dx * stride_x, weights);
            store_columns::<U, R, 1>(&acc, dst, channels, dx, c, count, bias, norm, dst_zero);
            dx += 1;
        }
    }
}

/// 3x3 kernel over a channel-blocked ring with all nine taps held in registers.
/// Unit vertical stride computes two output rows from four ring rows.
#[inline(always)]
pub(crate) unsafe fn convolve_widened_3x3<U: ExecutionUnit>(
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

        for cb in 0..layout.buf_c / f {
            let c = cb * f;
            let count = (channels - c).min(f);
            let bias = U::load_i32(params.bias.as_ptr().add(c));
            let norm = U::load_f32(params.norm.as_ptr().add(c));
            let mut weights = [U::zeros(); 9];
            for (k, w) in weights.iter_mut().enumerate() {
                *w = U::load_i32(params.weights.as_ptr().add((cb * 9 + k) * f));
            }
            let block = cb * layout.buf_w * f;

            let mut dy = dy_beg;
            while dy < dy_end {
                let base = dy * shape.stride_y;
                let rows = [
                    buf.add(layout.slot(base) + block),
                    buf.add(layout.slot(base + 1) + block),
                    buf.add(layout.slot(base + 2) + block),
                    buf.add(layout.slot(base + 3) + block),
                ];
                let dst_row = dst.add((dy - dy_beg) * row_len);
                if shape.stride_y == 1 && dy + 1 < dy_end {
                    row_3x3::<U, 2>(
                        &rows,
                        &weights,
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
                    row_3x3::<U, 1>(
                        &rows,
                        &weights,
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
