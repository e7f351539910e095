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
use std::ops::Range;

/// `B` channel vectors of one output pixel with per-tap bounds checks.
/// The last vector covers only `last` channels.
#[inline(always)]
unsafe fn direct_pixel_block<U: ExecutionUnit, const B: usize>(
    params: &KernelParams<'_, i8>,
    src: *const u8,
    src_zero: U::Vi32,
    dst_zero: U::Vi32,
    dy: usize,
    dx: usize,
    c: usize,
    last: usize,
    dst: *mut u8,
) {
    unsafe {
        let shape = params.shape;
        let channels = shape.channels;
        let f = U::LANES;
        let mut acc = [U::zeros(); B];

        for ky in 0..shape.kernel_y {
            let sy = (dy * shape.stride_y + ky * shape.dilation_y).wrapping_sub(shape.pad_top);
            for kx in 0..shape.kernel_x {
                let sx =
                    (dx * shape.stride_x + kx * shape.dilation_x).wrapping_sub(shape.pad_left);
                let w_ptr = params
                    .weights
                    .as_ptr()
                    .add((ky * shape.kernel_x + kx) * channels + c);
                if sy < shape.src_h && sx < shape.src_w {
                    let s_ptr = src.add((sy * shape.src_w + sx) * channels + c);
                    for (b, acc) in acc.iter_mut().enumerate() {
                        let count = if b + 1 == B { last } else { f };
                        let w = U::widen_i8_n(w_ptr.add(b * f), count);
                        let s = U::widen_u8_n(s_ptr.add(b * f), count);
                        *acc = U::madd(*acc, s, w);
                    }
                } else {
                    for (b, acc) in acc.iter_mut().enumerate() {
                        let count = if b + 1 == B { last } else { f };
                        let w = U::widen_i8_n(w_ptr.add(b * f), count);
                        *acc = U::madd(*acc, src_zero, w);
                    }
                }
            }
        }

        for (b, acc) in acc.iter().enumerate() {
            let count = if b + 1 == B { last } else { f };
            let cb = c + b * f;
            let bias = U::load_i32(params.bias.as_ptr().add(cb));
            let norm = U::load_f32(params.norm.as_ptr().add(cb));
            U::store_u8_part(dst.add(cb), *acc, bias, norm, dst_zero, count);
        }
    }
}

/// Boundary checked output pixel, channel groups of 4, 2 and 1 vectors
#[inline(always)]
unsafe fn direct_pixel<U: ExecutionUnit>(
    params: &KernelParams<'_, i8>,
    src: *const u8,
    src_zero: U::Vi32,
    dst_zero: U::Vi32,
    dy: usize,
    dx: usize,
    dst: *mut u8,
) {
    unsafe {
        let channels = params.shape.channels;
        let f = U::LANES;
        let mut c = 0usize;
        while c + 4 * f <= channels {
            direct_pixel_block::<U, 4>(params, src, src_zero, dst_zero, dy, dx, c, f, dst);
            c += 4 * f;
        }
        if c + 2 * f <= channels {
            direct_pixel_block::<U, 2>(params, src, src_zero, dst_zero, dy, dx, c, f, dst);
            c += 2 * f;
        }
        while c < channels {
            let last = (channels - c).min(f);
            direct_pixel_block::<U, 1>(params, src, src_zero, dst_zero, dy, dx, c, last, dst);
            c += f;
        }
    }
}

/// `X` horizontally adjacent 3x3 outputs whose receptive fields lie inside
/// the source. Each weight load feeds every column.
#[inline(always)]
unsafe fn direct_3x3_main<U: ExecutionUnit, const X: usize>(
    params: &KernelParams<'_, i8>,
    src: *const u8,
    dst_zero: U::Vi32,
    dy: usize,
    dx: usize,
    dst: *mut u8,
) {
    unsafe {
        let shape = params.shape;
        let channels = shape.channels;
        let f = U::LANES;
        let sy = dy * shape.stride_y - shape.pad_top;
        let sx = dx * shape.stride_x - shape.pad_left;
        let src_row = src.add((sy * shape.src_w + sx) * channels);
        let column_step = shape.stride_x * channels;
        let row_step = shape.src_w * channels;

        let mut c = 0usize;
        while c < channels {
            let count = (channels - c).min(f);
            let mut acc = [U::zeros(); X];
            for ky in 0..3 {
                for kx in 0..3 {
                    let w = U::widen_i8_n(
                        params.weights.as_ptr().add((ky * 3 + kx) * channels + c),
                        count,
                    );
                    let s_ptr = src_row.add(ky * row_step + kx * channels + c);
                    for (x, acc) in acc.iter_mut().enumerate() {
                        let s = U::widen_u8_n(s_ptr.add(x * column_step), count);
                        *acc = U::madd(*acc, s, w);
                    }
                }
            }
            let bias = U::load_i32(params.bias.as_ptr().add(c));
            let norm = U::load_f32(params.norm.as_ptr().add(c));
            for (x, acc) in acc.iter().enumerate() {
                U::store_u8_part(dst.add(x * channels + c), *acc, bias, norm, dst_zero, count);
            }
            c += f;
        }
    }
}

/// Output positions along one axis whose 3-tap receptive field avoids padding
#[inline]
pub(crate) fn interior_range(src: usize, pad: usize, stride: usize, dst: usize) -> Range<usize> {
    let beg = pad.div_ceil(stride).min(dst);
    let end = if src + pad >= 3 {
        ((src + pad - 3) / stride + 1).min(dst)
    } else {
        0
    };
    beg..end.max(beg)
}

#[inline(always)]
pub(crate) unsafe fn depthwise_direct<U: ExecutionUnit, const FAST: bool>(
    params: &KernelParams<'_, i8>,
    src: &[u8],
    src_zero: u8,
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        let shape = params.shape;
        let channels = shape.channels;
        let dst_w = shape.dst_w();
        let dst_row_len = dst_w * channels;
        debug_assert!(dst.len() >= (dy_end - dy_beg) * dst_row_len);
        debug_assert!(src.len() >= shape.src_len());

        let src_zero_v = U::splat(src_zero as i32);
        let dst_zero_v = U::splat(dst_zero as i32);
        let src_ptr = src.as_ptr();

        let (rows_inside, cols_inside) = if FAST {
            (
                interior_range(shape.src_h, shape.pad_top, shape.stride_y, shape.dst_h()),
                interior_range(shape.src_w, shape.pad_left, shape.stride_x, dst_w),
            )
        } else {
            (0..0, 0..0)
        };

        for dy in dy_beg..dy_end {
            let dst_row = dst.as_mut_ptr().add((dy - dy_beg) * dst_row_len);
            if !rows_inside.contains(&dy) {
                for dx in 0..dst_w {
                    direct_pixel::<U>(
                        params,
                        src_ptr,
                        src_zero_v,
                        dst_zero_v,
                        dy,
                        dx,
                        dst_row.add(dx * channels),
                    );
                }
                continue;
            }
            for dx in 0..cols_inside.start {
                direct_pixel::<U>(
                    params,
                    src_ptr,
                    src_zero_v,
                    dst_zero_v,
                    dy,
                    dx,
                    dst_row.add(dx * channels),
                );
            }
            let mut dx = cols_inside.start;
            while dx + 2 <= cols_inside.end {
                direct_3x3_main::<U, 2>(params, src_ptr, dst_zero_v, dy, dx, dst_row.add(dx * channels));
                dx += 2;
            }
            if dx < cols_inside.end {
                direct_3x3_main::<U, 1>(params, src_ptr, dst_zero_v, dy, dx, dst_row.add(dx * channels));
            }
            for dx in cols_inside.end..dst_w {
                direct_pixel::<U>(
                    params,
                    src_ptr,
                    src_zero_v,
                    dst_zero_v,
                    dy,
                    dx,
                    dst_row.add(dx * channels),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_excludes_padded_outputs() {
        // src 5, pad 1: outputs 1..=3 read rows 0..=4
        assert_eq!(interior_range(5, 1, 1, 5), 1..4);
        // pad 2 on a 5 pixel source, 7 outputs
        assert_eq!(interior_range(5, 2, 1, 7), 2..5);
        // stride 2, pad 1, src 8 -> dst 4, outputs 1..=3
        assert_eq!(interior_range(8, 1, 2, 4), 1..4);
        // everything padded
        assert_eq!(interior_range(2, 2, 1, 4), 2..2);
        assert_eq!(interior_range(1, 1, 1, 1), 1..1);
    }
}
