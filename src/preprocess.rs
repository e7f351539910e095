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

/// Offset of pixel `x`, channel `c` inside one ring row
#[inline(always)]
pub(crate) fn pixel_offset<const BLOCKED: bool>(
    x: usize,
    c: usize,
    lanes: usize,
    buf_w: usize,
    buf_c: usize,
) -> usize {
    if BLOCKED {
        (c / lanes) * buf_w * lanes + x * lanes
    } else {
        x * buf_c + c
    }
}

/// Source pixel `sx` of row `sy` widened to i32, or the zero point outside
#[inline(always)]
unsafe fn fetch<U: ExecutionUnit>(
    src: *const u8,
    sy: usize,
    sx: usize,
    c: usize,
    src_h: usize,
    src_w: usize,
    channels: usize,
    zero: U::Vi32,
) -> U::Vi32 {
    unsafe {
        if sy < src_h && sx < src_w {
            U::widen_u8_n(src.add((sy * src_w + sx) * channels + c), channels - c)
        } else {
            zero
        }
    }
}

/// Widens logical rows `[by_beg, by_end)` into i32 ring rows, padding and
/// rows outside the source hold the source zero point
#[inline(always)]
pub(crate) unsafe fn preprocess_widened<U: ExecutionUnit, const BLOCKED: bool>(
    params: &KernelParams<'_, i32>,
    src: &[u8],
    src_zero: u8,
    buf: &mut [i32],
    by_beg: usize,
    by_end: usize,
) {
    unsafe {
        let shape = params.shape;
        let layout = params.layout;
        let f = U::LANES;
        let zero = U::splat(src_zero as i32);
        debug_assert!(buf.len() >= layout.ring_len());

        for by in by_beg..by_end {
            let row = buf.as_mut_ptr().add(layout.slot(by));
            let sy = by.wrapping_sub(shape.pad_top);
            if sy >= shape.src_h {
                for i in (0..layout.row_stride).step_by(f) {
                    U::store_i32(row.add(i), zero);
                }
                continue;
            }
            for x in 0..layout.buf_w {
                let sx = x.wrapping_sub(shape.pad_left);
                for c in (0..layout.buf_c).step_by(f) {
                    let v = fetch::<U>(
                        src.as_ptr(),
                        sy,
                        sx,
                        c,
                        shape.src_h,
                        shape.src_w,
                        shape.channels,
                        zero,
                    );
                    let offset = pixel_offset::<BLOCKED>(x, c, f, layout.buf_w, layout.buf_c);
                    U::store_i32(row.add(offset), v);
                }
            }
        }
    }
}

/// Packs each even logical row `by` of `[by_beg, by_end)` together with `by + 1`
/// into the low and high halves of one ring row
#[inline(always)]
pub(crate) unsafe fn preprocess_paired<U: ExecutionUnit, const BLOCKED: bool>(
    params: &KernelParams<'_, i32>,
    src: &[u8],
    src_zero: u8,
    buf: &mut [i32],
    by_beg: usize,
    by_end: usize,
) {
    unsafe {
        let shape = params.shape;
        let layout = params.layout;
        let f = U::LANES;
        let zero = U::splat(src_zero as i32);
        debug_assert!(by_beg % 2 == 0 && by_end % 2 == 0);
        debug_assert!(buf.len() >= layout.ring_len());

        for by in (by_beg..by_end).step_by(2) {
            let row = buf.as_mut_ptr().add(layout.slot(by));
            let sy0 = by.wrapping_sub(shape.pad_top);
            let sy1 = (by + 1).wrapping_sub(shape.pad_top);
            if sy0 >= shape.src_h && sy1 >= shape.src_h {
                let both = U::pack_pair(zero, zero);
                for i in (0..layout.row_stride).step_by(f) {
                    U::store_i32(row.add(i), both);
                }
                continue;
            }
            for x in 0..layout.buf_w {
                let sx = x.wrapping_sub(shape.pad_left);
                for c in (0..layout.buf_c).step_by(f) {
                    let s0 = fetch::<U>(
                        src.as_ptr(),
                        sy0,
                        sx,
                        c,
                        shape.src_h,
                        shape.src_w,
                        shape.channels,
                        zero,
                    );
                    let s1 = fetch::<U>(
                        src.as_ptr(),
                        sy1,
                        sx,
                        c,
                        shape.src_h,
                        shape.src_w,
                        shape.channels,
                        zero,
                    );
                    let offset = pixel_offset::<BLOCKED>(x, c, f, layout.buf_w, layout.buf_c);
                    U::store_i32(row.add(offset), U::pack_pair(s0, s1));
                }
            }
        }
    }
}
