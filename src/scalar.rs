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
use crate::requantize::cvt_nearest_i32;
use num_traits::AsPrimitive;

/// Portable execution unit emulating an `N` lane vector machine
#[derive(Copy, Clone, Default)]
pub(crate) struct ScalarUnit<const N: usize> {}

#[inline(always)]
unsafe fn widen<T: AsPrimitive<i32>, const N: usize>(ptr: *const T) -> [i32; N] {
    let mut v = [0i32; N];
    for (i, dst) in v.iter_mut().enumerate() {
        *dst = unsafe { ptr.add(i).read_unaligned() }.as_();
    }
    v
}

#[inline(always)]
fn lo16(v: i32) -> i32 {
    v as i16 as i32
}

#[inline(always)]
fn hi16(v: i32) -> i32 {
    (v >> 16) as i16 as i32
}

impl<const N: usize> ExecutionUnit for ScalarUnit<N> {
    const LANES: usize = N;
    type Vi32 = [i32; N];
    type Vf32 = [f32; N];

    #[inline(always)]
    unsafe fn zeros() -> [i32; N] {
        [0; N]
    }

    #[inline(always)]
    unsafe fn splat(v: i32) -> [i32; N] {
        [v; N]
    }

    #[inline(always)]
    unsafe fn load_i32(ptr: *const i32) -> [i32; N] {
        unsafe { widen::<i32, N>(ptr) }
    }

    #[inline(always)]
    unsafe fn store_i32(ptr: *mut i32, v: [i32; N]) {
        unsafe {
            std::ptr::copy_nonoverlapping(v.as_ptr(), ptr, N);
        }
    }

    #[inline(always)]
    unsafe fn load_f32(ptr: *const f32) -> [f32; N] {
        let mut v = [0f32; N];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr, v.as_mut_ptr(), N);
        }
        v
    }

    #[inline(always)]
    unsafe fn widen_u8(ptr: *const u8) -> [i32; N] {
        unsafe { widen::<u8, N>(ptr) }
    }

    #[inline(always)]
    unsafe fn widen_i8(ptr: *const i8) -> [i32; N] {
        unsafe { widen::<i8, N>(ptr) }
    }

    #[inline(always)]
    unsafe fn madd(acc: [i32; N], a: [i32; N], b: [i32; N]) -> [i32; N] {
        let mut v = acc;
        for i in 0..N {
            let lo = lo16(a[i]).wrapping_mul(lo16(b[i]));
            let hi = hi16(a[i]).wrapping_mul(hi16(b[i]));
            v[i] = v[i].wrapping_add(lo.wrapping_add(hi));
        }
        v
    }

    #[inline(always)]
    unsafe fn pack_pair(lo: [i32; N], hi: [i32; N]) -> [i32; N] {
        let mut v = [0i32; N];
        for i in 0..N {
            v[i] = (lo[i] & 0xffff) | (hi[i] << 16);
        }
        v
    }

    #[inline(always)]
    unsafe fn shift_up(v: [i32; N]) -> [i32; N] {
        v.map(|x| x << 16)
    }

    #[inline(always)]
    unsafe fn shift_down(v: [i32; N]) -> [i32; N] {
        v.map(|x| ((x as u32) >> 16) as i32)
    }

    #[inline(always)]
    unsafe fn store_u8(dst: *mut u8, sum: [i32; N], bias: [i32; N], norm: [f32; N], zero: [i32; N]) {
        for i in 0..N {
            let v = cvt_nearest_i32(sum[i].saturating_add(bias[i]) as f32 * norm[i]);
            let v = v.wrapping_add(zero[i]).clamp(0, 255) as u8;
            unsafe {
                dst.add(i).write(v);
            }
        }
    }
}

/// Runs every unit operation on `U` and on the `N` lane scalar unit and
/// asserts both agree lane for lane.
#[cfg(test)]
#[inline(always)]
pub(crate) unsafe fn assert_matches_scalar<U: ExecutionUnit, const N: usize>() {
    unsafe {
        assert_eq!(U::LANES, N);
        let a: [i32; N] = std::array::from_fn(|i| (i as i32 * 37 - 100) * 311);
        let b: [i32; N] = std::array::from_fn(|i| (i as i32 * -53 + 17) * 977);
        let lo: [i32; N] = std::array::from_fn(|i| (i * 29 % 256) as i32);
        let hi: [i32; N] = std::array::from_fn(|i| i as i32 * 13 - 128);
        let mut out = [0i32; N];

        let va = U::load_i32(a.as_ptr());
        let vb = U::load_i32(b.as_ptr());
        U::store_i32(out.as_mut_ptr(), U::madd(U::splat(-7), va, vb));
        assert_eq!(out, ScalarUnit::<N>::madd([-7; N], a, b));
        // both halves at i16::MIN make the pair sum wrap
        let extreme = U::splat(i32::MIN | 0x8000);
        U::store_i32(out.as_mut_ptr(), U::madd(U::zeros(), extreme, extreme));
        assert_eq!(out, ScalarUnit::<N>::madd([0; N], [i32::MIN | 0x8000; N], [i32::MIN | 0x8000; N]));

        let packed = U::pack_pair(U::load_i32(lo.as_ptr()), U::load_i32(hi.as_ptr()));
        U::store_i32(out.as_mut_ptr(), packed);
        let packed_scalar = ScalarUnit::<N>::pack_pair(lo, hi);
        assert_eq!(out, packed_scalar);
        U::store_i32(out.as_mut_ptr(), U::shift_up(packed));
        assert_eq!(out, ScalarUnit::<N>::shift_up(packed_scalar));
        U::store_i32(out.as_mut_ptr(), U::shift_down(packed));
        assert_eq!(out, ScalarUnit::<N>::shift_down(packed_scalar));

        let bytes: [u8; 16] = std::array::from_fn(|i| (i * 67 + 5) as u8);
        U::store_i32(out.as_mut_ptr(), U::widen_u8(bytes.as_ptr()));
        assert_eq!(out, ScalarUnit::<N>::widen_u8(bytes.as_ptr()));
        U::store_i32(out.as_mut_ptr(), U::widen_i8(bytes.as_ptr() as *const i8));
        assert_eq!(out, ScalarUnit::<N>::widen_i8(bytes.as_ptr() as *const i8));

        let sums: [i32; N] = std::array::from_fn(|i| match i % 4 {
            0 => i32::MIN + 5,
            1 => i32::MAX - 3,
            2 => i as i32 * 1000 - 4000,
            _ => -(i as i32) * 77,
        });
        let bias: [i32; N] = std::array::from_fn(|i| match i % 4 {
            0 => -2000,
            1 => 2000,
            _ => i as i32 - 3,
        });
        let norm: [f32; N] = std::array::from_fn(|i| match i % 4 {
            0 | 1 => 1.0e-7,
            2 => 0.0625,
            _ => 1.0e10,
        });
        let zero = [37i32; N];
        let mut expected = [0u8; 16];
        let mut actual = [0u8; 16];
        ScalarUnit::<N>::store_u8(expected.as_mut_ptr(), sums, bias, norm, zero);
        U::store_u8(
            actual.as_mut_ptr(),
            U::load_i32(sums.as_ptr()),
            U::load_i32(bias.as_ptr()),
            U::load_f32(norm.as_ptr()),
            U::splat(37),
        );
        assert_eq!(actual[..N], expected[..N]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requantize::requantize;

    type Unit = ScalarUnit<4>;

    #[test]
    fn madd_sums_both_halves() {
        unsafe {
            let a = Unit::pack_pair([1, 2, 255, 0], [3, 4, 255, 7]);
            let b = Unit::pack_pair([-1, 5, -128, 9], [2, -3, 127, -2]);
            let r = Unit::madd(Unit::splat(10), a, b);
            assert_eq!(r, [10 - 1 + 6, 10 + 10 - 12, 10 - 255 * 128 + 255 * 127, 10 - 14]);
        }
    }

    #[test]
    fn shifts_move_halves() {
        unsafe {
            let pair = Unit::pack_pair([-5, 1, 2, 3], [7, -1, 0, 9]);
            let up = Unit::shift_up(pair);
            let down = Unit::shift_down(pair);
            let probe = Unit::pack_pair([1, 1, 1, 1], [1, 1, 1, 1]);
            // up = (0, lo), down = (hi, 0)
            assert_eq!(Unit::madd(Unit::zeros(), up, probe), [-5, 1, 2, 3]);
            assert_eq!(Unit::madd(Unit::zeros(), down, probe), [7, -1, 0, 9]);
        }
    }

    #[test]
    fn saturates_bias_before_scaling() {
        unsafe {
            let mut dst = [0u8; 4];
            Unit::store_u8(
                dst.as_mut_ptr(),
                [i32::MIN + 5, i32::MAX - 3, 0, 0],
                [-2000, 2000, 0, 0],
                [1.0e-7, 1.0e-7, 1.0, 1.0],
                [37, 37, 0, 0],
            );
            // wrapping would flip both signs
            assert_eq!(dst[..2], [37 - 215, 37 + 215].map(|x: i32| x.clamp(0, 255) as u8));
        }
    }

    #[test]
    fn partial_load_and_store() {
        unsafe {
            let src = [200u8, 3, 9];
            let v = Unit::widen_u8_part(src.as_ptr(), 3);
            assert_eq!(v, [200, 3, 9, 0]);
            let w = [-3i8, 4];
            assert_eq!(Unit::widen_i8_part(w.as_ptr(), 2), [-3, 4, 0, 0]);

            let mut dst = [77u8; 4];
            Unit::store_u8_part(
                dst.as_mut_ptr(),
                [10, 20, 30, 40],
                [1, 1, 1, 1],
                [0.5, 0.5, 0.5, 0.5],
                [2, 2, 2, 2],
                2,
            );
            assert_eq!(dst, [requantize(10, 1, 0.5, 2), requantize(20, 1, 0.5, 2), 77, 77]);
        }
    }
}
