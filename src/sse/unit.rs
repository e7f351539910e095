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
#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Saturating i32 add, lanes that overflow take the limit of the sign of `a`
#[inline(always)]
unsafe fn adds_epi32(a: __m128i, b: __m128i) -> __m128i {
    unsafe {
        let sum = _mm_add_epi32(a, b);
        let overflow = _mm_and_si128(_mm_xor_si128(a, sum), _mm_xor_si128(b, sum));
        let limit = _mm_xor_si128(_mm_srai_epi32::<31>(a), _mm_set1_epi32(i32::MAX));
        _mm_blendv_epi8(sum, limit, _mm_srai_epi32::<31>(overflow))
    }
}

/// 4 lanes of SSE4.1
#[derive(Copy, Clone, Default)]
pub(crate) struct SseUnit {}

impl ExecutionUnit for SseUnit {
    const LANES: usize = 4;
    type Vi32 = __m128i;
    type Vf32 = __m128;

    #[inline(always)]
    unsafe fn zeros() -> __m128i {
        unsafe { _mm_setzero_si128() }
    }

    #[inline(always)]
    unsafe fn splat(v: i32) -> __m128i {
        unsafe { _mm_set1_epi32(v) }
    }

    #[inline(always)]
    unsafe fn load_i32(ptr: *const i32) -> __m128i {
        unsafe { _mm_loadu_si128(ptr as *const __m128i) }
    }

    #[inline(always)]
    unsafe fn store_i32(ptr: *mut i32, v: __m128i) {
        unsafe { _mm_storeu_si128(ptr as *mut __m128i, v) }
    }

    #[inline(always)]
    unsafe fn load_f32(ptr: *const f32) -> __m128 {
        unsafe { _mm_loadu_ps(ptr) }
    }

    #[inline(always)]
    unsafe fn widen_u8(ptr: *const u8) -> __m128i {
        unsafe {
            let v = _mm_cvtsi32_si128((ptr as *const i32).read_unaligned());
            _mm_cvtepu8_epi32(v)
        }
    }

    #[inline(always)]
    unsafe fn widen_i8(ptr: *const i8) -> __m128i {
        unsafe {
            let v = _mm_cvtsi32_si128((ptr as *const i32).read_unaligned());
            _mm_cvtepi8_epi32(v)
        }
    }

    #[inline(always)]
    unsafe fn madd(acc: __m128i, a: __m128i, b: __m128i) -> __m128i {
        unsafe { _mm_add_epi32(acc, _mm_madd_epi16(a, b)) }
    }

    #[inline(always)]
    unsafe fn pack_pair(lo: __m128i, hi: __m128i) -> __m128i {
        unsafe { _mm_blend_epi16::<0b10101010>(lo, _mm_slli_epi32::<16>(hi)) }
    }

    #[inline(always)]
    unsafe fn shift_up(v: __m128i) -> __m128i {
        unsafe { _mm_slli_epi32::<16>(v) }
    }

    #[inline(always)]
    unsafe fn shift_down(v: __m128i) -> __m128i {
        unsafe { _mm_srli_epi32::<16>(v) }
    }

    #[inline(always)]
    unsafe fn store_u8(dst: *mut u8, sum: __m128i, bias: __m128i, norm: __m128, zero: __m128i) {
        unsafe {
            let f = _mm_mul_ps(_mm_cvtepi32_ps(adds_epi32(sum, bias)), norm);
            let v = _mm_add_epi32(_mm_cvtps_epi32(f), zero);
            let packed = _mm_packus_epi16(_mm_packs_epi32(v, v), _mm_setzero_si128());
            (dst as *mut i32).write_unaligned(_mm_cvtsi128_si32(packed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::assert_matches_scalar;

    #[target_feature(enable = "sse4.1")]
    unsafe fn check_sse41() {
        unsafe {
            assert_matches_scalar::<SseUnit, 4>();
        }
    }

    #[test]
    fn agrees_with_scalar_unit() {
        if !std::arch::is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            check_sse41();
        }
    }
}
