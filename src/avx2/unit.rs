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
unsafe fn adds_epi32(a: __m256i, b: __m256i) -> __m256i {
    unsafe {
        let sum = _mm256_add_epi32(a, b);
        let overflow = _mm256_and_si256(_mm256_xor_si256(a, sum), _mm256_xor_si256(b, sum));
        let limit = _mm256_xor_si256(_mm256_srai_epi32::<31>(a), _mm256_set1_epi32(i32::MAX));
        _mm256_blendv_epi8(sum, limit, _mm256_srai_epi32::<31>(overflow))
    }
}

/// 8 lanes of AVX2
#[derive(Copy, Clone, Default)]
pub(crate) struct AvxUnit {}

impl ExecutionUnit for AvxUnit {
    const LANES: usize = 8;
    type Vi32 = __m256i;
    type Vf32 = __m256;

    #[inline(always)]
    unsafe fn zeros() -> __m256i {
        unsafe { _mm256_setzero_si256() }
    }

    #[inline(always)]
    unsafe fn splat(v: i32) -> __m256i {
        unsafe { _mm256_set1_epi32(v) }
    }

    #[inline(always)]
    unsafe fn load_i32(ptr: *const i32) -> __m256i {
        unsafe { _mm256_loadu_si256(ptr as *const __m256i) }
    }

    #[inline(always)]
    unsafe fn store_i32(ptr: *mut i32, v: __m256i) {
        unsafe { _mm256_storeu_si256(ptr as *mut __m256i, v) }
    }

    #[inline(always)]
    unsafe fn load_f32(ptr: *const f32) -> __m256 {
        unsafe { _mm256_loadu_ps(ptr) }
    }

    #[inline(always)]
    unsafe fn widen_u8(ptr: *const u8) -> __m256i {
        unsafe { _mm256_cvtepu8_epi32(_mm_loadl_epi64(ptr as *const __m128i)) }
    }

    #[inline(always)]
    unsafe fn widen_i8(ptr: *const i8) -> __m256i {
        unsafe { _mm256_cvtepi8_epi32(_mm_loadl_epi64(ptr as *const __m128i)) }
    }

    #[inline(always)]
    unsafe fn madd(acc: __m256i, a: __m256i, b: __m256i) -> __m256i {
        unsafe { _mm256_add_epi32(acc, _mm256_madd_epi16(a, b)) }
    }

    #[inline(always)]
    unsafe fn pack_pair(lo: __m256i, hi: __m256i) -> __m256i {
        unsafe { _mm256_blend_epi16::<0b10101010>(lo, _mm256_slli_epi32::<16>(hi)) }
    }

    #[inline(always)]
    unsafe fn shift_up(v: __m256i) -> __m256i {
        unsafe { _mm256_slli_epi32::<16>(v) }
    }

    #[inline(always)]
    unsafe fn shift_down(v: __m256i) -> __m256i {
        unsafe { _mm256_srli_epi32::<16>(v) }
    }

    #[inline(always)]
    unsafe fn store_u8(dst: *mut u8, sum: __m256i, bias: __m256i, norm: __m256, zero: __m256i) {
        unsafe {
            let f = _mm256_mul_ps(_mm256_cvtepi32_ps(adds_epi32(sum, bias)), norm);
            let v = _mm256_add_epi32(_mm256_cvtps_epi32(f), zero);
            let lo = _mm256_castsi256_si128(v);
            let hi = _mm256_extracti128_si256::<1>(v);
            let packed = _mm_packs_epi32(lo, hi);
            let bytes = _mm_packus_epi16(packed, packed);
            _mm_storel_epi64(dst as *mut __m128i, bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::assert_matches_scalar;

    #[target_feature(enable = "avx2")]
    unsafe fn check_avx2() {
        unsafe {
            assert_matches_scalar::<AvxUnit, 8>();
        }
    }

    #[test]
    fn agrees_with_scalar_unit() {
        if !std::arch::is_x86_feature_detected!("avx2") {
            return;
        }
        unsafe {
            check_avx2();
        }
    }
}
