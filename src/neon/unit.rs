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
use std::arch::aarch64::*;

/// 4 lanes of NEON
#[derive(Copy, Clone, Default)]
pub(crate) struct NeonUnit {}

impl ExecutionUnit for NeonUnit {
    const LANES: usize = 4;
    type Vi32 = int32x4_t;
    type Vf32 = float32x4_t;

    #[inline(always)]
    unsafe fn zeros() -> int32x4_t {
        unsafe { vdupq_n_s32(0) }
    }

    #[inline(always)]
    unsafe fn splat(v: i32) -> int32x4_t {
        unsafe { vdupq_n_s32(v) }
    }

    #[inline(always)]
    unsafe fn load_i32(ptr: *const i32) -> int32x4_t {
        unsafe { vld1q_s32(ptr) }
    }

    #[inline(always)]
    unsafe fn store_i32(ptr: *mut i32, v: int32x4_t) {
        unsafe { vst1q_s32(ptr, v) }
    }

    #[inline(always)]
    unsafe fn load_f32(ptr: *const f32) -> float32x4_t {
        unsafe { vld1q_f32(ptr) }
    }

    #[inline(always)]
    unsafe fn widen_u8(ptr: *const u8) -> int32x4_t {
        unsafe {
            let v = vreinterpret_u8_u32(vdup_n_u32((ptr as *const u32).read_unaligned()));
            let v16 = vmovl_u8(v);
            vreinterpretq_s32_u32(vmovl_u16(vget_low_u16(v16)))
        }
    }

    #[inline(always)]
    unsafe fn widen_i8(ptr: *const i8) -> int32x4_t {
        unsafe {
            let v = vreinterpret_s8_u32(vdup_n_u32((ptr as *const u32).read_unaligned()));
            let v16 = vmovl_s8(v);
            vmovl_s16(vget_low_s16(v16))
        }
    }

    #[inline(always)]
    unsafe fn madd(acc: int32x4_t, a: int32x4_t, b: int32x4_t) -> int32x4_t {
        unsafe {
            let a = vreinterpretq_s16_s32(a);
            let b = vreinterpretq_s16_s32(b);
            let lo = vmull_s16(vget_low_s16(a), vget_low_s16(b));
            let hi = vmull_high_s16(a, b);
            vaddq_s32(acc, vpaddq_s32(lo, hi))
        }
    }

    #[inline(always)]
    unsafe fn pack_pair(lo: int32x4_t, hi: int32x4_t) -> int32x4_t {
        unsafe { vsliq_n_s32::<16>(lo, hi) }
    }

    #[inline(always)]
    unsafe fn shift_up(v: int32x4_t) -> int32x4_t {
        unsafe { vshlq_n_s32::<16>(v) }
    }

    #[inline(always)]
    unsafe fn shift_down(v: int32x4_t) -> int32x4_t {
        unsafe { vreinterpretq_s32_u32(vshrq_n_u32::<16>(vreinterpretq_u32_s32(v))) }
    }

    #[inline(always)]
    unsafe fn store_u8(
        dst: *mut u8,
        sum: int32x4_t,
        bias: int32x4_t,
        norm: float32x4_t,
        zero: int32x4_t,
    ) {
        unsafe {
            let f = vmulq_f32(vcvtq_f32_s32(vqaddq_s32(sum, bias)), norm);
            // NEON saturates out of range conversions and maps NaN to zero,
            // x86 returns i32::MIN for both.
            let limit = vdupq_n_f32(2_147_483_648f32);
            let invalid = vorrq_u32(
                vcgeq_f32(vabsq_f32(f), limit),
                vmvnq_u32(vceqq_f32(f, f)),
            );
            let converted = vbslq_s32(invalid, vdupq_n_s32(i32::MIN), vcvtnq_s32_f32(f));
            let v = vaddq_s32(converted, zero);
            let v16 = vqmovun_s32(v);
            let v8 = vqmovn_u16(vcombine_u16(v16, v16));
            (dst as *mut u32).write_unaligned(vget_lane_u32::<0>(vreinterpret_u32_u8(v8)));
        }
    }
}
