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
/// Widest supported vector, in i32 lanes
pub(crate) const MAX_LANES: usize = 16;

/// Vector operations the convolution kernels are written against.
///
/// All integer vectors hold `LANES` i32 lanes. `madd` treats every i32 lane as
/// two signed 16-bit halves and sums both products, so one call accumulates
/// either a single widened tap (upper halves are zero) or two packed kernel rows.
///
/// # Safety
///
/// Loads read exactly `LANES` elements from the pointer, stores write exactly
/// `LANES` elements. Callers must keep the pointers in bounds and only invoke
/// an implementation on a CPU supporting its instruction set.
pub(crate) trait ExecutionUnit: Copy {
    const LANES: usize;
    type Vi32: Copy;
    type Vf32: Copy;

    unsafe fn zeros() -> Self::Vi32;
    unsafe fn splat(v: i32) -> Self::Vi32;
    unsafe fn load_i32(ptr: *const i32) -> Self::Vi32;
    unsafe fn store_i32(ptr: *mut i32, v: Self::Vi32);
    unsafe fn load_f32(ptr: *const f32) -> Self::Vf32;
    /// Loads `LANES` bytes zero extended to i32
    unsafe fn widen_u8(ptr: *const u8) -> Self::Vi32;
    /// Loads `LANES` bytes sign extended to i32
    unsafe fn widen_i8(ptr: *const i8) -> Self::Vi32;
    /// `acc + lo(a) * lo(b) + hi(a) * hi(b)` per lane over 16-bit halves
    unsafe fn madd(acc: Self::Vi32, a: Self::Vi32, b: Self::Vi32) -> Self::Vi32;
    /// `lo & 0xffff | hi << 16`
    unsafe fn pack_pair(lo: Self::Vi32, hi: Self::Vi32) -> Self::Vi32;
    /// Moves the low half into the high one, zeroing the low half
    unsafe fn shift_up(v: Self::Vi32) -> Self::Vi32;
    /// Moves the high half into the low one, zeroing the high half
    unsafe fn shift_down(v: Self::Vi32) -> Self::Vi32;
    /// Requantizes `LANES` sums and stores them as bytes
    unsafe fn store_u8(
        dst: *mut u8,
        sum: Self::Vi32,
        bias: Self::Vi32,
        norm: Self::Vf32,
        zero: Self::Vi32,
    );

    #[inline(always)]
    unsafe fn widen_u8_part(ptr: *const u8, count: usize) -> Self::Vi32 {
        unsafe {
            debug_assert!(count <= Self::LANES);
            let mut tmp = [0u8; MAX_LANES];
            std::ptr::copy_nonoverlapping(ptr, tmp.as_mut_ptr(), count);
            Self::widen_u8(tmp.as_ptr())
        }
    }

    #[inline(always)]
    unsafe fn widen_i8_part(ptr: *const i8, count: usize) -> Self::Vi32 {
        unsafe {
            debug_assert!(count <= Self::LANES);
            let mut tmp = [0i8; MAX_LANES];
            std::ptr::copy_nonoverlapping(ptr, tmp.as_mut_ptr(), count);
            Self::widen_i8(tmp.as_ptr())
        }
    }

    /// Stores only the first `count` requantized lanes
    #[inline(always)]
    unsafe fn store_u8_part(
        dst: *mut u8,
        sum: Self::Vi32,
        bias: Self::Vi32,
        norm: Self::Vf32,
        zero: Self::Vi32,
        count: usize,
    ) {
        unsafe {
            if count == Self::LANES {
                Self::store_u8(dst, sum, bias, norm, zero);
                return;
            }
            debug_assert!(count < Self::LANES);
            let mut tmp = [0u8; MAX_LANES];
            Self::store_u8(tmp.as_mut_ptr(), sum, bias, norm, zero);
            std::ptr::copy_nonoverlapping(tmp.as_ptr(), dst, count);
        }
    }

    /// Loads widened pixels, reading only `count` bytes when short of a full vector
    #[inline(always)]
    unsafe fn widen_u8_n(ptr: *const u8, count: usize) -> Self::Vi32 {
        unsafe {
            if count >= Self::LANES {
                Self::widen_u8(ptr)
            } else {
                Self::widen_u8_part(ptr, count)
            }
        }
    }

    #[inline(always)]
    unsafe fn widen_i8_n(ptr: *const i8, count: usize) -> Self::Vi32 {
        unsafe {
            if count >= Self::LANES {
                Self::widen_i8(ptr)
            } else {
                Self::widen_i8_part(ptr, count)
            }
        }
    }
}
