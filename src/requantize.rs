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
/// Converts `f32` to `i32` with round-half-even, out of range and NaN values
/// become `i32::MIN` as `cvtps2dq` does.
#[inline(always)]
pub(crate) fn cvt_nearest_i32(v: f32) -> i32 {
    let rounded = v.round_ties_even();
    if (-2_147_483_648f32..2_147_483_648f32).contains(&rounded) {
        rounded as i32
    } else {
        i32::MIN
    }
}

/// Scales an i32 accumulator back into the u8 destination domain.
///
/// `(sum + bias) * scale` is rounded half to even, shifted by `dst_zero` and
/// saturated to `[0, 255]`. The bias is added with i32 saturation.
/// Every backend reproduces this bit for bit.
#[inline]
pub fn requantize(sum: i32, bias: i32, scale: f32, dst_zero: i32) -> u8 {
    let v = cvt_nearest_i32(sum.saturating_add(bias) as f32 * scale);
    v.wrapping_add(dst_zero).clamp(0, 255) as u8
}
