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
use crate::buffered::{depthwise_convolve, depthwise_preprocess};
use crate::direct::depthwise_direct;
use crate::kernel_params::KernelParams;
use crate::neon::unit::NeonUnit;

pub(crate) fn depthwise_direct_neon<const FAST: bool>(
    params: &KernelParams<'_, i8>,
    src: &[u8],
    src_zero: u8,
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        depthwise_direct::<NeonUnit, FAST>(params, src, src_zero, dst, dst_zero, dy_beg, dy_end);
    }
}

pub(crate) fn depthwise_preprocess_neon<const KIND: u8>(
    params: &KernelParams<'_, i32>,
    src: &[u8],
    src_zero: u8,
    buf: &mut [i32],
    by_beg: usize,
    by_end: usize,
) {
    unsafe {
        depthwise_preprocess::<NeonUnit, KIND>(params, src, src_zero, buf, by_beg, by_end);
    }
}

pub(crate) fn depthwise_convolve_neon<const KIND: u8>(
    params: &KernelParams<'_, i32>,
    buf: &[i32],
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        depthwise_convolve::<NeonUnit, KIND>(params, buf, dst, dst_zero, dy_beg, dy_end);
    }
}
