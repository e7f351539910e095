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
use crate::conv_shape::ConvShape;
use crate::layout::LayoutParams;

/// Everything a kernel reads besides the tensors, borrowed from the
/// convolution object for one invocation
#[derive(Copy, Clone)]
pub(crate) struct KernelParams<'a, W> {
    pub(crate) shape: &'a ConvShape,
    pub(crate) layout: &'a LayoutParams,
    pub(crate) weights: &'a [W],
    /// Padded to `layout.buf_c`
    pub(crate) bias: &'a [i32],
    /// Padded to `layout.buf_c`
    pub(crate) norm: &'a [f32],
}

/// Convolves output rows `[dy_beg, dy_end)` straight from the source,
/// `dst` starts at row `dy_beg`
pub(crate) type DirectKernel =
    fn(&KernelParams<'_, i8>, &[u8], u8, &mut [u8], u8, usize, usize);

/// Writes logical rows `[by_beg, by_end)` into the ring buffer
pub(crate) type PreprocessKernel = fn(&KernelParams<'_, i32>, &[u8], u8, &mut [i32], usize, usize);

/// Convolves output rows `[dy_beg, dy_end)` from the ring buffer,
/// `dst` starts at row `dy_beg`
pub(crate) type ConvolveKernel = fn(&KernelParams<'_, i32>, &[i32], &mut [u8], u8, usize, usize);
