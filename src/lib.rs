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
#![deny(deprecated)]
#![allow(clippy::too_many_arguments)]
//! 8-bit quantized depthwise 2D convolution over NHWC tensors.
//!
//! Three strategies trade memory bandwidth for multiply-accumulate throughput:
//! direct convolution from the source, a ring of source rows widened to i32,
//! and a ring of source row pairs packed into 16-bit halves so one multiply-add
//! covers two kernel rows. Each has an unrolled path for 3x3 kernels without
//! dilation. Kernels are generic over a vector execution unit implemented for
//! SSE4.1, AVX2, NEON and a portable fallback.

#[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "avx"))]
mod avx2;
mod buffered;
mod conv_shape;
mod convolution;
mod depthwise_error;
mod direct;
mod dispatch;
mod execution_unit;
mod kernel_params;
mod layout;
#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
mod neon;
mod options;
mod paired;
mod preprocess;
mod requantize;
#[cfg(test)]
mod reference;
mod ring_buffer;
mod scalar;
#[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "sse"))]
mod sse;
mod threading_policy;
mod variant;
mod weights;
mod widened;

pub use conv_shape::{ConvShape, MAX_KERNEL_AREA, TensorType};
pub use convolution::DepthwiseConvolution;
pub use depthwise_error::{DepthwiseBufferMismatch, DepthwiseError};
pub use layout::LayoutParams;
pub use options::{ComputeBackend, DepthwiseAlgorithm, DepthwiseOptions, ReorderType};
pub use requantize::requantize;
pub use ring_buffer::RowRingBuffer;
pub use threading_policy::ThreadingPolicy;
pub use variant::DepthwiseVariant;
