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
#[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "avx"))]
use crate::avx2::{depthwise_convolve_avx, depthwise_direct_avx, depthwise_preprocess_avx};
use crate::buffered::{
    PAIRED_3X3_R1, PAIRED_R0, PAIRED_R1, WIDENED_3X3_R1, WIDENED_R0, WIDENED_R1,
    depthwise_convolve, depthwise_preprocess,
};
use crate::depthwise_error::DepthwiseError;
use crate::direct::depthwise_direct;
use crate::kernel_params::{ConvolveKernel, DirectKernel, KernelParams, PreprocessKernel};
#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
use crate::neon::{depthwise_convolve_neon, depthwise_direct_neon, depthwise_preprocess_neon};
use crate::options::ComputeBackend;
use crate::scalar::ScalarUnit;
#[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "sse"))]
use crate::sse::{depthwise_convolve_sse, depthwise_direct_sse, depthwise_preprocess_sse};
use crate::variant::DepthwiseVariant;

/// Kernels bound once at construction
#[derive(Copy, Clone)]
pub(crate) enum KernelDispatch {
    Direct(DirectKernel),
    Buffered {
        preprocess: PreprocessKernel,
        convolve: ConvolveKernel,
    },
}

fn depthwise_direct_scalar<const N: usize, const FAST: bool>(
    params: &KernelParams<'_, i8>,
    src: &[u8],
    src_zero: u8,
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        depthwise_direct::<ScalarUnit<N>, FAST>(params, src, src_zero, dst, dst_zero, dy_beg, dy_end);
    }
}

fn depthwise_preprocess_scalar<const N: usize, const KIND: u8>(
    params: &KernelParams<'_, i32>,
    src: &[u8],
    src_zero: u8,
    buf: &mut [i32],
    by_beg: usize,
    by_end: usize,
) {
    unsafe {
        depthwise_preprocess::<ScalarUnit<N>, KIND>(params, src, src_zero, buf, by_beg, by_end);
    }
}

fn depthwise_convolve_scalar<const N: usize, const KIND: u8>(
    params: &KernelParams<'_, i32>,
    buf: &[i32],
    dst: &mut [u8],
    dst_zero: u8,
    dy_beg: usize,
    dy_end: usize,
) {
    unsafe {
        depthwise_convolve::<ScalarUnit<N>, KIND>(params, buf, dst, dst_zero, dy_beg, dy_end);
    }
}

macro_rules! bind_kernels {
    ($variant:expr, $direct:ident, $preprocess:ident, $convolve:ident $(, $lanes:literal)?) => {
        match $variant {
            DepthwiseVariant::Direct => KernelDispatch::Direct($direct::<$($lanes,)? false>),
            DepthwiseVariant::Direct3x3 => KernelDispatch::Direct($direct::<$($lanes,)? true>),
            DepthwiseVariant::WidenedR0 => KernelDispatch::Buffered {
                preprocess: $preprocess::<$($lanes,)? WIDENED_R0>,
                convolve: $convolve::<$($lanes,)? WIDENED_R0>,
            },
            DepthwiseVariant::WidenedR1 => KernelDispatch::Buffered {
                preprocess: $preprocess::<$($lanes,)? WIDENED_R1>,
                convolve: $convolve::<$($lanes,)? WIDENED_R1>,
            },
            DepthwiseVariant::Widened3x3R1 => KernelDispatch::Buffered {
                preprocess: $preprocess::<$($lanes,)? WIDENED_3X3_R1>,
                convolve: $convolve::<$($lanes,)? WIDENED_3X3_R1>,
            },
            DepthwiseVariant::PairedR0 => KernelDispatch::Buffered {
                preprocess: $preprocess::<$($lanes,)? PAIRED_R0>,
                convolve: $convolve::<$($lanes,)? PAIRED_R0>,
            },
            DepthwiseVariant::PairedR1 => KernelDispatch::Buffered {
                preprocess: $preprocess::<$($lanes,)? PAIRED_R1>,
                convolve: $convolve::<$($lanes,)? PAIRED_R1>,
            },
            DepthwiseVariant::Paired3x3R1 => KernelDispatch::Buffered {
                preprocess: $preprocess::<$($lanes,)? PAIRED_3X3_R1>,
                convolve: $convolve::<$($lanes,)? PAIRED_3X3_R1>,
            },
        }
    };
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
fn has_avx2() -> bool {
    #[cfg(feature = "avx")]
    if std::arch::is_x86_feature_detected!("avx2") {
        return true;
    }
    false
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
fn has_sse41() -> bool {
    #[cfg(feature = "sse")]
    if std::arch::is_x86_feature_detected!("sse4.1") {
        return true;
    }
    false
}

/// Replaces `Auto` by the best backend and rejects unavailable ones
pub(crate) fn resolve_backend(requested: ComputeBackend) -> Result<ComputeBackend, DepthwiseError> {
    let available = match requested {
        ComputeBackend::Auto => {
            #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
            {
                if has_avx2() {
                    return Ok(ComputeBackend::Avx2);
                }
                if has_sse41() {
                    return Ok(ComputeBackend::Sse41);
                }
            }
            #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
            {
                return Ok(ComputeBackend::Neon);
            }
            #[allow(unreachable_code)]
            return Ok(ComputeBackend::Scalar(8));
        }
        ComputeBackend::Scalar(lanes) => matches!(lanes, 4 | 8 | 16),
        #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
        ComputeBackend::Sse41 => has_sse41(),
        #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
        ComputeBackend::Avx2 => has_avx2(),
        #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
        ComputeBackend::Neon => true,
        _ => false,
    };
    if available {
        Ok(requested)
    } else {
        Err(DepthwiseError::UnsupportedBackend(requested))
    }
}

/// Binds kernels of `variant` for an already resolved `backend`
pub(crate) fn bind_kernels(backend: ComputeBackend, variant: DepthwiseVariant) -> KernelDispatch {
    match backend {
        #[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "avx"))]
        ComputeBackend::Avx2 => bind_kernels!(
            variant,
            depthwise_direct_avx,
            depthwise_preprocess_avx,
            depthwise_convolve_avx
        ),
        #[cfg(all(any(target_arch = "x86_64", target_arch = "x86"), feature = "sse"))]
        ComputeBackend::Sse41 => bind_kernels!(
            variant,
            depthwise_direct_sse,
            depthwise_preprocess_sse,
            depthwise_convolve_sse
        ),
        #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
        ComputeBackend::Neon => bind_kernels!(
            variant,
            depthwise_direct_neon,
            depthwise_preprocess_neon,
            depthwise_convolve_neon
        ),
        ComputeBackend::Scalar(4) => bind_kernels!(
            variant,
            depthwise_direct_scalar,
            depthwise_preprocess_scalar,
            depthwise_convolve_scalar,
            4
        ),
        ComputeBackend::Scalar(16) => bind_kernels!(
            variant,
            depthwise_direct_scalar,
            depthwise_preprocess_scalar,
            depthwise_convolve_scalar,
            16
        ),
        _ => bind_kernels!(
            variant,
            depthwise_direct_scalar,
            depthwise_preprocess_scalar,
            depthwise_convolve_scalar,
            8
        ),
    }
}
