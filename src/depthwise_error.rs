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
use crate::conv_shape::TensorType;
use crate::options::{ComputeBackend, DepthwiseAlgorithm};
use std::error::Error;
use std::fmt::Display;

/// Buffer mismatch error description
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DepthwiseBufferMismatch {
    /// Which argument was rejected, e.g. "weights" or "dst"
    pub buffer: &'static str,
    pub expected: usize,
    pub slice_len: usize,
}

/// Error enumeration type
#[derive(Debug, Clone, PartialEq)]
pub enum DepthwiseError {
    ZeroDimensions,
    /// Dilated kernel extent and padded source extent
    KernelExceedsInput(usize, usize),
    KernelTooLarge(usize),
    BufferMismatch(DepthwiseBufferMismatch),
    UnsupportedDestination(TensorType),
    UnsupportedAlgorithm(DepthwiseAlgorithm),
    UnsupportedBackend(ComputeBackend),
    InvalidRowRange(usize, usize),
    RowsNotPreprocessed(usize, usize),
    /// Requested rows and ring capacity
    RingCapacityExceeded(usize, usize),
    RingLayoutMismatch,
    NoRowBuffer,
    ThreadPool(String),
    OutOfMemory(usize),
}

impl DepthwiseError {
    /// Returns error as int code
    #[inline]
    pub fn code(&self) -> usize {
        match self {
            DepthwiseError::ZeroDimensions => 1,
            DepthwiseError::KernelExceedsInput(_, _) => 2,
            DepthwiseError::KernelTooLarge(_) => 3,
            DepthwiseError::BufferMismatch(_) => 4,
            DepthwiseError::UnsupportedDestination(_) => 5,
            DepthwiseError::UnsupportedAlgorithm(_) => 6,
            DepthwiseError::UnsupportedBackend(_) => 7,
            DepthwiseError::InvalidRowRange(_, _) => 8,
            DepthwiseError::RowsNotPreprocessed(_, _) => 9,
            DepthwiseError::RingCapacityExceeded(_, _) => 10,
            DepthwiseError::RingLayoutMismatch => 11,
            DepthwiseError::NoRowBuffer => 12,
            DepthwiseError::ThreadPool(_) => 13,
            DepthwiseError::OutOfMemory(_) => 14,
        }
    }
}

impl Display for DepthwiseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepthwiseError::ZeroDimensions => {
                f.write_str("One of convolution dimensions is 0, this should not happen")
            }
            DepthwiseError::KernelExceedsInput(extent, padded) => f.write_fmt(format_args!(
                "Dilated kernel extent {extent} is larger than padded source extent {padded}",
            )),
            DepthwiseError::KernelTooLarge(area) => f.write_fmt(format_args!(
                "Kernel area {area} may overflow 32-bit accumulator, at most {} is supported",
                crate::conv_shape::MAX_KERNEL_AREA
            )),
            DepthwiseError::BufferMismatch(mismatch) => f.write_fmt(format_args!(
                "Buffer `{}` len expected to be {} but received {}",
                mismatch.buffer, mismatch.expected, mismatch.slice_len,
            )),
            DepthwiseError::UnsupportedDestination(tensor_type) => f.write_fmt(format_args!(
                "Destination tensor type {tensor_type:?} is not supported, only U8 is"
            )),
            DepthwiseError::UnsupportedAlgorithm(algorithm) => f.write_fmt(format_args!(
                "Algorithm {algorithm:?} cannot execute this convolution shape"
            )),
            DepthwiseError::UnsupportedBackend(backend) => f.write_fmt(format_args!(
                "Backend {backend:?} is not available on this CPU or build"
            )),
            DepthwiseError::InvalidRowRange(beg, end) => f.write_fmt(format_args!(
                "Output row range [{beg}, {end}) is empty or out of destination bounds"
            )),
            DepthwiseError::RowsNotPreprocessed(beg, end) => f.write_fmt(format_args!(
                "Source rows [{beg}, {end}) must be preprocessed before convolution"
            )),
            DepthwiseError::RingCapacityExceeded(rows, capacity) => f.write_fmt(format_args!(
                "Window of {rows} source rows does not fit ring buffer of {capacity} rows"
            )),
            DepthwiseError::RingLayoutMismatch => {
                f.write_str("Row buffer was created for another convolution layout")
            }
            DepthwiseError::NoRowBuffer => {
                f.write_str("Direct convolution does not use a row buffer")
            }
            DepthwiseError::ThreadPool(reason) => {
                f.write_fmt(format_args!("Unable to create thread pool: {reason}"))
            }
            DepthwiseError::OutOfMemory(capacity) => f.write_fmt(format_args!(
                "There is no enough memory to allocate {capacity} elements"
            )),
        }
    }
}

impl Error for DepthwiseError {}

macro_rules! try_vec {
    () => {
        Vec::new()
    };
    ($elem:expr; $n:expr) => {{
        let mut v = Vec::new();
        v.try_reserve_exact($n)
            .map_err(|_| crate::depthwise_error::DepthwiseError::OutOfMemory($n))?;
        v.resize($n, $elem);
        v
    }};
}

pub(crate) use try_vec;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let errors = [
            DepthwiseError::ZeroDimensions,
            DepthwiseError::KernelExceedsInput(5, 3),
            DepthwiseError::KernelTooLarge(70_000),
            DepthwiseError::BufferMismatch(DepthwiseBufferMismatch {
                buffer: "src",
                expected: 4,
                slice_len: 3,
            }),
            DepthwiseError::UnsupportedDestination(TensorType::F32),
            DepthwiseError::UnsupportedAlgorithm(DepthwiseAlgorithm::Paired),
            DepthwiseError::UnsupportedBackend(ComputeBackend::Neon),
            DepthwiseError::InvalidRowRange(3, 1),
            DepthwiseError::RowsNotPreprocessed(0, 4),
            DepthwiseError::RingCapacityExceeded(9, 8),
            DepthwiseError::RingLayoutMismatch,
            DepthwiseError::NoRowBuffer,
            DepthwiseError::ThreadPool("test".to_string()),
            DepthwiseError::OutOfMemory(1),
        ];
        let mut codes = errors.iter().map(|x| x.code()).collect::<Vec<_>>();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn display_mentions_buffer() {
        let error = DepthwiseError::BufferMismatch(DepthwiseBufferMismatch {
            buffer: "bias",
            expected: 8,
            slice_len: 7,
        });
        let message = error.to_string();
        assert!(message.contains("bias"));
        assert!(message.contains('8'));
    }

    #[test]
    fn try_vec_allocates() {
        fn alloc() -> Result<Vec<i32>, DepthwiseError> {
            Ok(try_vec![7i32; 16])
        }
        let v = alloc().unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|&x| x == 7));
    }
}
