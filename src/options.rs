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
use crate::threading_policy::ThreadingPolicy;

/// Requested convolution strategy
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DepthwiseAlgorithm {
    /// Chooses by shape: dilated kernels run direct, kernels with at least two
    /// rows run paired, the rest run widened.
    #[default]
    Auto,
    /// Reads the source tensor directly with per-tap bounds checks
    Direct,
    /// Preprocesses source rows widened to i32 into a ring buffer
    Widened,
    /// Preprocesses two source rows packed into 16-bit halves of each i32 lane
    Paired,
}

/// Channel arrangement inside the ring buffer and the repacked weights
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReorderType {
    /// `[x][channel]`, channels of one pixel are contiguous
    PixelMajor,
    /// `[channel block][x][lane]`, one block of lanes keeps a whole row contiguous
    ChannelBlocked,
}

/// Instruction set used by the kernels
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ComputeBackend {
    /// Best available on the running CPU
    #[default]
    Auto,
    /// Portable implementation with the given lane count, one of 4, 8 or 16
    Scalar(usize),
    Sse41,
    Avx2,
    Neon,
}

impl ComputeBackend {
    /// Count of i32 lanes in one vector of the backend
    pub fn lanes(&self) -> usize {
        match self {
            ComputeBackend::Auto => 0,
            ComputeBackend::Scalar(lanes) => *lanes,
            ComputeBackend::Sse41 => 4,
            ComputeBackend::Avx2 => 8,
            ComputeBackend::Neon => 4,
        }
    }
}

/// Construction options for [crate::DepthwiseConvolution]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct DepthwiseOptions {
    pub algorithm: DepthwiseAlgorithm,
    /// Forces a buffer reorder type, ignored by direct convolution
    pub reorder: Option<ReorderType>,
    /// Output rows produced per ring buffer fill
    pub macro_rows: Option<usize>,
    pub threading_policy: ThreadingPolicy,
    pub backend: ComputeBackend,
}

impl DepthwiseOptions {
    pub fn with_algorithm(mut self, algorithm: DepthwiseAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_reorder(mut self, reorder: ReorderType) -> Self {
        self.reorder = Some(reorder);
        self
    }

    pub fn with_macro_rows(mut self, rows: usize) -> Self {
        self.macro_rows = Some(rows);
        self
    }

    pub fn with_threading_policy(mut self, policy: ThreadingPolicy) -> Self {
        self.threading_policy = policy;
        self
    }

    pub fn with_backend(mut self, backend: ComputeBackend) -> Self {
        self.backend = backend;
        self
    }
}
