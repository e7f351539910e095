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
use crate::depthwise_error::DepthwiseError;
use crate::options::{DepthwiseAlgorithm, DepthwiseOptions, ReorderType};

/// Kernel family a convolution object executes for its whole lifetime
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DepthwiseVariant {
    Direct,
    Direct3x3,
    WidenedR0,
    WidenedR1,
    Widened3x3R1,
    PairedR0,
    PairedR1,
    Paired3x3R1,
}

impl DepthwiseVariant {
    /// Chooses a variant for `shape` on a machine with `lanes` wide vectors
    pub fn select(
        shape: &ConvShape,
        options: &DepthwiseOptions,
        lanes: usize,
    ) -> Result<DepthwiseVariant, DepthwiseError> {
        let dense = shape.is_dilation(1);
        let algorithm = match options.algorithm {
            DepthwiseAlgorithm::Auto => {
                if !dense {
                    DepthwiseAlgorithm::Direct
                } else if shape.kernel_y >= 2 {
                    DepthwiseAlgorithm::Paired
                } else {
                    DepthwiseAlgorithm::Widened
                }
            }
            DepthwiseAlgorithm::Widened | DepthwiseAlgorithm::Paired if !dense => {
                return Err(DepthwiseError::UnsupportedAlgorithm(options.algorithm));
            }
            DepthwiseAlgorithm::Paired if shape.kernel_y < 2 => {
                return Err(DepthwiseError::UnsupportedAlgorithm(options.algorithm));
            }
            requested => requested,
        };

        let fast = shape.is_3x3_dense();
        let reorder = options.reorder.unwrap_or({
            if fast || shape.channels <= 2 * lanes {
                ReorderType::ChannelBlocked
            } else {
                ReorderType::PixelMajor
            }
        });

        let variant = match (algorithm, reorder) {
            (DepthwiseAlgorithm::Direct, _) if fast => DepthwiseVariant::Direct3x3,
            (DepthwiseAlgorithm::Direct, _) => DepthwiseVariant::Direct,
            (DepthwiseAlgorithm::Widened, ReorderType::PixelMajor) => DepthwiseVariant::WidenedR0,
            (DepthwiseAlgorithm::Widened, ReorderType::ChannelBlocked) if fast => {
                DepthwiseVariant::Widened3x3R1
            }
            (DepthwiseAlgorithm::Widened, ReorderType::ChannelBlocked) => {
                DepthwiseVariant::WidenedR1
            }
            (DepthwiseAlgorithm::Paired, ReorderType::PixelMajor) => DepthwiseVariant::PairedR0,
            (DepthwiseAlgorithm::Paired, ReorderType::ChannelBlocked) if fast => {
                DepthwiseVariant::Paired3x3R1
            }
            (DepthwiseAlgorithm::Paired, ReorderType::ChannelBlocked) => {
                DepthwiseVariant::PairedR1
            }
            (DepthwiseAlgorithm::Auto, _) => unreachable!("auto is resolved above"),
        };
        Ok(variant)
    }

    /// Whether the variant reads a preprocessed ring buffer instead of the source
    #[inline]
    pub fn is_buffered(&self) -> bool {
        !matches!(self, DepthwiseVariant::Direct | DepthwiseVariant::Direct3x3)
    }

    #[inline]
    pub fn is_paired(&self) -> bool {
        matches!(
            self,
            DepthwiseVariant::PairedR0 | DepthwiseVariant::PairedR1 | DepthwiseVariant::Paired3x3R1
        )
    }

    #[inline]
    pub fn reorder(&self) -> Option<ReorderType> {
        match self {
            DepthwiseVariant::Direct | DepthwiseVariant::Direct3x3 => None,
            DepthwiseVariant::WidenedR0 | DepthwiseVariant::PairedR0 => {
                Some(ReorderType::PixelMajor)
            }
            _ => Some(ReorderType::ChannelBlocked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(shape: ConvShape, options: DepthwiseOptions) -> Result<DepthwiseVariant, DepthwiseError> {
        DepthwiseVariant::select(&shape, &options, 8)
    }

    #[test]
    fn auto_prefers_paired_for_tall_kernels() {
        let shape = ConvShape::new(16, 16, 64, 5, 5);
        assert_eq!(
            select(shape, DepthwiseOptions::default()),
            Ok(DepthwiseVariant::PairedR0)
        );
        let shape = ConvShape::new(16, 16, 64, 3, 3);
        assert_eq!(
            select(shape, DepthwiseOptions::default()),
            Ok(DepthwiseVariant::Paired3x3R1)
        );
    }

    #[test]
    fn auto_uses_widened_for_single_row_kernels() {
        let shape = ConvShape::new(16, 16, 8, 1, 3);
        assert_eq!(
            select(shape, DepthwiseOptions::default()),
            Ok(DepthwiseVariant::WidenedR1)
        );
    }

    #[test]
    fn dilation_forces_direct() {
        let shape = ConvShape::new(16, 16, 8, 3, 3).with_dilation(2, 2);
        assert_eq!(
            select(shape, DepthwiseOptions::default()),
            Ok(DepthwiseVariant::Direct)
        );
        let options = DepthwiseOptions::default().with_algorithm(DepthwiseAlgorithm::Widened);
        assert_eq!(
            select(shape, options),
            Err(DepthwiseError::UnsupportedAlgorithm(DepthwiseAlgorithm::Widened))
        );
    }

    #[test]
    fn paired_needs_two_kernel_rows() {
        let shape = ConvShape::new(16, 16, 8, 1, 5);
        let options = DepthwiseOptions::default().with_algorithm(DepthwiseAlgorithm::Paired);
        assert_eq!(
            select(shape, options),
            Err(DepthwiseError::UnsupportedAlgorithm(DepthwiseAlgorithm::Paired))
        );
    }

    #[test]
    fn explicit_reorder_is_honored() {
        let shape = ConvShape::new(16, 16, 8, 3, 3);
        let options = DepthwiseOptions::default()
            .with_algorithm(DepthwiseAlgorithm::Widened)
            .with_reorder(ReorderType::PixelMajor);
        assert_eq!(select(shape, options), Ok(DepthwiseVariant::WidenedR0));
        let options = DepthwiseOptions::default().with_algorithm(DepthwiseAlgorithm::Direct);
        assert_eq!(select(shape, options), Ok(DepthwiseVariant::Direct3x3));
    }
}
