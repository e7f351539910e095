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
use crate::depthwise_error::{DepthwiseError, try_vec};
use crate::layout::LayoutParams;
use crate::options::ReorderType;
use crate::variant::DepthwiseVariant;
use num_traits::AsPrimitive;

/// Weights rearranged for the kernels of one variant
#[derive(Debug, Clone)]
pub(crate) enum RepackedWeights {
    /// Source layout `[kernel_y][kernel_x][channels]`
    Direct(Vec<i8>),
    /// Widened or pair-packed i32 lanes
    Packed(Vec<i32>),
}

/// Packs two signed taps into the 16-bit halves of one lane
#[inline]
pub(crate) fn pack_taps(lo: i8, hi: i8) -> i32 {
    let lo: i32 = lo.as_();
    let hi: i32 = hi.as_();
    (lo & 0xffff) | (hi << 16)
}

struct TapReader<'a> {
    weights: &'a [i8],
    kernel_y: usize,
    kernel_x: usize,
    channels: usize,
}

impl TapReader<'_> {
    /// Tap of kernel row `ky`, zero when the row lies outside the kernel
    #[inline]
    fn tap(&self, ky: isize, kx: usize, c: usize) -> i8 {
        if ky < 0 || ky as usize >= self.kernel_y || c >= self.channels {
            return 0;
        }
        self.weights[(ky as usize * self.kernel_x + kx) * self.channels + c]
    }
}

impl RepackedWeights {
    pub(crate) fn new(
        shape: &ConvShape,
        layout: &LayoutParams,
        variant: DepthwiseVariant,
        weights: &[i8],
    ) -> Result<RepackedWeights, DepthwiseError> {
        debug_assert_eq!(weights.len(), shape.weights_len());
        let reader = TapReader {
            weights,
            kernel_y: shape.kernel_y,
            kernel_x: shape.kernel_x,
            channels: shape.channels,
        };
        let lanes = layout.lanes;
        let buf_c = layout.buf_c;
        let kernel_x = shape.kernel_x;
        let taps = shape.kernel_area();

        if !variant.is_buffered() {
            let mut direct = try_vec![0i8; weights.len()];
            direct.copy_from_slice(weights);
            return Ok(RepackedWeights::Direct(direct));
        }

        if !variant.is_paired() {
            let mut packed = try_vec![0i32; taps * buf_c];
            for k in 0..taps {
                let (ky, kx) = ((k / kernel_x) as isize, k % kernel_x);
                for c in 0..shape.channels {
                    let dst = match layout.reorder {
                        Some(ReorderType::ChannelBlocked) => {
                            ((c / lanes) * taps + k) * lanes + c % lanes
                        }
                        _ => k * buf_c + c,
                    };
                    packed[dst] = reader.tap(ky, kx, c).as_();
                }
            }
            return Ok(RepackedWeights::Packed(packed));
        }

        let pair_rows = layout.pair_rows;
        let mut packed = try_vec![0i32; 2 * layout.weight_set_stride];
        for set in 0..2usize {
            // aligned pairs hold rows (2p, 2p + 1), shifted ones (2p - 1, 2p)
            let first_row = -(set as isize);
            for p in 0..pair_rows {
                let lo_row = first_row + 2 * p as isize;
                for kx in 0..kernel_x {
                    for c in 0..buf_c {
                        let dst = match layout.reorder {
                            Some(ReorderType::ChannelBlocked) => {
                                (((c / lanes) * pair_rows + p) * kernel_x + kx) * lanes
                                    + c % lanes
                            }
                            _ => (p * kernel_x + kx) * buf_c + c,
                        };
                        packed[set * layout.weight_set_stride + dst] =
                            pack_taps(reader.tap(lo_row, kx, c), reader.tap(lo_row + 1, kx, c));
                    }
                }
            }
        }
        Ok(RepackedWeights::Packed(packed))
    }
}

/// Bias and scale padded with zeros up to `buf_c`
pub(crate) fn pad_channels<T: Copy + Default>(
    values: &[T],
    buf_c: usize,
) -> Result<Vec<T>, DepthwiseError> {
    let mut padded = try_vec![T::default(); buf_c];
    padded[..values.len()].copy_from_slice(values);
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lo(v: i32) -> i32 {
        v as i16 as i32
    }

    fn hi(v: i32) -> i32 {
        v >> 16
    }

    fn sample(shape: &ConvShape) -> Vec<i8> {
        (0..shape.weights_len())
            .map(|x| (x as i32 % 17 - 8) as i8)
            .collect()
    }

    #[test]
    fn widened_blocked_layout() {
        let shape = ConvShape::new(8, 8, 6, 2, 3);
        let weights = sample(&shape);
        let layout = LayoutParams::new(&shape, DepthwiseVariant::WidenedR1, 4, None);
        let RepackedWeights::Packed(packed) =
            RepackedWeights::new(&shape, &layout, DepthwiseVariant::WidenedR1, &weights).unwrap()
        else {
            panic!("widened weights must be packed");
        };
        assert_eq!(packed.len(), 6 * 8);
        for k in 0..6 {
            for c in 0..6 {
                let expected = weights[k * 6 + c] as i32;
                assert_eq!(packed[((c / 4) * 6 + k) * 4 + c % 4], expected);
            }
            // padding channels
            assert_eq!(packed[(6 + k) * 4 + 2], 0);
            assert_eq!(packed[(6 + k) * 4 + 3], 0);
        }
    }

    #[test]
    fn paired_sets_cover_every_row() {
        let shape = ConvShape::new(8, 8, 5, 3, 2);
        let weights = sample(&shape);
        let variant = DepthwiseVariant::PairedR0;
        let layout = LayoutParams::new(&shape, variant, 4, None);
        let RepackedWeights::Packed(packed) =
            RepackedWeights::new(&shape, &layout, variant, &weights).unwrap()
        else {
            panic!("paired weights must be packed");
        };
        let w = |ky: usize, kx: usize, c: usize| weights[(ky * 2 + kx) * 5 + c] as i32;
        let at = |set: usize, p: usize, kx: usize, c: usize| {
            packed[set * layout.weight_set_stride + (p * 2 + kx) * layout.buf_c + c]
        };
        for kx in 0..2 {
            for c in 0..5 {
                // aligned: (w0, w1), (w2, 0)
                assert_eq!((lo(at(0, 0, kx, c)), hi(at(0, 0, kx, c))), (w(0, kx, c), w(1, kx, c)));
                assert_eq!((lo(at(0, 1, kx, c)), hi(at(0, 1, kx, c))), (w(2, kx, c), 0));
                // shifted: (0, w0), (w1, w2)
                assert_eq!((lo(at(1, 0, kx, c)), hi(at(1, 0, kx, c))), (0, w(0, kx, c)));
                assert_eq!((lo(at(1, 1, kx, c)), hi(at(1, 1, kx, c))), (w(1, kx, c), w(2, kx, c)));
            }
            assert_eq!(at(0, 0, kx, 7), 0);
        }
    }

    #[test]
    fn pads_bias() {
        let padded = pad_channels(&[1i32, 2, 3], 8).unwrap();
        assert_eq!(padded, vec![1, 2, 3, 0, 0, 0, 0, 0]);
    }
}
