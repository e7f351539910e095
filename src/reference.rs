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
use crate::requantize::requantize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Quantized depthwise parameters of one test case
pub(crate) struct Case {
    pub(crate) shape: ConvShape,
    pub(crate) src: Vec<u8>,
    pub(crate) weights: Vec<i8>,
    pub(crate) bias: Vec<i32>,
    pub(crate) scale: Vec<f32>,
    pub(crate) src_zero: u8,
    pub(crate) dst_zero: u8,
}

impl Case {
    pub(crate) fn random(shape: ConvShape, seed: u64) -> Case {
        let mut rng = StdRng::seed_from_u64(seed);
        let src = (0..shape.src_len()).map(|_| rng.r#gen::<u8>()).collect();
        let weights = (0..shape.weights_len()).map(|_| rng.r#gen::<i8>()).collect();
        let bias = (0..shape.channels)
            .map(|_| rng.gen_range(-2000..2000))
            .collect();
        let area = shape.kernel_area() as f32;
        let scale = (0..shape.channels)
            .map(|_| rng.gen_range(0.5f32..4.0) / (area * 64.0))
            .collect();
        Case {
            shape,
            src,
            weights,
            bias,
            scale,
            src_zero: rng.r#gen(),
            dst_zero: rng.gen_range(64..192),
        }
    }

    /// Plain nested loops over every tap
    pub(crate) fn expected(&self) -> Vec<u8> {
        let shape = &self.shape;
        let channels = shape.channels;
        let mut dst = vec![0u8; shape.dst_len()];
        for dy in 0..shape.dst_h() {
            for dx in 0..shape.dst_w() {
                for c in 0..channels {
                    let mut sum = 0i32;
                    for ky in 0..shape.kernel_y {
                        for kx in 0..shape.kernel_x {
                            let sy = (dy * shape.stride_y + ky * shape.dilation_y) as isize
                                - shape.pad_top as isize;
                            let sx = (dx * shape.stride_x + kx * shape.dilation_x) as isize
                                - shape.pad_left as isize;
                            let inside = sy >= 0
                                && sx >= 0
                                && (sy as usize) < shape.src_h
                                && (sx as usize) < shape.src_w;
                            let s = if inside {
                                self.src[(sy as usize * shape.src_w + sx as usize) * channels + c]
                            } else {
                                self.src_zero
                            };
                            let w = self.weights[(ky * shape.kernel_x + kx) * channels + c];
                            sum += s as i32 * w as i32;
                        }
                    }
                    dst[(dy * shape.dst_w() + dx) * channels + c] =
                        requantize(sum, self.bias[c], self.scale[c], self.dst_zero as i32);
                }
            }
        }
        dst
    }
}
