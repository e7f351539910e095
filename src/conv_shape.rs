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
use crate::depthwise_error::DepthwiseError;

/// Largest supported `kernel_y * kernel_x`.
///
/// Every product of an u8 activation and an i8 weight is bounded by `255 * 128`,
/// so a sum of this many products cannot leave `i32`. The bias is added to
/// that sum with saturation.
pub const MAX_KERNEL_AREA: usize = 65_793;

/// Element type of the destination tensor
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TensorType {
    U8,
    F32,
}

/// Static geometry of a depthwise convolution over NHWC tensors.
///
/// Source and destination share the channel count, every channel is convolved
/// with its own `kernel_y x kernel_x` filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConvShape {
    pub src_h: usize,
    pub src_w: usize,
    pub channels: usize,
    pub kernel_y: usize,
    pub kernel_x: usize,
    pub stride_y: usize,
    pub stride_x: usize,
    pub pad_top: usize,
    pub pad_left: usize,
    pub pad_bottom: usize,
    pub pad_right: usize,
    pub dilation_y: usize,
    pub dilation_x: usize,
    pub dst_type: TensorType,
}

impl ConvShape {
    /// Unit stride, no padding, no dilation and u8 destination.
    pub fn new(
        src_h: usize,
        src_w: usize,
        channels: usize,
        kernel_y: usize,
        kernel_x: usize,
    ) -> ConvShape {
        ConvShape {
            src_h,
            src_w,
            channels,
            kernel_y,
            kernel_x,
            stride_y: 1,
            stride_x: 1,
            pad_top: 0,
            pad_left: 0,
            pad_bottom: 0,
            pad_right: 0,
            dilation_y: 1,
            dilation_x: 1,
            dst_type: TensorType::U8,
        }
    }

    pub fn with_stride(mut self, stride_y: usize, stride_x: usize) -> ConvShape {
        self.stride_y = stride_y;
        self.stride_x = stride_x;
        self
    }

    pub fn with_padding(
        mut self,
        top: usize,
        left: usize,
        bottom: usize,
        right: usize,
    ) -> ConvShape {
        self.pad_top = top;
        self.pad_left = left;
        self.pad_bottom = bottom;
        self.pad_right = right;
        self
    }

    pub fn with_dilation(mut self, dilation_y: usize, dilation_x: usize) -> ConvShape {
        self.dilation_y = dilation_y;
        self.dilation_x = dilation_x;
        self
    }

    pub fn with_dst_type(mut self, dst_type: TensorType) -> ConvShape {
        self.dst_type = dst_type;
        self
    }

    #[inline]
    fn extent(kernel: usize, dilation: usize) -> usize {
        dilation * (kernel - 1) + 1
    }

    /// `None` when the dilated extent does not fit in `usize`
    fn checked_extent(kernel: usize, dilation: usize) -> Option<usize> {
        dilation.checked_mul(kernel - 1)?.checked_add(1)
    }

    fn check_axis(
        src: usize,
        pad_before: usize,
        pad_after: usize,
        kernel: usize,
        dilation: usize,
    ) -> Result<(), DepthwiseError> {
        let padded = src.checked_add(pad_before).and_then(|x| x.checked_add(pad_after));
        let extent = Self::checked_extent(kernel, dilation);
        match (extent, padded) {
            (Some(extent), Some(padded)) if extent <= padded => Ok(()),
            (Some(extent), Some(padded)) => Err(DepthwiseError::KernelExceedsInput(extent, padded)),
            (Some(extent), None) => Err(DepthwiseError::KernelExceedsInput(extent, usize::MAX)),
            (None, padded) => Err(DepthwiseError::KernelExceedsInput(
                usize::MAX,
                padded.unwrap_or(usize::MAX),
            )),
        }
    }

    /// Output height, valid only for a shape that passed [ConvShape::validate]
    #[inline]
    pub fn dst_h(&self) -> usize {
        (self.src_h + self.pad_top + self.pad_bottom - Self::extent(self.kernel_y, self.dilation_y))
            / self.stride_y
            + 1
    }

    /// Output width, valid only for a shape that passed [ConvShape::validate]
    #[inline]
    pub fn dst_w(&self) -> usize {
        (self.src_w + self.pad_left + self.pad_right - Self::extent(self.kernel_x, self.dilation_x))
            / self.stride_x
            + 1
    }

    #[inline]
    pub fn kernel_area(&self) -> usize {
        self.kernel_y * self.kernel_x
    }

    /// Expected weights length, `[kernel_y][kernel_x][channels]`
    #[inline]
    pub fn weights_len(&self) -> usize {
        self.kernel_area() * self.channels
    }

    #[inline]
    pub fn src_len(&self) -> usize {
        self.src_h * self.src_w * self.channels
    }

    #[inline]
    pub fn dst_len(&self) -> usize {
        self.dst_h() * self.dst_w() * self.channels
    }

    #[inline]
    pub fn is_kernel(&self, size: usize) -> bool {
        self.kernel_y == size && self.kernel_x == size
    }

    #[inline]
    pub fn is_dilation(&self, value: usize) -> bool {
        self.dilation_y == value && self.dilation_x == value
    }

    /// 3x3 kernel without dilation, eligible for unrolled kernels
    #[inline]
    pub fn is_3x3_dense(&self) -> bool {
        self.is_kernel(3) && self.is_dilation(1)
    }

    pub fn validate(&self) -> Result<(), DepthwiseError> {
        if self.src_h == 0
            || self.src_w == 0
            || self.channels == 0
            || self.kernel_y == 0
            || self.kernel_x == 0
            || self.stride_y == 0
            || self.stride_x == 0
            || self.dilation_y == 0
            || self.dilation_x == 0
        {
            return Err(DepthwiseError::ZeroDimensions);
        }
        Self::check_axis(
            self.src_h,
            self.pad_top,
            self.pad_bottom,
            self.kernel_y,
            self.dilation_y,
        )?;
        Self::check_axis(
            self.src_w,
            self.pad_left,
            self.pad_right,
            self.kernel_x,
            self.dilation_x,
        )?;
        match self.kernel_y.checked_mul(self.kernel_x) {
            Some(area) if area <= MAX_KERNEL_AREA => {}
            area => return Err(DepthwiseError::KernelTooLarge(area.unwrap_or(usize::MAX))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_padding_keeps_size() {
        let shape = ConvShape::new(17, 23, 5, 3, 3).with_padding(1, 1, 1, 1);
        assert!(shape.validate().is_ok());
        assert_eq!(shape.dst_h(), 17);
        assert_eq!(shape.dst_w(), 23);
        assert_eq!(shape.dst_len(), 17 * 23 * 5);
    }

    #[test]
    fn stride_and_dilation_shrink_output() {
        let shape = ConvShape::new(32, 20, 3, 3, 5)
            .with_stride(2, 3)
            .with_dilation(2, 1)
            .with_padding(1, 2, 0, 2);
        assert!(shape.validate().is_ok());
        // (32 + 1 - 5) / 2 + 1
        assert_eq!(shape.dst_h(), 15);
        // (20 + 4 - 5) / 3 + 1
        assert_eq!(shape.dst_w(), 7);
    }

    #[test]
    fn oversized_geometry_is_rejected_without_overflow() {
        let shape = ConvShape::new(4, 4, 1, 3, 3);
        assert_eq!(
            shape.with_padding(usize::MAX, 0, 0, 0).validate(),
            Err(DepthwiseError::KernelExceedsInput(3, usize::MAX))
        );
        assert_eq!(
            shape.with_padding(0, 1, 0, usize::MAX).validate(),
            Err(DepthwiseError::KernelExceedsInput(3, usize::MAX))
        );
        assert_eq!(
            shape.with_dilation(usize::MAX, 1).validate(),
            Err(DepthwiseError::KernelExceedsInput(usize::MAX, 4))
        );
        assert_eq!(
            shape
                .with_dilation(1, usize::MAX)
                .with_padding(0, usize::MAX, 0, 1)
                .validate(),
            Err(DepthwiseError::KernelExceedsInput(usize::MAX, usize::MAX))
        );
        // Fits in usize but not the accumulator budget
        let wide = ConvShape::new(usize::MAX / 2, usize::MAX / 2, 1, usize::MAX / 4, 8);
        assert_eq!(wide.validate(), Err(DepthwiseError::KernelTooLarge(usize::MAX)));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let shape = ConvShape::new(4, 4, 0, 3, 3);
        assert_eq!(shape.validate(), Err(DepthwiseError::ZeroDimensions));
        let shape = ConvShape::new(4, 4, 2, 3, 3).with_stride(0, 1);
        assert_eq!(shape.validate(), Err(DepthwiseError::ZeroDimensions));
    }

    #[test]
    fn rejects_kernel_wider_than_padded_source() {
        let shape = ConvShape::new(2, 8, 1, 3, 3);
        assert_eq!(
            shape.validate(),
            Err(DepthwiseError::KernelExceedsInput(3, 2))
        );
        let shape = ConvShape::new(8, 8, 1, 3, 3).with_dilation(1, 4);
        assert_eq!(
            shape.validate(),
            Err(DepthwiseError::KernelExceedsInput(9, 8))
        );
    }

    #[test]
    fn rejects_overflowing_kernel_area() {
        let shape = ConvShape::new(300, 300, 1, 257, 257);
        assert_eq!(
            shape.validate(),
            Err(DepthwiseError::KernelTooLarge(257 * 257))
        );
    }
}
