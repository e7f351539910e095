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
use crate::options::ReorderType;
use crate::variant::DepthwiseVariant;
use std::ops::Range;

/// Ring buffer bytes a macro block aims to stay within
const RING_BUDGET: usize = 256 * 1024;

#[inline]
pub(crate) fn align_hi(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// Per-variant constants derived once at construction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayoutParams {
    /// i32 lanes per vector
    pub lanes: usize,
    pub reorder: Option<ReorderType>,
    /// Channels rounded up to a multiple of `lanes`
    pub buf_c: usize,
    /// `pad_left + src_w + pad_right`
    pub buf_w: usize,
    /// Ring buffer rows, a power of two
    pub buf_h: usize,
    /// i32 values per ring buffer row
    pub row_stride: usize,
    /// Output rows produced per ring buffer fill
    pub macro_h: usize,
    /// Kernel row pairs held by one packed weight set
    pub pair_rows: usize,
    /// Distance between aligned and shifted packed weight sets
    pub weight_set_stride: usize,
    paired: bool,
    stride_y: usize,
    kernel_y: usize,
}

impl LayoutParams {
    pub(crate) fn new(
        shape: &ConvShape,
        variant: DepthwiseVariant,
        lanes: usize,
        macro_rows: Option<usize>,
    ) -> LayoutParams {
        let buf_c = align_hi(shape.channels, lanes);
        let dst_h = shape.dst_h();
        let mut layout = LayoutParams {
            lanes,
            reorder: variant.reorder(),
            buf_c,
            buf_w: 0,
            buf_h: 0,
            row_stride: 0,
            macro_h: dst_h,
            pair_rows: 0,
            weight_set_stride: 0,
            paired: variant.is_paired(),
            stride_y: shape.stride_y,
            kernel_y: shape.kernel_y,
        };
        if !variant.is_buffered() {
            return layout;
        }

        layout.buf_w = shape.pad_left + shape.src_w + shape.pad_right;
        layout.row_stride = layout.buf_w * buf_c;

        let macro_h = match macro_rows {
            Some(rows) => rows,
            None => {
                let rows_fit = (RING_BUDGET / (layout.row_stride * size_of::<i32>())).max(1);
                let fit = if rows_fit > shape.kernel_y {
                    (rows_fit - shape.kernel_y) / shape.stride_y + 1
                } else {
                    1
                };
                fit.max(2)
            }
        };
        layout.macro_h = macro_h.clamp(1, dst_h);

        let mut rows = (layout.macro_h - 1) * shape.stride_y + shape.kernel_y;
        if layout.paired {
            rows += 2;
            layout.pair_rows = shape.kernel_y / 2 + 1;
            layout.weight_set_stride = layout.pair_rows * shape.kernel_x * buf_c;
        }
        layout.buf_h = rows.next_power_of_two();
        layout
    }

    /// Logical source rows, counted from the top padding, that output rows
    /// `[dy_beg, dy_end)` read. Paired layouts start and end on even rows.
    pub fn source_window(&self, dy_beg: usize, dy_end: usize) -> Range<usize> {
        let lo = dy_beg * self.stride_y;
        let hi = (dy_end - 1) * self.stride_y + self.kernel_y;
        if self.paired {
            (lo & !1)..((hi + 1) & !1)
        } else {
            lo..hi
        }
    }

    /// i32 values in one ring buffer
    #[inline]
    pub fn ring_len(&self) -> usize {
        self.buf_h * self.row_stride
    }

    /// Row offset of logical row `row` inside the ring buffer
    #[inline(always)]
    pub(crate) fn slot(&self, row: usize) -> usize {
        (row & (self.buf_h - 1)) * self.row_stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widened_ring_holds_macro_block() {
        let shape = ConvShape::new(40, 10, 6, 3, 3).with_padding(1, 1, 1, 1);
        let layout = LayoutParams::new(&shape, DepthwiseVariant::WidenedR0, 4, Some(5));
        assert_eq!(layout.buf_c, 8);
        assert_eq!(layout.buf_w, 12);
        assert_eq!(layout.row_stride, 96);
        assert_eq!(layout.macro_h, 5);
        // 4 + 3 rows rounded up
        assert_eq!(layout.buf_h, 8);
        assert_eq!(layout.source_window(3, 8), 3..10);
        assert_eq!(layout.slot(9), 96);
    }

    #[test]
    fn paired_window_is_even() {
        let shape = ConvShape::new(40, 10, 6, 3, 3).with_stride(1, 1);
        let layout = LayoutParams::new(&shape, DepthwiseVariant::PairedR1, 8, Some(4));
        assert_eq!(layout.pair_rows, 2);
        assert_eq!(layout.weight_set_stride, 2 * 3 * 8);
        // 3 + 3 + 2 rows rounded up
        assert_eq!(layout.buf_h, 8);
        assert_eq!(layout.source_window(1, 5), 0..8);
        assert_eq!(layout.source_window(2, 4), 2..6);
        assert!(layout.source_window(3, 7).len() <= layout.buf_h);
    }

    #[test]
    fn macro_rows_are_clamped() {
        let shape = ConvShape::new(3, 10, 6, 3, 1);
        let layout = LayoutParams::new(&shape, DepthwiseVariant::WidenedR1, 4, Some(100));
        assert_eq!(layout.macro_h, 1);
        assert_eq!(layout.buf_h, 4);
    }

    #[test]
    fn direct_has_no_ring() {
        let shape = ConvShape::new(8, 8, 5, 3, 3);
        let layout = LayoutParams::new(&shape, DepthwiseVariant::Direct3x3, 4, None);
        assert_eq!(layout.buf_c, 8);
        assert_eq!(layout.ring_len(), 0);
    }
}
