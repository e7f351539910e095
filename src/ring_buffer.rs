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
use std::ops::Range;

/// Preprocessed source rows addressed by logical row modulo a power of two.
///
/// Each worker owns one buffer. It remembers which logical rows it holds so
/// consecutive macro blocks only preprocess the rows they add.
/// Rows are only meaningful to a convolution with the same shape and layout.
#[derive(Debug, Clone)]
pub struct RowRingBuffer {
    data: Vec<i32>,
    rows: usize,
    row_stride: usize,
    ready: Range<usize>,
    shape: ConvShape,
    layout: LayoutParams,
}

impl RowRingBuffer {
    pub(crate) fn new(
        shape: &ConvShape,
        layout: &LayoutParams,
    ) -> Result<RowRingBuffer, DepthwiseError> {
        debug_assert!(layout.buf_h == 0 || layout.buf_h.is_power_of_two());
        Ok(RowRingBuffer {
            data: try_vec![0i32; layout.ring_len()],
            rows: layout.buf_h,
            row_stride: layout.row_stride,
            ready: 0..0,
            shape: *shape,
            layout: *layout,
        })
    }

    /// Count of row slots
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// i32 values per row slot
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Logical rows currently held
    #[inline]
    pub fn ready_rows(&self) -> Range<usize> {
        self.ready.clone()
    }

    /// Forgets every held row, the next fill rewrites its whole window
    #[inline]
    pub fn reset(&mut self) {
        self.ready = 0..0;
    }

    #[inline]
    pub(crate) fn matches(&self, shape: &ConvShape, layout: &LayoutParams) -> bool {
        self.shape == *shape && self.layout == *layout
    }

    #[inline]
    pub(crate) fn holds(&self, window: &Range<usize>) -> bool {
        self.ready.start <= window.start && window.end <= self.ready.end
    }

    /// Marks `window` as held and returns the rows that must be written to get there
    pub(crate) fn claim(&mut self, window: Range<usize>) -> Result<Range<usize>, DepthwiseError> {
        if window.len() > self.rows {
            return Err(DepthwiseError::RingCapacityExceeded(window.len(), self.rows));
        }
        let continues = !self.ready.is_empty()
            && self.ready.start <= window.start
            && window.start <= self.ready.end;
        if !continues {
            self.ready = window.clone();
            return Ok(window);
        }
        let fresh_start = self.ready.end;
        let end = window.end.max(fresh_start);
        let start = self.ready.start.max(end.saturating_sub(self.rows));
        self.ready = start..end;
        Ok(fresh_start..end)
    }

    #[inline]
    pub(crate) fn data(&self) -> &[i32] {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut [i32] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::DepthwiseVariant;

    fn buffer(rows: usize) -> RowRingBuffer {
        let shape = ConvShape::new(1, 1, 4, 1, 1);
        RowRingBuffer {
            data: vec![0; rows * 4],
            rows,
            row_stride: 4,
            ready: 0..0,
            shape,
            layout: LayoutParams::new(&shape, DepthwiseVariant::WidenedR0, 4, None),
        }
    }

    #[test]
    fn layout_must_match_exactly() {
        let shape = ConvShape::new(8, 8, 8, 3, 3);
        let pixel_major = LayoutParams::new(&shape, DepthwiseVariant::WidenedR0, 4, Some(8));
        let blocked = LayoutParams::new(&shape, DepthwiseVariant::WidenedR1, 4, Some(8));
        assert_eq!(pixel_major.ring_len(), blocked.ring_len());
        let ring = RowRingBuffer::new(&shape, &pixel_major).unwrap();
        assert!(ring.matches(&shape, &pixel_major));
        assert!(!ring.matches(&shape, &blocked));
        let padded = shape.with_padding(1, 0, 0, 0);
        assert!(!ring.matches(&padded, &pixel_major));
    }

    #[test]
    fn first_claim_writes_whole_window() {
        let mut ring = buffer(8);
        assert_eq!(ring.claim(2..7).unwrap(), 2..7);
        assert_eq!(ring.ready_rows(), 2..7);
        assert!(ring.holds(&(3..7)));
        assert!(!ring.holds(&(3..8)));
    }

    #[test]
    fn sliding_claim_writes_only_new_rows() {
        let mut ring = buffer(8);
        ring.claim(0..6).unwrap();
        assert_eq!(ring.claim(4..10).unwrap(), 6..10);
        // rows 0 and 1 were overwritten by 8 and 9
        assert_eq!(ring.ready_rows(), 2..10);
        assert_eq!(ring.claim(9..17).unwrap(), 10..17);
        assert_eq!(ring.ready_rows(), 9..17);
    }

    #[test]
    fn gap_restarts_window() {
        let mut ring = buffer(4);
        ring.claim(0..3).unwrap();
        assert_eq!(ring.claim(5..8).unwrap(), 5..8);
        assert_eq!(ring.ready_rows(), 5..8);
    }

    #[test]
    fn covered_window_needs_no_rows() {
        let mut ring = buffer(8);
        ring.claim(0..8).unwrap();
        assert!(ring.claim(2..6).unwrap().is_empty());
        assert_eq!(ring.ready_rows(), 0..8);
    }

    #[test]
    fn rejects_oversized_window() {
        let mut ring = buffer(4);
        assert_eq!(
            ring.claim(0..5),
            Err(DepthwiseError::RingCapacityExceeded(5, 4))
        );
        ring.claim(0..4).unwrap();
        ring.reset();
        assert_eq!(ring.claim(1..3).unwrap(), 1..3);
    }
}
