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
use rayon::ThreadPool;

/// Controls how output rows are spread across threads
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub enum ThreadingPolicy {
    #[default]
    Single,
    Fixed(usize),
    /// One thread per 128x128 output pixels, at most 16
    Adaptive,
}

impl ThreadingPolicy {
    pub fn thread_count(&self, dst_h: usize, dst_w: usize) -> usize {
        let threads = match self {
            ThreadingPolicy::Single => 1,
            ThreadingPolicy::Fixed(thread_count) => (*thread_count).max(1),
            ThreadingPolicy::Adaptive => {
                let box_size = 128 * 128;
                let new_box_size = dst_h * dst_w;
                (new_box_size / box_size).clamp(1, 16)
            }
        };
        threads.min(dst_h.max(1))
    }

    /// Returns `None` when rows should be processed on the calling thread
    pub fn get_pool(&self, dst_h: usize, dst_w: usize) -> Result<Option<ThreadPool>, DepthwiseError> {
        let threads_count = self.thread_count(dst_h, dst_w);
        if threads_count <= 1 {
            return Ok(None);
        }
        let shared_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads_count)
            .build()
            .map_err(|x| DepthwiseError::ThreadPool(x.to_string()))?;
        Ok(Some(shared_pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_never_spawns() {
        assert_eq!(ThreadingPolicy::Single.thread_count(4096, 4096), 1);
        assert!(ThreadingPolicy::Single.get_pool(4096, 4096).unwrap().is_none());
    }

    #[test]
    fn threads_do_not_exceed_rows() {
        assert_eq!(ThreadingPolicy::Fixed(8).thread_count(3, 100), 3);
        assert_eq!(ThreadingPolicy::Fixed(0).thread_count(3, 100), 1);
    }

    #[test]
    fn adaptive_scales_with_area() {
        assert_eq!(ThreadingPolicy::Adaptive.thread_count(64, 64), 1);
        assert_eq!(ThreadingPolicy::Adaptive.thread_count(256, 256), 4);
        assert_eq!(ThreadingPolicy::Adaptive.thread_count(8192, 8192), 16);
    }

    #[test]
    fn fixed_builds_pool() {
        let pool = ThreadingPolicy::Fixed(2).get_pool(16, 16).unwrap();
        assert_eq!(pool.map(|x| x.current_num_threads()), Some(2));
    }
}
