// SPDX-License-Identifier: MPL-2.0
//! Copies converted frames into device memory.
//!
//! Frames are placed at an offset (optionally justified to the right or
//! bottom edge), clipped to the device, and optionally magnified by
//! duplicating every pixel into an `m x m` block.

use crate::player::decode::FrameView;

/// Row-addressable destination for decoded pixels.
pub trait FrameSink {
    fn rows(&self) -> usize;

    fn cols(&self) -> usize;

    fn bytes_per_pixel(&self) -> usize;

    /// Bytes of device row `row`, at least `cols() * bytes_per_pixel()` long.
    fn row_mut(&mut self, row: usize) -> &mut [u8];
}

/// Heap-backed [`FrameSink`] for tests and benchmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySink {
    rows: usize,
    cols: usize,
    bytes_per_pixel: usize,
    pixels: Vec<u8>,
}

impl MemorySink {
    #[must_use]
    pub fn new(rows: usize, cols: usize, bytes_per_pixel: usize) -> Self {
        Self {
            rows,
            cols,
            bytes_per_pixel,
            pixels: vec![0; rows * cols * bytes_per_pixel],
        }
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[u8] {
        let len = self.cols * self.bytes_per_pixel;
        &self.pixels[row * len..(row + 1) * len]
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl FrameSink for MemorySink {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let len = self.cols * self.bytes_per_pixel;
        &mut self.pixels[row * len..(row + 1) * len]
    }
}

/// Where and how large a frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Pixel duplication factor, at least 1.
    pub magnify: usize,
    pub offset_x: i64,
    pub offset_y: i64,
    /// Measure `offset_x` from the right edge.
    pub right: bool,
    /// Measure `offset_y` from the bottom edge.
    pub bottom: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            magnify: 1,
            offset_x: 0,
            offset_y: 0,
            right: false,
            bottom: false,
        }
    }
}

impl Placement {
    /// Device `(row, col)` of the frame's top-left pixel; may be negative.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn origin(&self, sink_rows: usize, sink_cols: usize, width: usize, height: usize) -> (i64, i64) {
        let m = self.magnify.max(1) as i64;
        let col = if self.right {
            sink_cols as i64 - width as i64 * m + self.offset_x
        } else {
            self.offset_x
        };
        let row = if self.bottom {
            sink_rows as i64 - height as i64 * m + self.offset_y
        } else {
            self.offset_y
        };
        (row, col)
    }
}

/// Copies `pixels` (a run of `bpp`-byte pixels) to device row `row` at `col`,
/// clipping to the device.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn draw_row(sink: &mut impl FrameSink, row: i64, col: i64, pixels: &[u8]) {
    if row < 0 || row >= sink.rows() as i64 {
        return;
    }
    let bpp = sink.bytes_per_pixel();
    let cols = sink.cols() as i64;
    let count = (pixels.len() / bpp) as i64;

    let skip = (-col).clamp(0, count);
    let start = col + skip;
    let visible = (count - skip).min(cols - start).max(0);
    if visible == 0 {
        return;
    }

    let src = &pixels[skip as usize * bpp..(skip + visible) as usize * bpp];
    let dst = sink.row_mut(row as usize);
    let offset = start as usize * bpp;
    dst[offset..offset + src.len()].copy_from_slice(src);
}

/// Draws `frame` onto `sink` according to `placement`.
///
/// The frame's pixel layout must match the sink's depth.
#[allow(clippy::cast_possible_wrap)]
pub fn present(frame: &FrameView<'_>, sink: &mut impl FrameSink, placement: &Placement) {
    let m = placement.magnify.max(1);
    let (row0, col0) = placement.origin(sink.rows(), sink.cols(), frame.width, frame.height);

    if m == 1 {
        for r in 0..frame.height {
            draw_row(sink, row0 + r as i64, col0, frame.row(r));
        }
        return;
    }

    let bpp = frame.bytes_per_pixel;
    let mut magnified = vec![0u8; frame.width * m * bpp];
    for r in 0..frame.height {
        let src = frame.row(r);
        for (pixel, block) in src
            .chunks_exact(bpp)
            .zip(magnified.chunks_exact_mut(bpp * m))
        {
            for copy in block.chunks_exact_mut(bpp) {
                copy.copy_from_slice(pixel);
            }
        }
        let top = row0 + (r * m) as i64;
        for i in 0..m {
            draw_row(sink, top + i as i64, col0, &magnified);
        }
    }
}

/// Zoom that fits a `width x height` frame, magnified `magnify` times, on the device.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fullscreen_zoom(rows: usize, cols: usize, width: u32, height: u32, magnify: usize) -> f32 {
    if width == 0 || height == 0 {
        return 1.0;
    }
    let m = magnify.max(1) as f32;
    let by_height = rows as f32 / height as f32 / m;
    let by_width = cols as f32 / width as f32 / m;
    by_height.min(by_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_abs_diff_eq;

    /// 2x2 frame with one-byte pixels 1 2 / 3 4.
    fn small_frame(pixels: &[u8]) -> FrameView<'_> {
        FrameView {
            pixels,
            stride: 2,
            width: 2,
            height: 2,
            bytes_per_pixel: 1,
        }
    }

    #[test]
    fn copies_frame_at_offset() {
        let pixels = [1, 2, 3, 4];
        let mut sink = MemorySink::new(4, 4, 1);
        let placement = Placement {
            offset_x: 1,
            offset_y: 2,
            ..Placement::default()
        };
        present(&small_frame(&pixels), &mut sink, &placement);

        assert_eq!(sink.row(0), &[0, 0, 0, 0]);
        assert_eq!(sink.row(2), &[0, 1, 2, 0]);
        assert_eq!(sink.row(3), &[0, 3, 4, 0]);
    }

    #[test]
    fn clips_left_and_right_edges() {
        let pixels = [1, 2, 3, 4];
        let mut sink = MemorySink::new(2, 3, 1);

        let left = Placement {
            offset_x: -1,
            ..Placement::default()
        };
        present(&small_frame(&pixels), &mut sink, &left);
        assert_eq!(sink.row(0), &[2, 0, 0]);

        let right = Placement {
            offset_x: 2,
            ..Placement::default()
        };
        present(&small_frame(&pixels), &mut sink, &right);
        assert_eq!(sink.row(1), &[4, 0, 3]);
    }

    #[test]
    fn clips_rows_outside_device() {
        let pixels = [1, 2, 3, 4];
        let mut sink = MemorySink::new(1, 2, 1);
        let placement = Placement {
            offset_y: -1,
            ..Placement::default()
        };
        present(&small_frame(&pixels), &mut sink, &placement);
        assert_eq!(sink.row(0), &[3, 4]);
    }

    #[test]
    fn frame_entirely_off_screen_draws_nothing() {
        let pixels = [1, 2, 3, 4];
        let mut sink = MemorySink::new(2, 2, 1);
        let placement = Placement {
            offset_x: 10,
            offset_y: -10,
            ..Placement::default()
        };
        present(&small_frame(&pixels), &mut sink, &placement);
        assert!(sink.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn magnify_duplicates_pixels_into_blocks() {
        let pixels = [1, 2, 3, 4];
        let mut sink = MemorySink::new(4, 4, 1);
        let placement = Placement {
            magnify: 2,
            ..Placement::default()
        };
        present(&small_frame(&pixels), &mut sink, &placement);

        assert_eq!(sink.row(0), &[1, 1, 2, 2]);
        assert_eq!(sink.row(1), &[1, 1, 2, 2]);
        assert_eq!(sink.row(2), &[3, 3, 4, 4]);
        assert_eq!(sink.row(3), &[3, 3, 4, 4]);
    }

    #[test]
    fn magnify_keeps_multibyte_pixels_intact() {
        let pixels = [0xAA, 0xBB];
        let frame = FrameView {
            pixels: &pixels,
            stride: 2,
            width: 1,
            height: 1,
            bytes_per_pixel: 2,
        };
        let mut sink = MemorySink::new(3, 3, 2);
        let placement = Placement {
            magnify: 3,
            ..Placement::default()
        };
        present(&frame, &mut sink, &placement);
        assert_eq!(sink.row(2), &[0xAA, 0xBB, 0xAA, 0xBB, 0xAA, 0xBB]);
    }

    #[test]
    fn right_and_bottom_justification() {
        let pixels = [1, 2, 3, 4];
        let mut sink = MemorySink::new(3, 4, 1);
        let placement = Placement {
            right: true,
            bottom: true,
            ..Placement::default()
        };
        present(&small_frame(&pixels), &mut sink, &placement);

        assert_eq!(placement.origin(3, 4, 2, 2), (1, 2));
        assert_eq!(sink.row(0), &[0, 0, 0, 0]);
        assert_eq!(sink.row(1), &[0, 0, 1, 2]);
        assert_eq!(sink.row(2), &[0, 0, 3, 4]);
    }

    #[test]
    fn justification_accounts_for_magnify() {
        let placement = Placement {
            magnify: 2,
            offset_x: -1,
            right: true,
            ..Placement::default()
        };
        assert_eq!(placement.origin(10, 10, 3, 3), (0, 3));
    }

    #[test]
    fn fullscreen_zoom_fits_smaller_axis() {
        assert_abs_diff_eq!(fullscreen_zoom(600, 800, 400, 200, 1), 2.0);
        assert_abs_diff_eq!(fullscreen_zoom(600, 800, 400, 200, 2), 1.0);
        assert_abs_diff_eq!(fullscreen_zoom(600, 800, 0, 0, 1), 1.0);
    }
}
