//! Color histograms and boundary finding.
//!
//! The segmenter never uses absolute pixel coordinates: screenshot resolution
//! and card placement vary, so section boundaries are located from per-row
//! (or per-column) counts of pixels matching a color band.

use crate::buffer::{Color, ColorBand, PixelBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

/// Count of pixels whose color falls within `band`, per row or per column.
pub fn color_histogram(buffer: &PixelBuffer, band: ColorBand, axis: Axis) -> Vec<u32> {
    let len = match axis {
        Axis::Row => buffer.height(),
        Axis::Col => buffer.width(),
    } as usize;
    let mut hist = vec![0u32; len];

    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            if band.matches(buffer.color_at(x, y)) {
                let i = match axis {
                    Axis::Row => y,
                    Axis::Col => x,
                } as usize;
                hist[i] += 1;
            }
        }
    }
    hist
}

/// First and last index whose value exceeds `relative_threshold * max(hist)`.
///
/// Returns `(0, 0)` for an empty or all-zero histogram.
pub fn find_histogram_range(hist: &[u32], relative_threshold: f32) -> (usize, usize) {
    let max = hist.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return (0, 0);
    }
    let cutoff = max as f32 * relative_threshold;

    let mut first = None;
    let mut last = 0;
    for (i, &v) in hist.iter().enumerate() {
        if v as f32 > cutoff {
            if first.is_none() {
                first = Some(i);
            }
            last = i;
        }
    }
    (first.unwrap_or(0), last)
}

/// Skipped top margin: the first rows of a card crop are frequently polluted
/// by window chrome or the previous section's anti-aliased edge.
pub const BOUNDARY_SKIP_ROWS: u32 = 20;

/// First row (scanning downward from `start_row`) whose fraction of
/// band-matching pixels exceeds `coverage`. `0` when none is found; the
/// caller then treats the whole buffer as one section.
pub fn find_boundary_row(
    buffer: &PixelBuffer,
    band: ColorBand,
    coverage: f32,
    start_row: u32,
) -> u32 {
    if buffer.is_empty() {
        return 0;
    }
    let needed = (buffer.width() as f32 * coverage) as u32;
    for y in start_row..buffer.height() {
        let mut count = 0u32;
        for x in 0..buffer.width() {
            if band.matches(buffer.color_at(x, y)) {
                count += 1;
            }
        }
        if count > needed {
            return y;
        }
    }
    0
}

/// Slide a window of `batch_size` rows over the buffer, summing a per-pixel
/// score, and return the start row of the maximum-scoring batch.
///
/// Used where no sharp single-row boundary exists (e.g. separating sub-stat
/// text from the green set-name text).
pub fn find_batched_peak_row(
    buffer: &PixelBuffer,
    batch_size: u32,
    score: impl Fn(Color) -> u32,
) -> u32 {
    if buffer.is_empty() || batch_size == 0 {
        return 0;
    }

    let mut row_scores = Vec::with_capacity(buffer.height() as usize);
    for y in 0..buffer.height() {
        let mut s = 0u64;
        for x in 0..buffer.width() {
            s += score(buffer.color_at(x, y)) as u64;
        }
        row_scores.push(s);
    }

    let batch = (batch_size as usize).min(row_scores.len());
    let mut sum: u64 = row_scores[..batch].iter().sum();
    let mut best_sum = sum;
    let mut best_row = 0;
    for start in 1..=row_scores.len() - batch {
        sum = sum - row_scores[start - 1] + row_scores[start + batch - 1];
        if sum > best_sum {
            best_sum = sum;
            best_row = start;
        }
    }
    best_row as u32
}

/// Per-pixel "greenness" score: how much green dominates red/blue, floored so
/// neutral background pixels contribute nothing.
pub fn greenness(c: Color) -> u32 {
    let avg_rb = (c.r as i32 + c.b as i32) / 2;
    let diff = c.g as i32 - avg_rb;
    if diff > 40 { diff as u32 } else { 0 }
}
