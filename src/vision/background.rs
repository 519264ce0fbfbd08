//! Sliding-window background model: a ring buffer of green-mask
//! classifications plus per-pixel running sums, producing a pixel-wise mean
//! background of the field.
//!
//! Grounded on `GetBackground`/`BackgroundFetcher5` in the original
//! prototype (`SoccerPlayersTracking/mainNB.cpp`): the running sum/count
//! accumulation is a direct port, and the salvage-on-evict rule fixes the
//! original's `flags[frame][i][j]==1;` no-op (a comparison where an
//! assignment was meant) by actually flipping the mask bit in the slot the
//! contribution is moved into.

use std::collections::VecDeque;

use opencv::core::{Mat, Vec3b, CV_8UC3};
use opencv::prelude::*;

use crate::vision::field_color::{extract_green_mask, FieldColorModel};
use crate::vision::types::Mask;

struct Slot {
    mask: Mask,
    pixels: Vec<Vec3b>,
}

impl Slot {
    fn pixel(&self, row: i32, col: i32, cols: i32) -> Vec3b {
        self.pixels[(row as usize) * (cols as usize) + (col as usize)]
    }

    fn set_pixel(&mut self, row: i32, col: i32, cols: i32, value: Vec3b) {
        self.pixels[(row as usize) * (cols as usize) + (col as usize)] = value;
    }
}

/// Ring buffer of up to `capacity` frames' green-mask classifications, with
/// per-pixel running BGR sums (`f64`, to avoid overflow/precision loss over
/// long runs), contribution counts, and untouched-streak counters.
pub struct BackgroundModel {
    rows: i32,
    cols: i32,
    capacity: usize,
    minimum_size: u32,
    untouched_ttl: u32,
    slots: VecDeque<Slot>,
    sum: Vec<[f64; 3]>,
    count: Vec<u32>,
    untouched_count: Vec<u32>,
    /// Tight enclosure of every pixel with `count > 0`; `None` when no pixel
    /// has ever contributed. Recomputed after `add`/`remove` change the
    /// `count` array (spec §4.3/§8: "Bounding-rectangle tightness").
    bounds: Option<(i32, i32, i32, i32)>,
}

impl BackgroundModel {
    pub fn new(rows: i32, cols: i32, capacity: usize) -> Self {
        let n = (rows as usize) * (cols as usize);
        BackgroundModel {
            rows,
            cols,
            capacity,
            minimum_size: 3,
            untouched_ttl: 30,
            slots: VecDeque::with_capacity(capacity),
            sum: vec![[0.0; 3]; n],
            count: vec![0; n],
            untouched_count: vec![0; n],
            bounds: None,
        }
    }

    pub fn with_thresholds(mut self, minimum_size: u32, untouched_ttl: u32) -> Self {
        self.minimum_size = minimum_size;
        self.untouched_ttl = untouched_ttl;
        self
    }

    #[inline]
    fn index(&self, row: i32, col: i32) -> usize {
        (row as usize) * (self.cols as usize) + (col as usize)
    }

    /// Adds one frame to the model: evicts the oldest slot first if the
    /// buffer is full, computes the new frame's green-mask, then folds its
    /// BGR values into the running sum wherever the mask is set.
    pub fn add(&mut self, frame: &Mat, field_color: &FieldColorModel, previous_size_threshold: f64, y_aligned: bool) -> opencv::Result<()> {
        if self.slots.len() >= self.capacity {
            self.remove();
        }

        let mask = extract_green_mask(frame, field_color, previous_size_threshold, y_aligned)?;
        let mut pixels = Vec::with_capacity((self.rows as usize) * (self.cols as usize));
        for i in 0..self.rows {
            for j in 0..self.cols {
                pixels.push(*frame.at_2d::<Vec3b>(i, j)?);
            }
        }

        for i in 0..self.rows {
            for j in 0..self.cols {
                let idx = self.index(i, j);
                if mask.get(i, j) {
                    let p = pixels[idx];
                    self.sum[idx][0] += p[0] as f64;
                    self.sum[idx][1] += p[1] as f64;
                    self.sum[idx][2] += p[2] as f64;
                    self.count[idx] += 1;
                    self.untouched_count[idx] = 0;
                } else {
                    self.untouched_count[idx] += 1;
                }
            }
        }

        self.slots.push_back(Slot { mask, pixels });
        self.recompute_bounds();
        Ok(())
    }

    /// Rescans `count` for a tight enclosure of every contributing pixel.
    fn recompute_bounds(&mut self) {
        let mut bounds: Option<(i32, i32, i32, i32)> = None;
        for i in 0..self.rows {
            for j in 0..self.cols {
                if self.count[self.index(i, j)] == 0 {
                    continue;
                }
                bounds = Some(match bounds {
                    Some((min_row, max_row, min_col, max_col)) => (min_row.min(i), max_row.max(i), min_col.min(j), max_col.max(j)),
                    None => (i, i, j, j),
                });
            }
        }
        self.bounds = bounds;
    }

    /// Tight enclosure of every pixel with `count > 0`, or `None` if the
    /// model has never accumulated a contribution. Passed downstream to
    /// restrict foreground segmentation to the region the background
    /// actually covers.
    pub fn bounding_rect(&self) -> Option<(i32, i32, i32, i32)> {
        self.bounds
    }

    /// Evicts the oldest slot. Pixels that are rare (`count <= minimum_size`)
    /// and stale (`untouched_count > untouched_ttl`) have their contribution
    /// salvaged into the first newer slot that did not already mark them,
    /// rather than truly evicted; all other contributing pixels are subtracted
    /// from the running sum and their count decremented.
    pub fn remove(&mut self) {
        let Some(oldest) = self.slots.pop_front() else {
            return;
        };

        for i in 0..self.rows {
            for j in 0..self.cols {
                if !oldest.mask.get(i, j) {
                    continue;
                }
                let idx = self.index(i, j);
                let salvageable = self.count[idx] <= self.minimum_size && self.untouched_count[idx] > self.untouched_ttl;
                let salvage_slot = if salvageable {
                    self.slots.iter_mut().find(|slot| !slot.mask.get(i, j))
                } else {
                    None
                };
                match salvage_slot {
                    Some(slot) => {
                        let value = oldest.pixel(i, j, self.cols);
                        slot.set_pixel(i, j, self.cols, value);
                        slot.mask.set(i, j, true);
                    }
                    None => {
                        let p = oldest.pixel(i, j, self.cols);
                        self.sum[idx][0] -= p[0] as f64;
                        self.sum[idx][1] -= p[1] as f64;
                        self.sum[idx][2] -= p[2] as f64;
                        self.count[idx] -= 1;
                    }
                }
            }
        }
        self.recompute_bounds();
    }

    /// Emits `sum[i,j]/count[i,j]` where `count > 0`, else black.
    pub fn background(&self) -> opencv::Result<Mat> {
        let mut out = Mat::new_rows_cols_with_default(self.rows, self.cols, CV_8UC3, opencv::core::Scalar::all(0.0))?;
        for i in 0..self.rows {
            for j in 0..self.cols {
                let idx = self.index(i, j);
                if self.count[idx] == 0 {
                    continue;
                }
                let c = self.count[idx] as f64;
                let pixel = out.at_2d_mut::<Vec3b>(i, j)?;
                pixel[0] = (self.sum[idx][0] / c) as u8;
                pixel[1] = (self.sum[idx][1] / c) as u8;
                pixel[2] = (self.sum[idx][2] / c) as u8;
            }
        }
        Ok(out)
    }

    /// Zeros sums, counts and untouched counters, and empties the buffer.
    /// Invoked when camera motion settles and the scene has changed enough
    /// to invalidate the accumulated background.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.sum.iter_mut().for_each(|s| *s = [0.0; 3]);
        self.count.iter_mut().for_each(|c| *c = 0);
        self.untouched_count.iter_mut().for_each(|u| *u = 0);
        self.bounds = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn count_at(&self, row: i32, col: i32) -> u32 {
        self.count[self.index(row, col)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;

    fn solid_green_frame(rows: i32, cols: i32) -> Mat {
        // BGR = (51, 144, 105): r=105/300=0.35, g=144/300=0.48, both inside
        // the default FieldColorModel bounds.
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::new(51.0, 144.0, 105.0, 0.0)).unwrap()
    }

    #[test]
    fn background_averages_constant_field() {
        let mut model = BackgroundModel::new(8, 8, 4);
        let field_color = FieldColorModel::default();
        let frame = solid_green_frame(8, 8);
        for _ in 0..4 {
            model.add(&frame, &field_color, 2.0, false).unwrap();
        }
        let bg = model.background().unwrap();
        let pixel = *bg.at_2d::<Vec3b>(3, 3).unwrap();
        assert_eq!(pixel, *frame.at_2d::<Vec3b>(3, 3).unwrap());
    }

    #[test]
    fn clear_resets_counts() {
        let mut model = BackgroundModel::new(4, 4, 2);
        let field_color = FieldColorModel::default();
        let frame = solid_green_frame(4, 4);
        model.add(&frame, &field_color, 2.0, false).unwrap();
        model.clear();
        assert!(model.is_empty());
        assert_eq!(model.count_at(0, 0), 0);
        assert_eq!(model.bounding_rect(), None);
    }

    #[test]
    fn bounding_rect_tightly_encloses_every_contributing_pixel() {
        let mut model = BackgroundModel::new(8, 8, 4);
        let field_color = FieldColorModel::default();
        let frame = solid_green_frame(8, 8);
        model.add(&frame, &field_color, 2.0, false).unwrap();
        let (min_row, max_row, min_col, max_col) = model.bounding_rect().expect("at least one pixel contributed");
        for i in 0..8 {
            for j in 0..8 {
                if model.count_at(i, j) > 0 {
                    assert!(min_row <= i && i <= max_row && min_col <= j && j <= max_col);
                }
            }
        }
    }
}
