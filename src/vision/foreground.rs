//! Converts a frame, background and terrain mask into a binary foreground
//! flag map, combining background-difference, previous-frame-difference and
//! a low-green veto.
//!
//! Grounded on the distance-accumulation pattern of
//! `IsForegroundPixel2`/background-difference loops in the original
//! prototype (`SoccerPlayersTracking/mainNB.cpp`): squared-BGR distance with
//! a green-channel penalty term, gated by a "survives only if suddenly
//! changed or non-field" rule that rejects slow color drift.

use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;

use crate::vision::field_color::FieldColorModel;
use crate::vision::terrain::TerrainMask;
use crate::vision::types::Mask;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForegroundThresholds {
    pub tau_bg: f64,
    pub tau_prev: f64,
    pub green_threshold: f64,
}

impl Default for ForegroundThresholds {
    fn default() -> Self {
        ForegroundThresholds {
            tau_bg: 800.0,
            tau_prev: 200.0,
            green_threshold: 35.0,
        }
    }
}

/// Squared BGR distance between two pixels, with `(greenThreshold - G)^2`
/// added when the first pixel's green channel falls below `green_threshold`.
pub fn background_distance(pixel: Vec3b, reference: Vec3b, green_threshold: f64) -> f64 {
    let db = pixel[0] as f64 - reference[0] as f64;
    let dg = pixel[1] as f64 - reference[1] as f64;
    let dr = pixel[2] as f64 - reference[2] as f64;
    let mut dist = db * db + dg * dg + dr * dr;
    let g = pixel[1] as f64;
    if g < green_threshold {
        let penalty = green_threshold - g;
        dist += penalty * penalty;
    }
    dist
}

/// Runs the three-step segmentation procedure over the rectangle
/// `(min_row..=max_row, min_col..=max_col)`, restricted further to pixels
/// inside `terrain`.
pub fn segment(
    frame: &Mat,
    previous_frame: Option<&Mat>,
    background: &Mat,
    terrain: &TerrainMask,
    field_color: &FieldColorModel,
    thresholds: &ForegroundThresholds,
    min_row: i32,
    max_row: i32,
    min_col: i32,
    max_col: i32,
) -> opencv::Result<Mask> {
    let rows = frame.rows();
    let cols = frame.cols();
    let mut mask = Mask::new(rows, cols);

    for i in min_row.max(0)..=max_row.min(rows - 1) {
        for j in min_col.max(0)..=max_col.min(cols - 1) {
            if !terrain.contains(i, j) {
                continue;
            }
            let pixel = *frame.at_2d::<Vec3b>(i, j)?;
            let bg_pixel = *background.at_2d::<Vec3b>(i, j)?;
            if bg_pixel[0] == 0 && bg_pixel[1] == 0 && bg_pixel[2] == 0 {
                // Background never accumulated a contribution at this pixel
                // (BackgroundModel::background() emits black where count==0);
                // treating it as a real reference would flag it foreground
                // against almost any live frame pixel.
                continue;
            }
            let bg_distance = background_distance(pixel, bg_pixel, thresholds.green_threshold);
            if bg_distance <= thresholds.tau_bg {
                continue;
            }

            let suddenly_changed = match previous_frame {
                Some(prev) => {
                    let prev_pixel = *prev.at_2d::<Vec3b>(i, j)?;
                    background_distance(pixel, prev_pixel, thresholds.green_threshold) > thresholds.tau_prev
                }
                None => false,
            };
            let non_field = !field_color.is_field_pixel(pixel);

            if suddenly_changed || non_field {
                mask.set(i, j, true);
            }
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn solid(rows: i32, cols: i32, bgr: (f64, f64, f64)) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::new(bgr.0, bgr.1, bgr.2, 0.0)).unwrap()
    }

    #[test]
    fn flags_a_color_jump_inside_terrain() {
        let background = solid(6, 6, (60.0, 170.0, 120.0));
        let frame = solid(6, 6, (200.0, 10.0, 10.0));
        let terrain = TerrainMask::from_polygon(&[(0, 0), (0, 5), (5, 5), (5, 0)], 6, 6).unwrap();
        let mask = segment(
            &frame,
            None,
            &background,
            &terrain,
            &FieldColorModel::default(),
            &ForegroundThresholds::default(),
            0,
            5,
            0,
            5,
        )
        .unwrap();
        assert!(mask.get(2, 2));
    }

    #[test]
    fn slow_drift_without_sudden_change_is_rejected_when_field_colored() {
        // Both BGR triples land inside the default field chromaticity bounds
        // (r=0.345..0.3661, g=0.46..0.5075); only their magnitude differs.
        let background = solid(6, 6, (51.0, 144.0, 105.0));
        // Field-colored pixel far enough from `background` to fail tau_bg,
        // with no previous frame to trigger suddenly_changed -- should be
        // rejected since it is still field-colored (non_field == false).
        let frame = solid(6, 6, (53.0, 146.0, 106.0));
        let terrain = TerrainMask::from_polygon(&[(0, 0), (0, 5), (5, 5), (5, 0)], 6, 6).unwrap();
        let mut thresholds = ForegroundThresholds::default();
        thresholds.tau_bg = 1.0;
        let mask = segment(&frame, None, &background, &terrain, &FieldColorModel::default(), &thresholds, 0, 5, 0, 5).unwrap();
        assert!(!mask.get(2, 2));
    }
}
