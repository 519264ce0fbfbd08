//! Sparse-sample camera motion detection, gating background refresh and
//! terrain re-selection.
//!
//! Grounded on the sampled-difference loop used to drive `Beep3`/terrain
//! reselection in the original prototype (`SoccerPlayersTracking/mainNB.cpp`):
//! a step-grid sample of per-channel differences against the previous frame,
//! thresholded and ratioed, feeding an edge-triggered moving/stopped state
//! machine.

use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;

use crate::vision::terrain::TerrainMask;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMotionParams {
    pub step: i32,
    pub pixel_changed_threshold: f64,
    pub camera_moved_threshold: f64,
}

impl Default for CameraMotionParams {
    fn default() -> Self {
        CameraMotionParams {
            step: 20,
            pixel_changed_threshold: 5.0,
            camera_moved_threshold: 0.2,
        }
    }
}

/// The edge-triggered result of observing one frame: whether the camera is
/// moving *this* frame, and whether it *just* stopped (the falling edge that
/// triggers a terrain reselect and background clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionEdge {
    pub moving: bool,
    pub just_stopped: bool,
}

/// Samples pixels on a step grid inside `terrain`, comparing `frame` against
/// `previous`. Tracks a single `was_moving` bit of internal state across
/// calls so callers get edge-triggered semantics for free.
pub struct CameraMotionDetector {
    params: CameraMotionParams,
    was_moving: bool,
}

impl CameraMotionDetector {
    pub fn new(params: CameraMotionParams) -> Self {
        CameraMotionDetector { params, was_moving: false }
    }

    /// Observes one frame transition. `previous` is `None` only for the
    /// very first frame, in which case no motion is ever asserted.
    pub fn observe(&mut self, frame: &Mat, previous: Option<&Mat>, terrain: &TerrainMask) -> opencv::Result<MotionEdge> {
        let Some(previous) = previous else {
            self.was_moving = false;
            return Ok(MotionEdge { moving: false, just_stopped: false });
        };

        let rows = frame.rows();
        let cols = frame.cols();
        let mut sampled = 0u32;
        let mut changed = 0u32;

        let mut row = 0;
        while row < rows {
            let mut col = 0;
            while col < cols {
                if terrain.contains(row, col) {
                    let a = *frame.at_2d::<Vec3b>(row, col)?;
                    let b = *previous.at_2d::<Vec3b>(row, col)?;
                    sampled += 1;
                    let diff = (a[0] as f64 - b[0] as f64).abs().max((a[1] as f64 - b[1] as f64).abs()).max((a[2] as f64 - b[2] as f64).abs());
                    if diff > self.params.pixel_changed_threshold {
                        changed += 1;
                    }
                }
                col += self.params.step;
            }
            row += self.params.step;
        }

        let moving = sampled > 0 && (changed as f64 / sampled as f64) > self.params.camera_moved_threshold;
        let just_stopped = self.was_moving && !moving;
        self.was_moving = moving;
        Ok(MotionEdge { moving, just_stopped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn solid(rows: i32, cols: i32, bgr: (f64, f64, f64)) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::new(bgr.0, bgr.1, bgr.2, 0.0)).unwrap()
    }

    fn full_terrain(rows: i32, cols: i32) -> TerrainMask {
        TerrainMask::from_polygon(&[(0, 0), (0, cols - 1), (rows - 1, cols - 1), (rows - 1, 0)], rows, cols).unwrap()
    }

    #[test]
    fn first_frame_never_asserts_motion() {
        let mut detector = CameraMotionDetector::new(CameraMotionParams::default());
        let frame = solid(40, 40, (0.0, 0.0, 0.0));
        let edge = detector.observe(&frame, None, &full_terrain(40, 40)).unwrap();
        assert!(!edge.moving);
        assert!(!edge.just_stopped);
    }

    #[test]
    fn large_uniform_shift_asserts_motion_then_settle_triggers_just_stopped() {
        let mut detector = CameraMotionDetector::new(CameraMotionParams::default());
        let terrain = full_terrain(40, 40);
        let still = solid(40, 40, (10.0, 10.0, 10.0));
        let moved = solid(40, 40, (200.0, 200.0, 200.0));

        let edge1 = detector.observe(&moved, Some(&still), &terrain).unwrap();
        assert!(edge1.moving);
        assert!(!edge1.just_stopped);

        let edge2 = detector.observe(&still, Some(&moved), &terrain).unwrap();
        assert!(edge2.moving);

        let edge3 = detector.observe(&still, Some(&still), &terrain).unwrap();
        assert!(!edge3.moving);
        assert!(edge3.just_stopped);
    }
}
