//! End-to-end scenarios over a synthetic 200x300 BGR frame stream, exercising
//! the pipeline the way a single processing-thread frame loop would: build a
//! background, then step the registry frame by frame.

use opencv::core::{Mat, Scalar, Vec3b, CV_8UC3};
use opencv::prelude::*;

use pitchtrack::vision::background::BackgroundModel;
use pitchtrack::vision::camera_motion::{CameraMotionDetector, CameraMotionParams};
use pitchtrack::vision::field_color::FieldColorModel;
use pitchtrack::vision::registry::{RegistryParams, TrackedObjectRegistry};
use pitchtrack::vision::terrain::TerrainMask;
use pitchtrack::vision::types::TypeFlags;

const ROWS: i32 = 200;
const COLS: i32 = 300;

// BGR (51, 144, 105): r = 105/300 = 0.35, g = 144/300 = 0.48, both inside
// FieldColorModel::default()'s bounds.
const FIELD_BGR: (u8, u8, u8) = (51, 144, 105);

fn field_frame(blobs: &[(i32, i32, (u8, u8, u8))]) -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(ROWS, COLS, CV_8UC3, Scalar::new(FIELD_BGR.0 as f64, FIELD_BGR.1 as f64, FIELD_BGR.2 as f64, 0.0)).unwrap();
    for &(center_row, center_col, color) in blobs {
        for dr in -4..=4 {
            for dc in -4..=4 {
                let row = center_row + dr;
                let col = center_col + dc;
                if row >= 0 && row < ROWS && col >= 0 && col < COLS {
                    *frame.at_2d_mut::<Vec3b>(row, col).unwrap() = Vec3b::from([color.0, color.1, color.2]);
                }
            }
        }
    }
    frame
}

fn full_terrain() -> TerrainMask {
    TerrainMask::from_polygon(&[(0, 0), (0, COLS - 1), (ROWS - 1, COLS - 1), (ROWS - 1, 0)], ROWS, COLS).unwrap()
}

fn build_background(frame: &Mat, take: usize) -> (Mat, Option<(i32, i32, i32, i32)>) {
    let mut model = BackgroundModel::new(ROWS, COLS, take);
    let field_color = FieldColorModel::default();
    for _ in 0..take {
        model.add(frame, &field_color, 2.0, false).unwrap();
    }
    (model.background().unwrap(), model.bounding_rect())
}

#[test]
fn static_field_tracks_nothing() {
    let frame = field_frame(&[]);
    let (background, background_bounds) = build_background(&frame, 10);
    let terrain = full_terrain();
    let field_color = FieldColorModel::default();
    let mut registry = TrackedObjectRegistry::new(ROWS, COLS, RegistryParams::default());

    let mut previous: Option<Mat> = None;
    for frame_index in 0..20u64 {
        registry.step(&frame, previous.as_ref(), &background, true, background_bounds, &terrain, &field_color, frame_index).unwrap();
        previous = Some(frame.clone());
    }

    assert!(registry.tracked().is_empty());
    assert!(registry.disposed().is_empty());
}

#[test]
fn single_walking_blob_keeps_one_stable_id() {
    let (background, background_bounds) = build_background(&field_frame(&[]), 10);
    let terrain = full_terrain();
    let field_color = FieldColorModel::default();
    let mut registry = TrackedObjectRegistry::new(ROWS, COLS, RegistryParams::default());

    let mut previous: Option<Mat> = None;
    let mut seen_id = None;
    let mut stable_frames = 0u32;
    for frame_index in 0..60u64 {
        let row = 20 + (frame_index as i32) * 2;
        let col = 20 + (frame_index as i32) * 2;
        let frame = field_frame(&[(row, col, (0, 0, 255))]);

        registry.step(&frame, previous.as_ref(), &background, true, background_bounds, &terrain, &field_color, frame_index).unwrap();

        if let Some(object) = registry.tracked().first() {
            match seen_id {
                None => seen_id = Some(object.id),
                Some(id) => assert_eq!(id, object.id, "tracked id changed across frames"),
            }
            stable_frames += 1;
        }
        previous = Some(frame);
    }

    assert!(seen_id.is_some(), "expected the walking blob to be tracked at least once");
    assert!(stable_frames >= 55, "expected the blob to be tracked for most of the 60 frames, got {stable_frames}");
    let object = &registry.tracked()[0];
    assert!(object.history.len() >= 55);
}

#[test]
fn two_crossing_blobs_mark_a_push_out() {
    let (background, background_bounds) = build_background(&field_frame(&[]), 10);
    let terrain = full_terrain();
    let field_color = FieldColorModel::default();
    let mut registry = TrackedObjectRegistry::new(ROWS, COLS, RegistryParams::default());

    let mut previous: Option<Mat> = None;
    let mut saw_push_out = false;
    for frame_index in 0..60u64 {
        let t = frame_index as i32;
        // Two blobs converge toward the center at frame 30, then separate.
        let a_col = 50 + t.min(30) * 2 - (t - 30).max(0) * 2;
        let b_col = 200 - t.min(30) * 2 + (t - 30).max(0) * 2;
        let frame = field_frame(&[(100, a_col, (0, 0, 255)), (100, b_col, (255, 0, 0))]);

        registry.step(&frame, previous.as_ref(), &background, true, background_bounds, &terrain, &field_color, frame_index).unwrap();

        if registry.tracked().iter().any(|o| o.pushed_out) {
            saw_push_out = true;
        }
        previous = Some(frame);
    }

    assert!(saw_push_out, "expected at least one object to be marked pushed out during the crossing");
    for object in registry.tracked() {
        if object.history.iter().any(|b| b.type_flags.contains(TypeFlags::FILLED)) {
            // Filled boxes are only legitimate between a dispose and a revival.
            assert!(object.history.len() > 1);
        }
    }
}

#[test]
fn blob_that_leaves_the_field_eventually_gets_disposed() {
    let (background, background_bounds) = build_background(&field_frame(&[]), 10);
    // A narrow terrain strip so the blob can walk out of it quickly.
    let terrain = TerrainMask::from_polygon(&[(0, 0), (0, 100), (ROWS - 1, 100), (ROWS - 1, 0)], ROWS, COLS).unwrap();
    let field_color = FieldColorModel::default();
    let params = RegistryParams { allowed_frames_outside_of_terrain: 50, ..RegistryParams::default() };
    let mut registry = TrackedObjectRegistry::new(ROWS, COLS, params);

    let mut previous: Option<Mat> = None;
    for frame_index in 0..80u64 {
        let col = 50 + (frame_index as i32) * 3;
        let frame = field_frame(&[(100, col.min(COLS - 10), (0, 0, 255))]);
        registry.step(&frame, previous.as_ref(), &background, true, background_bounds, &terrain, &field_color, frame_index).unwrap();
        previous = Some(frame);
    }

    assert!(!registry.disposed().is_empty() || registry.tracked().iter().any(|o| o.frames_outside_of_terrain > 0));
}

#[test]
fn maximum_cap_keeps_at_most_configured_count() {
    let (background, background_bounds) = build_background(&field_frame(&[]), 10);
    let terrain = full_terrain();
    let field_color = FieldColorModel::default();
    let params = RegistryParams { max_objects: 5, ..RegistryParams::default() };
    let mut registry = TrackedObjectRegistry::new(ROWS, COLS, params);

    let mut blobs = Vec::new();
    for i in 0..8 {
        let row = 10 + (i / 4) * 60;
        let col = 10 + (i % 4) * 70;
        blobs.push((row, col, (0, 0, 255)));
    }
    let frame = field_frame(&blobs);

    let mut previous: Option<Mat> = None;
    for frame_index in 0..5u64 {
        registry.step(&frame, previous.as_ref(), &background, true, background_bounds, &terrain, &field_color, frame_index).unwrap();
        previous = Some(frame.clone());
    }

    assert!(registry.tracked().len() <= 5);
}

#[test]
fn camera_pan_settles_into_a_clean_background_with_no_carried_over_ids() {
    let terrain = full_terrain();
    let field_color = FieldColorModel::default();
    let still_frame = field_frame(&[(100, 150, (0, 0, 255))]);
    let (background, background_bounds) = build_background(&field_frame(&[]), 10);
    let mut registry = TrackedObjectRegistry::new(ROWS, COLS, RegistryParams::default());
    let mut camera_motion = CameraMotionDetector::new(CameraMotionParams::default());

    // Phase 1: a stable blob is tracked before the camera starts panning.
    let mut previous: Option<Mat> = None;
    for frame_index in 0..10u64 {
        registry.step(&still_frame, previous.as_ref(), &background, true, background_bounds, &terrain, &field_color, frame_index).unwrap();
        previous = Some(still_frame.clone());
    }
    let pre_pan_id = registry.tracked().first().map(|o| o.id);
    assert!(pre_pan_id.is_some(), "expected the blob to be tracked before the pan starts");

    // Phase 2: the whole field sweeps to a uniformly bright frame over
    // several frames, the way a real camera pan floods every sampled pixel
    // with new content at once.
    let panning_frame = Mat::new_rows_cols_with_default(ROWS, COLS, CV_8UC3, Scalar::new(220.0, 220.0, 220.0, 0.0)).unwrap();
    let mut saw_motion = false;
    for _ in 0..10 {
        let edge = camera_motion.observe(&panning_frame, previous.as_ref(), &terrain).unwrap();
        if edge.moving {
            saw_motion = true;
        }
        previous = Some(panning_frame.clone());
    }
    assert!(saw_motion, "expected the pan to assert camera motion");

    // Phase 3: the camera settles back onto a (new) static field; the next
    // observation against an unchanging frame reports the falling edge.
    let resettled_frame = field_frame(&[]);
    let edge = camera_motion.observe(&resettled_frame, previous.as_ref(), &terrain).unwrap();
    assert!(!edge.moving);
    assert!(edge.just_stopped, "expected settling after a pan to trigger just_stopped");

    // The driver reacts to just_stopped by clearing the background model and
    // re-selecting terrain before resuming tracking; a fresh background and
    // registry should carry nothing over from before the pan.
    let (background, background_bounds) = build_background(&resettled_frame, 10);
    let mut registry = TrackedObjectRegistry::new(ROWS, COLS, RegistryParams::default());
    assert!(registry.tracked().is_empty());
    assert!(registry.disposed().is_empty());

    let new_blob = field_frame(&[(100, 150, (0, 0, 255))]);
    registry.step(&new_blob, Some(&resettled_frame), &background, true, background_bounds, &terrain, &field_color, 0).unwrap();
    if let Some(object) = registry.tracked().first() {
        assert_ne!(Some(object.id), pre_pan_id, "post-pan tracking must not reuse a pre-pan identity");
    }
}
