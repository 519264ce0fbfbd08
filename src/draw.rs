//! Debug/display overlay drawing: bounding boxes, identifiers and trajectory
//! polylines for the currently tracked objects (spec §6 `trajectoryDrawingLength`).
//!
//! Grounded on the teacher's `lib::draw::draw` rounded-rectangle/circle/
//! put_text primitives, generalized from a road-lane tracker's objects to
//! `vision::registry::TrackedObject`.

use opencv::core::{Mat, Point, Rect, Scalar, Size};
use opencv::imgproc::{circle, ellipse, put_text, FONT_HERSHEY_SIMPLEX, LINE_8};

use crate::vision::registry::TrackedObject;
use crate::vision::team::Team;

fn pushed_out_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn team_color(team: Option<Team>) -> Scalar {
    match team {
        Some(Team::Team0) => Scalar::new(255.0, 0.0, 0.0, 0.0),
        Some(Team::Team1) => Scalar::new(0.0, 255.0, 0.0, 0.0),
        Some(Team::Team2) => Scalar::new(0.0, 255.0, 255.0, 0.0),
        Some(Team::Team3) => Scalar::new(255.0, 0.0, 255.0, 0.0),
        None => Scalar::new(200.0, 200.0, 200.0, 0.0),
    }
}

/// Draws a rounded bounding box, short identifier label and trajectory
/// polyline (last `trajectory_drawing_length` history boxes) for every
/// currently tracked object.
pub fn draw_tracked_objects(img: &mut Mat, objects: &[TrackedObject], teams: &[Option<Team>], trajectory_drawing_length: usize) {
    for (object, team) in objects.iter().zip(teams.iter()) {
        let color = if object.pushed_out { pushed_out_color() } else { team_color(*team) };
        if let Some(last) = object.history.last() {
            let rect = Rect::new(last.min_col, last.min_row, last.width(), last.height());
            if let Err(err) = draw_rounded_rectangle(img, rect, color, 2, 8) {
                println!("Can't draw rounded rectangle at object's bbox due the error: {:?}", err);
            }
            let short_id: String = object.id.to_string().chars().take(8).collect();
            let anchor = Point::new(last.min_col + 2, last.min_row + 10);
            if let Err(err) = put_text(img, &short_id, anchor, FONT_HERSHEY_SIMPLEX, 0.5, color, 2, LINE_8, false) {
                println!("Can't display ID of object due the error: {:?}", err);
            }
        }
        draw_trajectory(img, object, color, trajectory_drawing_length);
    }
}

fn draw_trajectory(img: &mut Mat, object: &TrackedObject, color: Scalar, trajectory_drawing_length: usize) {
    let start = object.history.len().saturating_sub(trajectory_drawing_length);
    for bbox in &object.history[start..] {
        let center_row = (bbox.min_row + bbox.max_row) / 2;
        let center_col = (bbox.min_col + bbox.max_col) / 2;
        let cv_pt = Point::new(center_col, center_row);
        if let Err(err) = circle(img, cv_pt, 3, color, 1, LINE_8, 0) {
            println!("Can't draw trajectory point due the error: {:?}", err);
        }
    }
}

fn draw_rounded_rectangle(img: &mut Mat, rect: Rect, color: Scalar, thickness: i32, corner_radius: i32) -> opencv::Result<()> {
    let x = rect.x;
    let y = rect.y;
    let width = rect.width;
    let height = rect.height;

    let min_dimension = width.min(height);
    let max_corner_radius = min_dimension / 8;
    let adaptive_radius = corner_radius.min(max_corner_radius).max(2);
    let arc_size = Size::new(adaptive_radius * 2, adaptive_radius * 2);

    ellipse(img, Point::new(x + adaptive_radius, y + adaptive_radius), arc_size, 180.0, 0.0, 90.0, color, thickness, LINE_8, 0)?;
    ellipse(img, Point::new(x + width - adaptive_radius, y + adaptive_radius), arc_size, 270.0, 0.0, 90.0, color, thickness, LINE_8, 0)?;
    ellipse(img, Point::new(x + width - adaptive_radius, y + height - adaptive_radius), arc_size, 0.0, 0.0, 90.0, color, thickness, LINE_8, 0)?;
    ellipse(img, Point::new(x + adaptive_radius, y + height - adaptive_radius), arc_size, 90.0, 0.0, 90.0, color, thickness, LINE_8, 0)?;
    Ok(())
}
