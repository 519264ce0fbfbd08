//! Team assignment from four seed colors against a set of closed contours.
//!
//! Grounded on the `yellowhama-footballgame` positioning/role-assignment
//! pipeline's use of `opencv::imgproc` contour and histogram primitives, and
//! on the original prototype's four-corner team-seed selection flow
//! (`SoccerPlayersTracking/mainNB.cpp`). Teams 0 and 3 are the selection
//! polygon's corner seeds (assigned by point-in-contour test); teams 1 and 2
//! are reference colors assigned by per-channel threshold pixel counts.

use opencv::core::{Mat, Point, Rect, Scalar, Vector, CV_8UC1};
use opencv::prelude::*;
use opencv::{core, imgproc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::vision::types::Mask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum Team {
    Team0,
    Team1,
    Team2,
    Team3,
}

/// Four seed pixels in selection-polygon order: `[team0_contour_seed,
/// team1_color_seed, team2_color_seed, team3_contour_seed]`.
#[derive(Debug, Clone, Copy)]
pub struct TeamSeeds {
    pub team0: Point,
    pub team1_color: (u8, u8, u8),
    pub team2_color: (u8, u8, u8),
    pub team3: Point,
}

pub struct TeamAssignment {
    pub contour_index: usize,
    pub team: Option<Team>,
}

/// Renders a foreground flag map as an 8-bit single-channel mask (`0`/`255`)
/// suitable for `opencv::imgproc::find_contours`.
pub fn mask_to_mat(mask: &Mask) -> opencv::Result<Mat> {
    let mut out = Mat::new_rows_cols_with_default(mask.rows, mask.cols, CV_8UC1, Scalar::all(0.0))?;
    for i in 0..mask.rows {
        for j in 0..mask.cols {
            if mask.get(i, j) {
                *out.at_2d_mut::<u8>(i, j)? = 255;
            }
        }
    }
    Ok(out)
}

/// Enumerates the foreground mask's external contours, the candidate regions
/// `classify` assigns a team to (spec §4.8's Phase E contour enumeration).
pub fn find_contours_in_mask(mask: &Mask) -> opencv::Result<Vector<Vector<Point>>> {
    let mat = mask_to_mat(mask)?;
    let mut contours = Vector::<Vector<Point>>::new();
    imgproc::find_contours(&mat, &mut contours, imgproc::RETR_EXTERNAL, imgproc::CHAIN_APPROX_SIMPLE, Point::new(0, 0))?;
    Ok(contours)
}

/// Computes the mean contour area and discards contours smaller than half
/// of it, then assigns each survivor to a team. `frame` supplies the crops
/// used for the color-threshold vote between teams 1 and 2.
pub fn classify(frame: &Mat, contours: &Vector<Vector<Point>>, seeds: &TeamSeeds) -> opencv::Result<Vec<TeamAssignment>> {
    let areas: Vec<f64> = (0..contours.len()).map(|i| imgproc::contour_area(&contours.get(i).unwrap(), false).unwrap_or(0.0)).collect();
    if areas.is_empty() {
        return Ok(Vec::new());
    }
    let mean_area = areas.iter().sum::<f64>() / areas.len() as f64;

    let mut out = Vec::new();
    for (i, &area) in areas.iter().enumerate() {
        if area < 0.5 * mean_area {
            out.push(TeamAssignment { contour_index: i, team: None });
            continue;
        }
        let contour = contours.get(i)?;
        let team = assign_one(frame, &contour, seeds)?;
        out.push(TeamAssignment { contour_index: i, team });
    }
    Ok(out)
}

fn assign_one(frame: &Mat, contour: &Vector<Point>, seeds: &TeamSeeds) -> opencv::Result<Option<Team>> {
    if imgproc::point_polygon_test(contour, core::Point2f::new(seeds.team0.x as f32, seeds.team0.y as f32), false)? >= 0.0 {
        return Ok(Some(Team::Team0));
    }
    if imgproc::point_polygon_test(contour, core::Point2f::new(seeds.team3.x as f32, seeds.team3.y as f32), false)? >= 0.0 {
        return Ok(Some(Team::Team3));
    }

    let rect = imgproc::bounding_rect(contour)?;
    let rect = clamp_rect(rect, frame.cols(), frame.rows());
    if rect.width <= 0 || rect.height <= 0 {
        return Ok(None);
    }
    let crop = Mat::roi(frame, rect)?;

    let count1 = count_near_color(&crop, seeds.team1_color)?;
    let count2 = count_near_color(&crop, seeds.team2_color)?;
    Ok(Some(if count1 >= count2 { Team::Team1 } else { Team::Team2 }))
}

fn clamp_rect(rect: Rect, cols: i32, rows: i32) -> Rect {
    let x = rect.x.max(0);
    let y = rect.y.max(0);
    let width = (rect.x + rect.width).min(cols) - x;
    let height = (rect.y + rect.height).min(rows) - y;
    Rect::new(x, y, width.max(0), height.max(0))
}

/// Thresholds `crop` to `[color-1, color+1]` per BGR channel and counts
/// non-zero pixels in the resulting mask.
fn count_near_color(crop: &Mat, color: (u8, u8, u8)) -> opencv::Result<i32> {
    let lower = Scalar::new((color.0 as f64 - 1.0).max(0.0), (color.1 as f64 - 1.0).max(0.0), (color.2 as f64 - 1.0).max(0.0), 0.0);
    let upper = Scalar::new((color.0 as f64 + 1.0).min(255.0), (color.1 as f64 + 1.0).min(255.0), (color.2 as f64 + 1.0).min(255.0), 0.0);
    let mut mask = Mat::default();
    core::in_range(crop, &lower, &upper, &mut mask)?;
    core::count_non_zero(&mask)
}

/// Normalized 3-channel 2D (hue/saturation-style BG/GR) histogram of a
/// contour's bounding-box crop, carried alongside the team assignment for
/// downstream display/diagnostics.
pub fn crop_histogram(frame: &Mat, contour: &Vector<Point>) -> opencv::Result<Mat> {
    let rect = clamp_rect(imgproc::bounding_rect(contour)?, frame.cols(), frame.rows());
    let crop = Mat::roi(frame, rect)?;
    let images = Vector::<Mat>::from_iter([crop.clone_pointee()]);
    let channels = Vector::<i32>::from_iter([0, 1]);
    let hist_size = Vector::<i32>::from_iter([32, 32]);
    let ranges = Vector::<f32>::from_iter([0.0, 256.0, 0.0, 256.0]);
    let mut hist = Mat::default();
    imgproc::calc_hist(&images, &channels, &core::no_array(), &mut hist, &hist_size, &ranges, false)?;
    let mut normalized = Mat::default();
    core::normalize(&hist, &mut normalized, 0.0, 1.0, core::NORM_MINMAX, -1, &core::no_array())?;
    Ok(normalized)
}
