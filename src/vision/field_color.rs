//! Chromaticity-based field-green classification and the green-mask
//! extraction procedure built on top of it.
//!
//! Grounded on `IsForegroundPixel2`/`GetBackgroundMask2`/`GetFilledBackgroundMask2`
//! in the original prototype (`SoccerPlayersTracking/mainNB.cpp`): the same
//! normalized-chromaticity bounds test, the same largest-component-plus-merge
//! union-find pass, and the same border-flood hole fill.

use opencv::core::{Mat, Vec3b};
use opencv::prelude::*;

use crate::vision::types::Mask;
use crate::vision::union_find::UnionFind;

/// Adaptive chromaticity bounds used to tell field-green pixels from
/// everything else. `r = R/(R+G+B)`, `g = G/(R+G+B)`; a pixel is field-green
/// iff both ratios fall inside their bound, inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldColorModel {
    pub r_lo: f64,
    pub r_hi: f64,
    pub g_lo: f64,
    pub g_hi: f64,
    pub green_threshold: f64,
}

impl Default for FieldColorModel {
    fn default() -> Self {
        FieldColorModel {
            r_lo: 0.3450,
            r_hi: 0.3661,
            g_lo: 0.4600,
            g_hi: 0.5075,
            green_threshold: 35.0,
        }
    }
}

impl FieldColorModel {
    /// Chromaticity test against a BGR pixel. A pixel whose channels sum to
    /// zero (pure black) is never field-green.
    pub fn is_field_pixel(&self, bgr: Vec3b) -> bool {
        let (b, g, r) = (bgr[0] as f64, bgr[1] as f64, bgr[2] as f64);
        let s = b + g + r;
        if s == 0.0 {
            return false;
        }
        let rn = r / s;
        let gn = g / s;
        self.r_lo <= rn && rn <= self.r_hi && self.g_lo <= gn && gn <= self.g_hi
    }

    /// True when `bgr` should be vetoed as foreground for being too dark in
    /// the green channel, regardless of what the chromaticity test says.
    pub fn is_low_green(&self, bgr: Vec3b) -> bool {
        (bgr[1] as f64) <= self.green_threshold
    }
}

/// Runs the green-mask extraction procedure (spec'd component 4.2) over one
/// frame: candidate marking, 4-connected union, largest-component selection,
/// and the `previousSizeThreshold`/`yAligned` merge of near-equal runner-ups.
pub fn extract_green_mask(frame: &Mat, model: &FieldColorModel, previous_size_threshold: f64, y_aligned: bool) -> opencv::Result<Mask> {
    let rows = frame.rows();
    let cols = frame.cols();
    let mut uf = UnionFind::new((rows as usize) * (cols as usize));
    let mut candidate = Mask::new(rows, cols);

    for i in 0..rows {
        for j in 0..cols {
            let pixel = *frame.at_2d::<Vec3b>(i, j)?;
            let idx = (i as usize) * (cols as usize) + (j as usize);
            if model.is_field_pixel(pixel) {
                uf.add(idx, i as f64);
                candidate.set(i, j, true);
                if i > 0 && candidate.get(i - 1, j) {
                    uf.union(idx, idx - cols as usize, false);
                }
                if j > 0 && candidate.get(i, j - 1) {
                    uf.union(idx, idx - 1, false);
                }
            }
        }
    }

    let total = (rows as usize) * (cols as usize);
    let mut best = 0usize;
    for i in 0..total {
        if uf.size_of(best) < uf.size_of(i) {
            best = i;
        }
    }
    let best_root = uf.find(best);
    let best_size = uf.size_of(best_root);
    let best_mean_row = uf.sum_of(best_root) / (best_size.max(1) as f64);

    for i in 0..total {
        if uf.find(i) != i {
            continue;
        }
        let size = uf.size_of(i);
        if (size as f64) * previous_size_threshold <= best_size as f64 {
            continue;
        }
        if i == best_root {
            continue;
        }
        let aligned = !y_aligned || (uf.sum_of(i) / (size as f64) - best_mean_row).abs() < 0.1 * rows as f64;
        if aligned {
            uf.union(i, best_root, true);
        }
    }
    let super_root = uf.find(best_root);

    let mut mask = Mask::new(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            if !candidate.get(i, j) {
                continue;
            }
            let idx = (i as usize) * (cols as usize) + (j as usize);
            if uf.find(idx) == super_root {
                mask.set(i, j, true);
            }
        }
    }
    Ok(mask)
}

/// Complements `mask` and runs a second union over the non-field pixels
/// linked to a sentinel "border" node; pixels that never reach the border
/// (enclosed holes inside the field) are flipped back to mask-true.
pub fn fill_enclosed_holes(mask: &Mask) -> Mask {
    let rows = mask.rows;
    let cols = mask.cols;
    let total = (rows as usize) * (cols as usize);
    let border = total;
    let mut uf = UnionFind::new(total + 1);
    uf.add(border, 0.0);

    for i in 0..rows {
        for j in 0..cols {
            if mask.get(i, j) {
                continue;
            }
            let idx = (i as usize) * (cols as usize) + (j as usize);
            uf.add(idx, 0.0);
            if i == 0 || j == 0 || i == rows - 1 || j == cols - 1 {
                uf.union(idx, border, false);
            } else {
                if !mask.get(i - 1, j) {
                    uf.union(idx, idx - cols as usize, false);
                }
                if !mask.get(i, j - 1) {
                    uf.union(idx, idx - 1, false);
                }
            }
        }
    }

    let mut filled = mask.clone();
    for i in 0..rows {
        for j in 0..cols {
            if mask.get(i, j) {
                continue;
            }
            let idx = (i as usize) * (cols as usize) + (j as usize);
            if uf.find(idx) != border {
                filled.set(i, j, true);
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_pixel_inclusive_bounds() {
        let model = FieldColorModel::default();
        // Exact chromaticity at the lower corner of both ranges.
        let s = 1000.0;
        let r = model.r_lo * s;
        let g = model.g_lo * s;
        let b = s - r - g;
        let pixel = Vec3b::from([b as u8, g as u8, r as u8]);
        assert!(model.is_field_pixel(pixel));
    }

    #[test]
    fn field_pixel_rejects_black() {
        let model = FieldColorModel::default();
        assert!(!model.is_field_pixel(Vec3b::from([0, 0, 0])));
    }

    #[test]
    fn low_green_veto() {
        let model = FieldColorModel::default();
        assert!(model.is_low_green(Vec3b::from([10, 20, 10])));
        assert!(!model.is_low_green(Vec3b::from([10, 200, 10])));
    }

    #[test]
    fn fill_enclosed_holes_plugs_interior_gap() {
        let mut mask = Mask::new(5, 5);
        for i in 0..5 {
            for j in 0..5 {
                mask.set(i, j, true);
            }
        }
        // A single interior hole must be reclassified as mask-true; a
        // border gap must not be.
        mask.set(2, 2, false);
        mask.set(0, 0, false);
        let filled = fill_enclosed_holes(&mask);
        assert!(filled.get(2, 2));
        assert!(!filled.get(0, 0));
    }
}
