//! The playable-field mask: a fixed binary matrix rasterized once from the
//! external polygon selector's output, held immutable between camera-motion
//! events.
//!
//! Grounded on the original prototype's terrain-selection flow
//! (`SoccerPlayersTracking/mainNB.cpp`, the `GetBackground`/terrain-cache
//! path construction around the main loop) for the cache path convention,
//! and on `GetFilledBackgroundMask2`'s border-flood pattern for the
//! scanline polygon rasterizer below.

use std::path::PathBuf;

use crate::vision::types::Mask;

/// Binary matrix of pixels inside the playable area. Produced once by
/// [`TerrainMask::from_polygon`] and left untouched until the next
/// camera-motion-triggered reselection.
#[derive(Debug, Clone)]
pub struct TerrainMask {
    mask: Mask,
}

/// The selector handed us fewer than 3 vertices, or a degenerate (zero-area)
/// polygon. Per spec this is retried by the selector and never surfaces past
/// this boundary, but `from_polygon` still reports it so callers can log and
/// re-request rather than silently tracking against an empty field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainInvalid;

impl std::fmt::Display for TerrainInvalid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "terrain polygon has fewer than 3 vertices or is degenerate")
    }
}

impl std::error::Error for TerrainInvalid {}

impl TerrainMask {
    /// Rasterizes an ordered closed polygon of image coordinates `(row, col)`
    /// into a `rows x cols` binary mask using scanline even-odd fill.
    pub fn from_polygon(polygon: &[(i32, i32)], rows: i32, cols: i32) -> Result<TerrainMask, TerrainInvalid> {
        if polygon.len() < 3 {
            return Err(TerrainInvalid);
        }
        let mut mask = Mask::new(rows, cols);
        for row in 0..rows {
            let mut crossings: Vec<i32> = Vec::new();
            let n = polygon.len();
            for i in 0..n {
                let (r0, c0) = polygon[i];
                let (r1, c1) = polygon[(i + 1) % n];
                if r0 == r1 {
                    continue;
                }
                let (lo, hi, c_lo, c_hi) = if r0 < r1 { (r0, r1, c0, c1) } else { (r1, r0, c1, c0) };
                if row < lo || row >= hi {
                    continue;
                }
                let t = (row - lo) as f64 / (hi - lo) as f64;
                let col = c_lo as f64 + t * (c_hi - c_lo) as f64;
                crossings.push(col.round() as i32);
            }
            crossings.sort_unstable();
            if crossings.is_empty() {
                continue;
            }
            for pair in crossings.chunks(2) {
                if pair.len() < 2 {
                    break;
                }
                let (start, end) = (pair[0].max(0), pair[1].min(cols - 1));
                for col in start..=end {
                    mask.set(row, col, true);
                }
            }
        }
        if mask.count_set() == 0 {
            return Err(TerrainInvalid);
        }
        Ok(TerrainMask { mask })
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn rows(&self) -> i32 {
        self.mask.rows
    }

    pub fn cols(&self) -> i32 {
        self.mask.cols
    }

    pub fn contains(&self, row: i32, col: i32) -> bool {
        self.mask.in_bounds(row, col) && self.mask.get(row, col)
    }

    /// Wraps an already-rasterized mask, e.g. one decoded from the on-disk
    /// cache by [`crate::vision::cache`].
    pub fn from_mask(mask: Mask) -> TerrainMask {
        TerrainMask { mask }
    }
}

/// Builds the on-disk cache path for a terrain mask, keyed by the video's
/// base name and the sampling parameters that were in effect when the
/// terrain was selected: `<terrains>/<video_base>_<skip>_<step>_<take>.png`.
pub fn cache_path(terrains_dir: &std::path::Path, video_base: &str, skip: u32, step: u32, take: u32) -> PathBuf {
    terrains_dir.join(format!("{video_base}_{skip}_{step}_{take}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_polygon() {
        assert!(TerrainMask::from_polygon(&[(0, 0), (1, 1)], 10, 10).is_err());
    }

    #[test]
    fn rasterizes_a_square() {
        let square = vec![(2, 2), (2, 7), (7, 7), (7, 2)];
        let terrain = TerrainMask::from_polygon(&square, 10, 10).unwrap();
        assert!(terrain.contains(4, 4));
        assert!(!terrain.contains(0, 0));
        assert!(!terrain.contains(9, 9));
    }

    #[test]
    fn cache_path_matches_naming_convention() {
        let dir = std::path::Path::new("/tmp/terrains");
        let path = cache_path(dir, "match_01", 0, 20, 30);
        assert_eq!(path, std::path::PathBuf::from("/tmp/terrains/match_01_0_20_30.png"));
    }
}
