//! PNG round-trip for the background and terrain caches.
//!
//! Grounded on the original prototype's background/terrain PNG persistence
//! around its main loop (`SoccerPlayersTracking/mainNB.cpp`), reworked onto
//! the `png` crate's streaming encoder/decoder rather than OpenCV's own
//! `imgcodecs::imwrite`, since the cache format is a fixed, simple
//! single/three-channel 8-bit PNG with no need to round-trip through `Mat`
//! encoding quirks.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use opencv::core::{Mat, Vec3b, CV_8UC3};
use opencv::prelude::*;

use crate::vision::terrain::TerrainMask;
use crate::vision::types::Mask;

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Png(png::DecodingError),
    DimensionMismatch { expected: (i32, i32), found: (u32, u32) },
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "cache io error: {e}"),
            CacheError::Png(e) => write!(f, "cache png error: {e}"),
            CacheError::DimensionMismatch { expected, found } => {
                write!(f, "cache dimension mismatch: expected {expected:?}, found {found:?}")
            }
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e)
    }
}

impl From<png::DecodingError> for CacheError {
    fn from(e: png::DecodingError) -> Self {
        CacheError::Png(e)
    }
}

/// Saves a terrain mask as a single-channel PNG, `255` marking "inside".
pub fn save_terrain(path: &Path, terrain: &TerrainMask) -> Result<(), CacheError> {
    let mask = terrain.mask();
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, mask.cols as u32, mask.rows as u32);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    let mut data = vec![0u8; (mask.rows as usize) * (mask.cols as usize)];
    for i in 0..mask.rows {
        for j in 0..mask.cols {
            data[(i as usize) * (mask.cols as usize) + (j as usize)] = if mask.get(i, j) { 255 } else { 0 };
        }
    }
    writer.write_image_data(&data)?;
    Ok(())
}

/// Loads a terrain mask previously written by [`save_terrain`].
pub fn load_terrain(path: &Path) -> Result<TerrainMask, CacheError> {
    let file = File::open(path)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;

    let rows = info.height as i32;
    let cols = info.width as i32;
    let mut mask = Mask::new(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            let value = buf[(i as usize) * (cols as usize) + (j as usize)];
            mask.set(i, j, value >= 128);
        }
    }
    Ok(TerrainMask::from_mask(mask))
}

/// Saves a background image (BGR `Mat`) as a 3-channel PNG.
pub fn save_background(path: &Path, background: &Mat) -> Result<(), CacheError> {
    let rows = background.rows();
    let cols = background.cols();
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, cols as u32, rows as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    let mut data = vec![0u8; (rows as usize) * (cols as usize) * 3];
    for i in 0..rows {
        for j in 0..cols {
            let pixel = background.at_2d::<Vec3b>(i, j).map_err(|e| CacheError::Io(std::io::Error::other(e.to_string())))?;
            let base = ((i as usize) * (cols as usize) + (j as usize)) * 3;
            // opencv Vec3b is BGR; PNG RGB wants channel order reversed.
            data[base] = pixel[2];
            data[base + 1] = pixel[1];
            data[base + 2] = pixel[0];
        }
    }
    writer.write_image_data(&data)?;
    Ok(())
}

/// Loads a background image previously written by [`save_background`].
pub fn load_background(path: &Path) -> Result<Mat, CacheError> {
    let file = File::open(path)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;

    let rows = info.height as i32;
    let cols = info.width as i32;
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, opencv::core::Scalar::all(0.0))
        .map_err(|e| CacheError::Io(std::io::Error::other(e.to_string())))?;
    for i in 0..rows {
        for j in 0..cols {
            let base = ((i as usize) * (cols as usize) + (j as usize)) * 3;
            let pixel = mat.at_2d_mut::<Vec3b>(i, j).map_err(|e| CacheError::Io(std::io::Error::other(e.to_string())))?;
            pixel[0] = buf[base + 2];
            pixel[1] = buf[base + 1];
            pixel[2] = buf[base];
        }
    }
    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terrain_round_trips_through_png() {
        let dir = std::env::temp_dir().join(format!("pitchtrack-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("terrain_roundtrip.png");

        let polygon = vec![(2, 2), (2, 12), (12, 12), (12, 2)];
        let terrain = TerrainMask::from_polygon(&polygon, 16, 16).unwrap();
        save_terrain(&path, &terrain).unwrap();
        let reloaded = load_terrain(&path).unwrap();

        for i in 0..16 {
            for j in 0..16 {
                assert_eq!(terrain.contains(i, j), reloaded.contains(i, j));
            }
        }
        std::fs::remove_file(&path).ok();
    }
}
