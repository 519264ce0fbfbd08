use std::fs;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use toml;
use std::error::Error;
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub input: InputSettings,
    pub debug: Option<DebugSettings>,
    pub output: OutputSettings,
    pub terrain: TerrainSettings,
    pub team: TeamSettings,
    pub background: BackgroundSettings,
    pub vision: VisionSettings,
    pub camera_motion: CameraMotionSettings,
    pub equipment_info: EquipmentInfo,
    pub worker: WorkerSettings,
    pub rest_api: RestAPISettings,
    pub redis_publisher: RedisPublisherSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InputSettings {
    pub video_src: String,
    pub typ: String,
    pub video_base: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DebugSettings {
    pub enable: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OutputSettings {
    pub enable: bool,
    pub width: i32,
    pub height: i32,
    pub window_name: String,
    /// How many of a track's most recent history boxes to draw as a
    /// trajectory polyline (display-only, spec §6 `trajectoryDrawingLength`).
    pub trajectory_drawing_length: usize,
}

/// Terrain polygon and its on-disk cache, spec §6: `<terrains>/<videoBase>_<skip>_<step>_<take>.png`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TerrainSettings {
    /// Ordered closed polygon of image coordinates `(row, col)`, produced by
    /// the out-of-scope interactive selector.
    pub polygon: Vec<[i32; 2]>,
    pub cache_dir: String,
}

/// Four team seed pixels in selection-polygon order, spec §4.8/§6:
/// `[team0_contour_seed, team1_color_seed, team2_color_seed, team3_contour_seed]`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamSettings {
    pub seeds: [[i32; 2]; 4],
}

/// `skip`/`step`/`take` (spec §6): frames discarded before model build,
/// stride between model-build frames, ring buffer capacity.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackgroundSettings {
    pub skip: u32,
    pub step: u32,
    pub take: usize,
    pub cache_dir: String,
    pub minimum_size: u32,
    pub untouched_ttl: u32,
    pub previous_size_threshold: f64,
    pub y_aligned: bool,
}

/// Tracking/segmentation knobs from spec §4.4/§4.6/§6.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VisionSettings {
    pub threshold_factor: f64,
    pub tau_bg: f64,
    pub tau_prev: f64,
    pub green_threshold: f64,
    pub maximum_groups_count: usize,
    pub redetect_step: u64,
    pub scanning_attempts: u32,
    pub minimum_group_size: usize,
    pub minimum_group_size_at_first_detection: usize,
    pub allowed_frames_outside_of_terrain: u32,
    pub max_width: i32,
    pub max_height: i32,
    pub remaining_factor: f64,
    pub enlargement_factor: f64,
    pub previous_look_size: usize,
    pub chromaticity_bounds_calculation_step: u64,
}

impl Default for VisionSettings {
    fn default() -> Self {
        VisionSettings {
            threshold_factor: 0.8,
            tau_bg: 800.0,
            tau_prev: 200.0,
            green_threshold: 35.0,
            maximum_groups_count: 35,
            redetect_step: 2,
            scanning_attempts: 3,
            minimum_group_size: 3,
            minimum_group_size_at_first_detection: 5,
            allowed_frames_outside_of_terrain: 300,
            max_width: 200,
            max_height: 200,
            remaining_factor: 1.2,
            enlargement_factor: 3.0,
            previous_look_size: 25,
            chromaticity_bounds_calculation_step: 250,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CameraMotionSettings {
    pub step: i32,
    pub pixel_changed_threshold: f64,
    pub camera_moved_threshold: f64,
}

impl Default for CameraMotionSettings {
    fn default() -> Self {
        CameraMotionSettings {
            step: 20,
            pixel_changed_threshold: 5.0,
            camera_moved_threshold: 0.2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EquipmentInfo {
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerSettings {
    pub reset_data_milliseconds: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RestAPISettings {
    pub enable: bool,
    pub host: String,
    pub back_end_port: i32,
    pub mjpeg_streaming: Option<MJPEGStreamingSettings>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RedisPublisherSettings {
    pub enable: bool,
    pub host: String,
    pub port: i32,
    pub password: String,
    pub db_index: i32,
    pub channel_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MJPEGStreamingSettings {
    pub enable: bool,
    pub quality: i32,
}

impl AppSettings {
    pub fn new(filename: &str) -> Self {
        let toml_contents = fs::read_to_string(filename).expect("Something went wrong reading the file");
        let app_settings = match toml::from_str::<AppSettings>(&toml_contents) {
            Ok(result) => result,
            Err(err) => {
                panic!("Can't parse TOML configuration file due the error: {:?}", err);
            }
        };
        app_settings
    }

    pub fn save(&self, filename: &str) -> Result<(), Box<dyn Error>> {
        fs::copy(filename, filename.to_owned() + &format!(".{}.bak", Utc::now().format("%Y-%m-%dT%H-%M-%S-%f")))?;
        let docs = toml::to_string(self)?;
        fs::write(filename, docs)?;
        Ok(())
    }

    /// A copy with the terrain polygon stripped, used by the REST API's
    /// `save_toml` mutation to avoid re-serializing a polygon that has since
    /// been replaced by a fresh interactive selection.
    pub fn get_copy_no_terrain(&self) -> AppSettings {
        let mut copy = self.clone();
        copy.terrain.polygon = Vec::new();
        copy
    }
}

impl fmt::Display for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Equipment ID: {}\n\tVideo input: {}\n\tTerrain cache dir: {}\n\tBackground cache dir: {}\n\tRefresh data (millis): {}\n\tBack-end host: {}\n\tBack-end port: {}",
            self.equipment_info.id,
            self.input.video_src,
            self.terrain.cache_dir,
            self.background.cache_dir,
            self.worker.reset_data_milliseconds,
            self.rest_api.host,
            self.rest_api.back_end_port,
        )
    }
}
