use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;
use std::thread;
use std::time::Duration as STDDuration;

use opencv::core::{Mat, Point, Vec3b, Vector};
use opencv::imgcodecs::imencode;
use opencv::imgproc::bounding_rect;
use opencv::prelude::*;
use opencv::videoio::VideoCapture;
use uuid::Uuid;

use pitchtrack::constants::CAMERA_DESTABILIZED_BELL;
use pitchtrack::draw;
use pitchtrack::perf_stats::FrameTimer;
use pitchtrack::publisher::RedisConnection;
use pitchtrack::rest_api;
use pitchtrack::settings::{AppSettings, VisionSettings};
use pitchtrack::storage::storage::{new_datastorage, ObjectSnapshot, ThreadedDataStorage};
use pitchtrack::video_capture::{get_video_capture, ThreadedFrame};
use pitchtrack::vision::background::BackgroundModel;
use pitchtrack::vision::cache;
use pitchtrack::vision::camera_motion::{CameraMotionDetector, CameraMotionParams};
use pitchtrack::vision::field_color::FieldColorModel;
use pitchtrack::vision::foreground::{self, ForegroundThresholds};
use pitchtrack::vision::registry::{RegistryParams, TrackedObjectRegistry};
use pitchtrack::vision::team::{self, Team, TeamSeeds};
use pitchtrack::vision::terrain::{self, TerrainMask};

const EMPTY_FRAMES_LIMIT: u16 = 60;
const REDIS_PUBLISH_MILLIS: u64 = 1000;
const PERF_WINDOW: usize = 120;
/// How often (in frames) the background/foreground snapshots served by the
/// REST API are refreshed -- PNG-encoding every frame would far outrun what
/// a polling client needs.
const SNAPSHOT_REFRESH_STEP: u64 = 30;

fn background_cache_path(settings: &AppSettings) -> PathBuf {
    Path::new(&settings.background.cache_dir).join(format!(
        "{}_{}_{}_{}.png",
        settings.input.video_base, settings.background.skip, settings.background.step, settings.background.take
    ))
}

/// Loads the cached terrain rasterization if it matches the current frame
/// size, otherwise rasterizes `settings.terrain.polygon` fresh and caches it.
/// Called both at startup and after a camera-motion-triggered reselection.
fn load_or_build_terrain(settings: &AppSettings, rows: i32, cols: i32) -> TerrainMask {
    let cache_dir = Path::new(&settings.terrain.cache_dir);
    let path = terrain::cache_path(
        cache_dir,
        &settings.input.video_base,
        settings.background.skip,
        settings.background.step,
        settings.background.take as u32,
    );
    if let Ok(cached) = cache::load_terrain(&path) {
        if cached.rows() == rows && cached.cols() == cols {
            println!("Loaded terrain cache from {:?}", path);
            return cached;
        }
        println!("Terrain cache at {:?} doesn't match current frame size, rebuilding", path);
    }
    let polygon: Vec<(i32, i32)> = settings.terrain.polygon.iter().map(|p| (p[0], p[1])).collect();
    let mask = TerrainMask::from_polygon(&polygon, rows, cols).unwrap_or_else(|err| {
        panic!("Can't rasterize terrain polygon due the error: {}", err);
    });
    if let Err(err) = std::fs::create_dir_all(cache_dir) {
        println!("Can't create terrain cache directory: {}", err);
    }
    if let Err(err) = cache::save_terrain(&path, &mask) {
        println!("Can't save terrain cache due the error: {:?}", err);
    }
    mask
}

/// Reads the four configured seed pixels off `reference` (the background
/// image, since it is the most stable source of field/jersey color): the
/// outer two (`team0`/`team3`) stay as contour-test points, the inner two
/// (`team1`/`team2`) are sampled into reference colors.
fn sample_team_seeds(settings: &AppSettings, reference: &Mat) -> opencv::Result<TeamSeeds> {
    let pts: Vec<Point> = settings.team.seeds.iter().map(|rc| Point::new(rc[1], rc[0])).collect();
    let color_at = |p: Point| -> opencv::Result<(u8, u8, u8)> {
        let pixel = *reference.at_2d::<Vec3b>(p.y, p.x)?;
        Ok((pixel[0], pixel[1], pixel[2]))
    };
    Ok(TeamSeeds {
        team0: pts[0],
        team1_color: color_at(pts[1])?,
        team2_color: color_at(pts[2])?,
        team3: pts[3],
    })
}

fn registry_params_from(vision: &VisionSettings, cols: i32) -> RegistryParams {
    let back_frames_to_check_for_strong_close_pushed_out = RegistryParams::default().back_frames_to_check_for_strong_close_pushed_out;
    RegistryParams {
        tau_bg: vision.tau_bg,
        green_threshold: vision.green_threshold,
        scanning_attempts: vision.scanning_attempts,
        minimum_group_size: vision.minimum_group_size,
        max_width: vision.max_width,
        max_height: vision.max_height,
        remaining_factor: vision.remaining_factor,
        enlargement_factor: vision.enlargement_factor,
        previous_look_size: vision.previous_look_size,
        allowed_frames_outside_of_terrain: vision.allowed_frames_outside_of_terrain,
        redetect_step: vision.redetect_step,
        minimum_group_size_at_first_detection: vision.minimum_group_size_at_first_detection,
        max_objects: vision.maximum_groups_count,
        // cols * 0.007 * backFramesToCheckForStrongClosePushedOut, scaled to
        // the frame width rather than a fixed pixel radius.
        same_group_field_distance: cols as f64 * 0.007 * back_frames_to_check_for_strong_close_pushed_out as f64,
        back_frames_to_check_for_strong_close_pushed_out,
        ..RegistryParams::default()
    }
}

/// Matches each team-assigned contour back to the tracked objects whose mean
/// position falls inside its bounding rectangle (spec §4.8 Phase E contour
/// enumeration feeding team classification).
fn assign_teams(registry: &TrackedObjectRegistry, frame: &Mat, contours: &Vector<Vector<Point>>, seeds: &TeamSeeds) -> opencv::Result<HashMap<Uuid, Team>> {
    let assignments = team::classify(frame, contours, seeds)?;
    let mut result = HashMap::new();
    for assignment in &assignments {
        let Some(assigned_team) = assignment.team else { continue };
        let contour = contours.get(assignment.contour_index)?;
        let rect = bounding_rect(&contour)?;
        for object in registry.tracked() {
            let (mean_row, mean_col) = object.mean_position();
            if mean_row < 0.0 {
                continue;
            }
            if rect.contains(Point::new(mean_col as i32, mean_row as i32)) {
                result.insert(object.id, assigned_team);
            }
        }
    }
    Ok(result)
}

fn encode_png(mat: &Mat) -> Option<Vec<u8>> {
    let mut buffer = Vector::<u8>::new();
    match imencode(".png", mat, &mut buffer, &Vector::new()) {
        Ok(true) => Some(buffer.as_ref().to_vec()),
        Ok(false) => None,
        Err(err) => {
            println!("Can't encode snapshot to PNG due the error: {:?}", err);
            None
        }
    }
}

fn spawn_redis_worker(settings: &AppSettings, data_storage: ThreadedDataStorage) {
    let redis_settings = settings.redis_publisher.clone();
    thread::spawn(move || {
        let mut conn = if redis_settings.password.chars().count() == 0 {
            RedisConnection::new(redis_settings.host.clone(), redis_settings.port, redis_settings.db_index)
        } else {
            RedisConnection::new_with_password(redis_settings.host.clone(), redis_settings.port, redis_settings.db_index, redis_settings.password.clone())
        };
        if redis_settings.channel_name.chars().count() != 0 {
            conn.set_channel(redis_settings.channel_name.clone());
        }
        conn.start_worker(data_storage, REDIS_PUBLISH_MILLIS);
    });
}

fn spawn_rest_api(settings: &AppSettings, path_to_config: &str, data_storage: ThreadedDataStorage, enable_mjpeg: bool, rx_mjpeg: mpsc::Receiver<Vector<u8>>) {
    let settings_clone = settings.clone();
    let overwrite_file = path_to_config.to_string();
    thread::spawn(move || {
        match rest_api::start_rest_api(
            settings_clone.rest_api.host.clone(),
            settings_clone.rest_api.back_end_port,
            data_storage,
            enable_mjpeg,
            rx_mjpeg,
            settings_clone,
            &overwrite_file,
        ) {
            Ok(_) => {}
            Err(err) => println!("Can't start API due the error: {:?}", err),
        }
    });
}

fn spawn_capture_thread(mut video_capture: VideoCapture, fps: f32, reset_data_milliseconds: i64, data_storage: ThreadedDataStorage) -> mpsc::Receiver<ThreadedFrame> {
    let (tx_capture, rx_capture): (mpsc::SyncSender<ThreadedFrame>, mpsc::Receiver<ThreadedFrame>) = mpsc::sync_channel(0);
    let next_reset = reset_data_milliseconds as f32 / 1000.0;
    thread::spawn(move || {
        let mut frames_counter: f32 = 0.0;
        let mut total_seconds: f32 = 0.0;
        let mut overall_seconds: f32 = 0.0;
        let mut empty_frames_counter: u16 = 0;
        loop {
            let mut read_frame = Mat::default();
            match video_capture.read(&mut read_frame) {
                Ok(_) => {}
                Err(_) => {
                    println!("Can't read next frame");
                    break;
                }
            }
            if read_frame.empty() {
                empty_frames_counter += 1;
                if empty_frames_counter >= EMPTY_FRAMES_LIMIT {
                    println!("Too many empty frames");
                    break;
                }
                continue;
            }
            empty_frames_counter = 0;
            frames_counter += 1.0;
            let second_fraction = total_seconds + (frames_counter / fps);
            if frames_counter >= fps {
                total_seconds += 1.0;
                overall_seconds += 1.0;
                frames_counter = 0.0;
            }

            let frame = ThreadedFrame {
                frame: read_frame,
                overall_seconds,
                current_second: second_fraction,
            };
            if tx_capture.send(frame).is_err() {
                break;
            }

            if total_seconds >= next_reset {
                total_seconds = 0.0;
                let ds_guard = data_storage.read().expect("DataStorage is poisoned [RWLock]");
                ds_guard.update_statistics(reset_data_milliseconds);
            }
        }
        match video_capture.release() {
            Ok(_) => println!("Video capture has been closed successfully"),
            Err(err) => println!("Can't release video capturer due the error: {}", err),
        }
    });
    rx_capture
}

fn run(settings: &AppSettings, path_to_config: &str) {
    let verbose = settings.debug.as_ref().map(|d| d.enable).unwrap_or(false);
    println!("Verbose is '{}'", verbose);
    println!("REST API is '{}'", settings.rest_api.enable);
    println!("Redis publisher is '{}'", settings.redis_publisher.enable);

    let (enable_mjpeg, mjpeg_quality) = match &settings.rest_api.mjpeg_streaming {
        Some(v) => (v.enable && settings.rest_api.enable, v.quality),
        None => (false, 80),
    };
    println!("MJPEG is '{}' (quality: {})", enable_mjpeg, mjpeg_quality);

    let data_storage = new_datastorage(settings.equipment_info.id.clone(), verbose);

    println!("Press `Ctrl-C` to stop main programm");
    ctrlc::set_handler(move || {
        println!("Ctrl+C has been pressed! Exit in 2 seconds");
        thread::sleep(STDDuration::from_secs(2));
        process::exit(1);
    })
    .expect("Error setting `Ctrl-C` handler");

    if settings.redis_publisher.enable {
        spawn_redis_worker(settings, data_storage.clone());
    }

    let (tx_mjpeg, rx_mjpeg): (mpsc::SyncSender<Vector<u8>>, mpsc::Receiver<Vector<u8>>) = mpsc::sync_channel(2);
    if settings.rest_api.enable {
        spawn_rest_api(settings, path_to_config, data_storage.clone(), enable_mjpeg, rx_mjpeg);
    }

    let mut video_capture = get_video_capture(&settings.input.video_src, settings.input.typ.clone());
    let opened = VideoCapture::is_opened(&video_capture).unwrap_or(false);
    if !opened {
        println!("Can't open video source '{}'", settings.input.video_src);
        return;
    }
    let rows = video_capture.get(opencv::videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as i32;
    let cols = video_capture.get(opencv::videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32;
    let fps = video_capture.get(opencv::videoio::CAP_PROP_FPS).unwrap_or(25.0) as f32;
    println!("Video probe: {{Width: {cols}px | Height: {rows}px | FPS: {fps}}}");

    let window = &settings.output.window_name;
    if settings.output.enable {
        opencv::highgui::named_window(window, 1).expect("Can't give a name to output window");
        opencv::highgui::resize_window(window, settings.output.width, settings.output.height).expect("Can't resize output window");
    }

    let rx_capture = spawn_capture_thread(video_capture, fps, settings.worker.reset_data_milliseconds, data_storage.clone());

    let mut terrain = load_or_build_terrain(settings, rows, cols);
    let field_color = FieldColorModel {
        green_threshold: settings.vision.green_threshold,
        ..FieldColorModel::default()
    };
    let mut background_model = BackgroundModel::new(rows, cols, settings.background.take).with_thresholds(settings.background.minimum_size, settings.background.untouched_ttl);

    let background_path = background_cache_path(settings);
    let mut background: Option<Mat> = None;
    let mut background_ready = false;
    if let Ok(cached) = cache::load_background(&background_path) {
        if cached.rows() == rows && cached.cols() == cols {
            println!("Loaded background cache from {:?}", background_path);
            background = Some(cached);
            background_ready = true;
        }
    }

    let mut registry = TrackedObjectRegistry::new(rows, cols, registry_params_from(&settings.vision, cols));
    let mut camera_motion = CameraMotionDetector::new(CameraMotionParams {
        step: settings.camera_motion.step,
        pixel_changed_threshold: settings.camera_motion.pixel_changed_threshold,
        camera_moved_threshold: settings.camera_motion.camera_moved_threshold,
    });
    let foreground_thresholds = ForegroundThresholds {
        tau_bg: settings.vision.tau_bg,
        tau_prev: settings.vision.tau_prev,
        green_threshold: settings.vision.green_threshold,
    };

    let mut team_seeds: Option<TeamSeeds> = None;
    let mut previous_frame: Option<Mat> = None;
    let mut frame_index: u64 = 0;
    let mut frames_since_background_build: u32 = 0;
    let mut timer = FrameTimer::new(PERF_WINDOW);
    let trajectory_drawing_length = settings.output.trajectory_drawing_length;
    let background_build_frames = settings.background.skip + settings.background.take as u32 * settings.background.step.max(1);

    for received in rx_capture {
        timer.start();
        let mut frame = received.frame.clone();

        if !background_ready {
            frames_since_background_build += 1;
            let past_skip = frames_since_background_build > settings.background.skip;
            let on_step = frames_since_background_build % settings.background.step.max(1) == 0;
            if past_skip && on_step {
                match background_model.add(&frame, &field_color, settings.background.previous_size_threshold, settings.background.y_aligned) {
                    Ok(_) => match background_model.background() {
                        Ok(bg) => {
                            if let Err(err) = cache::save_background(&background_path, &bg) {
                                println!("Can't save background cache due the error: {:?}", err);
                            }
                            if frames_since_background_build >= background_build_frames {
                                background_ready = true;
                                println!("Background model is ready after {} frames", frames_since_background_build);
                            }
                            background = Some(bg);
                        }
                        Err(err) => println!("Can't compute background due the error: {:?}", err),
                    },
                    Err(err) => println!("Can't add frame to background model due the error: {:?}", err),
                }
            }
            previous_frame = Some(received.frame);
            continue;
        }

        let background_mat = background.as_ref().expect("background must be set once ready").clone();

        match camera_motion.observe(&frame, previous_frame.as_ref(), &terrain) {
            Ok(edge) if edge.just_stopped => {
                println!("{CAMERA_DESTABILIZED_BELL} Camera motion settled, clearing background model and re-selecting terrain");
                background_model.clear();
                background_ready = false;
                frames_since_background_build = 0;
                terrain = load_or_build_terrain(settings, rows, cols);
            }
            Ok(_) => {}
            Err(err) => println!("Can't observe camera motion due the error: {:?}", err),
        }

        if background_ready {
            if let Err(err) = registry.step(&frame, previous_frame.as_ref(), &background_mat, background_ready, background_model.bounding_rect(), &terrain, &field_color, frame_index) {
                println!("Can't step tracked-object registry due the error: {}", err);
            }

            let recompute_requested = {
                let ds_guard = data_storage.read().expect("DataStorage is poisoned [RWLock]");
                ds_guard.take_team_recompute_request()
            };
            if team_seeds.is_none() || recompute_requested {
                match sample_team_seeds(settings, &background_mat) {
                    Ok(seeds) => team_seeds = Some(seeds),
                    Err(err) => println!("Can't sample team seeds due the error: {:?}", err),
                }
            }

            match foreground::segment(&frame, previous_frame.as_ref(), &background_mat, &terrain, &field_color, &foreground_thresholds, 0, rows - 1, 0, cols - 1) {
                Ok(mask) => {
                    if frame_index % SNAPSHOT_REFRESH_STEP == 0 {
                        if let Ok(mat) = team::mask_to_mat(&mask) {
                            if let Some(bytes) = encode_png(&mat) {
                                let ds_guard = data_storage.read().expect("DataStorage is poisoned [RWLock]");
                                ds_guard.update_foreground_snapshot(bytes);
                            }
                        }
                    }
                    if let Some(seeds) = &team_seeds {
                        match team::find_contours_in_mask(&mask) {
                            Ok(contours) => match assign_teams(&registry, &frame, &contours, seeds) {
                                Ok(assignments) => {
                                    let ds_guard = data_storage.read().expect("DataStorage is poisoned [RWLock]");
                                    for (id, assigned_team) in assignments {
                                        ds_guard.update_team(id, assigned_team);
                                    }
                                }
                                Err(err) => println!("Can't classify teams due the error: {:?}", err),
                            },
                            Err(err) => println!("Can't enumerate foreground contours due the error: {:?}", err),
                        }
                    }
                }
                Err(err) => println!("Can't segment foreground due the error: {:?}", err),
            }

            if frame_index % SNAPSHOT_REFRESH_STEP == 0 {
                if let Some(bytes) = encode_png(&background_mat) {
                    let ds_guard = data_storage.read().expect("DataStorage is poisoned [RWLock]");
                    ds_guard.update_background_snapshot(bytes);
                }
            }

            let snapshots: Vec<ObjectSnapshot> = registry
                .tracked()
                .iter()
                .filter_map(|object| {
                    object.history.last().map(|bbox| ObjectSnapshot {
                        id: object.id,
                        bbox: *bbox,
                        team: None,
                        type_flags: bbox.type_flags,
                    })
                })
                .collect();
            {
                let ds_guard = data_storage.read().expect("DataStorage is poisoned [RWLock]");
                ds_guard.update_objects(frame_index, snapshots);
            }

            if enable_mjpeg || settings.output.enable {
                let teams_for_draw: Vec<Option<Team>> = {
                    let ds_guard = data_storage.read().expect("DataStorage is poisoned [RWLock]");
                    let teams_guard = ds_guard.teams.read().expect("DataStorage.teams poisoned [RWLock]");
                    registry.tracked().iter().map(|object| teams_guard.get(&object.id).copied()).collect()
                };
                draw::draw_tracked_objects(&mut frame, registry.tracked(), &teams_for_draw, trajectory_drawing_length);

                if settings.output.enable {
                    if let Err(err) = opencv::highgui::imshow(window, &frame) {
                        println!("Can't display output frame due the error: {:?}", err);
                    }
                    match opencv::highgui::wait_key(10) {
                        Ok(key) if key == 27 || key == 115 || key == 83 => break,
                        _ => {}
                    }
                }
                if enable_mjpeg {
                    let mut buffer = Vector::<u8>::new();
                    let params = Vector::<i32>::from_slice(&[opencv::imgcodecs::IMWRITE_JPEG_QUALITY, mjpeg_quality]);
                    match imencode(".jpg", &frame, &mut buffer, &params) {
                        Ok(true) => {
                            let _ = tx_mjpeg.try_send(buffer);
                        }
                        Ok(false) => println!("image has not been encoded"),
                        Err(err) => println!("Can't encode MJPEG frame due the error: {:?}", err),
                    }
                }
            }
        }

        if let Some(avg_millis) = timer.stop() {
            if verbose {
                println!("Average frame processing time over last {} frames: {:.2}ms", PERF_WINDOW, avg_millis);
            }
        }

        previous_frame = Some(received.frame);
        frame_index += 1;
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let path_to_config = match args.len() {
        2 => &args[1],
        _ => {
            println!("Args should contain exactly one string: path to TOML configuration file. Setting to default './data/conf.toml'");
            "./data/conf.toml"
        }
    };
    let app_settings = AppSettings::new(path_to_config);
    println!("Settings are:\n\t{}", app_settings);

    run(&app_settings, path_to_config);
}
