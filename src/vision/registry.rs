//! The per-frame tracked-object state machine: Spread/Visit re-association,
//! wider-area retry, terrain persistence, new-object detection, and the
//! push-out/reconnection rules that let an object's identity survive a
//! brief occlusion by another tracked object.
//!
//! Grounded on the `Spread`/`Visit`/`GetWiderAreaPositions`/
//! `AddMissingPrevious` functions in the original prototype
//! (`SoccerPlayersTracking/mainNB.cpp`). Two bugs present there are fixed
//! here rather than reproduced:
//! - `Visit`'s neighbor test used `&&` where the 8-neighbor BFS needs `||`
//!   (the original only advanced along pixels that differed from the seed in
//!   *both* row and column, silently skipping straight neighbors).
//! - the background salvage-on-evict step compared a mask bit with `==`
//!   instead of assigning it, so no pixel's contribution was ever actually
//!   preserved; [`crate::vision::background::BackgroundModel::remove`] fixes
//!   this directly.

use std::collections::HashMap;

use opencv::core::Mat;
use uuid::Uuid;

use crate::vision::components::extract_components;
use crate::vision::foreground::{self, ForegroundThresholds};
use crate::vision::terrain::TerrainMask;
use crate::vision::types::{bounding_rect, BoundingBox, MeanColor, Position, TypeFlags};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryParams {
    pub tau_bg: f64,
    pub green_threshold: f64,
    pub scanning_attempts: u32,
    pub minimum_group_size: usize,
    pub max_width: i32,
    pub max_height: i32,
    pub remaining_factor: f64,
    pub enlargement_factor: f64,
    pub previous_look_size: usize,
    pub allowed_frames_outside_of_terrain: u32,
    pub redetect_step: u64,
    pub minimum_group_size_at_first_detection: usize,
    pub same_group_field_distance: f64,
    pub back_frames_to_check_for_strong_close_pushed_out: u64,
    pub same_group_back_frames_for_speed: usize,
    pub back_frames_to_check_for_close_tracked: usize,
    pub back_frames_to_check_for_close_pushed_out: u64,
    pub max_objects: usize,
}

impl Default for RegistryParams {
    fn default() -> Self {
        RegistryParams {
            tau_bg: 800.0,
            green_threshold: 35.0,
            scanning_attempts: 3,
            minimum_group_size: 3,
            max_width: 200,
            max_height: 200,
            remaining_factor: 1.2,
            enlargement_factor: 3.0,
            previous_look_size: 25,
            allowed_frames_outside_of_terrain: 300,
            redetect_step: 2,
            minimum_group_size_at_first_detection: 5,
            same_group_field_distance: 50.0,
            back_frames_to_check_for_strong_close_pushed_out: 30,
            same_group_back_frames_for_speed: 10,
            back_frames_to_check_for_close_tracked: 50,
            back_frames_to_check_for_close_pushed_out: 150,
            max_objects: 35,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: Uuid,
    pub positions: Vec<Position>,
    pub history: Vec<BoundingBox>,
    pub last_frame: u64,
    pub is_tracked: bool,
    pub pushed_out: bool,
    pub pushed_out_by: Option<Uuid>,
    pub pushed_out_groups: Vec<Uuid>,
    pub mean_color: MeanColor,
    pub frames_outside_of_terrain: u32,
}

impl TrackedObject {
    fn new(id: Uuid, positions: Vec<Position>, frame_index: u64, mean_color: MeanColor) -> Self {
        let bbox = bbox_from_positions(&positions, frame_index, mean_color);
        TrackedObject {
            id,
            positions,
            history: vec![bbox],
            last_frame: frame_index,
            is_tracked: true,
            pushed_out: false,
            pushed_out_by: None,
            pushed_out_groups: Vec::new(),
            mean_color,
            frames_outside_of_terrain: 0,
        }
    }

    /// Mean position of the object's current pixel set, or `(-1, -1)` if it
    /// currently holds no positions.
    pub fn mean_position(&self) -> (f64, f64) {
        if self.positions.is_empty() {
            return (-1.0, -1.0);
        }
        let n = self.positions.len() as f64;
        let sum_row: i64 = self.positions.iter().map(|p| p.row as i64).sum();
        let sum_col: i64 = self.positions.iter().map(|p| p.col as i64).sum();
        (sum_row as f64 / n, sum_col as f64 / n)
    }

    fn current_bbox(&self) -> Option<(i32, i32, i32, i32)> {
        if self.positions.is_empty() {
            None
        } else {
            Some(bounding_rect(&self.positions))
        }
    }

    fn area_at(&self, frames_back: usize) -> Option<i64> {
        let len = self.history.len();
        if len == 0 {
            return None;
        }
        let idx = len.saturating_sub(1 + frames_back);
        let b = &self.history[idx];
        Some(b.width() as i64 * b.height() as i64)
    }

    fn current_area(&self) -> i64 {
        self.current_bbox().map(|(r0, r1, c0, c1)| ((r1 - r0 + 1) as i64) * ((c1 - c0 + 1) as i64)).unwrap_or(0)
    }

    fn size_shrinked_lately(&self, lookback: usize) -> bool {
        let current = self.current_area();
        if current == 0 {
            return false;
        }
        (0..lookback.min(self.history.len())).any(|k| self.area_at(k).map(|a| a as f64 >= 1.5 * current as f64).unwrap_or(false))
    }
}

fn bbox_from_positions(positions: &[Position], frame_index: u64, mean_color: MeanColor) -> BoundingBox {
    if positions.is_empty() {
        return BoundingBox::new(-1, -1, -1, -1, frame_index, mean_color);
    }
    let (min_row, max_row, min_col, max_col) = bounding_rect(positions);
    BoundingBox::new(min_row, max_row, min_col, max_col, frame_index, mean_color)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    NoForeground,
    InvalidGeometry,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NoForeground => write!(f, "background is uninitialized, no foreground available"),
            RegistryError::InvalidGeometry => write!(f, "bounding box would exceed maxWidth/maxHeight at minimum size"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// A single candidate newcomer surfaced by Phase E, with its frame-index
/// stamp and mean color ready for either a fresh track or a reconnection.
struct Candidate {
    positions: Vec<Position>,
    mean_color: MeanColor,
}

pub struct TrackedObjectRegistry {
    tracked: Vec<TrackedObject>,
    disposed: Vec<TrackedObject>,
    params: RegistryParams,
    visit_stamp: Vec<u32>,
    visit_owner: Vec<Option<usize>>,
    visit_counter: u32,
    rows: i32,
    cols: i32,
    any_neighbor_touch: bool,
}

impl TrackedObjectRegistry {
    pub fn new(rows: i32, cols: i32, params: RegistryParams) -> Self {
        let n = (rows as usize) * (cols as usize);
        TrackedObjectRegistry {
            tracked: Vec::new(),
            disposed: Vec::new(),
            params,
            visit_stamp: vec![0; n],
            visit_owner: vec![None; n],
            visit_counter: 0,
            rows,
            cols,
            any_neighbor_touch: true,
        }
    }

    /// Configures the Phase A "touched another object" test (spec.md §9 Open
    /// Question #1). `true` (default) treats any already-visited neighbor as
    /// a touch; `false` reproduces the original's `row != seedRow && col !=
    /// seedCol` restriction, under which most straight (non-diagonal)
    /// neighbors don't count.
    pub fn with_any_neighbor_touch(mut self, value: bool) -> Self {
        self.any_neighbor_touch = value;
        self
    }

    pub fn tracked(&self) -> &[TrackedObject] {
        &self.tracked
    }

    pub fn disposed(&self) -> &[TrackedObject] {
        &self.disposed
    }

    #[inline]
    fn index(&self, row: i32, col: i32) -> usize {
        (row as usize) * (self.cols as usize) + (col as usize)
    }

    fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && row < self.rows && col >= 0 && col < self.cols
    }

    /// Runs one full frame step: Phases A through G. `background` must have
    /// at least one contribution or this returns [`RegistryError::NoForeground`].
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        frame: &Mat,
        previous_frame: Option<&Mat>,
        background: &Mat,
        background_is_ready: bool,
        background_bounds: Option<(i32, i32, i32, i32)>,
        terrain: &TerrainMask,
        field_color: &crate::vision::field_color::FieldColorModel,
        frame_index: u64,
    ) -> Result<(), RegistryError> {
        if !background_is_ready {
            return Err(RegistryError::NoForeground);
        }
        self.visit_counter += 1;

        let mut currently_disposed: Vec<usize> = Vec::new();

        // Phase A + B.
        for t_idx in 0..self.tracked.len() {
            let accepted = self.spread_and_visit(t_idx, frame, background, self.params.tau_bg);
            if !accepted {
                // Phase B only retries objects that failed Phase A outright;
                // one that was pushed out falls straight through to
                // disposal instead of re-acquiring via the widened search.
                let widened = !self.tracked[t_idx].pushed_out && self.wider_area_retry(t_idx, frame, background);
                if !widened {
                    self.tracked[t_idx].is_tracked = false;
                }
            }
        }

        // Phase C.
        for t in self.tracked.iter_mut() {
            if !t.is_tracked {
                continue;
            }
            let outside = t.positions.iter().all(|p| !terrain.contains(p.row, p.col));
            if outside {
                t.frames_outside_of_terrain += 1;
                if t.frames_outside_of_terrain > self.params.allowed_frames_outside_of_terrain {
                    t.is_tracked = false;
                }
            } else {
                t.frames_outside_of_terrain = 0;
            }
        }

        // Phase D.
        for (idx, t) in self.tracked.iter().enumerate() {
            if !t.is_tracked {
                currently_disposed.push(idx);
            }
        }

        // Phase E.
        let mut candidates = Vec::new();
        if frame_index % self.params.redetect_step == 0 {
            let thresholds = ForegroundThresholds {
                tau_bg: self.params.tau_bg,
                tau_prev: 200.0,
                green_threshold: self.params.green_threshold,
            };
            let (seg_min_row, seg_max_row, seg_min_col, seg_max_col) = background_bounds.unwrap_or((0, self.rows - 1, 0, self.cols - 1));
            if let Ok(mask) = foreground::segment(frame, previous_frame, background, terrain, field_color, &thresholds, seg_min_row, seg_max_row, seg_min_col, seg_max_col) {
                let components = extract_components(&mask, seg_min_row, seg_max_row, seg_min_col, seg_max_col);
                for component in components {
                    if component.positions.len() < self.params.minimum_group_size_at_first_detection {
                        continue;
                    }
                    let already_visited = component.positions.iter().any(|p| self.visit_stamp[self.index(p.row, p.col)] == self.visit_counter);
                    if already_visited {
                        continue;
                    }
                    let mean_color = mean_color_of(frame, &component.positions);
                    candidates.push(Candidate { positions: component.positions, mean_color });
                }
            }
        }

        // Phase F.
        self.reconnect_phase(candidates, frame_index);

        // Phase G.
        self.cap_and_finalize(currently_disposed, frame_index);

        Ok(())
    }

    fn spread_and_visit(&mut self, t_idx: usize, frame: &Mat, background: &Mat, initial_tau: f64) -> bool {
        self.spread_and_visit_in(t_idx, frame, background, initial_tau, None)
    }

    /// Same as [`Self::spread_and_visit`] but, when `area` is `Some`, restricts
    /// both seed selection and the Visit BFS to that rectangle -- used by
    /// [`Self::wider_area_retry`] (spec §4.6 Phase B) so the widened search
    /// doesn't silently degrade into an unrestricted Phase A retry.
    fn spread_and_visit_in(&mut self, t_idx: usize, frame: &Mat, background: &Mat, initial_tau: f64, area: Option<(i32, i32, i32, i32)>) -> bool {
        let mut tau = initial_tau;
        for _attempt in 0..self.params.scanning_attempts {
            let seed = self.pick_seed(t_idx, frame, background, tau);
            let Some(seed) = seed else {
                tau *= 0.8;
                continue;
            };
            let (accepted, touched_owner) = self.visit(t_idx, seed, frame, background, tau, area);
            if accepted.len() >= self.params.minimum_group_size {
                self.commit_positions(t_idx, accepted);
                return true;
            }
            if let Some(owner) = touched_owner {
                self.tracked[t_idx].pushed_out = true;
                self.tracked[t_idx].pushed_out_by = Some(self.tracked[owner].id);
                let pusher_id = self.tracked[owner].id;
                let pushed_id = self.tracked[t_idx].id;
                if let Some(pusher) = self.tracked.iter_mut().find(|o| o.id == pusher_id) {
                    if !pusher.pushed_out_groups.contains(&pushed_id) {
                        pusher.pushed_out_groups.push(pushed_id);
                    }
                }
                return false;
            }
            tau *= 0.8;
        }
        false
    }

    fn pick_seed(&self, t_idx: usize, frame: &Mat, background: &Mat, _tau: f64) -> Option<Position> {
        let positions = &self.tracked[t_idx].positions;
        if positions.is_empty() {
            return None;
        }
        let members: std::collections::HashSet<Position> = positions.iter().copied().collect();
        let mut best = positions[0];
        let mut best_score = f64::MIN;
        for &p in positions {
            let own = pixel_distance(frame, background, p.row, p.col, self.params.green_threshold);
            let mut neighbor_sum = 0.0;
            for (dr, dc) in EIGHT_NEIGHBORS {
                let neighbor = Position::new(p.row + dr, p.col + dc);
                if members.contains(&neighbor) {
                    neighbor_sum += pixel_distance(frame, background, neighbor.row, neighbor.col, self.params.green_threshold);
                }
            }
            let score = own + neighbor_sum;
            if score > best_score {
                best_score = score;
                best = p;
            }
        }
        Some(best)
    }

    /// BFS from `seed` over 8-neighbors. A pixel is accepted iff it passes
    /// the foreground criterion at `tau`, doesn't blow the bounding box past
    /// `maxWidth`/`maxHeight`, and hasn't already been claimed this frame by
    /// this object or another. Returns the accepted set and, if the BFS ran
    /// into another object's claim, that object's index. Terrain gating
    /// itself happens downstream (Phase C); the BFS only needs the
    /// foreground criterion, so no `TerrainMask` is threaded in here.
    fn visit(&mut self, t_idx: usize, seed: Position, frame: &Mat, background: &Mat, tau: f64, area: Option<(i32, i32, i32, i32)>) -> (Vec<Position>, Option<usize>) {
        let cap = ((self.tracked[t_idx].positions.len() as f64) * self.params.remaining_factor).ceil() as usize;
        let mut queue = std::collections::VecDeque::new();
        let mut accepted = Vec::new();
        let mut touched_owner = None;
        let mut bbox = (seed.row, seed.row, seed.col, seed.col);
        queue.push_back(seed);

        while let Some(p) = queue.pop_front() {
            if accepted.len() >= cap {
                break;
            }
            if !self.in_bounds(p.row, p.col) {
                continue;
            }
            if let Some((min_row, max_row, min_col, max_col)) = area {
                if p.row < min_row || p.row > max_row || p.col < min_col || p.col > max_col {
                    continue;
                }
            }
            let idx = self.index(p.row, p.col);
            if self.visit_stamp[idx] == self.visit_counter {
                if let Some(owner) = self.visit_owner[idx] {
                    // spec.md §9 Open Question #1: the original's already-
                    // visited "touches another object" test used
                    // `row != seedRow && col != seedCol`, which makes most
                    // diagonal cases not count. `any_neighbor_touch`
                    // (default true) makes the looser "any already-visited
                    // neighbor counts" reading configurable rather than
                    // silently picking one.
                    let counts = self.any_neighbor_touch || (p.row != seed.row && p.col != seed.col);
                    if owner != t_idx && touched_owner.is_none() && counts {
                        touched_owner = Some(owner);
                    }
                }
                continue;
            }
            // Re-derives the §4.4 criterion pixel-by-pixel rather than
            // re-running the full-frame segmenter per BFS step: a pixel
            // survives iff its background distance alone clears `tau`
            // (spec §4.6 Phase A step 2(i): "the foreground criterion ...
            // at the current threshold", a single distance test, not the
            // full three-step previous-frame-aware segmenter of §4.4).
            let is_foreground = pixel_distance(frame, background, p.row, p.col, self.params.green_threshold) > tau;
            if !is_foreground {
                continue;
            }
            let mut widened = bbox;
            widened.0 = widened.0.min(p.row);
            widened.1 = widened.1.max(p.row);
            widened.2 = widened.2.min(p.col);
            widened.3 = widened.3.max(p.col);
            if widened.1 - widened.0 + 1 > self.params.max_height || widened.3 - widened.2 + 1 > self.params.max_width {
                continue;
            }
            bbox = widened;
            self.visit_stamp[idx] = self.visit_counter;
            self.visit_owner[idx] = Some(t_idx);
            accepted.push(p);
            for (dr, dc) in EIGHT_NEIGHBORS {
                queue.push_back(Position::new(p.row + dr, p.col + dc));
            }
        }
        (accepted, touched_owner)
    }

    fn commit_positions(&mut self, t_idx: usize, positions: Vec<Position>) {
        let t = &mut self.tracked[t_idx];
        t.positions = positions;
        t.pushed_out = false;
        t.pushed_out_by = None;
    }

    /// Phase B: expands the search rectangle around the object's last
    /// bounding box by `enlargementFactor` times its recent maximum width and
    /// height (looked back `previousLookSize` frames), then retries
    /// Spread+Visit restricted to that rectangle.
    fn wider_area_retry(&mut self, t_idx: usize, frame: &Mat, background: &Mat) -> bool {
        let lookback = self.params.previous_look_size.min(self.tracked[t_idx].history.len());
        if lookback == 0 {
            return false;
        }
        let history = &self.tracked[t_idx].history;
        let max_width = history[history.len() - lookback..].iter().map(|b| b.width()).max().unwrap_or(1);
        let max_height = history[history.len() - lookback..].iter().map(|b| b.height()).max().unwrap_or(1);
        let last = history[history.len() - 1];
        let grow_w = ((max_width as f64) * self.params.enlargement_factor) as i32;
        let grow_h = ((max_height as f64) * self.params.enlargement_factor) as i32;
        let min_row = (last.min_row - grow_h).max(0);
        let max_row = (last.max_row + grow_h).min(self.rows - 1);
        let min_col = (last.min_col - grow_w).max(0);
        let max_col = (last.max_col + grow_w).min(self.cols - 1);

        if self.tracked[t_idx].positions.is_empty() {
            self.tracked[t_idx].positions = vec![Position::new((last.min_row + last.max_row) / 2, (last.min_col + last.max_col) / 2)];
        }
        self.spread_and_visit_in(t_idx, frame, background, self.params.tau_bg, Some((min_row, max_row, min_col, max_col)))
    }

    fn close_tracked_for(&self, mean_row: f64, mean_col: f64) -> Vec<usize> {
        let mut close_tracked: Vec<usize> = (0..self.tracked.len()).filter(|&i| self.tracked[i].is_tracked).collect();
        close_tracked.retain(|&i| {
            let (tr, tc) = self.tracked[i].mean_position();
            distance(tr, tc, mean_row, mean_col) <= self.params.same_group_field_distance
        });
        close_tracked.sort_by(|&a, &b| {
            let (ar, ac) = self.tracked[a].mean_position();
            let (br, bc) = self.tracked[b].mean_position();
            let da = distance(ar, ac, mean_row, mean_col);
            let db = distance(br, bc, mean_row, mean_col);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal).then(self.tracked[b].last_frame.cmp(&self.tracked[a].last_frame))
        });
        close_tracked
    }

    fn close_disposed_for(&self, mean_row: f64, mean_col: f64, frame_index: u64) -> Vec<usize> {
        let mut close_disposed: Vec<usize> = (0..self.disposed.len())
            .filter(|&i| frame_index.saturating_sub(self.disposed[i].last_frame) <= self.params.back_frames_to_check_for_strong_close_pushed_out)
            .collect();
        close_disposed.retain(|&i| {
            let (dr, dc) = self.disposed[i].mean_position();
            let d = distance(dr, dc, mean_row, mean_col);
            let speed = estimated_speed(&self.disposed[i], self.params.same_group_back_frames_for_speed);
            let elapsed = (frame_index.saturating_sub(self.disposed[i].last_frame)) as f64;
            d <= 1.5 * speed * elapsed.max(1.0)
        });
        close_disposed.sort_by(|&a, &b| {
            let (ar, ac) = self.disposed[a].mean_position();
            let (br, bc) = self.disposed[b].mean_position();
            distance(ar, ac, mean_row, mean_col).partial_cmp(&distance(br, bc, mean_row, mean_col)).unwrap_or(std::cmp::Ordering::Equal)
        });
        close_disposed
    }

    /// Phase F, run once per frame over every newcomer `ForegroundSegmenter`
    /// surfaced. Rule 1 (push-out release) is resolved per candidate since it
    /// tests one specific (pusher, pushed) pair; Rule 2 (unambiguous disposed
    /// return) is resolved jointly across every candidate still in play via
    /// [`crate::vision::assignment::solve`], so two candidates converging on
    /// the same disposed object in the same frame get the cost-minimizing
    /// pairing instead of whichever happened to run first. Rules 3 and 4 then
    /// run per leftover candidate as before.
    fn reconnect_phase(&mut self, candidates: Vec<Candidate>, frame_index: u64) {
        let mut remaining = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let (mean_row, mean_col) = mean_of(&candidate.positions);
            let close_tracked = self.close_tracked_for(mean_row, mean_col);
            let close_disposed = self.close_disposed_for(mean_row, mean_col, frame_index);

            let mut revived = false;
            if let (Some(&d0), Some(&t0)) = (close_disposed.first(), close_tracked.first()) {
                if self.disposed[d0].pushed_out
                    && self.disposed[d0].pushed_out_by == Some(self.tracked[t0].id)
                    && self.tracked[t0].size_shrinked_lately(self.params.back_frames_to_check_for_close_tracked)
                {
                    self.revive_disposed(d0, candidate.positions.clone(), candidate.mean_color, frame_index, TypeFlags::FILLED);
                    revived = true;
                }
            }
            if !revived {
                remaining.push(candidate);
            }
        }

        let remaining = self.resolve_disposed_returns(remaining, frame_index);

        for candidate in remaining {
            self.reconnect_pusher_or_create(candidate, frame_index);
        }
    }

    /// Rule 2: matches every remaining candidate against every disposed
    /// object it is close enough to revive (and that isn't itself awaiting a
    /// push-out release) using the Hungarian assignment, rather than each
    /// candidate greedily grabbing its own nearest disposed object in
    /// submission order. Candidates with no reachable disposed object, or
    /// whose optimal assignment came back as the sentinel (no feasible
    /// pairing), are returned for Rule 3/4 handling.
    fn resolve_disposed_returns(&mut self, candidates: Vec<Candidate>, frame_index: u64) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }

        struct Eligible {
            candidate_idx: usize,
            mean: (f64, f64),
            disposed: Vec<usize>,
        }

        let mut eligible = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let mean = mean_of(&candidate.positions);
            let returnable: Vec<usize> = self.close_disposed_for(mean.0, mean.1, frame_index).into_iter().filter(|&d| !self.disposed[d].pushed_out).collect();
            if !returnable.is_empty() {
                eligible.push(Eligible { candidate_idx: i, mean, disposed: returnable });
            }
        }
        if eligible.is_empty() {
            return candidates;
        }

        let mut targets: Vec<usize> = Vec::new();
        for e in &eligible {
            for &d in &e.disposed {
                if !targets.contains(&d) {
                    targets.push(d);
                }
            }
        }

        const SENTINEL: f64 = 1.0e9;
        let n = eligible.len().max(targets.len());
        let mut costs = vec![vec![SENTINEL; n]; n];
        for (row, e) in eligible.iter().enumerate() {
            for (col, &d) in targets.iter().enumerate() {
                if e.disposed.contains(&d) {
                    let (dr, dc) = self.disposed[d].mean_position();
                    costs[row][col] = distance(dr, dc, e.mean.0, e.mean.1);
                }
            }
        }
        let (assignment, _) = crate::vision::assignment::solve(&costs);

        // (candidate index into `candidates`, disposed index) pairs the
        // solver actually matched at a real (non-sentinel) cost.
        let mut revivals: Vec<(usize, usize)> = Vec::new();
        for (row, &col) in assignment.iter().enumerate() {
            if row >= eligible.len() || col >= targets.len() || costs[row][col] >= SENTINEL {
                continue;
            }
            revivals.push((eligible[row].candidate_idx, targets[col]));
        }
        // Revive highest disposed index first so `Vec::remove` doesn't shift
        // a later revival's index out from under it.
        revivals.sort_unstable_by(|a, b| b.1.cmp(&a.1));

        let mut consumed = vec![false; candidates.len()];
        let mut candidates: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        for (candidate_idx, disposed_idx) in revivals {
            let candidate = candidates[candidate_idx].take().expect("each candidate index assigned at most once");
            self.revive_disposed(disposed_idx, candidate.positions, candidate.mean_color, frame_index, TypeFlags::FILLED);
            consumed[candidate_idx] = true;
        }

        candidates.into_iter().enumerate().filter(|(i, _)| !consumed[*i]).filter_map(|(_, c)| c).collect()
    }

    /// Rules 3 and 4 for a candidate that Rules 1/2 left unmatched.
    fn reconnect_pusher_or_create(&mut self, candidate: Candidate, frame_index: u64) {
        let (mean_row, mean_col) = mean_of(&candidate.positions);
        let close_tracked = self.close_tracked_for(mean_row, mean_col);

        // Rule 3: unambiguous pusher's released partner.
        if let Some(&t0) = close_tracked.first() {
            let (tr0, tc0) = self.tracked[t0].mean_position();
            let dist0 = distance(tr0, tc0, mean_row, mean_col).max(1e-6);
            let unambiguous = match close_tracked.get(1) {
                Some(&t1) => {
                    let (tr1, tc1) = self.tracked[t1].mean_position();
                    distance(tr1, tc1, mean_row, mean_col) >= 3.0 * dist0
                }
                None => true,
            };
            if unambiguous {
                let pusher_id = self.tracked[t0].id;
                let oldest_group = self
                    .disposed
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.pushed_out_by == Some(pusher_id) && frame_index.saturating_sub(o.last_frame) <= self.params.back_frames_to_check_for_close_pushed_out)
                    .min_by_key(|(_, o)| o.last_frame)
                    .map(|(i, _)| i);
                if let Some(d_idx) = oldest_group {
                    self.revive_disposed(d_idx, candidate.positions, candidate.mean_color, frame_index, TypeFlags::FILLED);
                    return;
                }
            }
        }

        // Rule 4: fresh track.
        let id = Uuid::new_v4();
        self.tracked.push(TrackedObject::new(id, candidate.positions, frame_index, candidate.mean_color));
    }

    fn revive_disposed(&mut self, disposed_idx: usize, positions: Vec<Position>, mean_color: MeanColor, frame_index: u64, fill_flag: TypeFlags) {
        let mut object = self.disposed.remove(disposed_idx);
        let gap_start = object.last_frame;
        if let Some(last_box) = object.history.last().copied() {
            let gap = frame_index.saturating_sub(gap_start);
            if gap > 1 {
                let new_box = BoundingBox::new(bounding_rect(&positions).0, bounding_rect(&positions).1, bounding_rect(&positions).2, bounding_rect(&positions).3, frame_index, mean_color);
                let n = gap as i32;
                for step in 1..n {
                    let mut interpolated = BoundingBox::lerp(&last_box, &new_box, step - 1, n, gap_start + step as u64);
                    interpolated.type_flags |= fill_flag;
                    object.history.push(interpolated);
                }
            }
        }
        object.positions = positions;
        object.mean_color = mean_color;
        object.last_frame = frame_index;
        object.is_tracked = true;
        object.pushed_out = false;
        object.pushed_out_by = None;
        object.frames_outside_of_terrain = 0;
        self.tracked.push(object);
    }

    fn cap_and_finalize(&mut self, currently_disposed_idx: Vec<usize>, frame_index: u64) {
        if self.tracked.len() > self.params.max_objects {
            let mut order: Vec<usize> = (0..self.tracked.len()).collect();
            order.sort_by_key(|&i| self.tracked[i].positions.len() * self.tracked[i].history.len());
            let drop_count = self.tracked.len() - self.params.max_objects;
            let to_drop: std::collections::HashSet<usize> = order.into_iter().take(drop_count).collect();
            let mut kept = Vec::with_capacity(self.params.max_objects);
            for (i, obj) in self.tracked.drain(..).enumerate() {
                if !to_drop.contains(&i) {
                    kept.push(obj);
                }
            }
            self.tracked = kept;
        }

        let disposed_ids: std::collections::HashSet<usize> = currently_disposed_idx.into_iter().collect();
        let mut still_tracked = Vec::with_capacity(self.tracked.len());
        let mut newly_disposed = Vec::new();
        for (i, mut obj) in self.tracked.drain(..).enumerate() {
            if disposed_ids.contains(&i) {
                if let Some(last) = obj.history.last_mut() {
                    last.type_flags |= TypeFlags::PUSHED_OUT;
                }
                if let Some(pusher_id) = obj.pushed_out_by {
                    newly_disposed.push((obj, Some(pusher_id)));
                } else {
                    newly_disposed.push((obj, None));
                }
                continue;
            }
            let bbox = bbox_from_positions(&obj.positions, frame_index, obj.mean_color);
            obj.history.push(bbox);
            obj.last_frame = frame_index;
            still_tracked.push(obj);
        }
        self.tracked = still_tracked;

        for (obj, pusher_id) in newly_disposed {
            if let Some(pusher_id) = pusher_id {
                if let Some(pusher) = self.tracked.iter_mut().chain(self.disposed.iter_mut()).find(|o| o.id == pusher_id) {
                    if let Some(last) = pusher.history.last_mut() {
                        last.type_flags |= TypeFlags::PUSHER;
                    }
                }
            }
            self.disposed.push(obj);
        }
    }
}

const EIGHT_NEIGHBORS: [(i32, i32); 8] = [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];

fn pixel_distance(frame: &Mat, background: &Mat, row: i32, col: i32, green_threshold: f64) -> f64 {
    use opencv::core::Vec3b;
    use opencv::prelude::*;
    let a = match frame.at_2d::<Vec3b>(row, col) {
        Ok(p) => *p,
        Err(_) => return 0.0,
    };
    let b = match background.at_2d::<Vec3b>(row, col) {
        Ok(p) => *p,
        Err(_) => return 0.0,
    };
    foreground::background_distance(a, b, green_threshold)
}

fn mean_color_of(frame: &Mat, positions: &[Position]) -> MeanColor {
    use opencv::core::Vec3b;
    use opencv::prelude::*;
    if positions.is_empty() {
        return (0, 0, 0);
    }
    let mut sum = [0i64; 3];
    for p in positions {
        if let Ok(pixel) = frame.at_2d::<Vec3b>(p.row, p.col) {
            sum[0] += pixel[0] as i64;
            sum[1] += pixel[1] as i64;
            sum[2] += pixel[2] as i64;
        }
    }
    let n = positions.len() as i64;
    ((sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8)
}

fn mean_of(positions: &[Position]) -> (f64, f64) {
    let n = positions.len() as f64;
    let sum_row: i64 = positions.iter().map(|p| p.row as i64).sum();
    let sum_col: i64 = positions.iter().map(|p| p.col as i64).sum();
    (sum_row as f64 / n, sum_col as f64 / n)
}

fn distance(r0: f64, c0: f64, r1: f64, c1: f64) -> f64 {
    ((r0 - r1).powi(2) + (c0 - c1).powi(2)).sqrt()
}

/// Mean inter-frame top-center displacement over the last `window` history
/// entries, used to admit a disposed object's reconnection distance.
fn estimated_speed(object: &TrackedObject, window: usize) -> f64 {
    let history = &object.history;
    if history.len() < 2 {
        return 0.0;
    }
    let window = window.min(history.len() - 1);
    if window == 0 {
        return 0.0;
    }
    let start = history.len() - 1 - window;
    let mut total = 0.0;
    for i in start..history.len() - 1 {
        let a = &history[i];
        let b = &history[i + 1];
        let ac = ((a.min_col + a.max_col) as f64) / 2.0;
        let bc = ((b.min_col + b.max_col) as f64) / 2.0;
        total += distance(a.min_row as f64, ac, b.min_row as f64, bc);
    }
    total / window as f64
}

#[allow(dead_code)]
type OwnerMap = HashMap<usize, usize>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_position_reports_minus_one_when_empty() {
        let obj = TrackedObject::new(Uuid::new_v4(), Vec::new(), 0, (0, 0, 0));
        assert_eq!(obj.mean_position(), (-1.0, -1.0));
    }

    #[test]
    fn push_out_consistency_holds_after_recording() {
        let mut pusher = TrackedObject::new(Uuid::new_v4(), vec![Position::new(0, 0)], 0, (0, 0, 0));
        let mut pushed = TrackedObject::new(Uuid::new_v4(), vec![Position::new(1, 1)], 0, (0, 0, 0));
        pushed.pushed_out = true;
        pushed.pushed_out_by = Some(pusher.id);
        pusher.pushed_out_groups.push(pushed.id);
        assert_eq!(pushed.pushed_out_by, Some(pusher.id));
        assert!(pusher.pushed_out_groups.contains(&pushed.id));
    }

    #[test]
    fn cap_and_finalize_drops_smallest_when_over_cap() {
        let rows = 20;
        let cols = 20;
        let mut params = RegistryParams::default();
        params.max_objects = 2;
        let mut registry = TrackedObjectRegistry::new(rows, cols, params);
        for i in 0..4 {
            let id = Uuid::new_v4();
            let mut obj = TrackedObject::new(id, vec![Position::new(i, i)], 0, (0, 0, 0));
            obj.history = vec![obj.history[0]; i as usize + 1];
            registry.tracked.push(obj);
        }
        registry.cap_and_finalize(Vec::new(), 1);
        assert_eq!(registry.tracked.len(), 2);
    }
}
