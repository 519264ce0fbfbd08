//! Shared state handed to the REST API and Redis publisher threads: the
//! latest per-frame tracked-object snapshot, team tags, background/foreground
//! PNG snapshots and the rolling statistics window. Mirrors the teacher's
//! `lib::data_storage::DataStorage` (an `Arc<RwLock<..>>` all worker threads
//! borrow) but carries vision-tracking state instead of road-traffic zones.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::vision::team::Team;
use crate::vision::types::{BoundingBox, TypeFlags};

/// One tracked object as surfaced to external consumers: spec §6's runtime
/// UI contract, `(id, boundingBox, teamTag, typeFlags)`.
#[derive(Debug, Clone)]
pub struct ObjectSnapshot {
    pub id: Uuid,
    pub bbox: BoundingBox,
    pub team: Option<Team>,
    pub type_flags: TypeFlags,
}

pub type ThreadedDataStorage = Arc<RwLock<DataStorage>>;

pub struct DataStorage {
    pub id: String,
    pub verbose: bool,
    pub objects: RwLock<Vec<ObjectSnapshot>>,
    pub teams: RwLock<HashMap<Uuid, Team>>,
    pub background_png: RwLock<Option<Vec<u8>>>,
    pub foreground_png: RwLock<Option<Vec<u8>>>,
    pub frame_index: RwLock<u64>,
    pub period_start: RwLock<DateTime<Utc>>,
    pub period_end: RwLock<DateTime<Utc>>,
    /// Set by the REST API's `recompute_teams` mutation, cleared by the
    /// processing thread once it has re-run `vision::team::classify` on the
    /// next frame (spec §6 runtime mutation contract).
    pub recompute_teams_requested: RwLock<bool>,
}

impl DataStorage {
    pub fn new(id: String, verbose: bool) -> Self {
        let now = Utc::now();
        DataStorage {
            id,
            verbose,
            objects: RwLock::new(Vec::new()),
            teams: RwLock::new(HashMap::new()),
            background_png: RwLock::new(None),
            foreground_png: RwLock::new(None),
            frame_index: RwLock::new(0),
            period_start: RwLock::new(now),
            period_end: RwLock::new(now),
            recompute_teams_requested: RwLock::new(false),
        }
    }

    /// Flags the next frame's processing pass to re-run team classification.
    pub fn request_team_recompute(&self) {
        let mut guard = self.recompute_teams_requested.write().expect("DataStorage.recompute_teams_requested poisoned [RWLock]");
        *guard = true;
    }

    /// Consumes the pending recompute flag, if any. Called once per frame by
    /// the processing thread.
    pub fn take_team_recompute_request(&self) -> bool {
        let mut guard = self.recompute_teams_requested.write().expect("DataStorage.recompute_teams_requested poisoned [RWLock]");
        std::mem::replace(&mut *guard, false)
    }

    /// Replaces the current-frame object snapshot. Called once per frame
    /// from the processing thread after `TrackedObjectRegistry::step`.
    pub fn update_objects(&self, frame_index: u64, objects: Vec<ObjectSnapshot>) {
        let mut guard = self.objects.write().expect("DataStorage.objects poisoned [RWLock]");
        *guard = objects;
        drop(guard);
        let mut idx = self.frame_index.write().expect("DataStorage.frame_index poisoned [RWLock]");
        *idx = frame_index;
    }

    pub fn update_background_snapshot(&self, png: Vec<u8>) {
        let mut guard = self.background_png.write().expect("DataStorage.background_png poisoned [RWLock]");
        *guard = Some(png);
    }

    pub fn update_foreground_snapshot(&self, png: Vec<u8>) {
        let mut guard = self.foreground_png.write().expect("DataStorage.foreground_png poisoned [RWLock]");
        *guard = Some(png);
    }

    pub fn update_team(&self, id: Uuid, team: Team) {
        let mut guard = self.teams.write().expect("DataStorage.teams poisoned [RWLock]");
        guard.insert(id, team);
    }

    /// Rotates the statistics window the same way the teacher's worker does:
    /// `period_start` becomes the previous `period_end`, `period_end` is
    /// pushed forward by `reset_data_milliseconds`.
    pub fn update_statistics(&self, reset_data_milliseconds: i64) {
        let mut start = self.period_start.write().expect("DataStorage.period_start poisoned [RWLock]");
        let mut end = self.period_end.write().expect("DataStorage.period_end poisoned [RWLock]");
        if *start == *end {
            *end = Utc::now();
            *start = *end - chrono::Duration::milliseconds(reset_data_milliseconds);
        } else {
            *start = *end;
            *end += chrono::Duration::milliseconds(reset_data_milliseconds);
        }
        if self.verbose {
            println!("Reset timer due analytics. Period start: {} | Period end: {}", *start, *end);
        }
    }
}

pub fn new_datastorage(id: String, verbose: bool) -> ThreadedDataStorage {
    Arc::new(RwLock::new(DataStorage::new(id, verbose)))
}
