use actix_web::{web, Error, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rest_api::APIStorage;
use crate::vision::team::Team;
use crate::vision::types::{BoundingBox, TypeFlags};

/// A single tracked object as currently reported, spec §6 runtime UI contract.
#[derive(Debug, Serialize, ToSchema)]
pub struct ObjectView {
    /// Stable identifier, assigned once and kept across push-out/reconnection
    #[schema(value_type = String, example = "1e23985f-1fa3-45d0-a365-2d8525a23ddd")]
    pub id: Uuid,
    pub bounding_box: BoundingBox,
    pub team: Option<Team>,
    pub type_flags: TypeFlags,
}

/// All objects tracked in the most recently processed frame.
#[derive(Debug, Serialize, ToSchema)]
pub struct AllObjects {
    #[schema(example = "1e23985f-1fa3-45d0-a365-2d8525a23ddd")]
    pub equipment_id: String,
    #[schema(example = 18042)]
    pub frame_index: u64,
    pub objects: Vec<ObjectView>,
}

#[utoipa::path(
    get,
    tag = "Objects",
    path = "/api/objects",
    responses(
        (status = 200, description = "Tracked objects in the latest processed frame", body = AllObjects)
    )
)]
pub async fn all_objects(data: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let ds_guard = data.data_storage.read().expect("DataStorage is poisoned [RWLock]");
    let objects_guard = ds_guard.objects.read().expect("DataStorage.objects poisoned [RWLock]");
    let teams_guard = ds_guard.teams.read().expect("DataStorage.teams poisoned [RWLock]");
    let frame_index = *ds_guard.frame_index.read().expect("DataStorage.frame_index poisoned [RWLock]");

    let ans = AllObjects {
        equipment_id: ds_guard.id.clone(),
        frame_index,
        objects: objects_guard
            .iter()
            .map(|obj| ObjectView {
                id: obj.id,
                bounding_box: obj.bbox,
                team: obj.team.or_else(|| teams_guard.get(&obj.id).copied()),
                type_flags: obj.type_flags,
            })
            .collect(),
    };
    drop(teams_guard);
    drop(objects_guard);
    drop(ds_guard);

    Ok(HttpResponse::Ok().json(ans))
}
