use actix_web::{web, Error, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::rest_api::APIStorage;

#[derive(Debug, Serialize, ToSchema)]
pub struct MutationResponse<'a> {
    #[schema(example = "ok")]
    pub message: &'a str,
}

/// Requests that the processing thread re-run team classification on the
/// next frame, e.g. after the interactive seed picker has been re-run
/// (spec §6 runtime mutation contract, §4.8 team classification).
#[utoipa::path(
    post,
    tag = "Mutations",
    path = "/api/mutations/recompute_teams",
    responses(
        (status = 200, description = "Recompute request accepted", body = MutationResponse)
    )
)]
pub async fn recompute_teams(data: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let ds_guard = data.data_storage.read().expect("DataStorage is poisoned [RWLock]");
    ds_guard.request_team_recompute();
    drop(ds_guard);
    Ok(HttpResponse::Ok().json(MutationResponse { message: "ok" }))
}
