use actix_web::{web, Error, HttpResponse};

use crate::rest_api::APIStorage;

/// Latest background model snapshot, PNG-encoded (spec §6: `GET /api/background`).
#[utoipa::path(
    get,
    tag = "Snapshots",
    path = "/api/background",
    responses(
        (status = 200, description = "Background model snapshot (image/png)"),
        (status = 404, description = "No background snapshot available yet")
    )
)]
pub async fn background_snapshot(data: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let ds_guard = data.data_storage.read().expect("DataStorage is poisoned [RWLock]");
    let png_guard = ds_guard.background_png.read().expect("DataStorage.background_png poisoned [RWLock]");
    match png_guard.clone() {
        Some(bytes) => Ok(HttpResponse::Ok().content_type("image/png").body(bytes)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

/// Latest foreground mask snapshot, PNG-encoded (spec §6: `GET /api/foreground`).
#[utoipa::path(
    get,
    tag = "Snapshots",
    path = "/api/foreground",
    responses(
        (status = 200, description = "Foreground mask snapshot (image/png)"),
        (status = 404, description = "No foreground snapshot available yet")
    )
)]
pub async fn foreground_snapshot(data: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    let ds_guard = data.data_storage.read().expect("DataStorage is poisoned [RWLock]");
    let png_guard = ds_guard.foreground_png.read().expect("DataStorage.foreground_png poisoned [RWLock]");
    match png_guard.clone() {
        Some(bytes) => Ok(HttpResponse::Ok().content_type("image/png").body(bytes)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}
