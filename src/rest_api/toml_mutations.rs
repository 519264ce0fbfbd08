use actix_web::{web, Error, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::rest_api::APIStorage;

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    #[schema(example = "Can't save TOML due the error")]
    pub error_text: String,
}

/// Response for the save configuration file request
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateTOMLResponse<'a> {
    /// Message
    #[schema(example = "ok")]
    pub message: &'a str,
}

/// Persists the running configuration back to disk, with the interactively
/// selected terrain polygon stripped (spec §6: the terrain cache, not the
/// TOML, is the source of truth for the polygon once selected).
#[utoipa::path(
    get,
    tag = "Configuration file mutations",
    path = "/api/mutations/save_toml",
    responses(
        (status = 200, description = "Configuration has been saved", body = UpdateTOMLResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub async fn save_toml(data: web::Data<APIStorage>) -> Result<HttpResponse, Error> {
    println!("Saving TOML configuration");
    let setting_cloned = data.app_settings.get_copy_no_terrain();
    match setting_cloned.save(&data.settings_filename) {
        Ok(_) => {}
        Err(err) => {
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error_text: format!("Can't save TOML due the error: {}", err),
            }));
        }
    };
    Ok(HttpResponse::Ok().json(UpdateTOMLResponse { message: "ok" }))
}
