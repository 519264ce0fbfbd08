use actix_web::{web, HttpResponse, Responder};

use crate::rest_api::{mjpeg_client, mjpeg_page, mutations, objects, snapshots, toml_mutations};

async fn say_ping() -> impl Responder {
    HttpResponse::Ok().body("pong")
}

pub fn init_routes(enable_mjpeg: bool) -> impl Fn(&mut web::ServiceConfig) {
    move |cfg| {
        if enable_mjpeg {
            cfg.route("/live", web::get().to(mjpeg_page::mjpeg_page))
                .route("/live_streaming", web::get().to(mjpeg_client::add_new_client));
        }

        cfg.service(
            web::scope("/api")
                .service(RapiDoc::with_openapi("/docs.json", ApiDoc::openapi()))
                .service(RapiDoc::new("/api/docs.json").path("/docs"))
                .route("/ping", web::get().to(say_ping))
                .route("/objects", web::get().to(objects::all_objects))
                .route("/background", web::get().to(snapshots::background_snapshot))
                .route("/foreground", web::get().to(snapshots::foreground_snapshot))
                .service(
                    web::scope("/mutations")
                        .route("/recompute_teams", web::post().to(mutations::recompute_teams))
                        .route("/save_toml", web::get().to(toml_mutations::save_toml)),
                ),
        );
    }
}

/* Swagger section */
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        objects::all_objects,
        snapshots::background_snapshot,
        snapshots::foreground_snapshot,
        mutations::recompute_teams,
        toml_mutations::save_toml,
    ),
    tags(
        (name = "Objects", description = "Currently tracked objects"),
        (name = "Snapshots", description = "Background/foreground model snapshots"),
        (name = "Mutations", description = "Runtime mutations of the tracking pipeline"),
        (name = "Configuration file mutations", description = "Persisting the running configuration"),
    ),
    components(
        // utoipa can't discover recursive schemas on its own (yet?), so every
        // response type reachable from a path needs to be listed here too.
        schemas(
            crate::rest_api::objects::ObjectView,
            crate::rest_api::objects::AllObjects,
            crate::rest_api::mutations::MutationResponse,
            crate::rest_api::toml_mutations::UpdateTOMLResponse,
            crate::rest_api::toml_mutations::ErrorResponse,
            crate::vision::types::BoundingBox,
            crate::vision::team::Team,
        ),
    )
)]
struct ApiDoc;
