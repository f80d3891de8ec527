use crate::db::SharedRepository;
use crate::error::app_error::AppError;
use crate::models::health::HealthResponse;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

/// Liveness check that also pings the configured storage backend
#[openapi(tag = "Health")]
#[get("/")]
pub async fn healthcheck(repo: &State<SharedRepository>) -> Result<Json<HealthResponse>, AppError> {
    repo.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        storage: repo.backend_name(),
    }))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![healthcheck]
}
