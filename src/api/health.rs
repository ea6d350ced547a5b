use actix_web::{HttpResponse, Responder};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Server is up", body = Object, example = json!({
            "status": "Server is running"
        }))
    ),
    tag = "Health"
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "Server is running" }))
}
