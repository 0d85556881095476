use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Singapore Traffic Monitor",
        description = "Woodlands and Tuas checkpoint camera frames from data.gov.sg"
    ),
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::traffic::get_traffic,
    ),
    components(schemas(
        crate::routes::health::HealthResponse,
        crate::snapshot::TrafficSnapshot,
        crate::snapshot::CameraReading,
        crate::snapshot::CameraPosition,
        crate::snapshot::ImageMetadata,
        crate::error::ErrorBody,
    )),
    tags((name = "traffic", description = "Traffic camera proxy"))
)]
struct ApiDoc;

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_default()
}

async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}
