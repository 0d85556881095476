use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::error::{internal_error, AppResult, ErrorBody, TRAFFIC_FETCH_FAILED};
use crate::snapshot::TrafficSnapshot;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/traffic",
    tag = "traffic",
    responses(
        (status = 200, description = "Latest allowlisted camera frames", body = TrafficSnapshot),
        (status = 500, description = "Upstream unavailable or malformed", body = ErrorBody)
    )
)]
pub(crate) async fn get_traffic(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let snapshot = state
        .traffic_images
        .snapshot_at(Utc::now())
        .await
        .map_err(|err| {
            internal_error(
                format!("error fetching traffic data: {err}"),
                TRAFFIC_FETCH_FAILED,
            )
        })?;

    tracing::debug!(
        timestamp = %snapshot.timestamp,
        cameras = snapshot.cameras.len(),
        "served traffic snapshot"
    );
    Ok(([(CACHE_CONTROL, "no-store")], Json(snapshot)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/traffic", get(get_traffic))
}
