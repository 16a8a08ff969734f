use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use bioskop_core::CanonicalSchedule;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScheduleErrorResponse {
    pub error: String,
}

/// Resolve a screening to the canonical one of its slot
pub async fn get_canonical_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CanonicalSchedule>, impl IntoResponse> {
    match state.schema().canonical_schedule(id) {
        Ok(Some(resolved)) => Ok(Json(resolved)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ScheduleErrorResponse {
                error: format!("Schedule not found: {}", id),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ScheduleErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
