use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use bioskop_core::audit::{DEFAULT_AUDIT_LIMIT, MAX_AUDIT_LIMIT};
use bioskop_core::{AuditFilter, AuditRecord};

use crate::state::AppState;

/// Query parameters for the audit endpoint
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub transaction_id: Option<i64>,
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    /// Events at or after this instant (RFC 3339)
    pub from: Option<DateTime<Utc>>,
    /// Events at or before this instant (RFC 3339)
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Matching events, ignoring limit/offset
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct AuditErrorResponse {
    pub error: String,
}

/// Query audit events, newest first
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, impl IntoResponse> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut base_filter = AuditFilter::new();
    if let Some(transaction_id) = params.transaction_id {
        base_filter = base_filter.with_transaction_id(transaction_id);
    }
    if let Some(ref event_type) = params.event_type {
        base_filter = base_filter.with_event_type(event_type);
    }
    if let Some(ref user_id) = params.user_id {
        base_filter = base_filter.with_user_id(user_id);
    }
    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = base_filter.clone().with_limit(limit).with_offset(offset);

    let store = state.audit_store();
    let result = store
        .query(&query_filter)
        .and_then(|events| store.count(&base_filter).map(|total| (events, total)));

    match result {
        Ok((events, total)) => Ok(Json(AuditQueryResponse {
            events,
            total,
            limit,
            offset,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AuditErrorResponse {
                error: format!("Failed to query audit events: {}", e),
            }),
        )),
    }
}
