//! Status resolution for the write paths.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::{
    effective_timestamp, is_recognized_status, normalize_status, StatusChange, StatusTransition,
    TransactionError, TransactionStatus, TransactionStore,
};

/// Longest accepted `client_tz` value.
const MAX_CLIENT_TZ_LEN: usize = 60;

/// A status change as submitted by a client.
#[derive(Debug, Clone, Default)]
pub struct SetStatusRequest {
    pub status: String,
    pub client_time: Option<String>,
    pub client_tz: Option<String>,
}

/// Validate the request, resolve the effective timestamp and apply it.
///
/// Validation happens before the store is touched, so a rejected request
/// never mutates anything, even for an unknown id.
pub fn set_status(
    store: &dyn TransactionStore,
    id: i64,
    request: &SetStatusRequest,
    server_tz: Tz,
    now: DateTime<Utc>,
) -> Result<StatusTransition, TransactionError> {
    if !is_recognized_status(&request.status) {
        return Err(TransactionError::Validation(format!(
            "status '{}' is not one of pending, sukses, batal or their synonyms",
            request.status.trim()
        )));
    }
    if let Some(ref tz) = request.client_tz {
        if tz.chars().count() > MAX_CLIENT_TZ_LEN {
            return Err(TransactionError::Validation(format!(
                "client_tz must be at most {MAX_CLIENT_TZ_LEN} characters"
            )));
        }
    }

    let status = resolve_create_status(Some(&request.status))?;
    let effective_at = effective_timestamp(
        request.client_time.as_deref(),
        request.client_tz.as_deref(),
        server_tz,
        now,
    );

    store.set_status(id, StatusChange { status, effective_at })
}

/// Status for a new transaction: absent or empty means `pending`.
pub fn resolve_create_status(raw: Option<&str>) -> Result<TransactionStatus, TransactionError> {
    match normalize_status(raw) {
        None => Ok(TransactionStatus::Pending),
        Some(value) => TransactionStatus::from_canonical(&value).ok_or_else(|| {
            TransactionError::Validation(format!("unknown status '{value}'"))
        }),
    }
}

/// Status for an update: absent leaves it unchanged, a present value is
/// resolved like on create.
pub fn resolve_update_status(
    raw: Option<&str>,
) -> Result<Option<TransactionStatus>, TransactionError> {
    raw.map(|value| resolve_create_status(Some(value)))
        .transpose()
}
