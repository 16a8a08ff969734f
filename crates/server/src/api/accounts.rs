//! Account registration.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use bioskop_core::{AuditEvent, NewAccount, RegisteredAccount, SchemaError};

use super::middleware::AuthUser;
use crate::state::AppState;

/// Request body for registering an account
#[derive(Debug, Deserialize)]
pub struct RegisterAccountBody {
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Error response for account operations
#[derive(Debug, Serialize)]
pub struct AccountErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<AccountErrorResponse>);

fn error_response(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(AccountErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn schema_error_response(e: SchemaError) -> ApiError {
    let status = match e {
        SchemaError::DuplicateUsername(_) => StatusCode::CONFLICT,
        SchemaError::MissingColumn { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => {
            tracing::error!("Account registration failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e)
}

/// Register an account in whichever auth table the database has
///
/// Password hashing runs on the blocking pool.
pub async fn register_account(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(body): Json<RegisterAccountBody>,
) -> Result<(StatusCode, Json<RegisteredAccount>), ApiError> {
    let username = body.username.trim().to_string();
    if username.is_empty() {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "username is required",
        ));
    }
    if body.password.is_empty() {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "password is required",
        ));
    }

    let account = NewAccount {
        username: username.clone(),
        password: body.password,
        name: body.name,
        email: body.email,
    };

    let worker_state = Arc::clone(&state);
    let registered = tokio::task::spawn_blocking(move || {
        worker_state.schema().register_account(&account, Utc::now())
    })
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e))?
    .map_err(schema_error_response)?;

    state.audit().try_emit(AuditEvent::AccountRegistered {
        account_id: registered.id,
        table: registered.table.clone(),
        username,
        registered_by: actor,
        pk_strategy: registered.strategy.to_string(),
    });

    Ok((StatusCode::CREATED, Json(registered)))
}
