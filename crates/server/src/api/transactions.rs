//! Transaction API handlers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use bioskop_core::transaction::{
    parse_client_time, resolve_create_status, resolve_update_status, TicketSummary,
    TransactionDetail,
};
use bioskop_core::{
    normalize_status, set_status, AuditEvent, CreateTransactionRequest, SetStatusRequest,
    Transaction, TransactionChanges, TransactionError, TransactionFilter,
};

use super::middleware::AuthUser;
use crate::state::AppState;

/// Page size when `per_page` is absent.
const DEFAULT_PER_PAGE: i64 = 15;
const MIN_PER_PAGE: i64 = 5;
const MAX_PER_PAGE: i64 = 100;

const MAX_STATUS_LEN: usize = 20;
const MAX_PAYMENT_METHOD_LEN: usize = 50;
const MAX_PAYMENT_DESTINATION_LEN: usize = 120;
const MAX_PAYMENT_ACCOUNT_NAME_LEN: usize = 150;

const CLIENT_TIME_HEADER: &str = "x-client-time";
const CLIENT_TZ_HEADER: &str = "x-client-tz";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body for create and update.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionBody {
    #[serde(default, deserialize_with = "present")]
    pub customer_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub kasir_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub tanggal_transaksi: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub total_harga: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub status: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub payment_method: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub payment_destination: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub payment_account_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub paid_at: Option<Option<String>>,
}

impl TransactionBody {
    /// Wire names of the fields present in the body.
    fn present_fields(&self) -> Vec<String> {
        [
            ("customer_id", self.customer_id.is_some()),
            ("kasir_id", self.kasir_id.is_some()),
            ("tanggal_transaksi", self.tanggal_transaksi.is_some()),
            ("total_harga", self.total_harga.is_some()),
            ("status", self.status.is_some()),
            ("payment_method", self.payment_method.is_some()),
            ("payment_destination", self.payment_destination.is_some()),
            ("payment_account_name", self.payment_account_name.is_some()),
            ("paid_at", self.paid_at.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| name.to_string())
        .collect()
    }

    /// Length checks shared by create and update.
    fn validate_lengths(&self) -> Result<(), TransactionError> {
        check_len("status", &self.status, MAX_STATUS_LEN)?;
        check_len("payment_method", &self.payment_method, MAX_PAYMENT_METHOD_LEN)?;
        check_len(
            "payment_destination",
            &self.payment_destination,
            MAX_PAYMENT_DESTINATION_LEN,
        )?;
        check_len(
            "payment_account_name",
            &self.payment_account_name,
            MAX_PAYMENT_ACCOUNT_NAME_LEN,
        )
    }

    fn into_create_request(self, tz: Tz) -> Result<CreateTransactionRequest, TransactionError> {
        self.validate_lengths()?;
        let customer_id = self
            .customer_id
            .flatten()
            .ok_or_else(|| TransactionError::Validation("customer_id is required".to_string()))?;

        Ok(CreateTransactionRequest {
            customer_id,
            cashier_id: self.kasir_id.flatten(),
            transaction_date: parse_date_field("tanggal_transaksi", self.tanggal_transaksi, tz)?
                .flatten(),
            total_price: self.total_harga.flatten(),
            status: resolve_create_status(self.status.flatten().as_deref())?,
            payment_method: self.payment_method.flatten(),
            payment_destination: self.payment_destination.flatten(),
            payment_account_name: self.payment_account_name.flatten(),
            paid_at: parse_date_field("paid_at", self.paid_at, tz)?.flatten(),
        })
    }

    fn into_changes(self, tz: Tz) -> Result<TransactionChanges, TransactionError> {
        self.validate_lengths()?;
        let customer_id = match self.customer_id {
            Some(None) => {
                return Err(TransactionError::Validation(
                    "customer_id must be an integer".to_string(),
                ))
            }
            other => other.flatten(),
        };

        Ok(TransactionChanges {
            customer_id,
            cashier_id: self.kasir_id,
            transaction_date: parse_date_field("tanggal_transaksi", self.tanggal_transaksi, tz)?,
            total_price: self.total_harga,
            // An explicit null leaves the status alone.
            status: resolve_update_status(self.status.flatten().as_deref())?,
            payment_method: self.payment_method,
            payment_destination: self.payment_destination,
            payment_account_name: self.payment_account_name,
            paid_at: parse_date_field("paid_at", self.paid_at, tz)?,
        })
    }
}

fn check_len(
    field: &str,
    value: &Option<Option<String>>,
    max: usize,
) -> Result<(), TransactionError> {
    match value {
        Some(Some(v)) if v.chars().count() > max => Err(TransactionError::Validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

fn parse_date_field(
    field: &str,
    value: Option<Option<String>>,
    tz: Tz,
) -> Result<Option<Option<DateTime<FixedOffset>>>, TransactionError> {
    match value {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(raw)) => parse_client_time(&raw, tz)
            .map(|dt| Some(Some(dt)))
            .ok_or_else(|| TransactionError::Validation(format!("{field} is not a valid date"))),
    }
}

/// Query parameters for listing transactions.
///
/// Everything arrives as a string and is interpreted leniently: unparseable
/// numbers fall back, unknown flag spellings count as false.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsParams {
    pub status: Option<String>,
    pub only_pending: Option<String>,
    pub customer_id: Option<String>,
    pub flat: Option<String>,
    pub per_page: Option<String>,
    pub page: Option<String>,
}

impl ListTransactionsParams {
    fn filter(&self) -> TransactionFilter {
        let mut filter = TransactionFilter::new();
        if let Some(status) = normalize_status(self.status.as_deref()) {
            filter = filter.with_status(status);
        }
        if is_truthy(self.only_pending.as_deref()) {
            filter = filter.only_pending();
        }
        if let Some(customer_id) = self
            .customer_id
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id != 0)
        {
            filter = filter.with_customer_id(customer_id);
        }
        filter
    }

    fn per_page(&self) -> i64 {
        self.per_page
            .as_deref()
            .map(|v| v.trim().parse::<i64>().unwrap_or(0))
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(MIN_PER_PAGE, MAX_PER_PAGE)
    }

    fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1)
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "on" | "yes")
    )
}

/// Body for the status operation. Times may also come from headers.
#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub status: Option<String>,
    pub client_time: Option<String>,
    pub client_tz: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub tiket_id: i64,
    pub status: String,
    pub kode_kursi: Option<String>,
    pub jadwal_id: Option<i64>,
    pub tanggal: Option<String>,
    pub jam_mulai: Option<String>,
    pub judul_film: Option<String>,
    pub nama_studio: Option<String>,
}

impl From<TicketSummary> for TicketResponse {
    fn from(ticket: TicketSummary) -> Self {
        Self {
            tiket_id: ticket.id,
            status: ticket.status,
            kode_kursi: ticket.seat_code,
            jadwal_id: ticket.schedule_id,
            tanggal: ticket.show_date,
            jam_mulai: ticket.start_time,
            judul_film: ticket.film_title,
            nama_studio: ticket.studio_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail_id: i64,
    pub tiket_id: Option<i64>,
    pub harga: Option<f64>,
    pub tiket: Option<TicketResponse>,
}

impl From<TransactionDetail> for DetailResponse {
    fn from(detail: TransactionDetail) -> Self {
        Self {
            detail_id: detail.id,
            tiket_id: detail.ticket_id,
            harga: detail.price,
            tiket: detail.ticket.map(TicketResponse::from),
        }
    }
}

/// Response for transaction operations
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaksi_id: i64,
    pub customer_id: i64,
    pub nama_customer: Option<String>,
    pub kasir_id: Option<i64>,
    pub tanggal_transaksi: Option<String>,
    pub total_harga: Option<f64>,
    pub status: String,
    pub payment_method: Option<String>,
    pub payment_destination: Option<String>,
    pub payment_account_name: Option<String>,
    pub paid_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub detail: Vec<DetailResponse>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            transaksi_id: tx.id,
            customer_id: tx.customer_id,
            nama_customer: tx.customer_name,
            kasir_id: tx.cashier_id,
            tanggal_transaksi: tx.transaction_date.map(|dt| dt.to_rfc3339()),
            total_harga: tx.total_price,
            status: tx.status.to_string(),
            payment_method: tx.payment_method,
            payment_destination: tx.payment_destination,
            payment_account_name: tx.payment_account_name,
            paid_at: tx.paid_at.map(|dt| dt.to_rfc3339()),
            created_at: tx.created_at.to_rfc3339(),
            updated_at: tx.updated_at.to_rfc3339(),
            detail: tx.details.into_iter().map(DetailResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

/// Response for listing transactions; `meta` is omitted for flat listings.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    pub data: Vec<TransactionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TransactionErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<TransactionErrorResponse>);

fn error_response(e: TransactionError) -> ApiError {
    let status = match e {
        TransactionError::NotFound(_) => StatusCode::NOT_FOUND,
        TransactionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TransactionError::Database(ref msg) => {
            tracing::error!("Transaction store error: {}", msg);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(TransactionErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// List transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTransactionsParams>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let filter = params.filter();

    if is_truthy(params.flat.as_deref()) {
        let rows = state.transactions().list(&filter).map_err(error_response)?;
        return Ok(Json(ListTransactionsResponse {
            data: rows.into_iter().map(TransactionResponse::from).collect(),
            meta: None,
        }));
    }

    let per_page = params.per_page();
    let page = params.page();
    let total = state
        .transactions()
        .count(&filter)
        .map_err(error_response)?;
    let rows = state
        .transactions()
        .list(
            &filter
                .clone()
                .with_limit(per_page)
                .with_offset((page - 1).saturating_mul(per_page)),
        )
        .map_err(error_response)?;

    Ok(Json(ListTransactionsResponse {
        data: rows.into_iter().map(TransactionResponse::from).collect(),
        meta: Some(PageMeta {
            current_page: page,
            per_page,
            total,
            last_page: ((total + per_page - 1) / per_page).max(1),
        }),
    }))
}

/// Get a transaction by id
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransactionResponse>, impl IntoResponse> {
    match state.transactions().get(id) {
        Ok(Some(tx)) => Ok(Json(TransactionResponse::from(tx))),
        Ok(None) => Err(error_response(TransactionError::NotFound(id))),
        Err(e) => Err(error_response(e)),
    }
}

/// Create a transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(body): Json<TransactionBody>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let request = body
        .into_create_request(state.timezone())
        .map_err(error_response)?;
    let tx = state
        .transactions()
        .create(request)
        .map_err(error_response)?;

    state.audit().try_emit(AuditEvent::TransactionCreated {
        transaction_id: tx.id,
        created_by: actor,
        customer_id: tx.customer_id,
        status: tx.status.to_string(),
        total_price: tx.total_price,
    });

    Ok((StatusCode::CREATED, Json(TransactionResponse::from(tx))))
}

/// Apply a partial update
///
/// Status side effects (paid_at, ticket release) only happen through the
/// status endpoint.
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<TransactionBody>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let fields = body.present_fields();
    let changes = body.into_changes(state.timezone()).map_err(error_response)?;
    let tx = state
        .transactions()
        .update(id, changes)
        .map_err(error_response)?;

    if !fields.is_empty() {
        state.audit().try_emit(AuditEvent::TransactionUpdated {
            transaction_id: id,
            updated_by: actor,
            fields,
        });
    }

    Ok(Json(TransactionResponse::from(tx)))
}

/// Delete a transaction and its detail rows; tickets are left as they are
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.transactions().delete(id).map_err(error_response)?;

    state.audit().try_emit(AuditEvent::TransactionDeleted {
        transaction_id: id,
        deleted_by: actor,
        previous_status: deleted.status.to_string(),
    });

    Ok(Json(DeleteResponse { deleted: true }))
}

/// Set the status and apply its side effects
///
/// `client_time`/`client_tz` from the body win over the `X-Client-Time` and
/// `X-Client-Tz` headers.
pub async fn set_transaction_status(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<SetStatusBody>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    let status = body.status.ok_or_else(|| {
        error_response(TransactionError::Validation("status is required".to_string()))
    })?;
    let request = SetStatusRequest {
        status,
        client_time: body.client_time.or_else(|| header_value(CLIENT_TIME_HEADER)),
        client_tz: body.client_tz.or_else(|| header_value(CLIENT_TZ_HEADER)),
    };

    let transition =
        set_status(state.transactions(), id, &request, state.timezone(), Utc::now())
            .map_err(error_response)?;

    let tx = transition.transaction;
    state.audit().try_emit(AuditEvent::TransactionStatusChanged {
        transaction_id: id,
        changed_by: actor,
        from_status: transition.previous_status.to_string(),
        to_status: tx.status.to_string(),
        effective_at: transition.effective_at.to_rfc3339(),
        client_time: request.client_time,
        client_tz: request.client_tz,
    });
    if !transition.released_tickets.is_empty() {
        state.audit().try_emit(AuditEvent::TicketsReleased {
            transaction_id: id,
            ticket_ids: transition.released_tickets,
        });
    }

    Ok(Json(TransactionResponse::from(tx)))
}
