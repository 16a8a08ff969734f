//! Transaction storage trait and request types.

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use super::{Transaction, TransactionStatus};

/// Error type for transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// No transaction with this id.
    #[error("Transaction not found: {0}")]
    NotFound(i64),

    /// Malformed or out-of-vocabulary input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Underlying store failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for TransactionError {
    fn from(e: rusqlite::Error) -> Self {
        TransactionError::Database(e.to_string())
    }
}

/// Request to create a new transaction.
#[derive(Debug, Clone, Default)]
pub struct CreateTransactionRequest {
    pub customer_id: i64,
    pub cashier_id: Option<i64>,
    pub transaction_date: Option<DateTime<FixedOffset>>,
    pub total_price: Option<f64>,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    pub payment_destination: Option<String>,
    pub payment_account_name: Option<String>,
    pub paid_at: Option<DateTime<FixedOffset>>,
}

/// Partial update of a transaction.
///
/// The outer `Option` is "field present in the request"; for nullable
/// columns the inner `Option` is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    pub customer_id: Option<i64>,
    pub cashier_id: Option<Option<i64>>,
    pub transaction_date: Option<Option<DateTime<FixedOffset>>>,
    pub total_price: Option<Option<f64>>,
    pub status: Option<TransactionStatus>,
    pub payment_method: Option<Option<String>>,
    pub payment_destination: Option<Option<String>>,
    pub payment_account_name: Option<Option<String>>,
    pub paid_at: Option<Option<DateTime<FixedOffset>>>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.cashier_id.is_none()
            && self.transaction_date.is_none()
            && self.total_price.is_none()
            && self.status.is_none()
            && self.payment_method.is_none()
            && self.payment_destination.is_none()
            && self.payment_account_name.is_none()
            && self.paid_at.is_none()
    }
}

/// Filter for listing transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Already-normalized status value. Non-canonical values simply match nothing.
    pub status: Option<String>,
    /// Restrict to `pending` on top of any status filter.
    pub only_pending: bool,
    pub customer_id: Option<i64>,
    /// `None` returns every matching row.
    pub limit: Option<i64>,
    pub offset: i64,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn only_pending(mut self) -> Self {
        self.only_pending = true;
        self
    }

    pub fn with_customer_id(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Same conditions, no pagination. Used for totals.
    pub fn unpaginated(&self) -> Self {
        Self {
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }
}

/// A validated status change ready to be applied.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: TransactionStatus,
    /// Written to `paid_at` and `tanggal_transaksi` when the status is `sukses`.
    pub effective_at: DateTime<FixedOffset>,
}

/// Outcome of applying a [`StatusChange`].
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub previous_status: TransactionStatus,
    pub transaction: Transaction,
    /// Tickets returned to `tersedia`; empty unless the new status is `batal`.
    pub released_tickets: Vec<i64>,
    /// The timestamp the change was resolved to, whether or not it was written.
    pub effective_at: DateTime<FixedOffset>,
}

/// Trait for transaction storage backends.
pub trait TransactionStore: Send + Sync {
    /// Create a new transaction.
    fn create(&self, request: CreateTransactionRequest) -> Result<Transaction, TransactionError>;

    /// Get a transaction (with its details) by id.
    fn get(&self, id: i64) -> Result<Option<Transaction>, TransactionError>;

    /// List transactions matching the filter, newest first.
    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, TransactionError>;

    /// Count transactions matching the filter, ignoring pagination.
    fn count(&self, filter: &TransactionFilter) -> Result<i64, TransactionError>;

    /// Count transactions per canonical status.
    fn count_by_status(&self) -> Result<Vec<(TransactionStatus, i64)>, TransactionError>;

    /// Apply a partial update.
    fn update(&self, id: i64, changes: TransactionChanges) -> Result<Transaction, TransactionError>;

    /// Delete a transaction; detail rows go with it. Returns the deleted row.
    fn delete(&self, id: i64) -> Result<Transaction, TransactionError>;

    /// Set the status and apply its side effects on `paid_at`,
    /// `tanggal_transaksi` and, for `batal`, the referenced tickets.
    fn set_status(&self, id: i64, change: StatusChange) -> Result<StatusTransition, TransactionError>;
}
