//! Core transaction data types.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::TransactionStatus;

/// Ticket status meaning the seat can be sold again.
pub const TICKET_AVAILABLE: &str = "tersedia";

/// Ticket status for a seat bound to a transaction.
pub const TICKET_SOLD: &str = "terjual";

/// A booking/payment record (`transaksi`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub customer_id: i64,
    /// Name of the referenced customer, when the row exists.
    pub customer_name: Option<String>,
    pub cashier_id: Option<i64>,
    pub transaction_date: Option<DateTime<FixedOffset>>,
    pub total_price: Option<f64>,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    pub payment_destination: Option<String>,
    pub payment_account_name: Option<String>,
    /// Set only while the transaction is `sukses`.
    pub paid_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub details: Vec<TransactionDetail>,
}

impl Transaction {
    /// Ids of the tickets referenced by the detail rows.
    pub fn ticket_ids(&self) -> Vec<i64> {
        self.details.iter().filter_map(|d| d.ticket_id).collect()
    }
}

/// One line of a transaction (`detail_transaksi`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDetail {
    pub id: i64,
    pub ticket_id: Option<i64>,
    pub price: Option<f64>,
    pub ticket: Option<TicketSummary>,
}

/// The ticket behind a detail row, flattened with its seat and screening.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketSummary {
    pub id: i64,
    pub status: String,
    pub seat_code: Option<String>,
    pub schedule_id: Option<i64>,
    pub show_date: Option<String>,
    pub start_time: Option<String>,
    pub film_title: Option<String>,
    pub studio_name: Option<String>,
}

impl TicketSummary {
    pub fn is_available(&self) -> bool {
        self.status == TICKET_AVAILABLE
    }
}
