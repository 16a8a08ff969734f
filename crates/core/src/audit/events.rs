use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Transaction lifecycle
    TransactionCreated {
        transaction_id: i64,
        created_by: String,
        customer_id: i64,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_price: Option<f64>,
    },
    TransactionUpdated {
        transaction_id: i64,
        updated_by: String,
        /// Fields present in the request, by their wire names.
        fields: Vec<String>,
    },
    TransactionDeleted {
        transaction_id: i64,
        deleted_by: String,
        previous_status: String,
    },
    TransactionStatusChanged {
        transaction_id: i64,
        changed_by: String,
        from_status: String,
        to_status: String,
        /// Timestamp recorded for the change (RFC 3339, in the zone it was resolved in).
        effective_at: String,
        /// Raw client clock, when one was sent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_tz: Option<String>,
    },
    /// Tickets returned to sale by a cancellation.
    TicketsReleased {
        transaction_id: i64,
        ticket_ids: Vec<i64>,
    },

    // Accounts
    AccountRegistered {
        account_id: i64,
        table: String,
        username: String,
        registered_by: String,
        /// How the key was assigned (`native`, `gap_fill`, `max_plus_one`).
        pk_strategy: String,
    },
    /// Startup repair of the `admin` account.
    AdminRepaired {
        table: String,
        role_fixed: bool,
        token_issued: bool,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TransactionCreated { .. } => "transaction_created",
            Self::TransactionUpdated { .. } => "transaction_updated",
            Self::TransactionDeleted { .. } => "transaction_deleted",
            Self::TransactionStatusChanged { .. } => "transaction_status_changed",
            Self::TicketsReleased { .. } => "tickets_released",
            Self::AccountRegistered { .. } => "account_registered",
            Self::AdminRepaired { .. } => "admin_repaired",
        }
    }

    /// Returns the transaction the event is about, if any
    pub fn transaction_id(&self) -> Option<i64> {
        match self {
            Self::TransactionCreated { transaction_id, .. }
            | Self::TransactionUpdated { transaction_id, .. }
            | Self::TransactionDeleted { transaction_id, .. }
            | Self::TransactionStatusChanged { transaction_id, .. }
            | Self::TicketsReleased { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }

    /// Returns the actor who triggered the event, if any
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TransactionCreated { created_by, .. } => Some(created_by),
            Self::TransactionUpdated { updated_by, .. } => Some(updated_by),
            Self::TransactionDeleted { deleted_by, .. } => Some(deleted_by),
            Self::TransactionStatusChanged { changed_by, .. } => Some(changed_by),
            Self::AccountRegistered { registered_by, .. } => Some(registered_by),
            _ => None,
        }
    }
}

/// Stored audit record with metadata
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub transaction_id: Option<i64>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}
