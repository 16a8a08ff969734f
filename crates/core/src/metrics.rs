//! Prometheus metrics for core components.
//!
//! Counters here are bumped where the work happens (stores, schema helpers);
//! the server registers them next to its HTTP metrics.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Transactions
// =============================================================================

/// Status changes applied through the status operation.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bioskop_transaction_status_transitions_total",
            "Transaction status transitions",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Tickets returned to `tersedia` by cancellations.
pub static TICKETS_RELEASED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bioskop_tickets_released_total",
        "Tickets released back to sale by cancelled transactions",
    )
    .unwrap()
});

// =============================================================================
// Schema helpers
// =============================================================================

/// Rows inserted by the generated-key inserter, by strategy.
pub static PK_INSERTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bioskop_pk_inserts_total",
            "Rows inserted with a generated key, by key strategy",
        ),
        &["strategy"], // "native", "gap_fill", "max_plus_one"
    )
    .unwrap()
});

/// Admin repairs that changed the admin row.
pub static ADMIN_REPAIRS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bioskop_admin_repairs_total",
        "Startup repairs applied to the admin account",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(STATUS_TRANSITIONS.clone()),
        Box::new(TICKETS_RELEASED.clone()),
        Box::new(PK_INSERTS.clone()),
        Box::new(ADMIN_REPAIRS.clone()),
    ]
}
