//! Cinema booking transactions: status vocabulary, storage and the
//! status lifecycle.

mod clock;
mod lifecycle;
mod sqlite_store;
mod status;
mod store;
mod types;

pub use clock::{effective_timestamp, parse_client_time, parse_timezone, server_now};
pub use lifecycle::{resolve_create_status, resolve_update_status, set_status, SetStatusRequest};
pub use sqlite_store::SqliteTransactionStore;
pub use status::{canonical_status, is_recognized_status, normalize_status, TransactionStatus};
pub use store::{
    CreateTransactionRequest, StatusChange, StatusTransition, TransactionChanges,
    TransactionError, TransactionFilter, TransactionStore,
};
pub use types::{TicketSummary, Transaction, TransactionDetail, TICKET_AVAILABLE, TICKET_SOLD};
