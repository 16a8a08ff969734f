pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod metrics;
pub mod schema;
pub mod transaction;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditEventEnvelope, AuditFilter, AuditHandle,
    AuditRecord, AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use schema::{
    canonical_schedule, ensure_admin_user, insert_with_generated_key, pick_auth_table,
    AdminRepair, CanonicalSchedule, NewAccount, PkStrategy, RegisteredAccount, RowData,
    SchemaError, SchemaStore,
};
pub use transaction::{
    normalize_status, set_status, CreateTransactionRequest, SetStatusRequest,
    SqliteTransactionStore, StatusTransition, Transaction, TransactionChanges, TransactionError,
    TransactionFilter, TransactionStatus, TransactionStore,
};
