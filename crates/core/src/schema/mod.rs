//! Schema-aware helpers for tables whose layout varies between deployments.
//!
//! Free functions take the connection explicitly; [`SchemaStore`] wraps them
//! around a shared connection for the server.

mod account;
mod admin;
mod insert;
mod introspect;
mod schedule;
mod store;

use thiserror::Error;

pub use account::{generate_api_token, register_account, NewAccount, RegisteredAccount};
pub use admin::{ensure_admin_user, AdminRepair};
pub use insert::{
    insert_with_generated_key, max_pk, smallest_missing_pk, InsertedRow, PkStrategy, RowData,
};
pub use introspect::{
    auth_pk_col, pick_auth_table, quote_ident, table_columns, table_exists, table_has_col,
};
pub use schedule::{canonical_schedule, CanonicalSchedule, Schedule};
pub use store::SchemaStore;

/// Errors from schema helpers.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The native insert succeeded but produced no key.
    #[error("Insert into {0} did not produce a key")]
    NoGeneratedKey(String),

    /// The largest key in use is already `i64::MAX`.
    #[error("Key space of {0} is exhausted")]
    KeyOverflow(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// None of `users`, `customer`, `pelanggan` exists.
    #[error("No auth table found")]
    NoAuthTable,

    #[error("Table {table} has no {column} column")]
    MissingColumn { table: String, column: String },

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Connection lock poisoned")]
    LockPoisoned,
}
