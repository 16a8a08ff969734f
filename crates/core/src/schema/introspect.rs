//! Capability queries against the live schema.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension};

use super::SchemaError;

/// Auth tables tried in order of preference.
const AUTH_TABLES: &[&str] = &["users", "customer", "pelanggan"];

/// Primary-key column names tried in order of preference.
const PK_CANDIDATES: &[&str] = &["id_users", "users_id", "id", "user_id", "usersid", "customer_id"];

/// Quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> Result<String, SchemaError> {
    if name.is_empty() || name.contains('\0') {
        return Err(SchemaError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Column names of `table`. A missing table has no columns.
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
    names.collect()
}

/// Whether `table` has `col`. Introspection failures read as `false`.
pub fn table_has_col(conn: &Connection, table: &str, col: &str) -> bool {
    table_columns(conn, table)
        .map(|columns| columns.contains(col))
        .unwrap_or(false)
}

pub fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .unwrap_or(false)
}

/// The table holding login accounts: `users`, else `customer`, else `pelanggan`.
pub fn pick_auth_table(conn: &Connection) -> Option<&'static str> {
    AUTH_TABLES
        .iter()
        .copied()
        .find(|table| table_exists(conn, table))
}

/// Primary-key column of an account-like table, falling back to `id`.
pub fn auth_pk_col(conn: &Connection, table: &str) -> String {
    let columns = table_columns(conn, table).unwrap_or_default();
    PK_CANDIDATES
        .iter()
        .find(|candidate| columns.contains(**candidate))
        .unwrap_or(&"id")
        .to_string()
}
