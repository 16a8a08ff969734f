//! Repair of the built-in `admin` account.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::{auth_pk_col, generate_api_token, quote_ident, table_columns, SchemaError};
use crate::metrics::ADMIN_REPAIRS;

const ADMIN_USERNAME: &str = "admin";
const ADMIN_ROLE: &str = "admin";

/// What [`ensure_admin_user`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdminRepair {
    /// The table has no `username`/`password` columns.
    Skipped,
    /// No `admin` row exists; nothing is created.
    Missing,
    /// The admin row already has its role and a token.
    Unchanged,
    Repaired { role_fixed: bool, token_issued: bool },
}

/// Give an existing `admin` row the `admin` role and an API token.
///
/// Only columns the table actually has are touched. A missing admin row is
/// left missing.
pub fn ensure_admin_user(
    conn: &Connection,
    table: &str,
    now: DateTime<Utc>,
) -> Result<AdminRepair, SchemaError> {
    let columns = table_columns(conn, table)?;
    if !columns.contains("username") || !columns.contains("password") {
        return Ok(AdminRepair::Skipped);
    }

    let has_role = columns.contains("role");
    let has_token = columns.contains("api_token");
    let pk = auth_pk_col(conn, table);

    let sql = format!(
        "SELECT {}, {}, {} FROM {} WHERE username = ?1 LIMIT 1",
        quote_ident(&pk)?,
        if has_role { "role" } else { "NULL" },
        if has_token { "api_token" } else { "NULL" },
        quote_ident(table)?,
    );
    let admin = conn
        .query_row(&sql, params![ADMIN_USERNAME], |row| {
            Ok((
                row.get::<_, Value>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .optional()?;

    let Some((key, role, token)) = admin else {
        return Ok(AdminRepair::Missing);
    };

    let role_fixed = has_role && role.as_deref() != Some(ADMIN_ROLE);
    let token_issued = has_token && token.as_deref().map_or(true, str::is_empty);
    if !role_fixed && !token_issued {
        return Ok(AdminRepair::Unchanged);
    }

    let mut assignments = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if role_fixed {
        assignments.push("role = ?".to_string());
        values.push(Value::Text(ADMIN_ROLE.to_string()));
    }
    if token_issued {
        assignments.push("api_token = ?".to_string());
        values.push(Value::Text(generate_api_token()));
    }
    if columns.contains("updated_at") {
        assignments.push("updated_at = ?".to_string());
        values.push(Value::Text(now.to_rfc3339()));
    }
    values.push(key);

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(table)?,
        assignments.join(", "),
        quote_ident(&pk)?,
    );
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;

    ADMIN_REPAIRS.inc();
    info!(table, role_fixed, token_issued, "Repaired admin account");
    Ok(AdminRepair::Repaired {
        role_fixed,
        token_issued,
    })
}
