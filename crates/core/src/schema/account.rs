//! Account registration against whichever auth table the database has.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::{
    insert_with_generated_key, pick_auth_table, quote_ident, table_columns, PkStrategy, RowData,
    SchemaError,
};

const API_TOKEN_LEN: usize = 40;
const DEFAULT_ROLE: &str = "customer";

/// A fresh random alphanumeric API token.
pub fn generate_api_token() -> String {
    let mut token = String::with_capacity(64);
    token.push_str(&uuid::Uuid::new_v4().simple().to_string());
    token.push_str(&uuid::Uuid::new_v4().simple().to_string());
    token.truncate(API_TOKEN_LEN);
    token
}

#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A stored account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredAccount {
    pub table: String,
    pub id: i64,
    pub pk_column: String,
    pub strategy: PkStrategy,
    /// Columns written, sorted by name.
    pub columns: Vec<String>,
    pub role: Option<String>,
    pub api_token: Option<String>,
}

/// Insert an account, populating only the columns the auth table has.
pub fn register_account(
    conn: &mut Connection,
    account: &NewAccount,
    hash_cost: u32,
    now: DateTime<Utc>,
) -> Result<RegisteredAccount, SchemaError> {
    let table = pick_auth_table(conn).ok_or(SchemaError::NoAuthTable)?;
    let columns = table_columns(conn, table)?;
    for required in ["username", "password"] {
        if !columns.contains(required) {
            return Err(SchemaError::MissingColumn {
                table: table.to_string(),
                column: required.to_string(),
            });
        }
    }

    let taken = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE username = ?1", quote_ident(table)?),
            [&account.username],
            |_| Ok(()),
        )
        .optional()?;
    if taken.is_some() {
        return Err(SchemaError::DuplicateUsername(account.username.clone()));
    }

    let mut row = RowData::new();
    row.insert("username".to_string(), Value::Text(account.username.clone()));
    row.insert(
        "password".to_string(),
        Value::Text(bcrypt::hash(&account.password, hash_cost)?),
    );

    if let Some(ref name) = account.name {
        if let Some(col) = ["name", "nama"].into_iter().find(|c| columns.contains(*c)) {
            row.insert(col.to_string(), Value::Text(name.clone()));
        }
    }
    if let Some(ref email) = account.email {
        if columns.contains("email") {
            row.insert("email".to_string(), Value::Text(email.clone()));
        }
    }

    let role = columns.contains("role").then(|| DEFAULT_ROLE.to_string());
    if let Some(ref role) = role {
        row.insert("role".to_string(), Value::Text(role.clone()));
    }
    let api_token = columns.contains("api_token").then(generate_api_token);
    if let Some(ref token) = api_token {
        row.insert("api_token".to_string(), Value::Text(token.clone()));
    }
    for stamp in ["created_at", "updated_at"] {
        if columns.contains(stamp) {
            row.insert(stamp.to_string(), Value::Text(now.to_rfc3339()));
        }
    }

    let inserted = insert_with_generated_key(conn, table, &row)?;
    info!(
        table,
        id = inserted.key,
        strategy = %inserted.strategy,
        "Registered account"
    );

    Ok(RegisteredAccount {
        table: table.to_string(),
        id: inserted.key,
        pk_column: inserted.pk_column,
        strategy: inserted.strategy,
        columns: row.into_keys().collect(),
        role,
        api_token,
    })
}
