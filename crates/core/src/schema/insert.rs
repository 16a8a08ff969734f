//! Row insertion that tolerates legacy primary keys.
//!
//! Some deployments carry account tables whose key column is a plain
//! `INTEGER NOT NULL` without auto-increment. [`insert_with_generated_key`]
//! tries the native path first and only then assigns a key itself.
//!
//! The fallback strategies read the table and then insert, so two writers
//! racing on the same table can pick the same key. Only the native path is
//! safe under concurrent writers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use tracing::debug;

use super::{auth_pk_col, quote_ident, SchemaError};
use crate::metrics::PK_INSERTS;

/// Column values for one row, keyed by column name.
pub type RowData = BTreeMap<String, Value>;

/// How a key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PkStrategy {
    /// The database generated it.
    Native,
    /// Smallest positive integer not in use.
    GapFill,
    /// One past the largest key in use.
    MaxPlusOne,
}

impl PkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::GapFill => "gap_fill",
            Self::MaxPlusOne => "max_plus_one",
        }
    }
}

impl fmt::Display for PkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertedRow {
    pub key: i64,
    pub pk_column: String,
    pub strategy: PkStrategy,
}

/// Integer reading of a key value; text is accepted when it parses as a number.
fn numeric_key(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Real(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

/// Smallest positive integer not used as `pk` in `table`.
pub fn smallest_missing_pk(conn: &Connection, table: &str, pk: &str) -> Result<i64, SchemaError> {
    let sql = format!("SELECT {} FROM {}", quote_ident(pk)?, quote_ident(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt.query_map([], |row| row.get::<_, Value>(0))?;

    let mut used = BTreeSet::new();
    for value in values {
        if let Some(key) = numeric_key(&value?) {
            used.insert(key);
        }
    }

    let mut candidate = 1;
    while used.contains(&candidate) {
        candidate += 1;
    }
    Ok(candidate)
}

/// Largest numeric `pk` in `table`, `None` for an empty table or a
/// non-numeric maximum.
pub fn max_pk(conn: &Connection, table: &str, pk: &str) -> Result<Option<i64>, SchemaError> {
    let sql = format!("SELECT MAX({}) FROM {}", quote_ident(pk)?, quote_ident(table)?);
    let max: Value = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(numeric_key(&max))
}

fn insert_sql(table: &str, data: &RowData, returning: Option<&str>) -> Result<String, SchemaError> {
    let table = quote_ident(table)?;
    let mut sql = if data.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        let columns = data
            .keys()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        )
    };
    if let Some(pk) = returning {
        sql.push_str(&format!(" RETURNING {}", quote_ident(pk)?));
    }
    Ok(sql)
}

fn insert_native(conn: &mut Connection, table: &str, pk: &str, data: &RowData) -> Result<i64, SchemaError> {
    let sql = insert_sql(table, data, Some(pk))?;
    let savepoint = conn.savepoint()?;
    let key: Option<i64> =
        savepoint.query_row(&sql, params_from_iter(data.values()), |row| row.get(0))?;
    match key {
        Some(key) => {
            savepoint.commit()?;
            Ok(key)
        }
        // Dropping the savepoint rolls the row back.
        None => Err(SchemaError::NoGeneratedKey(table.to_string())),
    }
}

fn insert_explicit(
    conn: &Connection,
    table: &str,
    pk: &str,
    data: &RowData,
    key: i64,
) -> Result<(), SchemaError> {
    let mut row = data.clone();
    row.insert(pk.to_string(), Value::Integer(key));
    let sql = insert_sql(table, &row, None)?;
    conn.execute(&sql, params_from_iter(row.values()))?;
    Ok(())
}

/// Insert `data` into `table` and return the row's key.
///
/// The key column is resolved with [`auth_pk_col`]. Strategies, each tried
/// only after the previous one failed:
///
/// 1. native insert, reading back the generated key;
/// 2. when `data` carries no key: the smallest unused positive integer;
/// 3. when that failed too: one past the current maximum (1 for an empty table).
///
/// If every strategy fails the error of the native attempt is returned.
/// The errors of the fallbacks are only logged.
pub fn insert_with_generated_key(
    conn: &mut Connection,
    table: &str,
    data: &RowData,
) -> Result<InsertedRow, SchemaError> {
    let pk = auth_pk_col(conn, table);
    let inserted = |key, strategy: PkStrategy| {
        PK_INSERTS.with_label_values(&[strategy.as_str()]).inc();
        InsertedRow {
            key,
            pk_column: pk.clone(),
            strategy,
        }
    };

    let native_error = match insert_native(conn, table, &pk, data) {
        Ok(key) => return Ok(inserted(key, PkStrategy::Native)),
        Err(e) => e,
    };

    if data.contains_key(&pk) {
        return Err(native_error);
    }
    debug!(table, pk = %pk, error = %native_error, "Native insert failed, filling key gap");

    let gap_fill = smallest_missing_pk(conn, table, &pk)
        .and_then(|key| insert_explicit(conn, table, &pk, data, key).map(|_| key));
    match gap_fill {
        Ok(key) => return Ok(inserted(key, PkStrategy::GapFill)),
        Err(e) => debug!(table, pk = %pk, error = %e, "Gap-fill insert failed, using max + 1"),
    }

    let max_plus_one = max_pk(conn, table, &pk)
        .and_then(|max| match max {
            None => Ok(1),
            Some(m) => m
                .checked_add(1)
                .ok_or_else(|| SchemaError::KeyOverflow(table.to_string())),
        })
        .and_then(|key| insert_explicit(conn, table, &pk, data, key).map(|_| key));
    match max_plus_one {
        Ok(key) => Ok(inserted(key, PkStrategy::MaxPlusOne)),
        Err(e) => {
            debug!(table, pk = %pk, error = %e, "Max + 1 insert failed");
            Err(native_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_conn(schema: &str, ids: &[i64]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(schema).unwrap();
        for id in ids {
            conn.execute(
                "INSERT INTO legacy (id, name) VALUES (?1, 'seed')",
                [id],
            )
            .unwrap();
        }
        conn
    }

    fn row(name: &str) -> RowData {
        let mut data = RowData::new();
        data.insert("name".to_string(), Value::Text(name.to_string()));
        data
    }

    const NO_AUTOINCREMENT: &str = "CREATE TABLE legacy (id INTEGER NOT NULL, name TEXT);";

    #[test]
    fn test_native_insert() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE legacy (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);")
            .unwrap();

        let first = insert_with_generated_key(&mut conn, "legacy", &row("a")).unwrap();
        let second = insert_with_generated_key(&mut conn, "legacy", &row("b")).unwrap();

        assert_eq!(first.strategy, PkStrategy::Native);
        assert_eq!((first.key, second.key), (1, 2));
        assert_eq!(first.pk_column, "id");
    }

    #[test]
    fn test_gap_fill_assigns_smallest_missing() {
        let mut conn = legacy_conn(NO_AUTOINCREMENT, &[1, 2, 4]);

        let inserted = insert_with_generated_key(&mut conn, "legacy", &row("new")).unwrap();

        assert_eq!(inserted.key, 3);
        assert_eq!(inserted.strategy, PkStrategy::GapFill);
        let name: String = conn
            .query_row("SELECT name FROM legacy WHERE id = 3", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "new");
    }

    #[test]
    fn test_gap_fill_without_gap_appends() {
        let mut conn = legacy_conn(NO_AUTOINCREMENT, &[1, 2, 3]);
        let inserted = insert_with_generated_key(&mut conn, "legacy", &row("new")).unwrap();
        assert_eq!(inserted.key, 4);
    }

    #[test]
    fn test_max_plus_one_when_gap_is_rejected() {
        let mut conn = legacy_conn(
            "CREATE TABLE legacy (id INTEGER NOT NULL CHECK (id >= 2), name TEXT);",
            &[2, 3],
        );

        let inserted = insert_with_generated_key(&mut conn, "legacy", &row("new")).unwrap();

        assert_eq!(inserted.key, 4);
        assert_eq!(inserted.strategy, PkStrategy::MaxPlusOne);
    }

    #[test]
    fn test_null_key_is_rolled_back() {
        // Nullable key: the native insert succeeds but yields no key.
        let mut conn = legacy_conn("CREATE TABLE legacy (id INTEGER, name TEXT);", &[1]);

        let inserted = insert_with_generated_key(&mut conn, "legacy", &row("new")).unwrap();

        assert_eq!(inserted.key, 2);
        let nulls: i64 = conn
            .query_row("SELECT COUNT(*) FROM legacy WHERE id IS NULL", [], |r| r.get(0))
            .unwrap();
        assert_eq!(nulls, 0);
    }

    #[test]
    fn test_explicit_key_returns_native_error() {
        let mut conn = legacy_conn(NO_AUTOINCREMENT, &[1]);
        let mut data = row("dup");
        data.insert("id".to_string(), Value::Integer(1));
        conn.execute_batch("CREATE UNIQUE INDEX legacy_id ON legacy(id);").unwrap();

        let result = insert_with_generated_key(&mut conn, "legacy", &data);
        assert!(matches!(result, Err(SchemaError::Database(_))));
    }

    #[test]
    fn test_exhaustion_surfaces_native_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE legacy (id INTEGER NOT NULL, name TEXT NOT NULL);")
            .unwrap();

        // Every strategy trips over the missing `name`.
        let result = insert_with_generated_key(&mut conn, "legacy", &RowData::new());

        match result {
            Err(SchemaError::Database(e)) => assert!(e.to_string().contains("NOT NULL")),
            other => panic!("unexpected result: {other:?}"),
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM legacy", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_max_key_overflow_surfaces_native_error() {
        // Gap-fill picks 1, which the check rejects; the maximum has no successor.
        let mut conn = legacy_conn(
            "CREATE TABLE legacy (id INTEGER NOT NULL CHECK (id > 1), name TEXT);",
            &[i64::MAX],
        );

        let result = insert_with_generated_key(&mut conn, "legacy", &row("late"));

        match result {
            Err(SchemaError::Database(e)) => assert!(e.to_string().contains("NOT NULL")),
            other => panic!("unexpected result: {other:?}"),
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM legacy", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_smallest_missing_and_max() {
        let conn = legacy_conn(NO_AUTOINCREMENT, &[2, 3, 7]);
        conn.execute("INSERT INTO legacy (id, name) VALUES ('x', 'text key')", [])
            .unwrap();

        assert_eq!(smallest_missing_pk(&conn, "legacy", "id").unwrap(), 1);
        // MAX over mixed affinities picks the text value, which is not numeric.
        assert_eq!(max_pk(&conn, "legacy", "id").unwrap(), None);

        let empty = legacy_conn(NO_AUTOINCREMENT, &[]);
        assert_eq!(smallest_missing_pk(&empty, "legacy", "id").unwrap(), 1);
        assert_eq!(max_pk(&empty, "legacy", "id").unwrap(), None);
    }

    #[test]
    fn test_numeric_key() {
        assert_eq!(numeric_key(&Value::Integer(5)), Some(5));
        assert_eq!(numeric_key(&Value::Real(5.9)), Some(5));
        assert_eq!(numeric_key(&Value::Text(" 12 ".to_string())), Some(12));
        assert_eq!(numeric_key(&Value::Text("abc".to_string())), None);
        assert_eq!(numeric_key(&Value::Null), None);
    }
}
