//! SQLite-backed transaction store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use tracing::{debug, info};

use super::clock::parse_client_time;
use super::status::canonical_status;
use super::{
    CreateTransactionRequest, StatusChange, StatusTransition, TicketSummary, Transaction,
    TransactionChanges, TransactionDetail, TransactionError, TransactionFilter, TransactionStatus,
    TransactionStore, TICKET_AVAILABLE,
};
use crate::db;
use crate::metrics::{STATUS_TRANSITIONS, TICKETS_RELEASED};

const SELECT_TRANSACTION: &str = "SELECT t.transaksi_id, t.customer_id, c.nama, t.kasir_id, \
     t.tanggal_transaksi, t.total_harga, t.status, t.payment_method, t.payment_destination, \
     t.payment_account_name, t.paid_at, t.created_at, t.updated_at \
     FROM transaksi t LEFT JOIN customer c ON c.customer_id = t.customer_id";

const SELECT_DETAILS: &str = "SELECT d.detail_id, d.tiket_id, d.harga, \
     tk.tiket_id, tk.status, k.kode_kursi, j.jadwal_id, j.tanggal, j.jam_mulai, \
     f.judul, s.nama_studio \
     FROM detail_transaksi d \
     LEFT JOIN tiket tk ON tk.tiket_id = d.tiket_id \
     LEFT JOIN kursi k ON k.kursi_id = tk.kursi_id \
     LEFT JOIN jadwal j ON j.jadwal_id = tk.jadwal_id \
     LEFT JOIN film f ON f.film_id = j.film_id \
     LEFT JOIN studio s ON s.studio_id = j.studio_id \
     WHERE d.transaksi_id = ? ORDER BY d.detail_id";

/// SQLite-backed transaction store.
pub struct SqliteTransactionStore {
    conn: Mutex<Connection>,
    /// Zone for stored timestamps that carry no offset.
    tz: Tz,
}

impl SqliteTransactionStore {
    /// Open the database file, creating it and the cinema tables if needed.
    pub fn new(path: &Path) -> Result<Self, TransactionError> {
        let conn = db::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            tz: chrono_tz::UTC,
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, TransactionError> {
        let conn = db::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            tz: chrono_tz::UTC,
        })
    }

    /// Read offset-less stored timestamps as wall time in `tz` (default UTC).
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TransactionError> {
        self.conn
            .lock()
            .map_err(|_| TransactionError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &TransactionFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("{} = ?", status_expr("t.status")));
            params.push(Box::new(status.clone()));
        }

        if filter.only_pending {
            conditions.push(format!("{} = ?", status_expr("t.status")));
            params.push(Box::new(TransactionStatus::Pending.as_str()));
        }

        if let Some(customer_id) = filter.customer_id {
            conditions.push("t.customer_id = ?".to_string());
            params.push(Box::new(customer_id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_transaction(row: &rusqlite::Row, tz: Tz) -> rusqlite::Result<Transaction> {
        let status: Option<String> = row.get(6)?;
        let created_at: Option<String> = row.get(11)?;
        let updated_at: Option<String> = row.get(12)?;

        Ok(Transaction {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            customer_name: row.get(2)?,
            cashier_id: row.get(3)?,
            transaction_date: row
                .get::<_, Option<String>>(4)?
                .as_deref()
                .and_then(|raw| parse_stored(raw, tz)),
            total_price: row.get(5)?,
            // Legacy rows may carry a synonym; anything unreadable counts as pending.
            status: canonical_status(status.as_deref()).unwrap_or_default(),
            payment_method: row.get(7)?,
            payment_destination: row.get(8)?,
            payment_account_name: row.get(9)?,
            paid_at: row
                .get::<_, Option<String>>(10)?
                .as_deref()
                .and_then(|raw| parse_stored(raw, tz)),
            created_at: stored_utc(created_at.as_deref(), tz),
            updated_at: stored_utc(updated_at.as_deref(), tz),
            details: Vec::new(),
        })
    }

    fn row_to_detail(row: &rusqlite::Row) -> rusqlite::Result<TransactionDetail> {
        let ticket = match row.get::<_, Option<i64>>(3)? {
            Some(id) => Some(TicketSummary {
                id,
                status: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                seat_code: row.get(5)?,
                schedule_id: row.get(6)?,
                show_date: row.get(7)?,
                start_time: row.get(8)?,
                film_title: row.get(9)?,
                studio_name: row.get(10)?,
            }),
            None => None,
        };

        Ok(TransactionDetail {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            price: row.get(2)?,
            ticket,
        })
    }

    fn load_details(conn: &Connection, id: i64) -> rusqlite::Result<Vec<TransactionDetail>> {
        let mut stmt = conn.prepare(SELECT_DETAILS)?;
        let rows = stmt.query_map(params![id], Self::row_to_detail)?;
        rows.collect()
    }

    fn load(conn: &Connection, id: i64, tz: Tz) -> Result<Option<Transaction>, TransactionError> {
        let sql = format!("{SELECT_TRANSACTION} WHERE t.transaksi_id = ?");
        let Some(mut transaction) = conn
            .query_row(&sql, params![id], |row| Self::row_to_transaction(row, tz))
            .optional()?
        else {
            return Ok(None);
        };

        transaction.details = Self::load_details(conn, id)?;
        Ok(Some(transaction))
    }

    fn load_existing(conn: &Connection, id: i64, tz: Tz) -> Result<Transaction, TransactionError> {
        Self::load(conn, id, tz)?.ok_or(TransactionError::NotFound(id))
    }
}

/// SQL expression reading a status column the way [`canonical_status`] does:
/// synonyms collapse to their canonical value, anything else is `pending`.
fn status_expr(column: &str) -> String {
    let value = format!("lower(trim({column}, char(9, 10, 13, 32)))");
    let mut sql = String::from("CASE");
    for status in [TransactionStatus::Sukses, TransactionStatus::Batal] {
        let spellings = status
            .spellings()
            .iter()
            .map(|s| format!("'{s}'"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" WHEN {value} IN ({spellings}) THEN '{status}'"));
    }
    sql.push_str(&format!(" ELSE '{}' END", TransactionStatus::Pending));
    sql
}

/// Read a stored date column. Values written by this store are RFC 3339;
/// older rows may use plain `YYYY-MM-DD HH:MM:SS`, read as wall time in `tz`.
fn parse_stored(raw: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    parse_client_time(raw, tz)
}

fn stored_utc(raw: Option<&str>, tz: Tz) -> DateTime<Utc> {
    raw.and_then(|raw| parse_stored(raw, tz))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn format_time(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

impl TransactionStore for SqliteTransactionStore {
    fn create(&self, request: CreateTransactionRequest) -> Result<Transaction, TransactionError> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO transaksi (customer_id, kasir_id, tanggal_transaksi, total_harga, status, payment_method, payment_destination, payment_account_name, paid_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                request.customer_id,
                request.cashier_id,
                request.transaction_date.as_ref().map(format_time),
                request.total_price,
                request.status.as_str(),
                request.payment_method,
                request.payment_destination,
                request.payment_account_name,
                request.paid_at.as_ref().map(format_time),
                now,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(transaction_id = id, status = %request.status, "Created transaction");
        Self::load_existing(&conn, id, self.tz)
    }

    fn get(&self, id: i64) -> Result<Option<Transaction>, TransactionError> {
        let conn = self.lock()?;
        Self::load(&conn, id, self.tz)
    }

    fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, TransactionError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let mut all_params = params;

        let mut sql = format!(
            "{SELECT_TRANSACTION} {where_clause} ORDER BY julianday(t.tanggal_transaksi) DESC, t.transaksi_id DESC"
        );
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            all_params.push(Box::new(limit));
            all_params.push(Box::new(filter.offset));
        }

        let param_refs: Vec<&dyn ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let tz = self.tz;
        let rows = stmt.query_map(param_refs.as_slice(), |row| Self::row_to_transaction(row, tz))?;

        let mut transactions = Vec::new();
        for row_result in rows {
            let mut transaction = row_result?;
            transaction.details = Self::load_details(&conn, transaction.id)?;
            transactions.push(transaction);
        }

        Ok(transactions)
    }

    fn count(&self, filter: &TransactionFilter) -> Result<i64, TransactionError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM transaksi t {}", where_clause);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn count_by_status(&self) -> Result<Vec<(TransactionStatus, i64)>, TransactionError> {
        let conn = self.lock()?;

        let mut counts = Vec::with_capacity(TransactionStatus::ALL.len());
        for status in TransactionStatus::ALL {
            let count: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM transaksi t WHERE {} = ?",
                    status_expr("t.status")
                ),
                params![status.as_str()],
                |row| row.get(0),
            )?;
            counts.push((status, count));
        }

        Ok(counts)
    }

    fn update(&self, id: i64, changes: TransactionChanges) -> Result<Transaction, TransactionError> {
        let conn = self.lock()?;
        let current = Self::load_existing(&conn, id, self.tz)?;

        if changes.is_empty() {
            return Ok(current);
        }

        let mut assignments = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(customer_id) = changes.customer_id {
            assignments.push("customer_id = ?");
            values.push(Box::new(customer_id));
        }
        if let Some(cashier_id) = changes.cashier_id {
            assignments.push("kasir_id = ?");
            values.push(Box::new(cashier_id));
        }
        if let Some(date) = changes.transaction_date {
            assignments.push("tanggal_transaksi = ?");
            values.push(Box::new(date.as_ref().map(format_time)));
        }
        if let Some(total) = changes.total_price {
            assignments.push("total_harga = ?");
            values.push(Box::new(total));
        }
        if let Some(status) = changes.status {
            assignments.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(method) = changes.payment_method {
            assignments.push("payment_method = ?");
            values.push(Box::new(method));
        }
        if let Some(destination) = changes.payment_destination {
            assignments.push("payment_destination = ?");
            values.push(Box::new(destination));
        }
        if let Some(account_name) = changes.payment_account_name {
            assignments.push("payment_account_name = ?");
            values.push(Box::new(account_name));
        }
        if let Some(paid_at) = changes.paid_at {
            assignments.push("paid_at = ?");
            values.push(Box::new(paid_at.as_ref().map(format_time)));
        }

        assignments.push("updated_at = ?");
        values.push(Box::new(Utc::now().to_rfc3339()));
        values.push(Box::new(id));

        let sql = format!(
            "UPDATE transaksi SET {} WHERE transaksi_id = ?",
            assignments.join(", ")
        );
        let param_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, param_refs.as_slice())?;

        debug!(transaction_id = id, "Updated transaction");
        Self::load_existing(&conn, id, self.tz)
    }

    fn delete(&self, id: i64) -> Result<Transaction, TransactionError> {
        let mut conn = self.lock()?;
        let transaction = Self::load_existing(&conn, id, self.tz)?;

        // Legacy tables may lack the cascading foreign key.
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM detail_transaksi WHERE transaksi_id = ?",
            params![id],
        )?;
        tx.execute("DELETE FROM transaksi WHERE transaksi_id = ?", params![id])?;
        tx.commit()?;

        debug!(transaction_id = id, "Deleted transaction");
        Ok(transaction)
    }

    fn set_status(&self, id: i64, change: StatusChange) -> Result<StatusTransition, TransactionError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = Self::load_existing(&tx, id, self.tz)?;
        let now = Utc::now().to_rfc3339();

        match change.status {
            TransactionStatus::Sukses => {
                let effective = format_time(&change.effective_at);
                tx.execute(
                    "UPDATE transaksi SET status = ?, paid_at = ?, tanggal_transaksi = ?, updated_at = ? WHERE transaksi_id = ?",
                    params![change.status.as_str(), effective, effective, now, id],
                )?;
            }
            TransactionStatus::Pending | TransactionStatus::Batal => {
                tx.execute(
                    "UPDATE transaksi SET status = ?, paid_at = NULL, updated_at = ? WHERE transaksi_id = ?",
                    params![change.status.as_str(), now, id],
                )?;
            }
        }

        let mut released_tickets = Vec::new();
        if change.status == TransactionStatus::Batal {
            let mut ticket_ids = current.ticket_ids();
            ticket_ids.sort_unstable();
            ticket_ids.dedup();

            for ticket_id in ticket_ids {
                let updated = tx.execute(
                    "UPDATE tiket SET status = ? WHERE tiket_id = ?",
                    params![TICKET_AVAILABLE, ticket_id],
                )?;
                if updated > 0 {
                    released_tickets.push(ticket_id);
                }
            }
        }

        let transaction = Self::load_existing(&tx, id, self.tz)?;
        tx.commit()?;

        STATUS_TRANSITIONS
            .with_label_values(&[current.status.as_str(), change.status.as_str()])
            .inc();
        TICKETS_RELEASED.inc_by(released_tickets.len() as u64);

        info!(
            transaction_id = id,
            from = %current.status,
            to = %change.status,
            released = released_tickets.len(),
            "Transaction status changed"
        );

        Ok(StatusTransition {
            previous_status: current.status,
            transaction,
            released_tickets,
            effective_at: change.effective_at,
        })
    }
}
