//! Connection-owning wrapper over the schema helpers.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::{
    canonical_schedule, ensure_admin_user, pick_auth_table, register_account, AdminRepair,
    CanonicalSchedule, NewAccount, RegisteredAccount, SchemaError,
};
use crate::db;

/// Shared access to accounts and screenings.
pub struct SchemaStore {
    conn: Mutex<Connection>,
    hash_cost: u32,
}

impl SchemaStore {
    pub fn new(path: &Path) -> Result<Self, SchemaError> {
        Ok(Self::from_connection(db::open(path)?))
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, SchemaError> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt cost used for new passwords.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SchemaError> {
        self.conn.lock().map_err(|_| SchemaError::LockPoisoned)
    }

    pub fn auth_table(&self) -> Result<Option<&'static str>, SchemaError> {
        let conn = self.lock()?;
        Ok(pick_auth_table(&conn))
    }

    pub fn register_account(
        &self,
        account: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<RegisteredAccount, SchemaError> {
        let mut conn = self.lock()?;
        register_account(&mut conn, account, self.hash_cost, now)
    }

    /// Run the admin repair on the auth table. `None` when there is no auth table.
    pub fn ensure_admin(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<(&'static str, AdminRepair)>, SchemaError> {
        let conn = self.lock()?;
        let Some(table) = pick_auth_table(&conn) else {
            return Ok(None);
        };
        let outcome = ensure_admin_user(&conn, table, now)?;
        Ok(Some((table, outcome)))
    }

    pub fn canonical_schedule(&self, id: i64) -> Result<Option<CanonicalSchedule>, SchemaError> {
        let conn = self.lock()?;
        canonical_schedule(&conn, id)
    }
}
