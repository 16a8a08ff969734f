//! SQLite connection setup and the cinema schema.
//!
//! Every store opens its own connection to the same database file. The
//! tables below are created if missing; existing tables are left as they are
//! (legacy databases may carry extra or fewer columns, which the schema
//! helpers look up at runtime).

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS film (
    film_id INTEGER PRIMARY KEY AUTOINCREMENT,
    judul TEXT NOT NULL,
    durasi INTEGER
);

CREATE TABLE IF NOT EXISTS studio (
    studio_id INTEGER PRIMARY KEY AUTOINCREMENT,
    nama_studio TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kursi (
    kursi_id INTEGER PRIMARY KEY AUTOINCREMENT,
    studio_id INTEGER NOT NULL REFERENCES studio(studio_id),
    kode_kursi TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jadwal (
    jadwal_id INTEGER PRIMARY KEY AUTOINCREMENT,
    film_id INTEGER NOT NULL REFERENCES film(film_id),
    studio_id INTEGER NOT NULL REFERENCES studio(studio_id),
    tanggal TEXT NOT NULL,
    jam_mulai TEXT NOT NULL,
    harga REAL
);

CREATE TABLE IF NOT EXISTS tiket (
    tiket_id INTEGER PRIMARY KEY AUTOINCREMENT,
    jadwal_id INTEGER REFERENCES jadwal(jadwal_id),
    kursi_id INTEGER REFERENCES kursi(kursi_id),
    status TEXT NOT NULL DEFAULT 'tersedia'
);

CREATE TABLE IF NOT EXISTS customer (
    customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
    nama TEXT,
    email TEXT,
    username TEXT UNIQUE,
    password TEXT,
    role TEXT,
    api_token TEXT,
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS transaksi (
    transaksi_id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id INTEGER NOT NULL,
    kasir_id INTEGER,
    tanggal_transaksi TEXT,
    total_harga REAL,
    status TEXT NOT NULL DEFAULT 'pending',
    payment_method TEXT,
    payment_destination TEXT,
    payment_account_name TEXT,
    paid_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS detail_transaksi (
    detail_id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaksi_id INTEGER NOT NULL REFERENCES transaksi(transaksi_id) ON DELETE CASCADE,
    tiket_id INTEGER REFERENCES tiket(tiket_id),
    harga REAL
);

CREATE INDEX IF NOT EXISTS idx_jadwal_slot ON jadwal(studio_id, tanggal, jam_mulai);
CREATE INDEX IF NOT EXISTS idx_transaksi_customer ON transaksi(customer_id);
CREATE INDEX IF NOT EXISTS idx_transaksi_status ON transaksi(status);
CREATE INDEX IF NOT EXISTS idx_detail_transaksi ON detail_transaksi(transaksi_id);
"#;

/// Open a database file and make sure the schema exists.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    prepare(&conn)?;
    Ok(conn)
}

/// Open a private in-memory database with the schema (useful for testing).
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(SCHEMA)
}
