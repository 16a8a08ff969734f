//! In-process test fixture.
//!
//! Builds the real router over a temporary SQLite file so tests can drive
//! the HTTP surface with `oneshot` and seed or inspect rows directly.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use bioskop_core::config::{AppConfig, AuthConfig, DatabaseConfig, ServerConfig};
use bioskop_core::transaction::TICKET_SOLD;
use bioskop_core::{
    create_audit_system, create_authenticator, AuditStore, AuthMethod, Authenticator, Config,
    SchemaStore, SqliteAuditStore, SqliteTransactionStore, TransactionStore,
};
use bioskop_server::{create_router, AppState};

/// Test fixture wrapping an in-process server.
pub struct TestFixture {
    pub router: Router,
    pub db_path: PathBuf,
    /// Keeps the database file alive for the fixture's lifetime.
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Knobs for the fixture's config.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub timezone: String,
    pub api_key: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            api_key: None,
        }
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("bioskop.db");

        let auth = match test_config.api_key {
            Some(key) => AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(key),
            },
            None => AuthConfig {
                method: AuthMethod::None,
                api_key: None,
            },
        };
        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0,
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            app: AppConfig {
                timezone: test_config.timezone,
                bootstrap_admin: false,
                // bcrypt's minimum; keeps registration fast.
                password_hash_cost: 4,
            },
        };

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );
        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );
        let transactions: Arc<dyn TransactionStore> = Arc::new(
            SqliteTransactionStore::new(&db_path)
                .expect("Failed to create transaction store")
                .with_timezone(config.app.tz()),
        );
        let schema = Arc::new(
            SchemaStore::new(&db_path)
                .expect("Failed to create schema store")
                .with_hash_cost(config.app.password_hash_cost),
        );

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            audit_handle,
            audit_store,
            transactions,
            schema,
        ));

        Self {
            router: create_router(state),
            db_path,
            temp_dir,
        }
    }

    /// Open a side connection to the fixture's database.
    pub fn db(&self) -> rusqlite::Connection {
        let conn =
            rusqlite::Connection::open(&self.db_path).expect("Failed to open test database");
        conn.busy_timeout(Duration::from_secs(5)).unwrap();
        conn
    }

    /// Insert `count` tickets (status `terjual`) and attach them to the
    /// transaction as detail rows. Returns the ticket ids.
    pub fn attach_sold_tickets(&self, transaction_id: i64, count: usize) -> Vec<i64> {
        let conn = self.db();
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            conn.execute("INSERT INTO tiket (status) VALUES (?1)", [TICKET_SOLD])
                .unwrap();
            let ticket_id = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO detail_transaksi (transaksi_id, tiket_id, harga) VALUES (?1, ?2, 45000)",
                [transaction_id, ticket_id],
            )
            .unwrap();
            ids.push(ticket_id);
        }
        ids
    }

    pub fn ticket_status(&self, ticket_id: i64) -> String {
        self.db()
            .query_row(
                "SELECT status FROM tiket WHERE tiket_id = ?1",
                [ticket_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    /// Poll the audit endpoint until `count` events of `event_type` exist.
    pub async fn wait_for_audit(&self, event_type: &str, count: usize) -> Vec<Value> {
        for _ in 0..100 {
            let response = self
                .get(&format!("/api/v1/audit?event_type={}", event_type))
                .await;
            let events = response.body["events"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for {} {} audit events", count, event_type);
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body), &[]).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    /// POST with extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request("POST", path, Some(body), headers).await
    }

    /// POST a raw body (for malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// GET returning the raw text body (for `/metrics`).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = match body {
            Some(json_body) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&json_body).unwrap())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Assert a response status, printing the body on failure.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
