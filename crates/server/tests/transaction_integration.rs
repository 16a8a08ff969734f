//! Transaction API tests against an in-process server.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{TestConfig, TestFixture};

async fn create(fixture: &TestFixture, body: Value) -> i64 {
    let response = fixture.post("/api/v1/transactions", body).await;
    assert_status!(response, StatusCode::CREATED);
    response.body["transaksi_id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_defaults_to_pending() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transactions",
            json!({ "customer_id": 7, "kasir_id": 2, "total_harga": 90000, "payment_method": "qris" }),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["customer_id"], 7);
    assert_eq!(response.body["kasir_id"], 2);
    assert_eq!(response.body["payment_method"], "qris");
    assert_eq!(response.body["paid_at"], Value::Null);
    assert_eq!(response.body["detail"], json!([]));

    let events = fixture.wait_for_audit("transaction_created", 1).await;
    assert_eq!(events[0]["transaction_id"], response.body["transaksi_id"]);
    assert_eq!(events[0]["user_id"], "anonymous");
}

#[tokio::test]
async fn test_create_normalizes_status_synonyms() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transactions",
            json!({ "customer_id": 1, "status": "  Selesai " }),
        )
        .await;
    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["status"], "sukses");

    let response = fixture
        .post(
            "/api/v1/transactions",
            json!({ "customer_id": 1, "status": "canceled" }),
        )
        .await;
    assert_eq!(response.body["status"], "batal");
}

#[tokio::test]
async fn test_create_validation_errors() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/transactions", json!({ "total_harga": 1000 }))
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("customer_id"));

    let response = fixture
        .post(
            "/api/v1/transactions",
            json!({ "customer_id": 1, "status": "refunded" }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture
        .post(
            "/api/v1/transactions",
            json!({ "customer_id": 1, "payment_destination": "x".repeat(121) }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture
        .post(
            "/api/v1/transactions",
            json!({ "customer_id": "seven" }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture
        .post_raw("/api/v1/transactions", "{\"customer_id\": 1,")
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let list = fixture.get("/api/v1/transactions?flat=1").await;
    assert_eq!(list.body["data"], json!([]));
}

#[tokio::test]
async fn test_get_missing_transaction_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/transactions/999").await;

    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn test_get_includes_details_and_customer() {
    let fixture = TestFixture::new().await;
    fixture
        .db()
        .execute(
            "INSERT INTO customer (customer_id, nama) VALUES (5, 'Sari')",
            [],
        )
        .unwrap();
    let id = create(&fixture, json!({ "customer_id": 5 })).await;
    let tickets = fixture.attach_sold_tickets(id, 2);

    let response = fixture.get(&format!("/api/v1/transactions/{}", id)).await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["nama_customer"], "Sari");
    let detail = response.body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 2);
    assert_eq!(detail[0]["tiket_id"], tickets[0]);
    assert_eq!(detail[0]["tiket"]["status"], "terjual");
}

#[tokio::test]
async fn test_list_paginates_newest_first() {
    let fixture = TestFixture::new().await;
    for day in 1..=7 {
        create(
            &fixture,
            json!({ "customer_id": 1, "tanggal_transaksi": format!("2024-03-0{}T12:00:00Z", day) }),
        )
        .await;
    }

    let response = fixture.get("/api/v1/transactions?per_page=5").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["meta"],
        json!({ "current_page": 1, "per_page": 5, "total": 7, "last_page": 2 })
    );
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 5);
    assert!(data[0]["tanggal_transaksi"]
        .as_str()
        .unwrap()
        .starts_with("2024-03-07"));

    let response = fixture.get("/api/v1/transactions?per_page=5&page=2").await;
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data[1]["tanggal_transaksi"]
        .as_str()
        .unwrap()
        .starts_with("2024-03-01"));
}

#[tokio::test]
async fn test_list_flat_and_clamped_page_size() {
    let fixture = TestFixture::new().await;
    for _ in 0..6 {
        create(&fixture, json!({ "customer_id": 1 })).await;
    }

    let response = fixture.get("/api/v1/transactions?flat=true").await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 6);
    assert!(response.body.get("meta").is_none());

    let response = fixture.get("/api/v1/transactions?per_page=1").await;
    assert_eq!(response.body["meta"]["per_page"], 5);
    assert_eq!(response.body["meta"]["last_page"], 2);

    let response = fixture.get("/api/v1/transactions").await;
    assert_eq!(response.body["meta"]["per_page"], 15);
}

#[tokio::test]
async fn test_list_filters() {
    let fixture = TestFixture::new().await;
    create(&fixture, json!({ "customer_id": 1, "status": "sukses" })).await;
    create(&fixture, json!({ "customer_id": 1 })).await;
    create(&fixture, json!({ "customer_id": 2 })).await;
    create(&fixture, json!({ "customer_id": 2, "status": "batal" })).await;

    let response = fixture
        .get("/api/v1/transactions?flat=1&status=Success")
        .await;
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["status"], "sukses");

    let response = fixture
        .get("/api/v1/transactions?flat=1&only_pending=1")
        .await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 2);

    let response = fixture
        .get("/api/v1/transactions?flat=1&customer_id=2")
        .await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 2);

    let response = fixture
        .get("/api/v1/transactions?flat=1&customer_id=2&only_pending=true")
        .await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 1);

    let response = fixture.get("/api/v1/transactions?flat=1&status=foo").await;
    assert_eq!(response.body["data"], json!([]));
}

#[tokio::test]
async fn test_update_distinguishes_absent_from_null() {
    let fixture = TestFixture::new().await;
    let id = create(
        &fixture,
        json!({ "customer_id": 1, "kasir_id": 4, "payment_method": "cash", "total_harga": 50000 }),
    )
    .await;

    let response = fixture
        .patch(
            &format!("/api/v1/transactions/{}", id),
            json!({ "kasir_id": null, "total_harga": 75000 }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["kasir_id"], Value::Null);
    assert_eq!(response.body["total_harga"], 75000.0);
    assert_eq!(response.body["payment_method"], "cash");

    let events = fixture.wait_for_audit("transaction_updated", 1).await;
    assert_eq!(
        events[0]["data"]["fields"],
        json!(["kasir_id", "total_harga"])
    );
}

#[tokio::test]
async fn test_update_status_has_no_side_effects() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;
    let tickets = fixture.attach_sold_tickets(id, 2);

    let response = fixture
        .put(
            &format!("/api/v1/transactions/{}", id),
            json!({ "status": "cancel" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "batal");
    for ticket in tickets {
        assert_eq!(fixture.ticket_status(ticket), "terjual");
    }

    let response = fixture
        .put(
            &format!("/api/v1/transactions/{}", id),
            json!({ "status": null }),
        )
        .await;
    assert_eq!(response.body["status"], "batal");
}

#[tokio::test]
async fn test_update_missing_transaction_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .put("/api/v1/transactions/41", json!({ "total_harga": 1 }))
        .await;

    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_keeps_tickets() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;
    let tickets = fixture.attach_sold_tickets(id, 2);

    let response = fixture.delete(&format!("/api/v1/transactions/{}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body, json!({ "deleted": true }));

    let response = fixture.get(&format!("/api/v1/transactions/{}", id)).await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let details: i64 = fixture
        .db()
        .query_row(
            "SELECT COUNT(*) FROM detail_transaksi WHERE transaksi_id = ?1",
            [id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(details, 0);
    for ticket in tickets {
        assert_eq!(fixture.ticket_status(ticket), "terjual");
    }

    let response = fixture.delete(&format!("/api/v1/transactions/{}", id)).await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_sukses_uses_client_time_in_client_zone() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({
                "status": "sukses",
                "client_time": "2024-01-15T10:00:00",
                "client_tz": "Asia/Jakarta"
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "sukses");
    assert_eq!(response.body["paid_at"], "2024-01-15T17:00:00+07:00");
    assert_eq!(
        response.body["tanggal_transaksi"],
        "2024-01-15T17:00:00+07:00"
    );

    let events = fixture
        .wait_for_audit("transaction_status_changed", 1)
        .await;
    assert_eq!(events[0]["data"]["from_status"], "pending");
    assert_eq!(events[0]["data"]["to_status"], "sukses");
    assert_eq!(
        events[0]["data"]["effective_at"],
        "2024-01-15T17:00:00+07:00"
    );
}

#[tokio::test]
async fn test_status_naive_time_is_read_in_server_zone() {
    let fixture = TestFixture::with_config(TestConfig {
        timezone: "Asia/Jakarta".to_string(),
        ..TestConfig::default()
    })
    .await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "success", "client_time": "2024-01-15 10:00:00" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["paid_at"], "2024-01-15T10:00:00+07:00");
}

#[tokio::test]
async fn test_status_reads_client_clock_from_headers() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;

    let response = fixture
        .post_with_headers(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "selesai" }),
            &[
                ("X-Client-Time", "2024-06-01T08:15:00Z"),
                ("X-Client-Tz", "Asia/Makassar"),
            ],
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["paid_at"], "2024-06-01T16:15:00+08:00");
}

#[tokio::test]
async fn test_status_body_wins_over_headers_and_bad_input_falls_back() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;

    let response = fixture
        .post_with_headers(
            &format!("/api/v1/transactions/{}/status", id),
            json!({
                "status": "sukses",
                "client_time": "2024-06-01T08:15:00Z",
                "client_tz": "Not/AZone"
            }),
            &[("X-Client-Time", "2020-01-01T00:00:00Z")],
        )
        .await;

    assert_status!(response, StatusCode::OK);
    // Invalid zone ignored: the instant keeps the offset it was parsed with.
    assert_eq!(response.body["paid_at"], "2024-06-01T08:15:00+00:00");

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "sukses", "client_time": "tomorrow at noon" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    let paid_at = response.body["paid_at"].as_str().unwrap();
    assert!(!paid_at.starts_with("2024-06-01"));
}

#[tokio::test]
async fn test_status_batal_releases_every_ticket() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;
    let tickets = fixture.attach_sold_tickets(id, 3);
    fixture
        .db()
        .execute(
            "UPDATE tiket SET status = 'dipesan' WHERE tiket_id = ?1",
            [tickets[1]],
        )
        .unwrap();

    fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "sukses" }),
        )
        .await;
    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "cancel" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "batal");
    assert_eq!(response.body["paid_at"], Value::Null);
    for ticket in &tickets {
        assert_eq!(fixture.ticket_status(*ticket), "tersedia");
    }
    for detail in response.body["detail"].as_array().unwrap() {
        assert_eq!(detail["tiket"]["status"], "tersedia");
    }

    let events = fixture.wait_for_audit("tickets_released", 1).await;
    assert_eq!(events[0]["data"]["ticket_ids"], json!(tickets));
}

#[tokio::test]
async fn test_status_batal_without_details_is_fine() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "batal" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "batal");
}

#[tokio::test]
async fn test_status_pending_clears_paid_at() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "sukses" }),
        )
        .await;
    assert!(response.body["paid_at"].is_string());

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "PENDING" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "pending");
    assert_eq!(response.body["paid_at"], Value::Null);
}

#[tokio::test]
async fn test_status_rejects_unknown_value_without_mutation() {
    let fixture = TestFixture::new().await;
    let id = create(&fixture, json!({ "customer_id": 1 })).await;
    let tickets = fixture.attach_sold_tickets(id, 1);

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "foo" }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture
        .post(&format!("/api/v1/transactions/{}/status", id), json!({}))
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture
        .post(
            &format!("/api/v1/transactions/{}/status", id),
            json!({ "status": "batal", "client_tz": "z".repeat(61) }),
        )
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture.get(&format!("/api/v1/transactions/{}", id)).await;
    assert_eq!(response.body["status"], "pending");
    assert_eq!(fixture.ticket_status(tickets[0]), "terjual");
}

#[tokio::test]
async fn test_status_unknown_id_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/transactions/77/status", json!({ "status": "batal" }))
        .await;

    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_key_auth_guards_transactions() {
    let fixture = TestFixture::with_config(TestConfig {
        api_key: Some("till-secret".to_string()),
        ..TestConfig::default()
    })
    .await;

    let response = fixture.get("/api/v1/transactions").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = fixture
        .request(
            "POST",
            "/api/v1/transactions",
            Some(json!({ "customer_id": 3 })),
            &[("X-API-Key", "till-secret")],
        )
        .await;
    assert_status!(response, StatusCode::CREATED);

    let (status, _) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
}
