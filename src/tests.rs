//! Integration tests for the wealth tracker backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
        };

        let state = AppState {
            repo,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create an asset and return its id.
    async fn create_asset(&self, user_id: &str, name: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/assets"))
            .json(&json!({ "userId": user_id, "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Create a snapshot and return the response body.
    async fn create_snapshot(&self, user_id: &str, date: i64, entries: Vec<(&str, f64)>) -> Value {
        let entries: Vec<Value> = entries
            .iter()
            .map(|(asset_id, value)| json!({ "assetId": asset_id, "value": value }))
            .collect();
        let resp = self
            .client
            .post(self.url("/api/snapshots"))
            .json(&json!({ "userId": user_id, "date": date, "entries": entries }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    /// Fetch one page of snapshot history.
    async fn history_page(&self, user_id: &str, cursor: Option<&str>, page_size: u32) -> Value {
        let mut url = format!(
            "{}?userId={}&pageSize={}",
            self.url("/api/history"),
            user_id,
            page_size
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={}", cursor));
        }
        let resp = self.client.get(url).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    /// Fetch per-date totals.
    async fn totals(&self, user_id: &str) -> Value {
        let resp = self
            .client
            .get(format!(
                "{}?userId={}",
                self.url("/api/analytics/totals"),
                user_id
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let client = Client::new();
    let resp = client
        .get(format!("{}?userId=u1", fixture.url("/api/assets")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    // Request with wrong API key
    let client = Client::new();
    let resp = client
        .get(format!("{}?userId=u1", fixture.url("/api/assets")))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_disabled_without_psk() {
    let fixture = TestFixture::with_psk(None).await;

    let resp = fixture
        .client
        .get(format!("{}?userId=u1", fixture.url("/api/assets")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_user_upsert() {
    let fixture = TestFixture::new().await;

    // First sign-in creates the user
    let resp = fixture
        .client
        .post(fixture.url("/api/users"))
        .json(&json!({
            "externalId": "discord-123",
            "name": "Alice",
            "email": "alice@example.com",
            "image": "https://example.com/a.png"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let user_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["name"], "Alice");

    // Second sign-in with changed profile patches the same row
    let resp = fixture
        .client
        .post(fixture.url("/api/users"))
        .json(&json!({
            "externalId": "discord-123",
            "name": "Alice Smith",
            "email": "alice@example.com",
            "image": "https://example.com/a.png"
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], user_id.as_str());
    assert_eq!(body["data"]["name"], "Alice Smith");

    // Lookup by external id
    let resp = fixture
        .client
        .get(fixture.url("/api/users/discord-123"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], user_id.as_str());

    // Unknown external id
    let resp = fixture
        .client
        .get(fixture.url("/api/users/nobody"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_asset_crud() {
    let fixture = TestFixture::new().await;

    let asset_id = fixture.create_asset("u1", "Stocks USD").await;

    // List assets for the owner
    let resp = fixture
        .client
        .get(format!("{}?userId=u1", fixture.url("/api/assets")))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let assets = body["data"].as_array().unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0]["name"], "Stocks USD");

    // Another user's listing does not see it
    let resp = fixture
        .client
        .get(format!("{}?userId=u2", fixture.url("/api/assets")))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    // Update name and description
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/assets/{}", asset_id)))
        .json(&json!({ "name": "Stocks EUR", "description": "ETF portfolio" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Stocks EUR");
    assert_eq!(body["data"]["description"], "ETF portfolio");

    // Unknown asset id
    let resp = fixture
        .client
        .put(fixture.url("/api/assets/no-such-id"))
        .json(&json!({ "name": "X" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_asset_empty_name_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/assets"))
        .json(&json!({ "userId": "u1", "name": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    let bonds = fixture.create_asset("u1", "Bonds").await;

    let body = fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 1000.0), (&bonds, 250.5)])
        .await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["date"], 1700000000000i64);

    let page = fixture.history_page("u1", None, 10).await;
    let items = page["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(page["data"]["isExhausted"], true);

    let records = items[0]["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    // Insertion order is preserved for display
    assert_eq!(records[0]["assetId"], cash.as_str());
    assert_eq!(records[0]["assetName"], "Cash");
    assert_eq!(records[0]["value"].as_f64().unwrap(), 1000.0);
    assert_eq!(records[1]["assetId"], bonds.as_str());
    assert_eq!(records[1]["value"].as_f64().unwrap(), 250.5);
}

#[tokio::test]
async fn test_snapshot_unknown_asset_is_atomic() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/snapshots"))
        .json(&json!({
            "userId": "u1",
            "date": 1700000000000i64,
            "entries": [
                { "assetId": cash, "value": 1000.0 },
                { "assetId": "no-such-asset", "value": 5.0 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Nothing from the failed batch is visible
    let page = fixture.history_page("u1", None, 10).await;
    assert!(page["data"]["items"].as_array().unwrap().is_empty());
    let totals = fixture.totals("u1").await;
    assert!(totals["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_rejects_other_users_asset() {
    let fixture = TestFixture::new().await;

    let foreign = fixture.create_asset("u2", "Cash").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/snapshots"))
        .json(&json!({
            "userId": "u1",
            "date": 1700000000000i64,
            "entries": [{ "assetId": foreign, "value": 1.0 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_snapshot_empty_entries_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/snapshots"))
        .json(&json!({ "userId": "u1", "date": 1700000000000i64, "entries": [] }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_totals_merge_on_equal_date() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    let bonds = fixture.create_asset("u1", "Bonds").await;

    // Two snapshots sharing an identical date merge by addition
    fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 60.0), (&bonds, 40.0)])
        .await;
    fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 50.0)])
        .await;
    // An earlier date stays its own bucket
    fixture
        .create_snapshot("u1", 1600000000000, vec![(&cash, 10.0)])
        .await;

    let totals = fixture.totals("u1").await;
    let data = totals["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    // Ascending by date
    assert_eq!(data[0]["date"], 1600000000000i64);
    assert_eq!(data[0]["total"].as_f64().unwrap(), 10.0);
    assert_eq!(data[1]["date"], 1700000000000i64);
    assert_eq!(data[1]["total"].as_f64().unwrap(), 150.0);
}

#[tokio::test]
async fn test_last_known_values() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    let crypto = fixture.create_asset("u1", "Crypto").await;

    fixture
        .create_snapshot("u1", 1600000000000, vec![(&cash, 100.0), (&crypto, 7.0)])
        .await;
    fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 120.0)])
        .await;

    let resp = fixture
        .client
        .get(format!(
            "{}?userId=u1",
            fixture.url("/api/analytics/last-values")
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    // Cash comes from the later snapshot
    assert_eq!(body["data"][&cash]["value"].as_f64().unwrap(), 120.0);
    assert_eq!(body["data"][&cash]["date"], 1700000000000i64);
    // Crypto's last sighting is the earlier snapshot
    assert_eq!(body["data"][&crypto]["value"].as_f64().unwrap(), 7.0);
    assert_eq!(body["data"][&crypto]["date"], 1600000000000i64);

    // An asset with no history is absent, not zero
    let bare = fixture.create_asset("u1", "Bare").await;
    let resp = fixture
        .client
        .get(format!(
            "{}?userId=u1",
            fixture.url("/api/analytics/last-values")
        ))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].get(&bare).is_none());
}

#[tokio::test]
async fn test_delete_records_hides_snapshot() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    let body = fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 1000.0)])
        .await;
    let record_ids: Vec<String> = body["data"]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();

    let resp = fixture
        .client
        .delete(fixture.url("/api/records"))
        .json(&json!({ "recordIds": record_ids }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The emptied snapshot is invisible to both reads, never an error
    let page = fixture.history_page("u1", None, 10).await;
    assert!(page["data"]["items"].as_array().unwrap().is_empty());
    let totals = fixture.totals("u1").await;
    assert!(totals["data"].as_array().unwrap().is_empty());

    // Deleting unknown ids is a silent no-op
    let resp = fixture
        .client
        .delete(fixture.url("/api/records"))
        .json(&json!({ "recordIds": ["no-such-record"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_rename_preserves_historical_name() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 1000.0)])
        .await;

    // Rename the asset after the snapshot was taken
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/assets/{}", cash)))
        .json(&json!({ "name": "Gold" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // History keeps the name as written
    let page = fixture.history_page("u1", None, 10).await;
    let records = page["data"]["items"][0]["records"].as_array().unwrap();
    assert_eq!(records[0]["assetName"], "Cash");

    // A new snapshot captures the new name
    fixture
        .create_snapshot("u1", 1800000000000, vec![(&cash, 900.0)])
        .await;
    let page = fixture.history_page("u1", None, 10).await;
    assert_eq!(page["data"]["items"][0]["records"][0]["assetName"], "Gold");
}

#[tokio::test]
async fn test_update_record_values() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    let bonds = fixture.create_asset("u1", "Bonds").await;
    let body = fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 100.0), (&bonds, 50.0)])
        .await;
    let cash_record = body["data"]["records"][0]["id"].as_str().unwrap();

    let resp = fixture
        .client
        .put(fixture.url("/api/records"))
        .json(&json!({ "edits": [{ "id": cash_record, "value": 200.0 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Target changed, sibling untouched
    let page = fixture.history_page("u1", None, 10).await;
    let records = page["data"]["items"][0]["records"].as_array().unwrap();
    assert_eq!(records[0]["value"].as_f64().unwrap(), 200.0);
    assert_eq!(records[1]["value"].as_f64().unwrap(), 50.0);
}

#[tokio::test]
async fn test_update_record_values_unknown_id_is_atomic() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    let body = fixture
        .create_snapshot("u1", 1700000000000, vec![(&cash, 100.0)])
        .await;
    let cash_record = body["data"]["records"][0]["id"].as_str().unwrap();

    // One valid edit plus one unknown id fails the whole batch
    let resp = fixture
        .client
        .put(fixture.url("/api/records"))
        .json(&json!({ "edits": [
            { "id": cash_record, "value": 999.0 },
            { "id": "no-such-record", "value": 1.0 }
        ]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // The valid edit was rolled back with the batch
    let page = fixture.history_page("u1", None, 10).await;
    let records = page["data"]["items"][0]["records"].as_array().unwrap();
    assert_eq!(records[0]["value"].as_f64().unwrap(), 100.0);
}

#[tokio::test]
async fn test_pagination_walks_without_duplicates() {
    let fixture = TestFixture::new().await;

    let cash = fixture.create_asset("u1", "Cash").await;
    for i in 0..7i64 {
        fixture
            .create_snapshot("u1", 1700000000000 + i * 86_400_000, vec![(&cash, 1.0)])
            .await;
    }

    let mut seen_dates: Vec<i64> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;

    loop {
        let page = fixture.history_page("u1", cursor.as_deref(), 3).await;
        let items = page["data"]["items"].as_array().unwrap().clone();
        for item in &items {
            seen_dates.push(item["date"].as_i64().unwrap());
        }
        pages += 1;

        if page["data"]["isExhausted"].as_bool().unwrap() {
            assert!(page["data"].get("nextCursor").is_none());
            break;
        }
        cursor = Some(page["data"]["nextCursor"].as_str().unwrap().to_string());
    }

    assert_eq!(pages, 3);
    assert_eq!(seen_dates.len(), 7);
    // Descending by date, no duplicates
    for pair in seen_dates.windows(2) {
        assert!(pair[0] > pair[1]);
    }
}

#[tokio::test]
async fn test_invalid_cursor_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(format!(
            "{}?userId=u1&cursor=garbage",
            fixture.url("/api/history")
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_revision_advances_on_mutation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/revision"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let before = body["data"]["revisionId"].as_i64().unwrap();

    fixture.create_asset("u1", "Cash").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/revision"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let after = body["data"]["revisionId"].as_i64().unwrap();
    assert!(after > before);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let fixture = TestFixture::new().await;

    let a1 = fixture.create_asset("u1", "Cash").await;
    let a2 = fixture.create_asset("u2", "Cash").await;

    fixture
        .create_snapshot("u1", 1700000000000, vec![(&a1, 100.0)])
        .await;
    fixture
        .create_snapshot("u2", 1700000000000, vec![(&a2, 999.0)])
        .await;

    let totals = fixture.totals("u1").await;
    let data = totals["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["total"].as_f64().unwrap(), 100.0);

    let page = fixture.history_page("u2", None, 10).await;
    let items = page["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["records"][0]["value"].as_f64().unwrap(), 999.0);
}
