//! Analytics endpoint tests: aggregation payloads, the lookback window,
//! per-destination breakdowns, and the user overview.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use lariat::api::create_api_router;
use lariat::auth::AuthService;
use lariat::config::AuthMode;
use lariat::models::{NewClickEvent, ShortLink};
use lariat::storage::{SqliteStorage, Storage};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn test_router(storage: Arc<dyn Storage>) -> Router {
    let auth = Arc::new(AuthService::new(AuthMode::None, HashMap::new()));
    create_api_router(storage, auth, "http://sho.rt".to_string())
}

async fn get_json(app: &Router, uri: &str, user: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn click(link: &ShortLink, ip: &str, country: &str, device: &str, timestamp: i64) -> NewClickEvent {
    NewClickEvent {
        short_link_id: link.id,
        ip: ip.to_string(),
        country: country.to_string(),
        region: "Unknown".to_string(),
        city: "Unknown".to_string(),
        device: device.to_string(),
        browser: "test-agent".to_string(),
        timestamp,
    }
}

async fn seed_link(storage: &Arc<dyn Storage>, user: &str, alias: &str) -> ShortLink {
    let dest = storage
        .create_destination(user, alias, "", "https://example.com")
        .await
        .unwrap();
    storage
        .create_short_link(dest.id, alias, &format!("code-{}", alias), None, 0)
        .await
        .unwrap()
}

#[tokio::test]
async fn short_link_analytics_aggregates_recent_clicks() {
    let storage = create_test_storage().await;
    let link = seed_link(&storage, "alice", "docs").await;

    let now = Utc::now().timestamp();
    storage.record_click(&click(&link, "1.1.1.1", "US", "Desktop", now - 100)).await.unwrap();
    storage.record_click(&click(&link, "1.1.1.1", "US", "Mobile", now - 50)).await.unwrap();
    storage.record_click(&click(&link, "2.2.2.2", "DE", "Desktop", now - 10)).await.unwrap();

    let app = test_router(Arc::clone(&storage));
    let (status, body) = get_json(
        &app,
        &format!("/api/analytics/shortlinks/{}", link.id),
        "alice",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["short_link"]["alias"], "docs");
    assert_eq!(body["analytics"]["summary"]["total_clicks"], 3);
    assert_eq!(body["analytics"]["summary"]["unique_visitors"], 2);
    assert_eq!(body["raw_data"].as_array().unwrap().len(), 3);

    let countries = body["analytics"]["country_distribution"].as_array().unwrap();
    assert_eq!(countries[0]["value"], "US");
    assert_eq!(countries[0]["count"], 2);
    assert_eq!(countries[0]["percentage"], 66.7);

    let time_series = body["analytics"]["time_series"].as_array().unwrap();
    let total: u64 = time_series
        .iter()
        .map(|p| p["count"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn empty_window_produces_zero_totals_and_empty_distributions() {
    let storage = create_test_storage().await;
    let link = seed_link(&storage, "alice", "docs").await;

    let app = test_router(Arc::clone(&storage));
    let (status, body) = get_json(
        &app,
        &format!("/api/analytics/shortlinks/{}", link.id),
        "alice",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analytics"]["summary"]["total_clicks"], 0);
    assert_eq!(body["analytics"]["summary"]["unique_visitors"], 0);
    assert!(body["analytics"]["country_distribution"].as_array().unwrap().is_empty());
    assert!(body["analytics"]["time_series"].as_array().unwrap().is_empty());
    assert!(body["raw_data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn lookback_window_excludes_older_clicks() {
    let storage = create_test_storage().await;
    let link = seed_link(&storage, "alice", "docs").await;

    let now = Utc::now().timestamp();
    storage.record_click(&click(&link, "1.1.1.1", "US", "Desktop", now - 40 * 86_400)).await.unwrap();
    storage.record_click(&click(&link, "2.2.2.2", "US", "Desktop", now - 60)).await.unwrap();

    let app = test_router(Arc::clone(&storage));

    // Default window is 30 days: only the recent click shows up.
    let (_, body) = get_json(
        &app,
        &format!("/api/analytics/shortlinks/{}", link.id),
        "alice",
    )
    .await;
    assert_eq!(body["analytics"]["summary"]["total_clicks"], 1);

    // Widening the window brings the old click back.
    let (_, body) = get_json(
        &app,
        &format!("/api/analytics/shortlinks/{}?days=90", link.id),
        "alice",
    )
    .await;
    assert_eq!(body["analytics"]["summary"]["total_clicks"], 2);
}

#[tokio::test]
async fn destination_analytics_breaks_down_per_short_link() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com")
        .await
        .unwrap();
    let a = storage
        .create_short_link(dest.id, "docs", "code0001", None, 0)
        .await
        .unwrap();
    let b = storage
        .create_short_link(dest.id, "docs-1", "code0002", None, 0)
        .await
        .unwrap();

    let now = Utc::now().timestamp();
    storage.record_click(&click(&a, "1.1.1.1", "US", "Desktop", now - 30)).await.unwrap();
    storage.record_click(&click(&a, "2.2.2.2", "DE", "Mobile", now - 20)).await.unwrap();
    storage.record_click(&click(&b, "3.3.3.3", "US", "Tablet", now - 10)).await.unwrap();

    let app = test_router(Arc::clone(&storage));
    let (status, body) = get_json(
        &app,
        &format!("/api/analytics/destinations/{}", dest.id),
        "alice",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destination"]["label"], "Docs");
    assert_eq!(body["analytics"]["summary"]["total_clicks"], 3);

    let breakdown = body["short_links"].as_array().unwrap();
    assert_eq!(breakdown.len(), 2);
    let clicks_by_alias: HashMap<&str, u64> = breakdown
        .iter()
        .map(|l| (l["alias"].as_str().unwrap(), l["clicks"].as_u64().unwrap()))
        .collect();
    assert_eq!(clicks_by_alias["docs"], 2);
    assert_eq!(clicks_by_alias["docs-1"], 1);
}

#[tokio::test]
async fn overview_spans_all_of_the_users_links() {
    let storage = create_test_storage().await;

    let docs = seed_link(&storage, "alice", "docs").await;
    let promo = seed_link(&storage, "alice", "promo").await;
    // Another user's traffic must not leak into alice's overview.
    let foreign = seed_link(&storage, "bob", "intruder").await;

    let now = Utc::now().timestamp();
    storage.record_click(&click(&docs, "1.1.1.1", "US", "Desktop", now - 30)).await.unwrap();
    storage.record_click(&click(&promo, "2.2.2.2", "DE", "Mobile", now - 20)).await.unwrap();
    storage.record_click(&click(&foreign, "9.9.9.9", "FR", "Desktop", now - 10)).await.unwrap();

    let app = test_router(Arc::clone(&storage));
    let (status, body) = get_json(&app, "/api/analytics/overview", "alice").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_destinations"], 2);
    assert_eq!(body["total_short_links"], 2);
    assert_eq!(body["total_clicks"], 2);
    assert_eq!(body["analytics"]["summary"]["unique_visitors"], 2);

    let countries = body["analytics"]["country_distribution"].as_array().unwrap();
    assert!(countries.iter().all(|c| c["value"] != "FR"));
}

#[tokio::test]
async fn analytics_for_foreign_records_are_not_found() {
    let storage = create_test_storage().await;
    let link = seed_link(&storage, "alice", "docs").await;

    let app = test_router(Arc::clone(&storage));

    let (status, _) = get_json(
        &app,
        &format!("/api/analytics/shortlinks/{}", link.id),
        "bob",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(
        &app,
        &format!("/api/analytics/destinations/{}", link.destination_id),
        "bob",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
