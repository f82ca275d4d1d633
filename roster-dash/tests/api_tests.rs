//! Integration tests for roster-dash API endpoints
//!
//! Routers are built over in-memory sources and an in-memory override store,
//! and driven with `oneshot`.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use roster_common::model::SnapshotRow;
use roster_common::store::MemoryStore;
use roster_common::{credential, Error, IdentityKey, Result, RosterContext, SourceMode};
use roster_dash::sources::{LiveFeed, SnapshotSource};
use roster_dash::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Live feed serving fixed events; `None` simulates an outage
struct StubFeed {
    events: Option<Vec<Value>>,
    me: Option<IdentityKey>,
    calls: AtomicUsize,
}

impl StubFeed {
    fn up(events: Vec<Value>) -> Self {
        Self {
            events: Some(events),
            me: Some(IdentityKey::new("1750")),
            calls: AtomicUsize::new(0),
        }
    }

    fn down() -> Self {
        Self {
            events: None,
            me: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LiveFeed for StubFeed {
    async fn fetch_events(&self) -> Result<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events
            .clone()
            .ok_or_else(|| Error::source_unavailable("live", "connection refused"))
    }

    async fn fetch_profile(&self) -> Result<Option<IdentityKey>> {
        match &self.events {
            Some(_) => Ok(self.me.clone()),
            None => Err(Error::source_unavailable("live", "connection refused")),
        }
    }
}

struct StubSnapshot {
    rows: Option<Vec<SnapshotRow>>,
}

#[async_trait]
impl SnapshotSource for StubSnapshot {
    async fn load(&self) -> Result<Vec<SnapshotRow>> {
        self.rows
            .clone()
            .ok_or_else(|| Error::source_unavailable("snapshot", "missing file"))
    }
}

fn live_events() -> Vec<Value> {
    vec![
        json!({
            "contact": { "telegram_id": 1750, "name": "Ada" },
            "payload": { "startup_name": "Acme", "house": "[Venture House]", "progress": 0.4, "group_id": 2 }
        }),
        json!({
            "contact": { "telegram_id": 2001, "name": "grace" },
            "payload": { "startup_name": "Compile Co", "house": "Karma", "progress": 80 }
        }),
        json!({
            "contact": { "telegram_id": 3003, "name": "Linus" },
            "payload": { "startup_name": "Kernel Labs", "house": "venture", "progress": "90%" }
        }),
    ]
}

fn snapshot_rows() -> Vec<SnapshotRow> {
    vec![[("telegram_id", "4004"), ("name", "Barbara"), ("house", "builders")]
        .into_iter()
        .collect()]
}

/// Test helper: app over the given sources
fn setup_app(ctx: RosterContext, feed: Arc<StubFeed>, snapshot: Option<Vec<SnapshotRow>>) -> axum::Router {
    let state = AppState::new(
        ctx,
        Box::new(MemoryStore::new()),
        feed,
        Arc::new(StubSnapshot { rows: snapshot }),
    );
    build_router(state)
}

fn live_app() -> axum::Router {
    setup_app(
        RosterContext::default(),
        Arc::new(StubFeed::up(live_events())),
        Some(snapshot_rows()),
    )
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

fn identities(body: &Value) -> Vec<String> {
    body["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entity| entity["identity"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = send(&live_app(), test_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "roster-dash");
    assert!(body["version"].is_string());
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_entities_from_live_feed() {
    let (status, body) = send(&live_app(), test_request("GET", "/api/entities")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "live");
    assert_eq!(body["me"], "1750");
    assert_eq!(body["total"], 3);
    assert_eq!(identities(&body), vec!["1750", "2001", "3003"]);

    let ada = &body["entities"][0];
    assert_eq!(ada["house"], "venture");
    assert_eq!(ada["progress_percent"], 40);
    assert!(ada.get("login_code").is_none(), "login codes must not be listed");
}

#[tokio::test]
async fn test_list_entities_filter_and_sort() {
    let app = live_app();

    let (_, body) = send(&app, test_request("GET", "/api/entities?house=venture&sort=progress")).await;
    assert_eq!(identities(&body), vec!["3003", "1750"]);

    let (_, body) = send(&app, test_request("GET", "/api/entities?house=all&sort=name")).await;
    assert_eq!(identities(&body), vec!["1750", "2001", "3003"]);
}

#[tokio::test]
async fn test_list_entities_rejects_unknown_filter() {
    let (status, body) = send(&live_app(), test_request("GET", "/api/entities?house=mystery")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_live_outage_falls_back_to_snapshot() {
    let app = setup_app(
        RosterContext::default(),
        Arc::new(StubFeed::down()),
        Some(snapshot_rows()),
    );
    let (status, body) = send(&app, test_request("GET", "/api/entities")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "snapshot");
    assert!(body["me"].is_null());
    assert_eq!(identities(&body), vec!["4004"]);
    assert_eq!(body["entities"][0]["house"], "builder");
}

#[tokio::test]
async fn test_both_sources_down_is_unavailable() {
    let app = setup_app(RosterContext::default(), Arc::new(StubFeed::down()), None);
    let (status, body) = send(&app, test_request("GET", "/api/entities")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "unavailable");
}

#[tokio::test]
async fn test_demo_mode_never_contacts_live_feed() {
    let feed = Arc::new(StubFeed::up(live_events()));
    let app = setup_app(
        RosterContext::new(SourceMode::Demo),
        feed.clone(),
        Some(snapshot_rows()),
    );
    let (status, body) = send(&app, test_request("GET", "/api/entities")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "snapshot");
    assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Circles
// =============================================================================

#[tokio::test]
async fn test_circles() {
    let (status, body) = send(&live_app(), test_request("GET", "/api/circles")).await;

    assert_eq!(status, StatusCode::OK);
    let circles = body["circles"].as_array().unwrap();
    assert_eq!(circles.len(), 2);
    assert_eq!(circles[0]["group_id"], "1");
    assert_eq!(circles[0]["members"].as_array().unwrap().len(), 2);
    assert_eq!(circles[1]["group_id"], "2");
    assert_eq!(circles[1]["members"][0]["identity"], "1750");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_auth_with_derived_code() {
    let code = credential::derive(&IdentityKey::new("1750"));
    let (status, body) = send(&live_app(), json_request("POST", "/api/auth", json!({ "code": code }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], true);
    assert_eq!(body["entity"]["identity"], "1750");
    assert_eq!(body["entity"]["display_name"], "Ada");
}

#[tokio::test]
async fn test_auth_short_code_is_invalid() {
    let (status, body) = send(&live_app(), json_request("POST", "/api/auth", json!({ "code": "abcdef" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_code");
}

#[tokio::test]
async fn test_auth_unknown_code_is_not_an_error() {
    let (status, body) = send(
        &live_app(),
        json_request("POST", "/api/auth", json!({ "code": "definitely-not-a-code" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], false);
    assert!(body.get("entity").is_none());
}

// =============================================================================
// Overrides
// =============================================================================

#[tokio::test]
async fn test_auth_without_code_field_is_bad_request() {
    let (status, body) = send(
        &live_app(),
        json_request("POST", "/api/auth", json!({ "token": "bG9naW46MTc1MA==" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_override_roundtrip() {
    let app = live_app();

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            "/api/entities/1750/override",
            json!({ "stealth": true, "house": null, "bio": "Engines" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"], "1750");
    assert_eq!(body["stealth"], true);
    assert!(body["house"].is_null());
    assert_eq!(body["display_name"], "Ada");

    let (_, body) = send(&app, test_request("GET", "/api/entities")).await;
    assert_eq!(body["entities"][0]["stealth"], true);
    assert_eq!(body["entities"][0]["bio"], "Engines");

    let (status, body) = send(&app, test_request("DELETE", "/api/entities/1750/override")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], true);

    let (_, body) = send(&app, test_request("GET", "/api/entities")).await;
    assert_eq!(body["entities"][0]["stealth"], false);
    assert_eq!(body["entities"][0]["house"], "venture");

    let (_, body) = send(&app, test_request("DELETE", "/api/entities/1750/override")).await;
    assert_eq!(body["cleared"], false);
}

#[tokio::test]
async fn test_override_for_unknown_identity_is_preserved() {
    let app = live_app();

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            "/api/entities/9999/override",
            json!({ "display_name": "Alumna", "house": "side" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, test_request("GET", "/api/entities")).await;
    assert_eq!(identities(&body), vec!["1750", "2001", "3003", "9999"]);
    assert_eq!(body["entities"][3]["house"], "side");
}

#[tokio::test]
async fn test_override_rejects_out_of_range_progress() {
    let (status, body) = send(
        &live_app(),
        json_request("PUT", "/api/entities/1750/override", json!({ "progress_percent": 150 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_override_with_unknown_house_label_is_bad_request() {
    let (status, body) = send(
        &live_app(),
        json_request("PUT", "/api/entities/1750/override", json!({ "house": "Venture House" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
    assert!(body["error"]["message"].as_str().unwrap().contains("Invalid request"));
}

#[tokio::test]
async fn test_override_saved_while_sources_down() {
    let app = setup_app(RosterContext::default(), Arc::new(StubFeed::down()), None);

    let (status, body) = send(
        &app,
        json_request("PUT", "/api/entities/1750/override", json!({ "display_name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Ada");
}
