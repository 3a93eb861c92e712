//! End-to-end tests for the meterd HTTP surface

mod common;

use axum::http::{Method, StatusCode};
use common::{ADMIN, ADVISOR, CLIENT, TestApp, body_json, decimal};
use meter_config::BillingPolicy;
use meter_core::CoreEvent;
use meter_store::{SqliteStore, Store};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::sync::Arc;

async fn fund(app: &TestApp, amount: &str) {
    let response = app
        .post(
            "/wallets/client-1/credit",
            CLIENT,
            Some(json!({ "amount": amount, "description": "card top-up" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

async fn start(app: &TestApp, rate: &str) -> Value {
    let response = app
        .post(
            "/sessions",
            CLIENT,
            Some(json!({
                "clientId": "client-1",
                "advisorId": "advisor-1",
                "type": "video",
                "ratePerMinute": rate,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();
    let response = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storeHealthy"], true);
    assert_eq!(json["activeSessions"], 0);
}

#[tokio::test]
async fn missing_actor_is_unauthorized() {
    let app = TestApp::new();
    let response = app.send(Method::GET, "/wallets/client-1", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

    let response = app
        .send(Method::GET, "/wallets/client-1", Some(("client-1", "wizard")), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_session_requires_minimum_balance() {
    let app = TestApp::new();
    fund(&app, "0.50").await;

    let response = app
        .post(
            "/sessions",
            CLIENT,
            Some(json!({
                "clientId": "client-1",
                "advisorId": "advisor-1",
                "type": "chat",
                "ratePerMinute": 1.0,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body_json(response).await["code"], "INSUFFICIENT_BALANCE");
}

#[tokio::test]
async fn only_the_client_starts_their_session() {
    let app = TestApp::new();
    fund(&app, "10").await;

    let response = app
        .post(
            "/sessions",
            ADVISOR,
            Some(json!({
                "clientId": "client-1",
                "advisorId": "advisor-1",
                "type": "chat",
                "ratePerMinute": "1",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn five_dollar_session_end_to_end() {
    let app = TestApp::new();
    fund(&app, "5.00").await;
    let session = start(&app, "1.00").await;
    let id = session["id"].as_str().unwrap().to_string();
    let tick_uri = format!("/sessions/{}/tick", id);

    // Clients cannot drive billing
    let response = app.post(&tick_uri, CLIENT, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut charged = 0;
    let mut exhausted = None;
    for _ in 0..6 {
        let json = body_json(app.post(&tick_uri, ADMIN, None).await).await;
        if json.get("charged").is_some() {
            charged += 1;
        } else if json["shouldPause"] == true {
            exhausted = Some(json);
        }
    }
    assert_eq!(charged, 5);
    let exhausted = exhausted.unwrap();
    assert_eq!(decimal(&exhausted["balance"]), dec!(0));
    assert_eq!(exhausted["warning"], "zero-balance");
    assert_eq!(exhausted["status"], "completed");

    let json = body_json(app.get(&format!("/sessions/{}", id), CLIENT).await).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(decimal(&json["totalCharged"]), dec!(5));
    assert_eq!(decimal(&json["advisorEarning"]), dec!(4.5));
    assert_eq!(json["totalDurationSeconds"], 300);

    let warnings = body_json(app.get(&format!("/sessions/{}/warnings", id), ADVISOR).await).await;
    let kinds: Vec<&str> = warnings
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["2-minute", "1-minute", "zero-balance"]);

    assert!(app
        .events
        .drain()
        .iter()
        .any(|e| matches!(e, CoreEvent::ForceLeave { .. })));
}

#[tokio::test]
async fn tick_reports_each_warning_once() {
    let policy = BillingPolicy {
        tick_interval: std::time::Duration::from_secs(1),
        ..BillingPolicy::default()
    };
    let app = TestApp::with_policy(policy);
    fund(&app, "2").await;
    let session = start(&app, "1").await;
    let tick_uri = format!("/sessions/{}/tick", session["id"].as_str().unwrap());

    let mut surfaced = Vec::new();
    for _ in 0..10 {
        let json = body_json(app.post(&tick_uri, ADMIN, None).await).await;
        assert!(json.get("charged").is_some());
        if let Some(kind) = json.get("warning") {
            surfaced.push(kind.as_str().unwrap().to_string());
        }
    }
    assert_eq!(surfaced, vec!["2-minute"]);
}

#[tokio::test]
async fn end_is_idempotent_over_http() {
    let app = TestApp::new();
    fund(&app, "10").await;
    let session = start(&app, "2").await;
    let id = session["id"].as_str().unwrap();

    app.post(&format!("/sessions/{}/tick", id), ADMIN, None).await;

    let end_uri = format!("/sessions/{}/end", id);
    let first = body_json(app.post(&end_uri, CLIENT, None).await).await;
    assert_eq!(decimal(&first["earning"]["amount"]), dec!(1.8));
    assert_eq!(first["earning"]["status"], "pending");

    let second = body_json(app.post(&end_uri, ADVISOR, Some(json!({}))).await).await;
    assert_eq!(first["earning"]["id"], second["earning"]["id"]);

    let response = app.post(&format!("/sessions/{}/pause", id), CLIENT, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn strangers_cannot_touch_a_session() {
    let app = TestApp::new();
    fund(&app, "10").await;
    let session = start(&app, "1").await;
    let id = session["id"].as_str().unwrap();

    let stranger = ("someone", "client");
    let response = app.get(&format!("/sessions/{}", id), stranger).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.post(&format!("/sessions/{}/cancel", id), stranger, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/wallets/client-1", stranger).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cancel_keeps_charges() {
    let app = TestApp::new();
    fund(&app, "10").await;
    let session = start(&app, "1").await;
    let id = session["id"].as_str().unwrap();

    app.post(&format!("/sessions/{}/tick", id), ADMIN, None).await;
    let response = app
        .post(
            &format!("/sessions/{}/cancel", id),
            ADVISOR,
            Some(json!({ "reason": "connection lost" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");

    let wallet = body_json(app.get("/wallets/client-1", CLIENT).await).await;
    assert_eq!(decimal(&wallet["balance"]), dec!(9));
    assert_eq!(wallet["currency"], "USD");
}

#[tokio::test]
async fn rating_flow() {
    let app = TestApp::new();
    fund(&app, "10").await;
    let session = start(&app, "1").await;
    let id = session["id"].as_str().unwrap();
    let rate_uri = format!("/sessions/{}/rating", id);

    let response = app.post(&rate_uri, CLIENT, Some(json!({ "stars": 5 }))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.post(&format!("/sessions/{}/end", id), CLIENT, None).await;

    let response = app.post(&rate_uri, CLIENT, Some(json!({ "stars": 6 }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_RATING");

    let response = app.post(&rate_uri, ADVISOR, Some(json!({ "stars": 5 }))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post(&rate_uri, CLIENT, Some(json!({ "stars": 4, "feedback": "helpful" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let rating = body_json(app.get("/advisors/advisor-1/rating", CLIENT).await).await;
    assert_eq!(rating["count"], 1);
    assert_eq!(decimal(&rating["average"]), dec!(4));
}

#[tokio::test]
async fn admin_wallet_operations() {
    let app = TestApp::new();
    fund(&app, "3").await;

    let response = app
        .post("/wallets/client-1/debit", CLIENT, Some(json!({ "amount": "1" })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post("/wallets/client-1/debit", ADMIN, Some(json!({ "amount": "5" })))
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let response = app
        .post("/wallets/client-1/debit", ADMIN, Some(json!({ "amount": "2" })))
        .await;
    assert_eq!(decimal(&body_json(response).await["balance"]), dec!(1));

    let response = app
        .post(
            "/wallets/client-1/refund",
            ADMIN,
            Some(json!({ "amount": "0.5", "reason": "dropped call" })),
        )
        .await;
    assert_eq!(decimal(&body_json(response).await["balance"]), dec!(1.5));

    let response = app
        .post("/wallets/client-1/credit", CLIENT, Some(json!({ "amount": "-1" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_AMOUNT");

    let history = body_json(app.get("/wallets/client-1/transactions?limit=2", CLIENT).await).await;
    let kinds: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["refund", "deduct"]);
}

#[tokio::test]
async fn advisor_earnings_and_payout() {
    let app = TestApp::new();
    fund(&app, "10").await;
    let session = start(&app, "1").await;
    let id = session["id"].as_str().unwrap();
    app.post(&format!("/sessions/{}/tick", id), ADMIN, None).await;
    app.post(&format!("/sessions/{}/tick", id), ADMIN, None).await;
    let settled = body_json(app.post(&format!("/sessions/{}/end", id), ADVISOR, None).await).await;
    let earning_id = settled["earning"]["id"].clone();

    let response = app.get("/advisors/advisor-1/earnings", CLIENT).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(app.get("/advisors/advisor-1/earnings", ADVISOR).await).await;
    assert_eq!(decimal(&json["summary"]["totalPending"]), dec!(1.8));
    assert_eq!(json["summary"]["totalSessions"], 1);
    assert_eq!(json["earnings"].as_array().unwrap().len(), 1);

    let response = app
        .post(
            "/advisors/advisor-1/earnings/withdraw",
            ADVISOR,
            Some(json!({ "earningIds": [earning_id.clone()] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(
        app.post(
            "/advisors/advisor-1/earnings/withdraw",
            ADMIN,
            Some(json!({ "earningIds": [earning_id] })),
        )
        .await,
    )
    .await;
    assert_eq!(decimal(&json["amount"]), dec!(1.8));
    assert_eq!(decimal(&json["newBalance"]), dec!(1.8));

    let json = body_json(app.get("/advisors/advisor-1/earnings?status=withdrawn", ADVISOR).await).await;
    assert_eq!(json["earnings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn audit_log_is_admin_only() {
    let app = TestApp::new();
    fund(&app, "10").await;

    let response = app.get("/audit", CLIENT).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let events = body_json(app.get("/audit?limit=5", ADMIN).await).await;
    let events = events.as_array().unwrap();
    assert!(events.len() <= 5);
    assert_eq!(events[0]["event"]["type"], "funds_credited");
}

#[tokio::test]
async fn listing_follows_role() {
    let app = TestApp::new();
    fund(&app, "10").await;
    let session = start(&app, "1").await;

    let mine = body_json(app.get("/sessions", CLIENT).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let theirs = body_json(app.get("/sessions?status=active", ADVISOR).await).await;
    assert_eq!(theirs[0]["id"], session["id"]);

    let other = body_json(app.get("/sessions", ("advisor-2", "advisor")).await).await;
    assert!(other.as_array().unwrap().is_empty());

    let active = body_json(app.get("/sessions", ADMIN).await).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("meterd.db");

    let session_id = {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
        let app = TestApp::with_store(store, BillingPolicy::default());
        fund(&app, "10").await;
        let session = start(&app, "1").await;
        let id = session["id"].as_str().unwrap().to_string();
        app.post(&format!("/sessions/{}/tick", id), ADMIN, None).await;
        id
    };

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
    let app = TestApp::with_store(store, BillingPolicy::default());

    let wallet = body_json(app.get("/wallets/client-1", CLIENT).await).await;
    assert_eq!(decimal(&wallet["balance"]), dec!(9));

    let session = body_json(app.get(&format!("/sessions/{}", session_id), CLIENT).await).await;
    assert_eq!(session["status"], "active");
    assert_eq!(decimal(&session["totalCharged"]), dec!(1));

    // Billing picks up where it left off
    let tick = body_json(app.post(&format!("/sessions/{}/tick", session_id), ADMIN, None).await).await;
    assert_eq!(decimal(&tick["newBalance"]), dec!(8));
}
