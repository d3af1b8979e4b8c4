//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use plotline_market::MarketEngine;
use plotline_nullables::{NullClock, NullLedgerStore};
use plotline_rpc::router;
use plotline_types::MarketParams;

type Engine = MarketEngine<NullLedgerStore, NullClock>;

fn engine() -> Arc<Engine> {
    Arc::new(
        MarketEngine::new(NullLedgerStore::new(), NullClock::new(0), MarketParams::default())
            .unwrap(),
    )
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn open_chapter(app: &Router) {
    let (status, body) = call(
        app,
        "POST",
        "/chapters",
        Some(json!({
            "chapter_id": 1,
            "deadline": 100,
            "outcomes": [
                { "id": 11, "label": "she stays" },
                { "id": 12, "label": "she leaves" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["pools"].as_array().unwrap().len(), 2);
}

async fn bet(app: &Router, user: &str, outcome: u64, amount: &str, tx: &str) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        "/bets",
        Some(json!({
            "user": user,
            "outcome_id": outcome,
            "amount": amount,
            "token": "usdc",
            "tx_ref": tx,
        })),
    )
    .await
}

#[tokio::test]
async fn health_and_metrics() {
    let app = router(engine());
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&text).contains("plotline_bets_placed_total"));
}

#[tokio::test]
async fn full_cycle_over_http() {
    let engine = engine();
    let app = router(Arc::clone(&engine));
    open_chapter(&app).await;

    let (status, receipt) = bet(&app, "alice", 11, "100", "0x1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["net_amount"], "98.000000");
    assert_eq!(receipt["fee"], "2.000000");
    bet(&app, "bob", 12, "50", "0x2").await;

    let (_, odds) = call(&app, "GET", "/chapters/1/odds", None).await;
    let first = &odds["outcomes"][0]["tokens"][0];
    assert_eq!(first["token"], "usdc");
    assert_eq!(first["implied_odds"], "1.5000");
    assert_eq!(odds["outcomes"][0]["tokens"][1]["implied_odds"], "unbounded");

    let (_, active) = call(&app, "GET", "/pools/active", None).await;
    assert_eq!(active["pools"].as_array().unwrap().len(), 2);
    assert_eq!(active["pools"][0]["closes_in"], "1m 40s");

    engine.clock().set(101);
    let (status, closed) = call(&app, "POST", "/chapters/1/close", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["pools_closed"], 2);

    let (status, summary) = call(
        &app,
        "POST",
        "/chapters/1/resolve",
        Some(json!({ "winning_outcome": 11 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["has_winners"], true);
    assert_eq!(summary["pot"]["usdc"], "147.000000");
    assert_eq!(summary["distributed"]["usdc"], "124.950000");
    let pool_id = summary["winning_pool"].as_u64().unwrap();

    let (status, claim) = call(
        &app,
        "POST",
        "/claims",
        Some(json!({ "user": "alice", "pool_id": pool_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claim["claimed"]["usdc"], "124.950000");

    let (status, again) = call(
        &app,
        "POST",
        "/claims",
        Some(json!({ "user": "alice", "pool_id": pool_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(again["kind"], "not_found");

    let (_, audit) = call(&app, "GET", "/chapters/1/audit", None).await;
    assert_eq!(audit["balanced"], true);
    assert_eq!(audit["settled"], true);

    let (status, reset) = call(&app, "POST", "/chapters/1/reset-streaks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["users_reset"], 0);

    let (_, stats) = call(&app, "GET", "/users/alice/stats", None).await;
    assert_eq!(stats["bets_won"], 1);
    assert_eq!(stats["total_won"]["usdc"], "124.950000");

    let (_, pool) = call(&app, "GET", &format!("/pools/{pool_id}"), None).await;
    assert_eq!(pool["bets"][0]["status"], "claimed");
}

#[tokio::test]
async fn errors_carry_kind_and_status() {
    let engine = engine();
    let app = router(Arc::clone(&engine));

    let (status, body) = call(&app, "GET", "/chapters/9/odds", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    open_chapter(&app).await;
    let (status, body) = bet(&app, "alice", 11, "-1", "0x1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    bet(&app, "alice", 11, "1", "0x1").await;
    let (status, body) = bet(&app, "bob", 12, "1", "0x1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "state");

    let (status, body) = call(&app, "GET", "/leaderboard?order=loudest", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = call(&app, "GET", "/users/alice/bets?cursor=zzz", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn malformed_requests_are_validation_errors() {
    let app = router(engine());
    open_chapter(&app).await;

    let (status, body) = call(
        &app,
        "POST",
        "/bets",
        Some(json!({
            "user": "alice",
            "outcome_id": 11,
            "amount": "1",
            "token": "dai",
            "tx_ref": "0x1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert!(body["error"].as_str().unwrap().starts_with("invalid request"));

    let (status, body) = call(&app, "POST", "/claims", Some(json!({ "user": "alice" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = call(&app, "GET", "/chapters/abc/odds", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = call(&app, "GET", "/leaderboard?token=dai", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = call(&app, "GET", "/users/alice/bets?count=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let request = Request::builder()
        .method("POST")
        .uri("/bets")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_history_pages_newest_first() {
    let app = router(engine());
    open_chapter(&app).await;
    for n in 0..5 {
        bet(&app, "alice", 11, "1", &format!("0x{n}")).await;
    }

    let (_, page) = call(&app, "GET", "/users/alice/bets?count=2", None).await;
    let bets = page["bets"].as_array().unwrap();
    assert_eq!(bets.len(), 2);
    assert_eq!(bets[0]["tx_ref"], "0x4");
    let cursor = page["cursor"].as_str().unwrap().to_string();

    let (_, next) = call(
        &app,
        "GET",
        &format!("/users/alice/bets?count=2&cursor={cursor}"),
        None,
    )
    .await;
    assert_eq!(next["bets"][0]["tx_ref"], "0x2");

    let (status, board) = call(&app, "GET", "/leaderboard?order=win_rate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(board["entries"].as_array().unwrap().is_empty());
}
