//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use coin_ledger::api::{build_router, AppState};
use coin_ledger::cache::MemoryCache;
use coin_ledger::handlers::{PurchaseHandler, TransferHandler};
use coin_ledger::identity::{AuthService, TokenIssuer};
use coin_ledger::projection::SummaryService;
use coin_ledger::store::InMemoryLedgerStore;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Application wired to the in-memory ledger and cache
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryLedgerStore>,
    pub shutdown: CancellationToken,
}

pub async fn memory_app() -> TestApp {
    let store = Arc::new(InMemoryLedgerStore::new());
    store.seed_catalog().await.expect("Failed to seed catalog");

    let cache = Arc::new(MemoryCache::new());
    let shutdown = CancellationToken::new();

    let state = AppState {
        transfers: Arc::new(TransferHandler::new(store.clone(), cache.clone())),
        purchases: Arc::new(PurchaseHandler::new(store.clone(), cache.clone())),
        summaries: Arc::new(SummaryService::new(store.clone(), cache)),
        auth: Arc::new(AuthService::new(
            store.clone(),
            TokenIssuer::new(TEST_SECRET, Duration::from_secs(3600)),
        )),
        shutdown: shutdown.clone(),
    };

    TestApp {
        router: build_router(state),
        store,
        shutdown,
    }
}

/// Build a JSON request, optionally authenticated
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request, returning the status and the JSON body (`Null` if empty)
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    (status, json)
}

/// Log in through the API and return the bearer token
pub async fn login(router: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        router,
        request(
            "POST",
            "/api/auth",
            None,
            Some(serde_json::json!({ "username": username, "password": password })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);

    body["token"].as_str().unwrap().to_string()
}

/// Setup test database - apply the schema and truncate ledger tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    pool.execute(include_str!("../../migrations/0001_init.sql"))
        .await
        .expect("Failed to apply schema");

    sqlx::query("TRUNCATE TABLE operations, inventory, users RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
