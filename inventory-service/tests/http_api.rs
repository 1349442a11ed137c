use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use inventory_service::api::{create_router, AppState};
use inventory_service::auth::{Authenticator, Claims, HOLDER_HEADER};
use inventory_service::clock::ManualClock;
use inventory_service::rate_limit::RateLimiter;
use inventory_service::service::InventoryService;
use inventory_service::store::MemoryInventoryStore;
use inventory_service::validation::PageDefaults;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use shared::messages;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Self {
        Self::with(Authenticator::from_secret(None), RateLimiter::new(10_000, Duration::from_secs(900)))
    }

    fn with(auth: Authenticator, limiter: RateLimiter) -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()));
        let service = InventoryService::new(Arc::new(MemoryInventoryStore::new()), clock.clone());
        let router = create_router(AppState {
            service,
            pagination: PageDefaults::default(),
            auth,
            limiter,
        });
        Self { router, clock }
    }

    async fn send(&self, method: Method, uri: &str, holder: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(holder) = holder {
            request = request.header(HOLDER_HEADER, holder);
        }
        self.dispatch(request, body).await
    }

    async fn dispatch(&self, request: axum::http::request::Builder, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(&self, product_id: &str, stock: i64) {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/inventory",
                None,
                Some(json!({ "productId": product_id, "stock": stock })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    async fn reserve(&self, product_id: &str, holder: &str, quantity: i64) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("/api/inventory/{}/reserve", product_id),
            Some(holder),
            Some(json!({ "quantity": quantity })),
        )
        .await
    }

    async fn levels(&self, product_id: &str) -> (i64, i64) {
        let (status, body) = self
            .send(Method::GET, &format!("/api/inventory/{}", product_id), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        (
            body["data"]["stock"].as_i64().unwrap(),
            body["data"]["reservedStock"].as_i64().unwrap(),
        )
    }
}

#[tokio::test]
async fn health_reports_running() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/inventory/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "running", "success": true }));
}

#[tokio::test]
async fn reserve_and_deduct_walkthrough() {
    let app = TestApp::new();
    app.create("P1", 10).await;

    let (status, body) = app.reserve("P1", "u1", 4).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], messages::STOCK_RESERVED);
    assert_eq!(body["data"]["details"]["status"], "reserved");
    assert_eq!(app.levels("P1").await, (10, 4));

    let (status, body) = app.reserve("P1", "u2", 7).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, body) = app.send(Method::POST, "/api/inventory/P1/deduct", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["details"]["status"], "committed");
    assert_eq!(app.levels("P1").await, (6, 0));

    let (status, body) = app.send(Method::POST, "/api/inventory/P1/deduct", Some("u1"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], messages::RESERVATION_NOT_FOUND);

    let (status, _) = app.reserve("P1", "u2", 6).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.levels("P1").await, (6, 6));
}

#[tokio::test]
async fn release_returns_the_hold() {
    let app = TestApp::new();
    app.create("P1", 5).await;
    app.reserve("P1", "u1", 2).await;

    let (status, body) = app.send(Method::GET, "/api/inventory/P1/reservation", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], 2);
    assert_eq!(body["data"]["holderId"], "u1");

    let (status, body) = app.send(Method::POST, "/api/inventory/P1/release", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], messages::RESERVED_STOCK_RELEASED);
    assert_eq!(app.levels("P1").await, (5, 0));

    let (status, _) = app.send(Method::POST, "/api/inventory/P1/release", Some("u1"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = app.send(Method::GET, "/api/inventory/P1/reservation", Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
    assert_eq!(body["error"]["message"], messages::RESERVATION_NOT_FOUND);
}

#[tokio::test]
async fn sweep_endpoint_releases_lapsed_leases() {
    let app = TestApp::new();
    app.create("P1", 5).await;
    app.reserve("P1", "u1", 3).await;

    let (status, body) = app.send(Method::POST, "/api/inventory/cron/release-expired", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["details"]["releasedCount"], 0);

    app.clock.advance(chrono::Duration::minutes(16));
    let (status, _) = app.send(Method::POST, "/api/inventory/P1/release", Some("u1"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.send(Method::POST, "/api/inventory/cron/release-expired", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], messages::CRON_JOB_EXECUTED);
    assert_eq!(body["data"]["details"]["releasedCount"], 1);
    assert_eq!(body["data"]["details"]["reservations"][0]["status"], "released");
    assert_eq!(app.levels("P1").await, (5, 0));
}

#[tokio::test]
async fn listing_filters_by_range_with_default_paging() {
    let app = TestApp::new();
    for stock in 1..=12 {
        app.create(&format!("P{:02}", stock), stock).await;
    }

    let (status, body) = app
        .send(Method::GET, "/api/inventory?minStock=5&maxStock=10", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let stocks: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["stock"].as_i64().unwrap())
        .collect();
    assert_eq!(stocks, vec![5, 6, 7, 8, 9, 10]);
    assert_eq!(body["meta"], json!({ "page": 1, "limit": 10 }));

    let (_, body) = app
        .send(Method::GET, "/api/inventory?limit=abc&page=0", None, None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 10);
    assert_eq!(body["meta"], json!({ "page": 1, "limit": 10 }));

    let (_, body) = app.send(Method::GET, "/api/inventory?limit=2&page=2", None, None).await;
    assert_eq!(body["data"][0]["productId"], "P03");
    assert_eq!(body["data"][1]["productId"], "P04");

    let (_, body) = app.send(Method::GET, "/api/inventory?stock=7&minStock=1", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.send(Method::GET, "/api/inventory?minStock=-3", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], messages::INVALID_STOCK_VALUE);
}

#[tokio::test]
async fn product_crud() {
    let app = TestApp::new();
    app.create("P1", 3).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/inventory",
            None,
            Some(json!({ "productId": "P1", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/inventory",
            None,
            Some(json!({ "productId": "P2", "stock": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let (status, body) = app
        .send(Method::PUT, "/api/inventory/P1", None, Some(json!({ "stock": 8 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 8);

    let (status, body) = app.send(Method::PUT, "/api/inventory/P1", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], messages::STOCK_OR_RESERVED_STOCK_REQUIRED);

    app.reserve("P1", "u1", 1).await;
    let (status, _) = app.send(Method::DELETE, "/api/inventory/P1", None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.send(Method::POST, "/api/inventory/P1/release", Some("u1"), None).await;
    let (status, body) = app.send(Method::DELETE, "/api/inventory/P1", None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = app.send(Method::GET, "/api/inventory/P1", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], messages::PRODUCT_NOT_FOUND);
}

#[tokio::test]
async fn reserve_input_is_checked_before_the_store() {
    let app = TestApp::new();
    app.create("P1", 3).await;

    let (status, body) = app
        .send(Method::POST, "/api/inventory/P1/reserve", None, Some(json!({ "quantity": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], messages::HOLDER_ID_REQUIRED_RESERVE);

    for quantity in [json!(0), json!(-2), json!("lots")] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/inventory/P1/reserve",
                Some("u1"),
                Some(json!({ "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app.reserve("nope", "u1", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.levels("P1").await, (3, 0));
}

#[tokio::test]
async fn bearer_tokens_identify_the_holder() {
    let app = TestApp::with(
        Authenticator::from_secret(Some("test-secret")),
        RateLimiter::new(10_000, Duration::from_secs(900)),
    );
    let claims = Claims {
        sub: "user-7".into(),
        exp: 4_102_444_800,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap();
    let bearer = format!("Bearer {}", token);

    let (status, body) = app.send(Method::GET, "/api/inventory", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], messages::AUTHORIZATION_REQUIRED);

    let (status, _) = app.send(Method::GET, "/api/inventory/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let create = Request::builder()
        .method(Method::POST)
        .uri("/api/inventory")
        .header(header::AUTHORIZATION, &bearer);
    let (status, _) = app
        .dispatch(create, Some(json!({ "productId": "P1", "stock": 2 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let reserve = Request::builder()
        .method(Method::POST)
        .uri("/api/inventory/P1/reserve")
        .header(header::AUTHORIZATION, &bearer);
    let (status, body) = app.dispatch(reserve, Some(json!({ "quantity": 2 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["details"]["holderId"], "user-7");

    let forged = Request::builder()
        .method(Method::GET)
        .uri("/api/inventory/P1")
        .header(header::AUTHORIZATION, "Bearer not-a-token");
    let (status, body) = app.dispatch(forged, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthorized");
}

#[tokio::test]
async fn excess_requests_are_rate_limited() {
    let app = TestApp::with(
        Authenticator::from_secret(None),
        RateLimiter::new(2, Duration::from_secs(900)),
    );
    for _ in 0..2 {
        let (status, _) = app.send(Method::GET, "/api/inventory/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.send(Method::GET, "/api/inventory/health", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["message"], messages::TOO_MANY_REQUESTS);
}
