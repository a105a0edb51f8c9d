use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use freshcut_api::{app, metrics::Metrics, state::{AppState, AuthConfig}};
use freshcut_catalog::{CatalogRepository, PriceResolver};
use freshcut_core::carrier::CarrierError;
use freshcut_order::memory::{MemoryStore, RecordingNotifier, ScriptedCarrier};
use freshcut_order::{
    CheckoutService, CircuitBreaker, DispatchSettings, FulfillmentDispatcher, NotificationDispatcher,
    OrderAssembler, OrderNumberGenerator, OrderStatus,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    carrier: Arc<ScriptedCarrier>,
}

fn test_app(carrier: ScriptedCarrier, auto_dispatch: bool) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let carrier = Arc::new(carrier);
    let catalog: Arc<dyn CatalogRepository> = store.clone();

    let fulfillment = Arc::new(FulfillmentDispatcher::new(
        store.clone(),
        carrier.clone(),
        CircuitBreaker::new("scripted", 5, Duration::from_secs(60)),
        DispatchSettings::default(),
    ));
    let checkout = CheckoutService::new(
        OrderAssembler::new(
            PriceResolver::new(catalog),
            store.clone(),
            store.clone(),
            OrderNumberGenerator::default(),
        ),
        fulfillment.clone(),
        NotificationDispatcher::new(vec![Arc::new(RecordingNotifier::new("email"))]),
        auto_dispatch,
    );

    let state = AppState {
        checkout: Arc::new(checkout),
        orders: store.clone(),
        fulfillment,
        redis: None,
        rate_limit_per_minute: 100,
        metrics: Arc::new(Metrics::new().unwrap()),
        auth: AuthConfig { secret: SECRET.to_string() },
    };

    TestApp { router: app(state), store, carrier }
}

fn token(sub: &str, role: &str) -> String {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::default(),
        &json!({ "sub": sub, "role": role, "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn checkout_body(product_id: Uuid, variant_id: Uuid, quantity: u32) -> Value {
    json!({
        "items": [{ "product_id": product_id, "variant_id": variant_id, "quantity": quantity, "cut_type": "curry cut" }],
        "customer": {
            "name": "Kavya Nair",
            "phone": "+91 98470 12345",
            "email": "kavya@example.com",
            "address": "Flat 4B, Marine Drive",
            "city": "Kochi",
            "state": "Kerala",
            "pincode": "682031"
        },
        "payment_method": "cod",
        "total_amount": "1.00"
    })
}

fn decimal(value: &Value) -> Decimal {
    serde_json::from_value(value.clone()).unwrap()
}

#[tokio::test]
async fn test_guest_checkout_returns_server_total() {
    let t = test_app(ScriptedCarrier::new(), false);
    let (p, v) = t.store.add_variant("Chicken Curry Cut", "500 g", Decimal::from(100), Some(Decimal::from(80)), true, true);

    let (status, body) = send(&t.router, post_json("/v1/orders", &checkout_body(p, v, 3), None)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["total_amount"]), Decimal::from(240));
    assert_eq!(body["status"], "pending");
    assert!(body["order_number"].as_str().unwrap().starts_with("FC-"));
    assert_eq!(t.store.order_count(), 1);
    assert_eq!(t.store.customer_count(), 1);

    let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
    let owner = t.store.get_order_now(order_id).unwrap().customer_id;
    let session = token(&owner.to_string(), "customer");
    let (status, order) = send(&t.router, get(&format!("/v1/orders/{}", order_id), Some(&session))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["items"][0]["quantity"], 3);
    assert_eq!(order["shipping_address"]["phone"], "9847012345");
}

#[tokio::test]
async fn test_order_lookup_is_limited_to_owner_and_admin() {
    let t = test_app(ScriptedCarrier::new(), false);
    let order = t.store.seed_pending_order(Decimal::from(300), 1).await;
    let uri = format!("/v1/orders/{}", order.id);

    let (status, body) = send(&t.router, get(&uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("shipping_address").is_none());

    let (status, _) = send(&t.router, get(&uri, Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = token(&Uuid::new_v4().to_string(), "customer");
    let (status, body) = send(&t.router, get(&uri, Some(&stranger))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.get("shipping_address").is_none());

    let owner = token(&order.customer_id.to_string(), "customer");
    let (status, body) = send(&t.router, get(&uri, Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_number"], order.order_number.as_str());

    let admin = token(&Uuid::new_v4().to_string(), "admin");
    let (status, _) = send(&t.router, get(&uri, Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_inactive_product_is_rejected_without_writes() {
    let t = test_app(ScriptedCarrier::new(), false);
    let (p, v) = t.store.add_variant("Pomfret", "1 kg", Decimal::from(900), None, true, false);

    let (status, body) = send(&t.router, post_json("/v1/orders", &checkout_body(p, v, 1), None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Item 1"));
    assert_eq!(t.store.order_count(), 0);
    assert_eq!(t.store.customer_count(), 0);
}

#[tokio::test]
async fn test_malformed_quantity_is_bad_request() {
    let t = test_app(ScriptedCarrier::new(), false);
    let (p, v) = t.store.add_variant("Chicken Wings", "500 g", Decimal::from(150), None, true, true);
    let mut body = checkout_body(p, v, 1);
    body["items"][0]["quantity"] = json!(1.5);

    let (status, response) = send(&t.router, post_json("/v1/orders", &body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());

    body["items"][0]["quantity"] = json!(0);
    let (status, _) = send(&t.router, post_json("/v1/orders", &body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_bearer_token_is_unauthorized() {
    let t = test_app(ScriptedCarrier::new(), false);
    let (p, v) = t.store.add_variant("Chicken Wings", "500 g", Decimal::from(150), None, true, true);

    let (status, _) = send(&t.router, post_json("/v1/orders", &checkout_body(p, v, 1), Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.store.order_count(), 0);
}

#[tokio::test]
async fn test_session_checkout_uses_token_customer() {
    let t = test_app(ScriptedCarrier::new(), false);
    let (p, v) = t.store.add_variant("Mutton Boneless", "500 g", Decimal::from(550), None, true, true);
    let customer = t.store.seed_customer("Kavya Nair", "9847012345");

    let session = token(&customer.id.to_string(), "customer");
    let (status, body) = send(&t.router, post_json("/v1/orders", &checkout_body(p, v, 1), Some(&session))).await;
    assert_eq!(status, StatusCode::CREATED);

    let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(t.store.get_order_now(order_id).unwrap().customer_id, customer.id);

    let stranger = token(&Uuid::new_v4().to_string(), "customer");
    let (status, _) = send(&t.router, post_json("/v1/orders", &checkout_body(p, v, 1), Some(&stranger))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auto_dispatch_runs_after_response() {
    let t = test_app(ScriptedCarrier::new(), true);
    let (p, v) = t.store.add_variant("Chicken Breast", "1 kg", Decimal::from(320), None, true, true);

    let (status, body) = send(&t.router, post_json("/v1/orders", &checkout_body(p, v, 1), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(t.store.get_order_now(order_id).unwrap().status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_missing_order_is_not_found() {
    let t = test_app(ScriptedCarrier::new(), false);
    let admin = token(&Uuid::new_v4().to_string(), "admin");
    let (status, body) = send(&t.router, get(&format!("/v1/orders/{}", Uuid::new_v4()), Some(&admin))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let t = test_app(ScriptedCarrier::new(), false);
    let uri = "/v1/admin/orders/undispatched";

    let (status, _) = send(&t.router, get(uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = token(&Uuid::new_v4().to_string(), "customer");
    let (status, _) = send(&t.router, get(uri, Some(&customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    t.store.seed_pending_order(Decimal::from(300), 2).await;
    let admin = token(&Uuid::new_v4().to_string(), "admin");
    let (status, body) = send(&t.router, get(uri, Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_manual_dispatch_outcomes() {
    let carrier = ScriptedCarrier::new();
    carrier.push_failure(CarrierError::Rejected("pincode not serviceable".to_string()));
    let t = test_app(carrier, false);
    let order = t.store.seed_pending_order(Decimal::from(480), 2).await;
    let admin = token(&Uuid::new_v4().to_string(), "admin");
    let uri = format!("/v1/admin/orders/{}/dispatch", order.id);

    let (status, _) = send(&t.router, post_json(&uri, &json!({}), Some(&admin))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(t.store.get_order_now(order.id).unwrap().status, OrderStatus::Pending);

    let (status, body) = send(&t.router, post_json(&uri, &json!({}), Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["awb_number"].is_string());
    assert_eq!(t.store.get_order_now(order.id).unwrap().status, OrderStatus::Processing);

    let (status, _) = send(&t.router, post_json(&uri, &json!({}), Some(&admin))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(t.carrier.shipment_calls(), 2);

    let missing = format!("/v1/admin/orders/{}/dispatch", Uuid::new_v4());
    let (status, _) = send(&t.router, post_json(&missing, &json!({}), Some(&admin))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_dispatch_without_carrier_is_unavailable() {
    let t = test_app(ScriptedCarrier::unconfigured(), false);
    let order = t.store.seed_pending_order(Decimal::from(480), 1).await;
    let admin = token(&Uuid::new_v4().to_string(), "admin");

    let uri = format!("/v1/admin/orders/{}/dispatch", order.id);
    let (status, _) = send(&t.router, post_json(&uri, &json!({}), Some(&admin))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let t = test_app(ScriptedCarrier::new(), false);
    let (p, v) = t.store.add_variant("Chicken Wings", "500 g", Decimal::from(150), None, true, true);
    send(&t.router, post_json("/v1/orders", &checkout_body(p, v, 1), None)).await;

    let (status, body) = send(&t.router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["carrier_circuit"], "closed");

    let response = t.router.clone().oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("checkout_requests_total{outcome=\"created\"} 1"));
}
