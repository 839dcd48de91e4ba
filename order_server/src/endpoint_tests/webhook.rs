use std::{sync::Arc, time::Duration};

use actix_web::{
    http::{header::RETRY_AFTER, StatusCode},
    test::TestRequest,
    web,
    web::ServiceConfig,
};
use order_engine::{
    db_types::{OrderStatusType, PaymentStatusType},
    events::EventProducers,
    helpers::{gateway_signature, KeyedRateLimiter, RateLimiter},
    traits::OrderManagement,
    OrderFlowApi,
    PaymentWebhookApi,
    WebhookConfig,
};
use serde_json::json;
use shop_common::Secret;

use super::{
    helpers::{post_request, send},
    mocks::{db_with_order, order, MockOrderManager, SlowOrderManager},
};
use crate::{config::ServerOptions, middleware::RateLimitMiddlewareFactory, routes::GatewayNotificationRoute};

const SERVER_KEY: &str = "SB-Mid-server-endpoint-tests";

fn limiter(limit: u32) -> Arc<dyn RateLimiter> {
    Arc::new(KeyedRateLimiter::per_minute(limit))
}

fn configure(db: MockOrderManager, limiter: Arc<dyn RateLimiter>) -> impl FnOnce(&mut ServiceConfig) {
    configure_with(db, limiter, ServerOptions::default())
}

fn configure_with<B: OrderManagement + 'static>(
    db: B,
    limiter: Arc<dyn RateLimiter>,
    options: ServerOptions,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let flow = OrderFlowApi::new(db, EventProducers::default());
        let api = PaymentWebhookApi::new(flow, WebhookConfig::new(Secret::new(SERVER_KEY.to_string())));
        cfg.app_data(web::Data::new(api)).app_data(web::Data::new(options)).service(
            web::scope("/gateway")
                .wrap(RateLimitMiddlewareFactory::new(limiter, options))
                .service(GatewayNotificationRoute::<B>::new()),
        );
    }
}

fn notification(order_id: &str, status: &str, key: &str) -> serde_json::Value {
    let status_code = if status == "pending" { "201" } else { "200" };
    let gross_amount = "215000.00";
    json!({
        "order_id": order_id,
        "transaction_status": status,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "payment_type": "bank_transfer",
        "signature_key": gateway_signature(order_id, status_code, gross_amount, key),
    })
}

#[actix_web::test]
async fn settlement_marks_the_order_paid() {
    let _ = env_logger::try_init().ok();
    let db = db_with_order(order("1", OrderStatusType::AwaitingPayment, PaymentStatusType::Pending));
    let body = notification("1", "settlement", SERVER_KEY);
    let res = post_request("/gateway/notification", Some(body), None, configure(db, limiter(100))).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains("processing/paid"), "{}", res.body);
}

#[actix_web::test]
async fn late_notifications_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    let shipped = order("1", OrderStatusType::Shipped, PaymentStatusType::Paid);
    db.expect_fetch_order_by_id().returning(move |_| Ok(Some(shipped.clone())));
    db.expect_update_order_state().never();
    let body = notification("1", "expire", SERVER_KEY);
    let res = post_request("/gateway/notification", Some(body), None, configure(db, limiter(100))).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.json()["success"], true);
}

#[actix_web::test]
async fn forged_notifications_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_id().never();
    db.expect_update_order_state().never();
    let body = notification("1", "settlement", "not-the-server-key");
    let res = post_request("/gateway/notification", Some(body), None, configure(db, limiter(100))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn notifications_for_unknown_orders() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_id().returning(|_| Ok(None));
    let body = notification("404", "settlement", SERVER_KEY);
    let res = post_request("/gateway/notification", Some(body), None, configure(db, limiter(100))).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn malformed_notifications_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let mut body = notification("1", "settlement", SERVER_KEY);
    body["signature_key"] = json!("");
    let res =
        post_request("/gateway/notification", Some(body), None, configure(MockOrderManager::new(), limiter(100))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn gateway_test_notifications_do_not_touch_orders() {
    let _ = env_logger::try_init().ok();
    let body = notification("payment_notif_test_G123", "settlement", SERVER_KEY);
    let res =
        post_request("/gateway/notification", Some(body), None, configure(MockOrderManager::new(), limiter(100))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["success"], true);
}

#[actix_web::test]
async fn notifications_are_rate_limited_per_source() {
    let _ = env_logger::try_init().ok();
    let limiter = limiter(2);
    let request = |peer: &str| {
        TestRequest::post()
            .uri("/gateway/notification")
            .peer_addr(peer.parse().unwrap())
            .set_json(notification("payment_notif_test_G1", "settlement", SERVER_KEY))
    };
    for _ in 0..2 {
        let res = send(request("10.0.0.1:5000"), configure(MockOrderManager::new(), limiter.clone())).await;
        assert_eq!(res.status, StatusCode::OK);
    }
    let res = send(request("10.0.0.1:5001"), configure(MockOrderManager::new(), limiter.clone())).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after = res.headers.get(RETRY_AFTER).expect("Retry-After header").to_str().unwrap();
    assert!(retry_after.parse::<u64>().unwrap() >= 1);
    // Other sources have their own quota
    let res = send(request("10.0.0.2:5000"), configure(MockOrderManager::new(), limiter.clone())).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[actix_web::test]
async fn slow_processing_is_cut_off() {
    let _ = env_logger::try_init().ok();
    let inner = db_with_order(order("1", OrderStatusType::AwaitingPayment, PaymentStatusType::Pending));
    let db = SlowOrderManager { inner, delay: Duration::from_secs(5) };
    let options = ServerOptions { webhook_timeout: Duration::from_millis(50), ..ServerOptions::default() };
    let req = TestRequest::post().uri("/gateway/notification").set_json(notification("1", "settlement", SERVER_KEY));
    let res = send(req, configure_with(db, limiter(100), options)).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR, "{}", res.body);
    assert!(res.json()["error"].as_str().unwrap().contains("timed out"), "{}", res.body);
}
