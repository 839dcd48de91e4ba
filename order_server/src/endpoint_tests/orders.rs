use actix_web::{http::StatusCode, web, web::ServiceConfig};
use order_engine::{
    db_types::{OrderId, OrderItem, OrderStatusType, PaymentStatusType},
    events::EventProducers,
    OrderFlowApi,
};
use serde_json::json;
use shop_common::{Rupiah, Secret};

use super::{
    helpers::{get_request, post_request, ADMIN_KEY},
    mocks::{apply_update, db_with_order, order, MockOrderManager},
};
use crate::{
    middleware::AdminKeyMiddlewareFactory,
    routes::{
        ApproveCancellationRoute,
        CompleteOrderRoute,
        DenyCancellationRoute,
        OrderByIdRoute,
        RequestCancellationRoute,
        ShipOrderRoute,
        SweepRoute,
    },
};

fn configure(db: MockOrderManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = OrderFlowApi::new(db, EventProducers::default());
        let admin_scope = web::scope("/api")
            .wrap(AdminKeyMiddlewareFactory::new(Secret::new(ADMIN_KEY.to_string())))
            .service(SweepRoute::<MockOrderManager>::new())
            .service(OrderByIdRoute::<MockOrderManager>::new())
            .service(ApproveCancellationRoute::<MockOrderManager>::new())
            .service(DenyCancellationRoute::<MockOrderManager>::new())
            .service(ShipOrderRoute::<MockOrderManager>::new())
            .service(CompleteOrderRoute::<MockOrderManager>::new());
        cfg.app_data(web::Data::new(api))
            .service(RequestCancellationRoute::<MockOrderManager>::new())
            .service(admin_scope);
    }
}

#[actix_web::test]
async fn admin_routes_require_the_admin_key() {
    let _ = env_logger::try_init().ok();
    let res = get_request("/api/orders/1", None, configure(MockOrderManager::new())).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let res = get_request("/api/orders/1", Some("not-the-key"), configure(MockOrderManager::new())).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let res = post_request("/api/sweep", None, Some(""), configure(MockOrderManager::new())).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn fetch_order_with_items() {
    let _ = env_logger::try_init().ok();
    let mut db = db_with_order(order("1", OrderStatusType::Processing, PaymentStatusType::Paid));
    db.expect_fetch_order_items().times(1).returning(|id| {
        Ok(vec![OrderItem {
            order_id: id.clone(),
            line_index: 0,
            product_id: "batik-01".into(),
            product_name: "Kemeja Batik".into(),
            product_image: None,
            price: Rupiah::from(100_000),
            quantity: 2,
        }])
    });
    let res = get_request("/api/orders/1", Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["order"]["order_number"], "INV-1");
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["order"]["payment_status"], "paid");
    assert_eq!(body["items"][0]["product_name"], "Kemeja Batik");
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_id().returning(|_| Ok(None));
    let res = get_request("/api/orders/nope", Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn ship_and_complete_a_paid_order() {
    let _ = env_logger::try_init().ok();
    let db = db_with_order(order("1", OrderStatusType::Processing, PaymentStatusType::Paid));
    let res = post_request("/api/orders/1/ship", None, Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["status"], "shipped");
    assert!(!body["shipped_at"].is_null());

    let db = db_with_order(order("1", OrderStatusType::Shipped, PaymentStatusType::Paid));
    let res = post_request("/api/orders/1/complete", None, Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["status"], "completed");
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_shipped() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    let unpaid = order("1", OrderStatusType::AwaitingPayment, PaymentStatusType::Pending);
    db.expect_fetch_order_by_id().returning(move |_| Ok(Some(unpaid.clone())));
    db.expect_update_order_state().never();
    let res = post_request("/api/orders/1/ship", None, Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert!(res.json()["error"].as_str().unwrap().contains("mark_shipped"), "{}", res.body);
}

#[actix_web::test]
async fn customers_request_cancellation_of_their_own_orders() {
    let _ = env_logger::try_init().ok();
    let db = db_with_order(order("1", OrderStatusType::AwaitingPayment, PaymentStatusType::Pending));
    let body = json!({ "customer_id": "alice", "reason": "Ordered the wrong size" });
    let res = post_request("/orders/1/request_cancellation", Some(body), None, configure(db)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["cancellation_requested"], true);
    assert_eq!(body["cancellation_request_reason"], "Ordered the wrong size");
    assert_eq!(body["status"], "awaiting_payment");
}

#[actix_web::test]
async fn cancellation_requests_for_other_customers_orders_are_not_found() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    let alices = order("1", OrderStatusType::AwaitingPayment, PaymentStatusType::Pending);
    db.expect_fetch_order_by_id().returning(move |_| Ok(Some(alices.clone())));
    db.expect_update_order_state().never();
    let body = json!({ "customer_id": "mallory", "reason": "Because" });
    let res = post_request("/orders/1/request_cancellation", Some(body), None, configure(db)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cancellation_requests_need_a_reason() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "customer_id": "alice", "reason": "   " });
    let res =
        post_request("/orders/1/request_cancellation", Some(body), None, configure(MockOrderManager::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn approving_a_cancellation_keeps_the_payment_status() {
    let _ = env_logger::try_init().ok();
    let mut paid = order("1", OrderStatusType::Processing, PaymentStatusType::Paid);
    paid.cancellation_requested = true;
    paid.cancellation_request_reason = Some("Found it cheaper elsewhere".into());
    let db = db_with_order(paid);
    let res = post_request("/api/orders/1/approve_cancellation", None, Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let body = res.json();
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["cancellation_reason"], "Found it cheaper elsewhere");

    let db = db_with_order(order("2", OrderStatusType::AwaitingPayment, PaymentStatusType::Pending));
    let body = json!({ "reason": "Out of stock" });
    let res = post_request("/api/orders/2/approve_cancellation", Some(body), Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.json()["cancellation_reason"], "Out of stock");
}

#[actix_web::test]
async fn denying_without_a_request_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let db = db_with_order(order("1", OrderStatusType::Processing, PaymentStatusType::Paid));
    let res = post_request("/api/orders/1/deny_cancellation", None, Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn sweep_expires_overdue_orders() {
    let _ = env_logger::try_init().ok();
    let overdue = order("7", OrderStatusType::AwaitingPayment, PaymentStatusType::Pending);
    let paid = order("8", OrderStatusType::AwaitingPayment, PaymentStatusType::Paid);
    let mut db = MockOrderManager::new();
    let candidates = vec![overdue.clone(), paid.clone()];
    db.expect_fetch_expired_unpaid_orders().times(1).returning(move |_| Ok(candidates.clone()));
    let stored = [overdue.clone(), paid];
    db.expect_fetch_order_by_id()
        .returning(move |id: &OrderId| Ok(stored.iter().find(|o| &o.id == id).cloned()));
    db.expect_update_order_state().times(1).returning(move |_, update| Ok(Some(apply_update(&overdue, update))));
    let res = post_request("/api/sweep", None, Some(ADMIN_KEY), configure(db)).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["expired_count"], 1);
    assert_eq!(body["expired_order_numbers"], json!(["INV-7"]));
}
