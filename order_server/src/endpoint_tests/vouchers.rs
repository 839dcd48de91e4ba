use actix_web::{http::StatusCode, web, web::ServiceConfig};
use order_engine::{db_types::DiscountType, VoucherApi};
use serde_json::json;
use shop_common::Rupiah;

use super::{
    helpers::post_request,
    mocks::{voucher, MockVoucherManager},
};
use crate::routes::ApplyVoucherRoute;

fn configure(db: MockVoucherManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(VoucherApi::new(db))).service(ApplyVoucherRoute::<MockVoucherManager>::new());
    }
}

fn db_with_voucher(v: order_engine::db_types::Voucher) -> MockVoucherManager {
    let mut db = MockVoucherManager::new();
    db.expect_fetch_voucher_by_code()
        .returning(move |code| Ok(code.eq_ignore_ascii_case(&v.code).then(|| v.clone())));
    db
}

#[actix_web::test]
async fn percentage_voucher_is_capped() {
    let _ = env_logger::try_init().ok();
    let mut v = voucher("HEMAT10", DiscountType::Percentage, 10);
    v.max_discount = Some(Rupiah::from(15_000));
    let body = json!({ "code": "hemat10", "subtotal": 200_000 });
    let res = post_request("/vouchers/apply", Some(body), None, configure(db_with_voucher(v))).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let body = res.json();
    assert_eq!(body["voucher"]["code"], "HEMAT10");
    assert_eq!(body["discount"], 15_000);
    assert_eq!(body["payable"], 185_000);
}

#[actix_web::test]
async fn fixed_voucher_never_exceeds_subtotal() {
    let _ = env_logger::try_init().ok();
    let v = voucher("POTONG50", DiscountType::Fixed, 50_000);
    let body = json!({ "code": "POTONG50", "subtotal": 30_000 });
    let res = post_request("/vouchers/apply", Some(body), None, configure(db_with_voucher(v))).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let body = res.json();
    assert_eq!(body["discount"], 30_000);
    assert_eq!(body["payable"], 0);
}

#[actix_web::test]
async fn rejections_carry_a_code() {
    let _ = env_logger::try_init().ok();
    let mut v = voucher("BELANJA", DiscountType::Fixed, 10_000);
    v.min_purchase = Some(Rupiah::from(100_000));
    let body = json!({ "code": "BELANJA", "subtotal": 99_999 });
    let res = post_request("/vouchers/apply", Some(body), None, configure(db_with_voucher(v.clone()))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "below_minimum");

    let body = json!({ "code": "TIDAKADA", "subtotal": 200_000 });
    let res = post_request("/vouchers/apply", Some(body), None, configure(db_with_voucher(v))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "not_found");
}

#[actix_web::test]
async fn per_customer_limits_are_checked_when_the_customer_is_known() {
    let _ = env_logger::try_init().ok();
    let mut v = voucher("SEKALI", DiscountType::Fixed, 10_000);
    v.user_usage_limit = Some(1);
    let mut db = db_with_voucher(v);
    db.expect_count_voucher_usages_for_customer().times(1).returning(|_, _| Ok(1));
    let body = json!({ "code": "SEKALI", "subtotal": 200_000, "customer_id": "alice" });
    let res = post_request("/vouchers/apply", Some(body), None, configure(db)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "user_limit_reached");
}

#[actix_web::test]
async fn blank_codes_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "code": "  ", "subtotal": 200_000 });
    let res = post_request("/vouchers/apply", Some(body), None, configure(MockVoucherManager::new())).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json().get("code").is_none());
}
