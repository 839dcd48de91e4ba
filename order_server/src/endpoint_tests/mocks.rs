use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mockall::mock;
use order_engine::{
    db_types::{
        DiscountType,
        NewOrder,
        NewOrderItem,
        NewVoucher,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentStatusType,
        Voucher,
        VoucherUsage,
    },
    state_machine::OrderUpdate,
    traits::{OrderFlowError, OrderManagement, VoucherApiError, VoucherManagement},
};
use shop_common::Rupiah;

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn insert_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, OrderFlowError>;
        async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_order_by_order_number(&self, order_number: &str) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_order_items(&self, id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError>;
        async fn update_order_state(&self, id: &OrderId, update: &OrderUpdate) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_expired_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;
    }
}

mock! {
    pub VoucherManager {}
    impl VoucherManagement for VoucherManager {
        async fn fetch_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, VoucherApiError>;
        async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, VoucherApiError>;
        async fn count_voucher_usages_for_customer(&self, voucher_id: i64, customer_id: &str) -> Result<i64, VoucherApiError>;
        async fn fetch_customer_tier(&self, customer_id: &str) -> Result<Option<String>, VoucherApiError>;
        async fn set_customer_tier(&self, customer_id: &str, tier: &str) -> Result<(), VoucherApiError>;
        async fn redeem_voucher(&self, voucher: &Voucher, customer_id: &str, order_id: &OrderId, discount: Rupiah) -> Result<VoucherUsage, VoucherApiError>;
    }
}

/// Answers like `inner`, but every order lookup first waits for `delay`.
pub struct SlowOrderManager {
    pub inner: MockOrderManager,
    pub delay: StdDuration,
}

impl OrderManagement for SlowOrderManager {
    async fn insert_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, OrderFlowError> {
        self.inner.insert_order(order, items).await
    }

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_order_by_id(id).await
    }

    async fn fetch_order_by_order_number(&self, order_number: &str) -> Result<Option<Order>, OrderFlowError> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_order_by_order_number(order_number).await
    }

    async fn fetch_order_items(&self, id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError> {
        self.inner.fetch_order_items(id).await
    }

    async fn update_order_state(&self, id: &OrderId, update: &OrderUpdate) -> Result<Option<Order>, OrderFlowError> {
        self.inner.update_order_state(id, update).await
    }

    async fn fetch_expired_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        self.inner.fetch_expired_unpaid_orders(now).await
    }
}

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn order(id: &str, status: OrderStatusType, payment_status: PaymentStatusType) -> Order {
    let created_at = created_at();
    let paid = payment_status == PaymentStatusType::Paid;
    Order {
        id: OrderId::from(id),
        order_number: format!("INV-{id}"),
        customer_id: "alice".to_string(),
        subtotal: Rupiah::from(200_000),
        shipping_cost: Rupiah::from(15_000),
        discount: Rupiah::zero(),
        total_amount: Rupiah::from(215_000),
        voucher_code: None,
        status,
        payment_status,
        payment_method: paid.then(|| "bank_transfer".to_string()),
        payment_deadline: Some(created_at + Duration::hours(24)),
        paid_at: paid.then_some(created_at),
        shipped_at: None,
        completed_at: None,
        cancelled_at: None,
        cancellation_reason: None,
        cancellation_requested: false,
        cancellation_request_reason: None,
        cancellation_requested_at: None,
        created_at,
        updated_at: created_at,
    }
}

/// What the database would store after a successful compare-and-swap.
pub fn apply_update(order: &Order, update: &OrderUpdate) -> Order {
    Order {
        status: update.status,
        payment_status: update.payment_status,
        payment_method: update.payment_method.clone(),
        paid_at: update.paid_at,
        shipped_at: update.shipped_at,
        completed_at: update.completed_at,
        cancelled_at: update.cancelled_at,
        cancellation_reason: update.cancellation_reason.clone(),
        cancellation_requested: update.cancellation_requested,
        cancellation_request_reason: update.cancellation_request_reason.clone(),
        cancellation_requested_at: update.cancellation_requested_at,
        updated_at: update.updated_at,
        ..order.clone()
    }
}

/// A database holding exactly one order, which accepts every state update.
pub fn db_with_order(order: Order) -> MockOrderManager {
    let mut db = MockOrderManager::new();
    let stored = order.clone();
    db.expect_fetch_order_by_id().returning(move |id| Ok((id == &stored.id).then(|| stored.clone())));
    db.expect_update_order_state().returning(move |_, update| Ok(Some(apply_update(&order, update))));
    db
}

pub fn voucher(code: &str, discount_type: DiscountType, discount_value: i64) -> Voucher {
    Voucher {
        id: 1,
        code: code.to_string(),
        discount_type,
        discount_value,
        min_purchase: None,
        max_discount: None,
        usage_limit: None,
        usage_count: 0,
        user_usage_limit: None,
        valid_from: None,
        valid_until: None,
        active: true,
        allowed_tiers: vec![],
        created_at: created_at(),
        updated_at: created_at(),
    }
}
