use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem},
    state_machine::OrderUpdate,
};

/// Order storage.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order together with its item snapshots in a single atomic transaction.
    ///
    /// The order starts life as `awaiting_payment`/`pending`. If an order with the same id or order number already
    /// exists, nothing is written and [`OrderFlowError::OrderAlreadyExists`] is returned.
    async fn insert_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, OrderFlowError>;

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    async fn fetch_order_by_order_number(&self, order_number: &str) -> Result<Option<Order>, OrderFlowError>;

    /// Item snapshots for the order, in line order.
    async fn fetch_order_items(&self, id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError>;

    /// Writes the new lifecycle fields in `update`, but only if the stored order is still in the state the update was
    /// computed from (`status`, `payment_status` and `cancellation_requested` all match).
    ///
    /// Returns the updated order, or `None` if the row changed underneath the caller (or does not exist). Callers
    /// should re-read the order and re-evaluate the transition in that case.
    async fn update_order_state(&self, id: &OrderId, update: &OrderUpdate) -> Result<Option<Order>, OrderFlowError>;

    /// All orders that are `awaiting_payment`/`pending` and whose payment deadline is earlier than `now`.
    async fn fetch_expired_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
