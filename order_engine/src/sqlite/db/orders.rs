use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem},
    sqlite::db::is_unique_violation,
    state_machine::OrderUpdate,
    traits::OrderFlowError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. Embed this call inside a
/// transaction along with [`insert_order_items`], and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderFlowError> {
    let id = order.id.clone();
    let total_amount = order.total_amount();
    let result: Result<Order, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                order_number,
                customer_id,
                subtotal,
                shipping_cost,
                discount,
                total_amount,
                voucher_code,
                payment_method,
                payment_deadline,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order.order_number)
    .bind(order.customer_id)
    .bind(order.subtotal)
    .bind(order.shipping_cost)
    .bind(order.discount)
    .bind(total_amount)
    .bind(order.voucher_code)
    .bind(order.payment_method)
    .bind(order.payment_deadline)
    .bind(order.created_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(e) if is_unique_violation(&e) => Err(OrderFlowError::OrderAlreadyExists(id)),
        Err(e) => Err(e.into()),
    }
}

/// Stores the item snapshots for an order. Line indices are assigned in the order the items are given.
pub async fn insert_order_items(
    order_id: &OrderId,
    items: Vec<NewOrderItem>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    for (line_index, item) in items.into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, line_index, product_id, product_name, product_image, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7);
            "#,
        )
        .bind(order_id.as_str())
        .bind(line_index as i64)
        .bind(item.product_id)
        .bind(item.product_name)
        .bind(item.product_image)
        .bind(item.price)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    trace!("🗃️ Items for order {order_id} stored");
    Ok(())
}

pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_order_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(order_number).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY line_index")
        .bind(id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The compare-and-swap write behind every state transition. The `WHERE` clause pins the row to the state the update
/// was computed from; if another writer got there first, no row matches and `None` is returned.
///
/// Run this inside a transaction and commit it once this returns. The statement is driven to completion with
/// `fetch_all`, so the write is finished before the connection is handed back.
pub async fn update_order_state(
    id: &OrderId,
    update: &OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = $1,
            payment_status = $2,
            payment_method = $3,
            paid_at = $4,
            shipped_at = $5,
            completed_at = $6,
            cancelled_at = $7,
            cancellation_reason = $8,
            cancellation_requested = $9,
            cancellation_request_reason = $10,
            cancellation_requested_at = $11,
            updated_at = $12
        WHERE id = $13 AND status = $14 AND payment_status = $15 AND cancellation_requested = $16
        RETURNING *;
        "#,
    )
    .bind(update.status)
    .bind(update.payment_status)
    .bind(update.payment_method.as_deref())
    .bind(update.paid_at)
    .bind(update.shipped_at)
    .bind(update.completed_at)
    .bind(update.cancelled_at)
    .bind(update.cancellation_reason.as_deref())
    .bind(update.cancellation_requested)
    .bind(update.cancellation_request_reason.as_deref())
    .bind(update.cancellation_requested_at)
    .bind(update.updated_at)
    .bind(id.as_str())
    .bind(update.expected.status)
    .bind(update.expected.payment_status)
    .bind(update.expected_cancellation_requested)
    .fetch_all(conn)
    .await?
    .pop();
    match &order {
        Some(o) => debug!("🗃️ Order {id} moved from {} to {}", update.expected, o.state()),
        None => debug!("🗃️ Order {id} is no longer in state {}. Nothing was written.", update.expected),
    }
    Ok(order)
}

/// Unpaid orders whose payment deadline lies before `now`, oldest deadline first.
pub async fn fetch_expired_unpaid_orders(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE status = 'awaiting_payment'
          AND payment_status = 'pending'
          AND payment_deadline IS NOT NULL
          AND julianday(payment_deadline) < julianday($1)
        ORDER BY payment_deadline;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
