//! `SqliteDatabase` is a concrete implementation of an order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use shop_common::Rupiah;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, new_pool, orders, vouchers};
use crate::{
    db_types::{NewOrder, NewOrderItem, NewVoucher, Order, OrderId, OrderItem, Voucher, VoucherUsage},
    state_machine::OrderUpdate,
    traits::{OrderFlowError, OrderManagement, VoucherApiError, VoucherManagement},
    voucher_validator::VoucherRejection,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        orders::insert_order_items(&order.id, items, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] inserted with id {}", order.order_number, order.id);
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_order_number(&self, order_number: &str) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(id, &mut conn).await?;
        Ok(items)
    }

    async fn update_order_state(&self, id: &OrderId, update: &OrderUpdate) -> Result<Option<Order>, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_order_state(id, update, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_expired_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_expired_unpaid_orders(now, &mut conn).await?;
        Ok(orders)
    }
}

impl VoucherManagement for SqliteDatabase {
    async fn fetch_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, VoucherApiError> {
        let mut conn = self.pool.acquire().await?;
        let voucher = vouchers::fetch_voucher_by_code(code, &mut conn).await?;
        Ok(voucher)
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, VoucherApiError> {
        let mut conn = self.pool.acquire().await?;
        let voucher = vouchers::insert_voucher(voucher, &mut conn).await?;
        debug!("🗃️ Voucher {} created", voucher.code);
        Ok(voucher)
    }

    async fn count_voucher_usages_for_customer(
        &self,
        voucher_id: i64,
        customer_id: &str,
    ) -> Result<i64, VoucherApiError> {
        let mut conn = self.pool.acquire().await?;
        let count = vouchers::count_usages_for_customer(voucher_id, customer_id, &mut conn).await?;
        Ok(count)
    }

    async fn fetch_customer_tier(&self, customer_id: &str) -> Result<Option<String>, VoucherApiError> {
        let mut conn = self.pool.acquire().await?;
        let tier = vouchers::fetch_customer_tier(customer_id, &mut conn).await?;
        Ok(tier)
    }

    async fn set_customer_tier(&self, customer_id: &str, tier: &str) -> Result<(), VoucherApiError> {
        let mut conn = self.pool.acquire().await?;
        vouchers::upsert_customer_tier(customer_id, tier, &mut conn).await?;
        Ok(())
    }

    async fn redeem_voucher(
        &self,
        voucher: &Voucher,
        customer_id: &str,
        order_id: &OrderId,
        discount: Rupiah,
    ) -> Result<VoucherUsage, VoucherApiError> {
        let mut tx = self.pool.begin().await?;
        if !vouchers::increment_usage_count(voucher.id, &mut tx).await? {
            return Err(VoucherRejection::UsageExhausted.into());
        }
        if let Some(limit) = voucher.user_usage_limit {
            let used = vouchers::count_usages_for_customer(voucher.id, customer_id, &mut tx).await?;
            if used >= limit {
                return Err(VoucherRejection::UserLimitReached.into());
            }
        }
        let usage = vouchers::insert_usage(voucher.id, customer_id, order_id, discount, &mut tx).await?;
        tx.commit().await?;
        Ok(usage)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}
