use chrono::Utc;
use log::debug;
use shop_common::Rupiah;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{normalize_tier, normalize_voucher_code, NewVoucher, OrderId, Voucher, VoucherUsage},
    sqlite::db::is_unique_violation,
    traits::VoucherApiError,
    voucher_validator::VoucherRejection,
};

pub async fn fetch_voucher_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    let code = normalize_voucher_code(code);
    let voucher = sqlx::query_as("SELECT * FROM vouchers WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(voucher)
}

pub async fn insert_voucher(voucher: NewVoucher, conn: &mut SqliteConnection) -> Result<Voucher, VoucherApiError> {
    let code = normalize_voucher_code(&voucher.code);
    let tiers = voucher.allowed_tiers.iter().map(|t| normalize_tier(t)).collect::<Vec<_>>();
    let now = Utc::now();
    let result: Result<Voucher, sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO vouchers (
            code,
            discount_type,
            discount_value,
            min_purchase,
            max_discount,
            usage_limit,
            user_usage_limit,
            valid_from,
            valid_until,
            active,
            allowed_tiers,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
        RETURNING *;
        "#,
    )
    .bind(&code)
    .bind(voucher.discount_type)
    .bind(voucher.discount_value)
    .bind(voucher.min_purchase)
    .bind(voucher.max_discount)
    .bind(voucher.usage_limit)
    .bind(voucher.user_usage_limit)
    .bind(voucher.valid_from)
    .bind(voucher.valid_until)
    .bind(voucher.active)
    .bind(Json(tiers))
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(v) => Ok(v),
        Err(e) if is_unique_violation(&e) => {
            Err(VoucherApiError::ValidationError(format!("A voucher with code {code} already exists")))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn count_usages_for_customer(
    voucher_id: i64,
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM voucher_usage WHERE voucher_id = $1 AND customer_id = $2")
        .bind(voucher_id)
        .bind(customer_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn fetch_customer_tier(customer_id: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let tier = sqlx::query_scalar("SELECT tier FROM customer_tiers WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;
    Ok(tier)
}

pub async fn upsert_customer_tier(customer_id: &str, tier: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO customer_tiers (customer_id, tier, updated_at) VALUES ($1, $2, $3)
        ON CONFLICT (customer_id) DO UPDATE SET tier = excluded.tier, updated_at = excluded.updated_at;
        "#,
    )
    .bind(customer_id)
    .bind(normalize_tier(tier))
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

/// Bumps `usage_count` if the voucher still has uses left. Returns false if the global limit was already reached.
pub async fn increment_usage_count(voucher_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE vouchers SET usage_count = usage_count + 1, updated_at = $2
        WHERE id = $1 AND (usage_limit IS NULL OR usage_count < usage_limit);
        "#,
    )
    .bind(voucher_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_usage(
    voucher_id: i64,
    customer_id: &str,
    order_id: &OrderId,
    discount: Rupiah,
    conn: &mut SqliteConnection,
) -> Result<VoucherUsage, VoucherApiError> {
    let result: Result<VoucherUsage, sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO voucher_usage (voucher_id, customer_id, order_id, discount, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *;
        "#,
    )
    .bind(voucher_id)
    .bind(customer_id)
    .bind(order_id.as_str())
    .bind(discount)
    .bind(Utc::now())
    .fetch_one(conn)
    .await;
    match result {
        Ok(usage) => {
            debug!("🗃️ Voucher {voucher_id} redeemed by {customer_id} on order {order_id}");
            Ok(usage)
        },
        Err(e) if is_unique_violation(&e) => Err(VoucherRejection::AlreadyRedeemed.into()),
        Err(e) => Err(e.into()),
    }
}
