use shop_common::Rupiah;
use thiserror::Error;

use crate::{
    db_types::{NewVoucher, OrderId, Voucher, VoucherUsage},
    traits::OrderFlowError,
    voucher_validator::VoucherRejection,
};

/// Voucher storage.
#[allow(async_fn_in_trait)]
pub trait VoucherManagement {
    /// Looks a voucher up by its code. The code is normalized to upper case before the lookup.
    async fn fetch_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, VoucherApiError>;

    /// Stores a new voucher. Fails with a validation error if the code is already taken.
    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, VoucherApiError>;

    /// The number of times `customer_id` has redeemed the voucher.
    async fn count_voucher_usages_for_customer(&self, voucher_id: i64, customer_id: &str)
        -> Result<i64, VoucherApiError>;

    /// The membership tier of the customer, if the customer has one on record.
    async fn fetch_customer_tier(&self, customer_id: &str) -> Result<Option<String>, VoucherApiError>;

    /// Records the membership tier of a customer, replacing any previous tier.
    async fn set_customer_tier(&self, customer_id: &str, tier: &str) -> Result<(), VoucherApiError>;

    /// Consumes one use of the voucher for the given customer and order, in one transaction:
    /// * `usage_count` is incremented only if it is still below `usage_limit`, otherwise
    ///   [`VoucherRejection::UsageExhausted`] is returned,
    /// * the customer's prior usages are re-counted against `user_usage_limit`,
    /// * the usage record is inserted. A second redemption of the same (voucher, customer, order) is rejected with
    ///   [`VoucherRejection::AlreadyRedeemed`].
    ///
    /// Nothing is written if any of these steps fail.
    async fn redeem_voucher(
        &self,
        voucher: &Voucher,
        customer_id: &str,
        order_id: &OrderId,
        discount: Rupiah,
    ) -> Result<VoucherUsage, VoucherApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum VoucherApiError {
    #[error("Voucher rejected: {0}")]
    Rejected(VoucherRejection),
    #[error("Invalid voucher request: {0}")]
    ValidationError(String),
    #[error("The order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The voucher cannot be redeemed on this order. {0}")]
    OrderNotEligible(String),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for VoucherApiError {
    fn from(e: sqlx::Error) -> Self {
        VoucherApiError::DatabaseError(e.to_string())
    }
}

impl From<OrderFlowError> for VoucherApiError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::OrderNotFound(id) => VoucherApiError::OrderNotFound(id),
            e => VoucherApiError::DatabaseError(e.to_string()),
        }
    }
}

impl From<VoucherRejection> for VoucherApiError {
    fn from(r: VoucherRejection) -> Self {
        VoucherApiError::Rejected(r)
    }
}
