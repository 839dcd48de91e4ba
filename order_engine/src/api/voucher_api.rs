use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use shop_common::Rupiah;

use crate::{
    db_types::{
        normalize_voucher_code,
        DiscountType,
        NewVoucher,
        OrderId,
        OrderStatusType,
        PaymentStatusType,
        Voucher,
        VoucherUsage,
    },
    traits::{OrderManagement, VoucherApiError, VoucherManagement},
    voucher_validator::{check_tier, check_user_usage, check_voucher, compute_discount, VoucherRejection},
};

/// Customers without a tier on record are treated as members of this tier.
pub const DEFAULT_TIER: &str = "regular";

/// A voucher that passed every eligibility check, and the discount it grants on the given subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherQuote {
    pub voucher: Voucher,
    pub subtotal: Rupiah,
    pub discount: Rupiah,
    /// `subtotal - discount`. Never negative.
    pub payable: Rupiah,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRedemption {
    pub quote: VoucherQuote,
    pub usage: VoucherUsage,
}

pub struct VoucherApi<B> {
    db: B,
}

impl<B> Debug for VoucherApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VoucherApi")
    }
}

impl<B> VoucherApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> VoucherApi<B>
where B: VoucherManagement
{
    /// Checks whether `code` can be applied to an order with the given subtotal and returns the discount.
    ///
    /// `customer_id` is optional so that shoppers can preview a voucher before signing in. Without it, per-customer
    /// limits are not checked and tier-restricted vouchers are rejected. The limits are checked again when the voucher
    /// is redeemed.
    pub async fn evaluate(
        &self,
        code: &str,
        subtotal: Rupiah,
        customer_id: Option<&str>,
    ) -> Result<VoucherQuote, VoucherApiError> {
        self.evaluate_at(code, subtotal, customer_id, Utc::now()).await
    }

    pub async fn evaluate_at(
        &self,
        code: &str,
        subtotal: Rupiah,
        customer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VoucherQuote, VoucherApiError> {
        let code = normalize_voucher_code(code);
        if code.is_empty() {
            return Err(VoucherApiError::ValidationError("A voucher code is required".to_string()));
        }
        if subtotal < Rupiah::zero() {
            return Err(VoucherApiError::ValidationError(format!("Subtotal cannot be negative: {subtotal}")));
        }
        let result = self.run_checks(&code, subtotal, customer_id, now).await;
        match &result {
            Ok(quote) => debug!("🎟️ Voucher {code} grants {} on {subtotal}", quote.discount),
            Err(VoucherApiError::Rejected(reason)) => debug!("🎟️ Voucher {code} rejected: {reason}"),
            Err(e) => warn!("🎟️ Could not evaluate voucher {code}. {e}"),
        }
        result
    }

    async fn run_checks(
        &self,
        code: &str,
        subtotal: Rupiah,
        customer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VoucherQuote, VoucherApiError> {
        let voucher = self.db.fetch_voucher_by_code(code).await?.ok_or(VoucherRejection::NotFound)?;
        check_voucher(&voucher, subtotal, now)?;
        if let (Some(_), Some(customer)) = (voucher.user_usage_limit, customer_id) {
            let used = self.db.count_voucher_usages_for_customer(voucher.id, customer).await?;
            check_user_usage(&voucher, used)?;
        }
        if !voucher.allowed_tiers.is_empty() {
            let tier = match customer_id {
                Some(customer) => {
                    Some(self.db.fetch_customer_tier(customer).await?.unwrap_or_else(|| DEFAULT_TIER.to_string()))
                },
                None => None,
            };
            check_tier(&voucher, tier.as_deref())?;
        }
        let discount = compute_discount(&voucher, subtotal);
        Ok(VoucherQuote { voucher, subtotal, discount, payable: subtotal - discount })
    }

    /// Stores a new voucher after sanity-checking its terms.
    pub async fn create_voucher(&self, voucher: NewVoucher) -> Result<Voucher, VoucherApiError> {
        if normalize_voucher_code(&voucher.code).is_empty() {
            return Err(VoucherApiError::ValidationError("A voucher code is required".to_string()));
        }
        if voucher.discount_value < 0 {
            return Err(VoucherApiError::ValidationError("Discount value cannot be negative".to_string()));
        }
        if voucher.discount_type == DiscountType::Percentage && voucher.discount_value > 100 {
            return Err(VoucherApiError::ValidationError("Percentage discounts cannot exceed 100%".to_string()));
        }
        if let (Some(from), Some(until)) = (voucher.valid_from, voucher.valid_until) {
            if from > until {
                return Err(VoucherApiError::ValidationError("Validity window ends before it starts".to_string()));
            }
        }
        let voucher = self.db.insert_voucher(voucher).await?;
        info!("🎟️ Voucher {} created ({} {})", voucher.code, voucher.discount_type, voucher.discount_value);
        Ok(voucher)
    }

    pub async fn set_customer_tier(&self, customer_id: &str, tier: &str) -> Result<(), VoucherApiError> {
        self.db.set_customer_tier(customer_id, tier).await
    }
}

impl<B> VoucherApi<B>
where B: VoucherManagement + OrderManagement
{
    /// Consumes one use of the voucher for an order that is being finalized.
    ///
    /// The order is read from storage. It must belong to `customer_id`, reference `code` as its voucher and still be
    /// awaiting payment. The discount is recomputed from the stored voucher and the stored order subtotal, so nothing a
    /// client sends can change it.
    pub async fn redeem(
        &self,
        code: &str,
        customer_id: &str,
        order_id: &OrderId,
    ) -> Result<VoucherRedemption, VoucherApiError> {
        if customer_id.trim().is_empty() {
            return Err(VoucherApiError::ValidationError("A customer id is required to redeem a voucher".to_string()));
        }
        let code = normalize_voucher_code(code);
        // Orders belonging to someone else are reported as missing
        let order = self
            .db
            .fetch_order_by_id(order_id)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| VoucherApiError::OrderNotFound(order_id.clone()))?;
        if order.voucher_code.as_deref().map(normalize_voucher_code).as_deref() != Some(code.as_str()) {
            debug!("🎟️ {customer_id} tried to redeem {code} on order {order_id}, which does not reference it");
            return Err(VoucherApiError::OrderNotEligible(format!("Order {order_id} does not use voucher {code}")));
        }
        if order.status != OrderStatusType::AwaitingPayment || order.payment_status != PaymentStatusType::Pending {
            debug!("🎟️ Order {order_id} is {}. Voucher {code} cannot be redeemed on it", order.state());
            return Err(VoucherApiError::OrderNotEligible(format!(
                "Order {order_id} is {} and no longer accepts a voucher",
                order.state()
            )));
        }
        let quote = self.evaluate(&code, order.subtotal, Some(customer_id)).await?;
        if quote.discount != order.discount {
            warn!(
                "🎟️ Order {order_id} was created with a discount of {}, but {code} grants {}. Redeeming {}",
                order.discount, quote.discount, quote.discount
            );
        }
        let usage = self.db.redeem_voucher(&quote.voucher, customer_id, order_id, quote.discount).await.map_err(|e| {
            info!("🎟️ Redemption of {} by {customer_id} for order {order_id} failed. {e}", quote.voucher.code);
            e
        })?;
        info!("🎟️ Voucher {} redeemed by {customer_id} on order {order_id} for {}", quote.voucher.code, quote.discount);
        Ok(VoucherRedemption { quote, usage })
    }
}
