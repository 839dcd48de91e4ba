//! Voucher eligibility rules and discount computation.
//!
//! The checks here never touch the database. [`crate::VoucherApi`] runs them in the order
//! not found → inactive → validity window → minimum purchase → global usage → per-user usage → tier, stopping at the
//! first failure, and only performs the per-user and tier lookups when the voucher actually restricts them.
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_common::Rupiah;

use crate::db_types::{normalize_tier, DiscountType, Voucher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherRejection {
    NotFound,
    Inactive,
    NotYetValid,
    Expired,
    BelowMinimum,
    UsageExhausted,
    UserLimitReached,
    TierNotAllowed,
    /// The customer already redeemed this voucher on the same order
    AlreadyRedeemed,
}

impl VoucherRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Inactive => "inactive",
            Self::NotYetValid => "not_yet_valid",
            Self::Expired => "expired",
            Self::BelowMinimum => "below_minimum",
            Self::UsageExhausted => "usage_exhausted",
            Self::UserLimitReached => "user_limit_reached",
            Self::TierNotAllowed => "tier_not_allowed",
            Self::AlreadyRedeemed => "already_redeemed",
        }
    }

    /// A message suitable for showing to the shopper at checkout.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "This voucher code does not exist.",
            Self::Inactive => "This voucher is no longer active.",
            Self::NotYetValid => "This voucher cannot be used yet.",
            Self::Expired => "This voucher has expired.",
            Self::BelowMinimum => "Your order does not meet the minimum purchase for this voucher.",
            Self::UsageExhausted => "This voucher has been fully redeemed.",
            Self::UserLimitReached => "You have already used this voucher the maximum number of times.",
            Self::TierNotAllowed => "This voucher is not available for your membership tier.",
            Self::AlreadyRedeemed => "This voucher has already been applied to this order.",
        }
    }
}

impl Display for VoucherRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Checks that only depend on the voucher itself, the order subtotal and the current time.
pub fn check_voucher(voucher: &Voucher, subtotal: Rupiah, now: DateTime<Utc>) -> Result<(), VoucherRejection> {
    if !voucher.active {
        return Err(VoucherRejection::Inactive);
    }
    if voucher.valid_from.is_some_and(|from| now < from) {
        return Err(VoucherRejection::NotYetValid);
    }
    if voucher.valid_until.is_some_and(|until| now > until) {
        return Err(VoucherRejection::Expired);
    }
    if voucher.min_purchase.is_some_and(|min| subtotal < min) {
        return Err(VoucherRejection::BelowMinimum);
    }
    if voucher.usage_limit.is_some_and(|limit| voucher.usage_count >= limit) {
        return Err(VoucherRejection::UsageExhausted);
    }
    Ok(())
}

pub fn check_user_usage(voucher: &Voucher, prior_usages: i64) -> Result<(), VoucherRejection> {
    match voucher.user_usage_limit {
        Some(limit) if prior_usages >= limit => Err(VoucherRejection::UserLimitReached),
        _ => Ok(()),
    }
}

/// An empty tier list means the voucher is open to everyone. Otherwise the customer's tier must be listed. Anonymous
/// shoppers (`tier == None`) never qualify for a tier-restricted voucher.
pub fn check_tier(voucher: &Voucher, tier: Option<&str>) -> Result<(), VoucherRejection> {
    if voucher.allowed_tiers.is_empty() {
        return Ok(());
    }
    let tier = tier.map(normalize_tier);
    match tier {
        Some(t) if voucher.allowed_tiers.iter().any(|allowed| normalize_tier(allowed) == t) => Ok(()),
        _ => Err(VoucherRejection::TierNotAllowed),
    }
}

/// The discount `voucher` grants on `subtotal`. Always between zero and `subtotal` inclusive.
pub fn compute_discount(voucher: &Voucher, subtotal: Rupiah) -> Rupiah {
    let subtotal = subtotal.max(Rupiah::zero());
    let discount = match voucher.discount_type {
        DiscountType::Percentage => {
            let discount = subtotal.percentage(voucher.discount_value);
            match voucher.max_discount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        },
        DiscountType::Fixed => Rupiah::from(voucher.discount_value),
    };
    discount.clamp(Rupiah::zero(), subtotal)
}
