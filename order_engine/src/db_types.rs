use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_common::Rupiah;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(&'static str, String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The opaque primary key of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderStatusType     -------------------------------------------------------
/// The order lifecycle. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    AwaitingPayment,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError("order status", s.to_string())),
        }
    }
}

//--------------------------------------    PaymentStatusType    -------------------------------------------------------
/// The payment lifecycle. `Failed` and `Expired` are terminal; `Paid` is terminal for payment purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatusType {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PaymentStatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl Display for PaymentStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            s => Err(ConversionError("payment status", s.to_string())),
        }
    }
}

//--------------------------------------       OrderState        -------------------------------------------------------
/// The pair of state dimensions that every order write is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderState {
    pub status: OrderStatusType,
    pub payment_status: PaymentStatusType,
}

impl OrderState {
    pub fn new(status: OrderStatusType, payment_status: PaymentStatusType) -> Self {
        Self { status, payment_status }
    }

    pub fn initial() -> Self {
        Self::new(OrderStatusType::AwaitingPayment, PaymentStatusType::Pending)
    }
}

impl Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.status, self.payment_status)
    }
}

//--------------------------------------          Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable, unique and immutable
    pub order_number: String,
    pub customer_id: String,
    pub subtotal: Rupiah,
    pub shipping_cost: Rupiah,
    pub discount: Rupiah,
    pub total_amount: Rupiah,
    pub voucher_code: Option<String>,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub payment_method: Option<String>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancellation_requested: bool,
    pub cancellation_request_reason: Option<String>,
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn state(&self) -> OrderState {
        OrderState::new(self.status, self.payment_status)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatusType::Paid
    }
}

//--------------------------------------        NewOrder         -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: String,
    pub subtotal: Rupiah,
    pub shipping_cost: Rupiah,
    /// The voucher discount, as recomputed on the server at finalization time
    pub discount: Rupiah,
    pub voucher_code: Option<String>,
    pub payment_method: Option<String>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(id: OrderId, order_number: &str, customer_id: &str, subtotal: Rupiah, shipping_cost: Rupiah) -> Self {
        Self {
            id,
            order_number: order_number.to_string(),
            customer_id: customer_id.to_string(),
            subtotal,
            shipping_cost,
            discount: Rupiah::zero(),
            voucher_code: None,
            payment_method: None,
            payment_deadline: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_payment_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.payment_deadline = Some(deadline);
        self
    }

    pub fn with_voucher(mut self, code: &str, discount: Rupiah) -> Self {
        self.voucher_code = Some(code.to_uppercase());
        self.discount = discount;
        self
    }

    pub fn total_amount(&self) -> Rupiah {
        self.subtotal + self.shipping_cost - self.discount
    }
}

//--------------------------------------        OrderItem        -------------------------------------------------------
/// A snapshot of a purchased product, taken when the order was created. Never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub line_index: i64,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Rupiah,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Rupiah,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn new(product_id: &str, product_name: &str, price: Rupiah, quantity: i64) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_name: product_name.to_string(),
            product_image: None,
            price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Rupiah {
        self.price * self.quantity
    }
}

//--------------------------------------      DiscountType       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::Fixed => write!(f, "fixed"),
        }
    }
}

//--------------------------------------         Voucher         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    /// Always upper-case
    pub code: String,
    pub discount_type: DiscountType,
    /// A whole percentage for `Percentage` vouchers, or an amount in rupiah for `Fixed` vouchers
    pub discount_value: i64,
    pub min_purchase: Option<Rupiah>,
    /// Only applies to `Percentage` vouchers
    pub max_discount: Option<Rupiah>,
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    pub user_usage_limit: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub active: bool,
    #[sqlx(json)]
    pub allowed_tiers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVoucher {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_purchase: Option<Rupiah>,
    pub max_discount: Option<Rupiah>,
    pub usage_limit: Option<i64>,
    pub user_usage_limit: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub active: bool,
    pub allowed_tiers: Vec<String>,
}

impl NewVoucher {
    pub fn percentage(code: &str, percent: i64) -> Self {
        Self::new(code, DiscountType::Percentage, percent)
    }

    pub fn fixed(code: &str, amount: Rupiah) -> Self {
        Self::new(code, DiscountType::Fixed, amount.value())
    }

    fn new(code: &str, discount_type: DiscountType, discount_value: i64) -> Self {
        Self {
            code: normalize_voucher_code(code),
            discount_type,
            discount_value,
            min_purchase: None,
            max_discount: None,
            usage_limit: None,
            user_usage_limit: None,
            valid_from: None,
            valid_until: None,
            active: true,
            allowed_tiers: Vec::new(),
        }
    }

    pub fn with_min_purchase(mut self, amount: Rupiah) -> Self {
        self.min_purchase = Some(amount);
        self
    }

    pub fn with_max_discount(mut self, amount: Rupiah) -> Self {
        self.max_discount = Some(amount);
        self
    }

    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    pub fn with_user_usage_limit(mut self, limit: i64) -> Self {
        self.user_usage_limit = Some(limit);
        self
    }

    pub fn with_validity(mut self, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    pub fn with_allowed_tiers(mut self, tiers: &[&str]) -> Self {
        self.allowed_tiers = tiers.iter().map(|t| normalize_tier(t)).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Voucher codes are matched case-insensitively by storing and looking them up in upper case.
pub fn normalize_voucher_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn normalize_tier(tier: &str) -> String {
    tier.trim().to_lowercase()
}

//--------------------------------------      VoucherUsage       -------------------------------------------------------
/// Records that a customer consumed a voucher on an order. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VoucherUsage {
    pub id: i64,
    pub voucher_id: i64,
    pub customer_id: String,
    pub order_id: OrderId,
    pub discount: Rupiah,
    pub created_at: DateTime<Utc>,
}
