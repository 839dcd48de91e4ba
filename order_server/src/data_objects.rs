use std::fmt::Display;

use order_engine::{
    db_types::{Order, OrderItem},
    SweepResult,
};
use serde::{Deserialize, Serialize};
use shop_common::Rupiah;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyVoucherRequest {
    pub code: String,
    pub subtotal: Rupiah,
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRequestParams {
    pub customer_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveCancellationParams {
    /// Overrides the reason the customer gave, if any
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub success: bool,
    pub expired_count: usize,
    pub expired_order_numbers: Vec<String>,
}

impl From<SweepResult> for SweepResponse {
    fn from(result: SweepResult) -> Self {
        Self { success: true, expired_count: result.expired_count, expired_order_numbers: result.expired_order_numbers }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}
