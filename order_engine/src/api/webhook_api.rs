//! # Payment notification processing
//!
//! The gateway posts a notification whenever a transaction changes state. A notification is handled in these steps:
//!
//! 1. Required fields must be present.
//! 2. The signature is recomputed and compared in constant time. A mismatch never touches any order.
//! 3. Notifications for the gateway's connectivity test orders (identified by a fixed order id prefix) are acknowledged
//!    without further processing.
//! 4. The transaction status is mapped to an [`OrderTrigger`] and applied through the [`OrderFlowApi`].
//!
//! Re-delivery of a notification is harmless. The second delivery finds the order already in the target state and
//! results in a no-op or a benign conflict, so the paid hook (and invoice dispatch behind it) fires only once.
//!
//! Rate limiting by source address happens in the HTTP layer, before the notification reaches this API.
use std::fmt::Debug;

use log::*;
use shop_common::{Rupiah, Secret};

use crate::{
    api::{
        errors::WebhookError,
        order_flow_api::OrderFlowApi,
        order_objects::TransitionOutcome,
        payment_objects::{GatewayStatus, PaymentNotification},
    },
    db_types::OrderId,
    helpers::verify_gateway_signature,
    traits::OrderManagement,
};

pub const DEFAULT_TEST_ORDER_PREFIX: &str = "payment_notif_test";

#[derive(Clone)]
pub struct WebhookConfig {
    /// The secret shared with the gateway
    pub server_key: Secret<String>,
    /// Order ids starting with this prefix belong to the gateway's test notifications
    pub test_order_prefix: String,
}

impl WebhookConfig {
    pub fn new(server_key: Secret<String>) -> Self {
        Self { server_key, test_order_prefix: DEFAULT_TEST_ORDER_PREFIX.to_string() }
    }

    pub fn with_test_order_prefix(mut self, prefix: &str) -> Self {
        self.test_order_prefix = prefix.to_string();
        self
    }
}

impl Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookConfig {{ server_key: {}, test_order_prefix: {} }}", self.server_key, self.test_order_prefix)
    }
}

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// A connectivity test from the gateway. Nothing was changed.
    TestNotification,
    Processed { status: GatewayStatus, outcome: TransitionOutcome },
}

pub struct PaymentWebhookApi<B> {
    flow: OrderFlowApi<B>,
    config: WebhookConfig,
}

impl<B> Debug for PaymentWebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentWebhookApi ({:?})", self.config)
    }
}

impl<B> PaymentWebhookApi<B> {
    pub fn new(flow: OrderFlowApi<B>, config: WebhookConfig) -> Self {
        Self { flow, config }
    }

    pub fn flow(&self) -> &OrderFlowApi<B> {
        &self.flow
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }
}

impl<B> PaymentWebhookApi<B>
where B: OrderManagement
{
    pub async fn process_notification(&self, notification: PaymentNotification) -> Result<WebhookOutcome, WebhookError> {
        validate_fields(&notification)?;
        let PaymentNotification { order_id, transaction_status, status_code, gross_amount, signature_key, .. } =
            &notification;
        let key = self.config.server_key.reveal();
        if key.is_empty() || !verify_gateway_signature(order_id, status_code, gross_amount, key, signature_key) {
            warn!("💳️ Rejected payment notification for order {order_id} with an invalid signature");
            return Err(WebhookError::AuthenticationError);
        }
        if !self.config.test_order_prefix.is_empty() && order_id.starts_with(&self.config.test_order_prefix) {
            info!("💳️ Acknowledged gateway test notification {order_id} ({transaction_status})");
            return Ok(WebhookOutcome::TestNotification);
        }
        let status = transaction_status.parse::<GatewayStatus>().map_err(WebhookError::ValidationError)?;
        let amount = gross_amount
            .parse::<Rupiah>()
            .map_err(|e| WebhookError::ValidationError(format!("Invalid gross_amount. {e}")))?;
        let id = OrderId::from(order_id.as_str());
        let trigger = status.to_trigger(notification.payment_type.clone());
        debug!("💳️ Payment notification for order {id}: {status} ({amount}). Applying {trigger}");
        let outcome = self.flow.apply_trigger(&id, trigger).await.map_err(|e| {
            warn!("💳️ Payment notification for order {id} failed. {e}");
            WebhookError::from(e)
        })?;
        let order = outcome.order();
        if amount != order.total_amount {
            warn!(
                "💳️ Gateway reported {amount} for order {} ({status}) but the order total is {}",
                order.order_number, order.total_amount
            );
        }
        if outcome.newly_paid() {
            info!("💳️ Order {} has been paid", order.order_number);
        }
        Ok(WebhookOutcome::Processed { status, outcome })
    }
}

fn validate_fields(notification: &PaymentNotification) -> Result<(), WebhookError> {
    let required = [
        ("order_id", &notification.order_id),
        ("transaction_status", &notification.transaction_status),
        ("status_code", &notification.status_code),
        ("gross_amount", &notification.gross_amount),
        ("signature_key", &notification.signature_key),
    ];
    match required.iter().find(|(_, v)| v.trim().is_empty()) {
        Some((name, _)) => Err(WebhookError::ValidationError(format!("{name} is required"))),
        None => Ok(()),
    }
}
