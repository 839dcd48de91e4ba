use thiserror::Error;

use crate::{db_types::OrderId, traits::OrderFlowError};

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Invalid payment notification: {0}")]
    ValidationError(String),
    #[error("Payment notification signature is invalid")]
    AuthenticationError,
    #[error("Payment notification refers to unknown order {0}")]
    NotFound(OrderId),
    #[error("Could not process payment notification: {0}")]
    InternalError(String),
}

impl From<OrderFlowError> for WebhookError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::OrderNotFound(id) => WebhookError::NotFound(id),
            e => WebhookError::InternalError(e.to_string()),
        }
    }
}
