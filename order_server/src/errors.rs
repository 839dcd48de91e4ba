use std::time::Duration;

use actix_web::{
    error::ResponseError,
    http::{
        header::{ContentType, RETRY_AFTER},
        StatusCode,
    },
    HttpResponse,
};
use log::error;
use order_engine::{voucher_validator::VoucherRejection, OrderFlowError, VoucherApiError, WebhookError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The order cannot be changed. {0}")]
    Conflict(String),
    #[error("Too many requests. Try again in {} seconds.", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("{}", .0.message())]
    VoucherRejected(VoucherRejection),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::VoucherRejected(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        builder.insert_header(ContentType::json());
        let body = match self {
            Self::RateLimited { retry_after } => {
                // Round up, so that a client never retries before the window has moved on
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                builder.insert_header((RETRY_AFTER, secs.max(1).to_string()));
                serde_json::json!({ "error": self.to_string() })
            },
            Self::VoucherRejected(reason) => serde_json::json!({ "error": reason.message(), "code": reason.code() }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        builder.body(body.to_string())
    }
}

impl From<WebhookError> for ServerError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::ValidationError(_) => Self::InvalidRequestBody(e.to_string()),
            WebhookError::AuthenticationError => Self::AuthenticationError(e.to_string()),
            WebhookError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            WebhookError::InternalError(_) => {
                error!("💻️ Payment notification could not be processed. {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            OrderFlowError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<VoucherApiError> for ServerError {
    fn from(e: VoucherApiError) -> Self {
        match e {
            VoucherApiError::Rejected(reason) => Self::VoucherRejected(reason),
            VoucherApiError::ValidationError(msg) => Self::InvalidRequestBody(msg),
            VoucherApiError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            VoucherApiError::OrderNotEligible(_) => Self::Conflict(e.to_string()),
            VoucherApiError::DatabaseError(_) => Self::BackendError(e.to_string()),
        }
    }
}
