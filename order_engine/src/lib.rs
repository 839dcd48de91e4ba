//! Storefront Order Engine
//!
//! The order engine owns the lifecycle of storefront orders. It reconciles order state against the asynchronous
//! notifications of a payment gateway, expires orders that were never paid, and validates promotional vouchers. It is
//! transport-agnostic: the HTTP surface lives in the `order_server` crate.
//!
//! The library is divided into these sections:
//! 1. Data types ([`mod@db_types`]) and the pure order [`mod@state_machine`] that decides which transitions are legal.
//! 2. Storage contracts ([`mod@traits`]) and the SQLite backend. You should never need to touch the database
//!    directly. Use the public APIs instead.
//! 3. The public APIs: [`OrderFlowApi`] (every state change, including the expiry sweep), [`PaymentWebhookApi`]
//!    (gateway notifications) and [`VoucherApi`].
//!
//! The engine also publishes events after every committed transition. See [`mod@events`] for how to hook into them.
mod api;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod state_machine;
pub mod traits;
pub mod voucher_validator;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use api::{
    errors::WebhookError,
    order_flow_api::OrderFlowApi,
    order_objects::{self, SweepResult, TransitionOutcome},
    payment_objects::{self, GatewayStatus, PaymentNotification},
    voucher_api::{VoucherApi, VoucherQuote, VoucherRedemption, DEFAULT_TIER},
    webhook_api::{PaymentWebhookApi, WebhookConfig, WebhookOutcome, DEFAULT_TEST_ORDER_PREFIX},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{OrderFlowError, OrderManagement, VoucherApiError, VoucherManagement};
