//! # Storage backend contracts
//!
//! The traits in this module define what a database backend has to provide to drive the order engine.
//!
//! * [`OrderManagement`] stores orders and their item snapshots, and applies state-machine updates with optimistic
//!   concurrency. It is the only way an order's lifecycle fields change.
//! * [`VoucherManagement`] stores vouchers, answers the eligibility queries the voucher validator needs, and records
//!   redemptions atomically.
//!
//! The public APIs ([`crate::OrderFlowApi`], [`crate::PaymentWebhookApi`], [`crate::VoucherApi`]) are generic over
//! these traits, so tests can substitute mocks.
mod order_management;
mod voucher_management;

pub use order_management::{OrderFlowError, OrderManagement};
pub use voucher_management::{VoucherApiError, VoucherManagement};
