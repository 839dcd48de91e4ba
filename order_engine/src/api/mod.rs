//! # Order engine public API
//!
//! The `api` module exposes the programmatic API of the order engine. Each API is created by supplying a database
//! backend that implements the backend traits it requires:
//!
//! * [`order_flow_api`] owns every order state change. Admin actions, customer cancellation requests and the expiry
//!   sweep all go through it.
//! * [`webhook_api`] authenticates and interprets payment gateway notifications, then hands them to the order flow.
//! * [`voucher_api`] evaluates and redeems promotional vouchers.
//!
//! ```rust,ignore
//! use order_engine::{OrderFlowApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let result = api.sweep_expired_orders().await?;
//! ```
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_objects;
pub mod voucher_api;
pub mod webhook_api;
