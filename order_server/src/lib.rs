//! # Storefront order server
//! This crate hosts the HTTP surface of the storefront order engine. It is responsible for:
//! * Receiving payment notifications from the payment gateway and handing them to the engine.
//! * Quoting vouchers for the checkout flow.
//! * Order administration (fulfilment and cancellation decisions) and the payment expiry sweep.
//! * Dispatching invoices once an order has been paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /gateway/notification`: Payment notifications from the gateway. Rate-limited per source address.
//! * `POST /vouchers/apply`: Checks a voucher code against a subtotal and returns the discount.
//! * `POST /orders/{id}/request_cancellation`: Customers ask for an order to be cancelled.
//! * `/api/*`: Admin and scheduler routes. These require the `X-Admin-Key` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
