//! Invoice delivery for paid orders.
//!
//! When an order is paid, the order engine publishes an [`OrderPaidEvent`]. The hooks in this module forward the paid
//! order to an external invoice service. Dispatch happens after the payment has been committed, so a failure here is
//! logged and never touches the order itself.
use std::{
    collections::{hash_map::Entry, HashMap},
    future::Future,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::*;
use order_engine::{
    db_types::{Order, OrderId},
    events::{EventHandlers, EventHooks, OrderPaidEvent},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shop_common::Rupiah;
use thiserror::Error;

use crate::config::InvoiceConfig;

pub const INVOICE_EVENT_BUFFER_SIZE: usize = 25;
/// How long a payment is remembered after its invoice was sent.
pub const INVOICE_DEDUP_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

type PaymentKey = (OrderId, DateTime<Utc>);

#[derive(Debug, Clone, Error)]
pub enum InvoiceError {
    #[error("Could not initialize the invoice client. {0}")]
    Initialization(String),
    #[error("Could not reach the invoice service. {0}")]
    RequestError(String),
    #[error("The invoice service rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
}

/// Sends the invoice for a paid order somewhere.
pub trait InvoiceDispatcher: Clone + Send + Sync + 'static {
    fn dispatch(&self, order: &Order) -> impl Future<Output = Result<(), InvoiceError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_id: String,
    pub subtotal: Rupiah,
    pub shipping_cost: Rupiah,
    pub discount: Rupiah,
    pub total_amount: Rupiah,
    pub voucher_code: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Order> for InvoiceRequest {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            customer_id: order.customer_id.clone(),
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            discount: order.discount,
            total_amount: order.total_amount,
            voucher_code: order.voucher_code.clone(),
            payment_method: order.payment_method.clone(),
            paid_at: order.paid_at,
        }
    }
}

/// POSTs the invoice as JSON to a configured URL.
#[derive(Clone)]
pub struct HttpInvoiceDispatcher {
    url: String,
    client: Arc<Client>,
}

impl HttpInvoiceDispatcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, InvoiceError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| InvoiceError::Initialization(e.to_string()))?;
        Ok(Self { url: url.to_string(), client: Arc::new(client) })
    }
}

impl InvoiceDispatcher for HttpInvoiceDispatcher {
    async fn dispatch(&self, order: &Order) -> Result<(), InvoiceError> {
        let body = InvoiceRequest::from(order);
        trace!("🧾️ Sending invoice request to {}", self.url);
        let response = self
            .client
            .post(self.url.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| InvoiceError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🧾️ Invoice request successful. {}", response.status());
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(InvoiceError::Rejected { status, message })
        }
    }
}

/// Creates the event handlers that dispatch invoices over HTTP, as configured by `config`.
pub fn create_invoice_event_handlers(config: &InvoiceConfig) -> Result<EventHandlers, InvoiceError> {
    let dispatcher = HttpInvoiceDispatcher::new(&config.url, config.timeout)?;
    let hooks = invoice_hooks(dispatcher);
    Ok(EventHandlers::new(INVOICE_EVENT_BUFFER_SIZE, hooks))
}

/// Payments whose invoice has been handed to the dispatcher, and when that happened.
struct SentInvoices {
    retention: Duration,
    sent: HashMap<PaymentKey, Instant>,
}

impl SentInvoices {
    fn new(retention: Duration) -> Self {
        Self { retention, sent: HashMap::new() }
    }

    /// Claims `key` for dispatch. Returns false if the same payment was claimed less than `retention` ago. Entries
    /// older than that are forgotten.
    fn claim_at(&mut self, key: PaymentKey, now: Instant) -> bool {
        let retention = self.retention;
        self.sent.retain(|_, at| now.saturating_duration_since(*at) < retention);
        match self.sent.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            },
        }
    }

    fn release(&mut self, key: &PaymentKey) {
        self.sent.remove(key);
    }

    fn len(&self) -> usize {
        self.sent.len()
    }
}

/// Hooks `dispatcher` up to the `OrderPaid` event.
///
/// Invoices are deduplicated by `(order id, paid_at)` for [`INVOICE_DEDUP_RETENTION`]. If delivery fails, the entry is
/// released again so that a later event for the same payment would be sent.
pub fn invoice_hooks<D: InvoiceDispatcher>(dispatcher: D) -> EventHooks {
    let mut hooks = EventHooks::default();
    let sent = Arc::new(Mutex::new(SentInvoices::new(INVOICE_DEDUP_RETENTION)));
    hooks.on_order_paid(move |ev: OrderPaidEvent| {
        let order = ev.order;
        let key = (order.id.clone(), order.paid_at.unwrap_or(order.updated_at));
        let is_new = match sent.lock() {
            Ok(mut sent) => {
                let claimed = sent.claim_at(key.clone(), Instant::now());
                trace!("🧾️ {} payments in the invoice deduplication window", sent.len());
                claimed
            },
            Err(e) => {
                error!("🧾️ Invoice deduplication set is poisoned. {e}");
                return no_op();
            },
        };
        if !is_new {
            debug!("🧾️ An invoice for order {} has already been sent. Skipping.", order.order_number);
            return no_op();
        }
        let dispatcher = dispatcher.clone();
        let sent = Arc::clone(&sent);
        Box::pin(async move {
            match dispatcher.dispatch(&order).await {
                Ok(()) => info!("🧾️ Invoice for order {} dispatched", order.order_number),
                Err(e) => {
                    error!("🧾️ Could not dispatch the invoice for order {}. {e}", order.order_number);
                    if let Ok(mut sent) = sent.lock() {
                        sent.release(&key);
                    }
                },
            }
        })
    });
    hooks
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
