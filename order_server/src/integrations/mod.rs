pub mod invoice;

pub use invoice::{create_invoice_event_handlers, invoice_hooks, HttpInvoiceDispatcher, InvoiceDispatcher, InvoiceError};
