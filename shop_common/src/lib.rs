mod rupiah;

pub mod helpers;
pub mod op;
mod secret;

pub use rupiah::{Rupiah, RupiahConversionError, CURRENCY_CODE};
pub use secret::Secret;
