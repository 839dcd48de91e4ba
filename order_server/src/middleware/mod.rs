mod admin_key;
mod rate_limit;

pub use admin_key::{AdminKeyMiddlewareFactory, AdminKeyMiddlewareService, ADMIN_KEY_HEADER};
pub use rate_limit::{RateLimitMiddlewareFactory, RateLimitMiddlewareService};
