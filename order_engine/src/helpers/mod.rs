mod gateway_signature;
mod rate_limiter;

pub use gateway_signature::{constant_time_eq, gateway_signature, verify_gateway_signature};
pub use rate_limiter::{KeyedRateLimiter, RateLimited, RateLimiter};
