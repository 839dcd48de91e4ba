//! Per-source request rate limiting.
//!
//! [`KeyedRateLimiter`] is a thin wrapper around a keyed [`governor`] limiter. Each source gets a quota of `limit`
//! requests per minute which replenishes continuously. State lives in process memory, so it only coordinates requests
//! handled by this process; replicated deployments need a [`RateLimiter`] backed by a shared counter instead.
use std::{num::NonZeroU32, time::Duration};

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota,
};
use log::*;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many requests. Retry in {} seconds", retry_after.as_secs())]
pub struct RateLimited {
    pub retry_after: Duration,
}

pub trait RateLimiter: Send + Sync {
    /// Records a request from `source`, or rejects it if the source has used up its quota.
    fn check(&self, source: &str) -> Result<(), RateLimited>;
}

/// Sources that have not been seen for a while are dropped once this many are being tracked.
const PURGE_THRESHOLD: usize = 10_000;

/// Allows a burst of up to `limit` requests per source, replenished at `limit` per minute.
pub struct KeyedRateLimiter<C: Clock = DefaultClock> {
    limit: u32,
    clock: C,
    limiter: governor::RateLimiter<String, DefaultKeyedStateStore<String>, C, NoOpMiddleware<C::Instant>>,
}

impl KeyedRateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::with_clock(limit, DefaultClock::default())
    }
}

impl<C: Clock> KeyedRateLimiter<C> {
    /// A limiter that reads the time from `clock`. A limit of zero is treated as one.
    pub fn with_clock(limit: u32, clock: C) -> Self {
        let limit = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
        let limiter = governor::RateLimiter::dashmap_with_clock(Quota::per_minute(limit), &clock);
        Self { limit: limit.get(), clock, limiter }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl<C> RateLimiter for KeyedRateLimiter<C>
where C: Clock + Send + Sync
{
    fn check(&self, source: &str) -> Result<(), RateLimited> {
        if self.limiter.len() > PURGE_THRESHOLD {
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
            trace!("Rate limiter purged idle sources. {} remain", self.limiter.len());
        }
        let key = source.to_string();
        self.limiter.check_key(&key).map_err(|not_until| {
            debug!("Rate limit of {} requests per minute exceeded for {source}", self.limit);
            RateLimited { retry_after: not_until.wait_time_from(self.clock.now()) }
        })
    }
}
