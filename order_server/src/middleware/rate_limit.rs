//! Rate limiting middleware for Actix Web.
//!
//! Requests are counted per source address (see [`get_remote_ip`](crate::helpers::get_remote_ip)) by a
//! [`RateLimiter`]. Once a source has used up its quota, further requests are refused with a `429 Too Many Requests`
//! response and a `Retry-After` header until the window moves on.
//!
//! The limiter is shared by all workers, so create it once and hand a clone of the `Arc` to each app instance.
use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use order_engine::helpers::RateLimiter;

use crate::{config::ServerOptions, errors::ServerError, helpers::remote_ip_key};

pub struct RateLimitMiddlewareFactory {
    limiter: Arc<dyn RateLimiter>,
    options: ServerOptions,
}

impl RateLimitMiddlewareFactory {
    pub fn new(limiter: Arc<dyn RateLimiter>, options: ServerOptions) -> Self {
        RateLimitMiddlewareFactory { limiter, options }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = RateLimitMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            limiter: Arc::clone(&self.limiter),
            options: self.options,
            service: Rc::new(service),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    limiter: Arc<dyn RateLimiter>,
    options: ServerOptions,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let source = remote_ip_key(req.request(), self.options);
        let verdict = self.limiter.check(&source);
        Box::pin(async move {
            match verdict {
                Ok(()) => {
                    trace!("🚦️ Request from {source} is within its rate limit");
                    service.call(req).await
                },
                Err(limited) => {
                    warn!("🚦️ Rate limit exceeded for {source} on {}. {limited}", req.path());
                    Err(ServerError::RateLimited { retry_after: limited.retry_after }.into())
                },
            }
        })
    }
}
