//! Admin key middleware for the order server.
//! This middleware can be placed on any route or scope.
//!
//! It checks the `X-Admin-Key` header of the incoming request against the configured admin key. If the key matches,
//! the request is allowed to continue. Otherwise a `401 Unauthorized` response is returned. If no admin key has been
//! configured, every request is refused.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ok, Ready};
use log::{trace, warn};
use order_engine::helpers::constant_time_eq;
use shop_common::Secret;

use crate::errors::ServerError;

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

pub struct AdminKeyMiddlewareFactory {
    key: Secret<String>,
}

impl AdminKeyMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        AdminKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) })
    }
}

pub struct AdminKeyMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let expected = self.key.clone();
        Box::pin(async move {
            let provided = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
            let authorized = !expected.is_empty() &&
                !provided.is_empty() &&
                constant_time_eq(expected.reveal().as_bytes(), provided.as_bytes());
            if authorized {
                trace!("🔐️ Admin key accepted for {}", req.path());
                service.call(req).await
            } else {
                let source = req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string();
                warn!("🔐️ Refused admin request to {} from {source}", req.path());
                Err(ServerError::AuthenticationError("A valid admin key is required".to_string()).into())
            }
        })
    }
}
