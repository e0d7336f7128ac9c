//! Shared-secret middleware for the admin surface.
//!
//! Admin requests carry the configured API key in the `X-Admin-Api-Key` header. The comparison is constant
//! time, and an unconfigured key locks the surface down entirely rather than leaving it open.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use pasal_common::Secret;

use crate::helpers::api_keys_match;

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Api-Key";

pub struct AdminAuthMiddlewareFactory {
    key: Secret<String>,
}

impl AdminAuthMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        AdminAuthMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct AdminAuthMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddlewareService<S>
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
        let expected = self.key.reveal().clone();
        Box::pin(async move {
            trace!("🔐️ Checking admin API key for request");
            let presented = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok());
            let Some(presented) = presented else {
                warn!("🔐️ No admin API key found in request. Denying access.");
                return Err(ErrorUnauthorized("Missing admin API key."));
            };
            if api_keys_match(&expected, presented) {
                trace!("🔐️ Admin API key check ✅️");
                service.call(req).await
            } else {
                warn!("🔐️ Invalid admin API key presented. Denying access.");
                Err(ErrorUnauthorized("Invalid admin API key."))
            }
        })
    }
}
