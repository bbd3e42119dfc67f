//! API key middleware for Actix Web.
//!
//! Guards the back-office routes. Callers must send the configured admin key in the `X-Admin-Key` header. If no key
//! is configured, every request is refused.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use storefront_common::Secret;

use crate::errors::{AuthError, ServerError};

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

pub struct ApiKeyMiddlewareFactory {
    key: Option<Secret<String>>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(key: Option<Secret<String>>) -> Self {
        ApiKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    key: Option<Secret<String>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
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
        let check = check_api_key(self.key.as_ref(), &req);
        Box::pin(async move {
            match check {
                Ok(()) => {
                    trace!("🔐️ Admin key check for {} ✅️", req.path());
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Refusing admin request to {}. {e}", req.path());
                    Err(ServerError::from(e).into())
                },
            }
        })
    }
}

fn check_api_key(key: Option<&Secret<String>>, req: &ServiceRequest) -> Result<(), AuthError> {
    let key = key.ok_or(AuthError::AdminDisabled)?;
    let supplied = req.headers().get(ADMIN_KEY_HEADER).ok_or(AuthError::MissingApiKey)?;
    let supplied = supplied.to_str().map_err(|_| AuthError::InvalidApiKey)?;
    if key.matches(supplied) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}
