//! Access control list middleware.
//!
//! Place it on any route or service that sits behind the identity middleware. It reads the caller's [`ActorClaims`]
//! from the request extensions and lets the request through if the caller holds *any* of the permitted roles.
//! Otherwise, a 403 Forbidden response is returned.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorUnauthorized},
    Error,
    HttpMessage,
};
use fulfillment_engine::db_types::Role;
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;

use crate::auth::ActorClaims;

pub struct AclMiddlewareFactory {
    permitted_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(permitted_roles: &[Role]) -> Self {
        AclMiddlewareFactory { permitted_roles: permitted_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { permitted_roles: self.permitted_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    permitted_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
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
        let permitted_roles = self.permitted_roles.clone();
        Box::pin(async move {
            let claims = req.extensions().get::<ActorClaims>().copied().ok_or_else(|| {
                warn!("🔐️ No caller identity found in request extensions");
                ErrorUnauthorized("No identity was provided.")
            })?;
            if claims.actor().has_role(&permitted_roles) {
                service.call(req).await
            } else {
                debug!("🔐️ {} may not call {}", claims.actor(), req.path());
                Err(ErrorForbidden("Insufficient permissions."))
            }
        })
    }
}
