//! Identity middleware.
//!
//! Every `/api` request carries the caller's identity, as established by the authentication service in front of this
//! server:
//! * `x-actor-id`: the user id
//! * `x-actor-role`: one of `customer`, `merchant`, `driver`, `admin`
//! * `x-actor-signature`: base64 HMAC-SHA256 of `"{id}:{role}"`, keyed with `MKT_IDENTITY_SECRET`
//!
//! Verified identities are stored in the request extensions as [`ActorClaims`], where the ACL middleware and the
//! handlers pick them up. The role is checked once, here, and never re-derived further down.

use std::{
    future::{ready, Ready},
    rc::Rc,
    str::FromStr,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use fulfillment_engine::db_types::Role;
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use market_common::Secret;

use crate::{
    auth::{ActorClaims, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, ACTOR_SIGNATURE_HEADER},
    errors::{AuthError, ServerError},
    helpers::{identity_message, verify_hmac},
};

pub struct IdentityMiddlewareFactory {
    key: Secret<String>,
    // If false, the signature header is not required and identities are taken at face value
    enabled: bool,
}

impl IdentityMiddlewareFactory {
    pub fn new(key: Secret<String>, enabled: bool) -> Self {
        IdentityMiddlewareFactory { key, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = IdentityMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityMiddlewareService { key: self.key.clone(), enabled: self.enabled, service: Rc::new(service) }))
    }
}

pub struct IdentityMiddlewareService<S> {
    key: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IdentityMiddlewareService<S>
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
        let verified = verify_identity(&req, self.key.reveal(), self.enabled);
        Box::pin(async move {
            let claims = verified.map_err(|e| {
                warn!("🔐️ Rejecting request to {}. {e}", req.path());
                Error::from(e)
            })?;
            trace!("🔐️ Request to {} from {} #{}", req.path(), claims.role, claims.id);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn header<'a>(req: &'a ServiceRequest, name: &str) -> Result<&'a str, ServerError> {
    req.headers()
        .get(name)
        .ok_or_else(|| AuthError::MissingIdentity(name.to_string()))?
        .to_str()
        .map_err(|e| AuthError::PoorlyFormattedIdentity(format!("{name}. {e}")).into())
}

fn verify_identity(req: &ServiceRequest, secret: &str, enabled: bool) -> Result<ActorClaims, ServerError> {
    let id = header(req, ACTOR_ID_HEADER)?
        .trim()
        .parse::<i64>()
        .map_err(|e| AuthError::PoorlyFormattedIdentity(format!("{ACTOR_ID_HEADER}. {e}")))?;
    let role_str = header(req, ACTOR_ROLE_HEADER)?.trim();
    let role = Role::from_str(role_str).map_err(|e| AuthError::PoorlyFormattedIdentity(e.to_string()))?;
    if enabled {
        let signature = header(req, ACTOR_SIGNATURE_HEADER)?;
        if !verify_hmac(secret, identity_message(id, role_str).as_bytes(), signature) {
            return Err(AuthError::InvalidSignature.into());
        }
    }
    Ok(ActorClaims::new(id, role))
}
