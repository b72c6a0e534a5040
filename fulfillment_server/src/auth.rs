//! Caller identity.
//!
//! The identity middleware verifies the `x-actor-*` headers and stores an [`ActorClaims`] in the request extensions.
//! Handlers take `ActorClaims` as an argument to learn who is calling.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use fulfillment_engine::{db_types::Role, Actor};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, ServerError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_SIGNATURE_HEADER: &str = "x-actor-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorClaims {
    pub id: i64,
    pub role: Role,
}

impl ActorClaims {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

impl FromRequest for ActorClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<ActorClaims>().copied().ok_or_else(|| {
            warn!("🔐️ No caller identity found in request extensions for {}", req.path());
            ServerError::AuthenticationError(AuthError::MissingIdentity(ACTOR_ID_HEADER.into()))
        });
        ready(claims)
    }
}
