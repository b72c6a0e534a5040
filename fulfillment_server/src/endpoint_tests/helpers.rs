use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use fulfillment_engine::db_types::Role;
use log::debug;
use market_common::Secret;

use crate::{
    auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, ACTOR_SIGNATURE_HEADER},
    helpers::{calculate_hmac, identity_message},
    middleware::IdentityMiddlewareFactory,
    server::configure_extractors,
};

// Test-only keys. DO NOT re-use these anywhere.
pub const IDENTITY_SECRET: &str = "identity-secret-for-endpoint-tests";
pub const WEBHOOK_SECRET: &str = "webhook-secret-for-endpoint-tests";
pub const WEBHOOK_HEADER: &str = "X-Callback-Signature";

pub fn sign_identity(id: i64, role: Role) -> String {
    calculate_hmac(IDENTITY_SECRET, identity_message(id, &role.to_string()).as_bytes())
}

/// Adds a correctly signed identity for the given user to the request.
pub fn as_actor(req: TestRequest, id: i64, role: Role) -> TestRequest {
    req.insert_header((ACTOR_ID_HEADER, id.to_string()))
        .insert_header((ACTOR_ROLE_HEADER, role.to_string()))
        .insert_header((ACTOR_SIGNATURE_HEADER, sign_identity(id, role)))
}

/// Sends `req` to an `/api` scope configured by `configure`, behind the identity middleware.
///
/// Errors raised by middleware come back from actix as `Err`, while handler errors are already responses. Both are
/// flattened into a status code and body so that tests can treat them alike.
pub async fn api_request(req: TestRequest, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let identity = IdentityMiddlewareFactory::new(Secret::new(IDENTITY_SECRET.to_string()), true);
    let app =
        App::new().configure(configure_extractors).service(web::scope("/api").wrap(identity).configure(configure));
    call(app, req).await
}

pub async fn call<T, B>(app: App<T>, req: TestRequest) -> (StatusCode, String)
where
    T: actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<B>,
            Error = actix_web::Error,
            InitError = (),
        > + 'static,
    B: MessageBody + 'static,
{
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}

pub fn body_json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON. {e}: {body}"))
}
