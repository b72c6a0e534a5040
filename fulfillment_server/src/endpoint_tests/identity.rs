use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use fulfillment_engine::{db_types::Role, MarketplaceApi};

use super::{
    helpers::{api_request, as_actor},
    mocks::MockMarketplace,
};
use crate::{
    auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, ACTOR_SIGNATURE_HEADER},
    routes::MyOrdersRoute,
};

fn configure(cfg: &mut ServiceConfig) {
    let mut db = MockMarketplace::new();
    db.expect_fetch_orders_for_customer().returning(|_| Ok(vec![]));
    cfg.service(MyOrdersRoute::<MockMarketplace>::new()).app_data(web::Data::new(MarketplaceApi::new(db)));
}

#[actix_web::test]
async fn no_identity_headers() {
    let _ = env_logger::try_init();
    let (status, body) = api_request(TestRequest::get().uri("/api/orders"), configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Authentication Error. No identity was provided. Missing x-actor-id.");
}

#[actix_web::test]
async fn missing_signature() {
    let _ = env_logger::try_init();
    let req = TestRequest::get()
        .uri("/api/orders")
        .insert_header((ACTOR_ID_HEADER, "7"))
        .insert_header((ACTOR_ROLE_HEADER, "customer"));
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Authentication Error. No identity was provided. Missing x-actor-signature.");
}

#[actix_web::test]
async fn signature_for_another_user() {
    let _ = env_logger::try_init();
    // A valid signature for customer #7, presented as customer #8
    let req = as_actor(TestRequest::get().uri("/api/orders"), 7, Role::Customer).insert_header((ACTOR_ID_HEADER, "8"));
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Authentication Error. The identity signature is invalid.");
}

#[actix_web::test]
async fn escalated_role() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders"), 7, Role::Customer)
        .insert_header((ACTOR_ROLE_HEADER, "admin"));
    let (status, _) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn unknown_role() {
    let _ = env_logger::try_init();
    let req = TestRequest::get()
        .uri("/api/orders")
        .insert_header((ACTOR_ID_HEADER, "7"))
        .insert_header((ACTOR_ROLE_HEADER, "superuser"))
        .insert_header((ACTOR_SIGNATURE_HEADER, "AAAA"));
    let (status, _) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn wrong_role_for_route() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders"), 3, Role::Driver);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Insufficient permissions.");
}

#[actix_web::test]
async fn signed_customer_is_let_through() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders"), 7, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}
