use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use fulfillment_engine::{
    db_types::{DeliveryTracking, Order, OrderItem, OrderNumber, OrderStatus, PaymentStatus, Role, TrackingStatus},
    order_objects::{OrderDetails, TrackingWithHistory},
    MarketplaceApi,
};
use market_common::Money;
use mockall::predicate::eq;

use super::{
    helpers::{api_request, as_actor, body_json},
    mocks::MockMarketplace,
};
use crate::routes::{MerchantOrdersRoute, MyOrdersRoute, OrderByIdRoute, OrderByNumberRoute, OrderTrackingRoute};

const CUSTOMER: i64 = 7;
const MERCHANT: i64 = 21;
const ORDER_NUMBER: &str = "ORD-K3M9X2QP7A";

fn order() -> Order {
    Order {
        id: 42,
        order_number: OrderNumber(ORDER_NUMBER.to_string()),
        customer_id: CUSTOMER,
        address_id: 3,
        subtotal: Money::from_major(65_000),
        shipping_cost: Money::from_major(10_000),
        total_price: Money::from_major(75_000),
        status: OrderStatus::Processing,
        payment_status: PaymentStatus::Paid,
        ..Default::default()
    }
}

fn details() -> OrderDetails {
    let item = OrderItem { order_id: 42, merchant_id: MERCHANT, quantity: 1, ..Default::default() };
    let tracking = DeliveryTracking { order_id: 42, status: TrackingStatus::WaitingMerchant, ..Default::default() };
    OrderDetails {
        order: order(),
        items: vec![item],
        merchant_payments: vec![],
        payments: vec![],
        tracking: Some(TrackingWithHistory { tracking, histories: vec![] }),
    }
}

fn configure(cfg: &mut ServiceConfig) {
    let mut db = MockMarketplace::new();
    db.expect_fetch_orders_for_customer().with(eq(CUSTOMER)).returning(|_| Ok(vec![order()]));
    db.expect_fetch_orders_for_customer().withf(|id| *id != CUSTOMER).returning(|_| Ok(vec![]));
    db.expect_fetch_orders_for_merchant()
        .with(eq(MERCHANT), eq(Some(OrderStatus::Processing)))
        .returning(|_, _| Ok(vec![order()]));
    db.expect_fetch_order_details().with(eq(42)).returning(|_| Ok(Some(details())));
    db.expect_fetch_order_details().withf(|id| *id != 42).returning(|_| Ok(None));
    db.expect_fetch_order_by_number().returning(|n| Ok((n == ORDER_NUMBER).then(order)));
    cfg.service(MyOrdersRoute::<MockMarketplace>::new())
        .service(OrderByNumberRoute::<MockMarketplace>::new())
        .service(OrderByIdRoute::<MockMarketplace>::new())
        .service(OrderTrackingRoute::<MockMarketplace>::new())
        .service(MerchantOrdersRoute::<MockMarketplace>::new())
        .app_data(web::Data::new(MarketplaceApi::new(db)));
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders"), CUSTOMER, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body_json(&body);
    assert_eq!(orders.as_array().map(|a| a.len()), Some(1));
    assert_eq!(orders[0]["order_number"], ORDER_NUMBER);
    assert_eq!(orders[0]["total_price"], 7_500_000);
    assert_eq!(orders[0]["payment_status"], "paid");
}

#[actix_web::test]
async fn another_customer_sees_no_orders() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders"), 8, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn order_details_for_owner() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/42"), CUSTOMER, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    let details = body_json(&body);
    assert_eq!(details["id"], 42);
    assert_eq!(details["items"][0]["merchant_id"], MERCHANT);
    assert_eq!(details["tracking"]["status"], "waiting_merchant");
}

#[actix_web::test]
async fn foreign_order_is_not_found() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/42"), 8, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Order not found"}"#);
}

#[actix_web::test]
async fn missing_order_looks_the_same_as_foreign_order() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/99"), CUSTOMER, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Order not found"}"#);
}

#[actix_web::test]
async fn merchant_sees_orders_with_their_items() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/42"), MERCHANT, Role::Merchant);
    let (status, _) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);

    let req = as_actor(TestRequest::get().uri("/api/orders/42"), MERCHANT + 1, Role::Merchant);
    let (status, _) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn drivers_cannot_see_orders_before_approval() {
    let _ = env_logger::try_init();
    // Still waiting on the merchant, so no driver may look yet
    let req = as_actor(TestRequest::get().uri("/api/orders/42"), 5, Role::Driver);
    let (status, _) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn order_by_number_is_case_insensitive() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/number/ord-k3m9x2qp7a"), CUSTOMER, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_json(&body)["order_number"], ORDER_NUMBER);
}

#[actix_web::test]
async fn malformed_order_number() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/number/ORD-123"), CUSTOMER, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Order not found"}"#);
}

#[actix_web::test]
async fn invalid_order_id() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/forty-two"), CUSTOMER, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body_json(&body)["error"].as_str().is_some_and(|e| e.starts_with("Could not read request path")));
}

#[actix_web::test]
async fn tracking_timeline() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/orders/42/tracking"), CUSTOMER, Role::Customer);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    let tracking = body_json(&body);
    assert_eq!(tracking["order_number"], ORDER_NUMBER);
    assert_eq!(tracking["status"], "waiting_merchant");
    assert_eq!(tracking["progress"], 30);
}

#[actix_web::test]
async fn merchant_orders_filtered_by_status() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/merchant/orders?status=processing"), MERCHANT, Role::Merchant);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_json(&body)[0]["id"], 42);
}

#[actix_web::test]
async fn customers_cannot_list_merchant_orders() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/merchant/orders"), CUSTOMER, Role::Customer);
    let (status, _) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
