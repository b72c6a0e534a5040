//! An order's whole life over HTTP, against a real SQLite database: checkout, payment notification, merchant approval,
//! delivery and the merchant's payout.
use actix_web::{
    http::{header::ContentType, StatusCode},
    test::TestRequest,
    web,
    App,
};
use fulfillment_engine::{
    db_types::Role,
    events::EventProducers,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{create_customer, create_driver, create_merchant, create_product},
    },
    DeliveryApi,
    FulfillmentSettings,
    MarketplaceApi,
    MarketplaceQueries,
    OrderFlowApi,
    SqliteDatabase,
    WithdrawalApi,
};
use log::info;
use market_common::Secret;
use serde_json::{json, Value};

use super::helpers::{as_actor, body_json, call, IDENTITY_SECRET, WEBHOOK_HEADER, WEBHOOK_SECRET};
use crate::{
    config::{RoutingConfig, ServerOptions},
    helpers::calculate_hmac,
    integrations::LocationIqRouter,
    middleware::{HmacMiddlewareFactory, IdentityMiddlewareFactory},
    routes::PaymentWebhookRoute,
    server::{configure_api_routes, configure_extractors},
};

async fn send(db: &SqliteDatabase, req: TestRequest) -> (StatusCode, String) {
    let settings = FulfillmentSettings::default();
    let producers = EventProducers::default();
    let router = LocationIqRouter::new(RoutingConfig::default());
    let options = ServerOptions { use_x_forwarded_for: false, use_forwarded: false };
    let app = App::new()
        .app_data(web::Data::new(OrderFlowApi::new(db.clone(), producers.clone(), settings)))
        .app_data(web::Data::new(MarketplaceApi::new(db.clone())))
        .app_data(web::Data::new(DeliveryApi::new(db.clone(), producers, router, &settings)))
        .app_data(web::Data::new(WithdrawalApi::new(db.clone(), &settings)))
        .app_data(web::Data::new(options))
        .configure(configure_extractors)
        .service(
            web::scope("/payments")
                .wrap(HmacMiddlewareFactory::new(WEBHOOK_HEADER, Secret::new(WEBHOOK_SECRET.to_string()), true))
                .service(PaymentWebhookRoute::<SqliteDatabase>::new()),
        )
        .service(
            web::scope("/api")
                .wrap(IdentityMiddlewareFactory::new(Secret::new(IDENTITY_SECRET.to_string()), true))
                .configure(configure_api_routes),
        );
    call(app, req).await
}

fn gateway_notification(transaction_id: &str, status: &str) -> TestRequest {
    let body = json!({
        "order_id": transaction_id,
        "transaction_status": status,
        "payment_type": "bank_transfer",
        "gross_amount": "140000.00"
    })
    .to_string();
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(ContentType::json())
        .insert_header((WEBHOOK_HEADER, signature))
        .set_payload(body)
}

fn driver_post(order_id: i64, action: &str, driver_id: i64) -> TestRequest {
    as_actor(TestRequest::post().uri(&format!("/api/driver/orders/{order_id}/{action}")), driver_id, Role::Driver)
}

fn expect(status: StatusCode, expected: StatusCode, body: String) -> Value {
    assert_eq!(status, expected, "Unexpected response: {body}");
    body_json(&body)
}

#[actix_web::test]
async fn order_lifecycle() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let (customer, address) = create_customer(&db, "Alice").await;
    let merchant = create_merchant(&db, "Bob's Bakery", 10).await;
    let product = create_product(&db, &merchant, "Sourdough", 65_000, 5).await;
    let driver = create_driver(&db, "Dave").await;
    db.add_to_cart(customer.id, product.id, 2).await.expect("Error adding to cart");

    info!("🚀️ Checkout");
    let req = as_actor(TestRequest::post().uri("/api/checkout"), customer.id, Role::Customer)
        .set_json(json!({ "address_id": address.id, "payment_method": "midtrans" }));
    let (status, body) = send(&db, req).await;
    let details = expect(status, StatusCode::CREATED, body);
    let order_id = details["id"].as_i64().expect("order id");
    // 2 x 65,000 plus 10,000 shipping
    assert_eq!(details["total_price"], 14_000_000);
    assert_eq!(details["status"], "pending");
    assert_eq!(details["tracking"]["status"], "pending_payment");
    let stock = db.fetch_product(product.id).await.expect("fetch product").expect("product exists").stock;
    assert_eq!(stock, 3);

    info!("🚀️ Drivers cannot take unpaid orders");
    let req = driver_post(order_id, "accept", driver.id);
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    info!("🚀️ Payment");
    let req = as_actor(TestRequest::post().uri(&format!("/api/orders/{order_id}/pay")), customer.id, Role::Customer);
    let (status, body) = send(&db, req).await;
    let payment = expect(status, StatusCode::OK, body);
    let transaction_id = payment["transaction_id"].as_str().expect("transaction id").to_string();
    assert_eq!(payment["amount"], 14_000_000);

    let (status, body) = send(&db, gateway_notification(&transaction_id, "settlement")).await;
    let outcome = expect(status, StatusCode::OK, body);
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["message"], "confirmed");
    // The gateway retries until it sees a 200. Repeats change nothing.
    let (status, body) = send(&db, gateway_notification(&transaction_id, "settlement")).await;
    assert_eq!(expect(status, StatusCode::OK, body)["message"], "already_confirmed");

    info!("🚀️ Merchant approval");
    let uri = format!("/api/merchant/orders/{order_id}/approve");
    let req = as_actor(TestRequest::post().uri(&uri), merchant.id, Role::Merchant);
    let (status, body) = send(&db, req).await;
    let approval = expect(status, StatusCode::OK, body);
    assert_eq!(approval["order_approved"], true);
    let req = as_actor(TestRequest::get().uri("/api/merchant/balance"), merchant.id, Role::Merchant);
    let (status, body) = send(&db, req).await;
    // 130,000 less 10% commission
    assert_eq!(expect(status, StatusCode::OK, body)["total_earnings"], 11_700_000);

    info!("🚀️ Delivery");
    let req = as_actor(TestRequest::get().uri("/api/driver/orders/available"), driver.id, Role::Driver);
    let (status, body) = send(&db, req).await;
    let available = expect(status, StatusCode::OK, body);
    assert!(available.as_array().is_some_and(|a| a.iter().any(|o| o["id"] == order_id)));

    let req = driver_post(order_id, "reject", driver.id).set_json(json!({ "reason": "   " }));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = driver_post(order_id, "reject", driver.id).set_json(json!({ "reason": "Flat tyre" }));
    let (status, body) = send(&db, req).await;
    assert_eq!(expect(status, StatusCode::OK, body)["status"], "waiting_driver");

    let req = driver_post(order_id, "accept", driver.id);
    let (status, body) = send(&db, req).await;
    assert_eq!(expect(status, StatusCode::OK, body)["status"], "driver_assigned");

    let req = driver_post(order_id, "location", driver.id)
        .set_json(json!({ "latitude": -6.2, "longitude": 106.81 }));
    let (status, body) = send(&db, req).await;
    assert_eq!(expect(status, StatusCode::OK, body)["current_latitude"], -6.2);

    // The pickup must say where it happened
    let req = driver_post(order_id, "start", driver.id).set_json(json!({ "pickup_photo": "pickups/alice.jpg" }));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = driver_post(order_id, "start", driver.id).set_json(json!({ "latitude": -6.2, "longitude": 106.81 }));
    let (status, body) = send(&db, req).await;
    assert_eq!(expect(status, StatusCode::OK, body)["status"], "on_the_way");

    let req = driver_post(order_id, "complete", driver.id).set_json(json!({ "latitude": -6.25, "longitude": 106.8 }));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = driver_post(order_id, "complete", driver.id)
        .set_json(json!({ "latitude": -6.25, "longitude": 106.8, "delivery_photo": "deliveries/alice.jpg" }));
    let (status, body) = send(&db, req).await;
    assert_eq!(expect(status, StatusCode::OK, body)["status"], "delivered");

    let uri = format!("/api/orders/{order_id}/tracking");
    let req = as_actor(TestRequest::get().uri(&uri), customer.id, Role::Customer);
    let (status, body) = send(&db, req).await;
    let tracking = expect(status, StatusCode::OK, body);
    assert_eq!(tracking["status"], "delivered");
    assert_eq!(tracking["progress"], 100);
    assert_eq!(tracking["delivery_photo"], "deliveries/alice.jpg");

    let uri = format!("/api/orders/{order_id}/cancel");
    let req = as_actor(TestRequest::post().uri(&uri), customer.id, Role::Customer)
        .set_json(json!({ "reason": "Changed my mind" }));
    let (status, _) = send(&db, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    info!("🚀️ Payout");
    let req = as_actor(TestRequest::post().uri("/api/merchant/withdrawals"), merchant.id, Role::Merchant)
        .set_json(json!({ "amount": 5_000_000 }));
    let (status, body) = send(&db, req).await;
    let withdrawal = expect(status, StatusCode::CREATED, body);
    assert_eq!(withdrawal["status"], "pending");
    let req = as_actor(TestRequest::get().uri("/api/admin/withdrawals?status=pending"), 1, Role::Admin);
    let (status, body) = send(&db, req).await;
    let pending = expect(status, StatusCode::OK, body);
    assert_eq!(pending[0]["id"], withdrawal["id"]);

    let _ = std::fs::remove_file(url.trim_start_matches("sqlite://"));
}

#[actix_web::test]
async fn webhook_rejects_bad_signatures() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database");
    let body = json!({ "order_id": "ORD-K3M9X2QP7A-1", "transaction_status": "settlement" }).to_string();

    let req = TestRequest::post().uri("/payments/webhook").insert_header(ContentType::json()).set_payload(body.clone());
    let (status, message) = send(&db, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message, "No HMAC signature found.");

    let forged = calculate_hmac("not-the-gateway", body.as_bytes());
    let req = TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(ContentType::json())
        .insert_header((WEBHOOK_HEADER, forged))
        .set_payload(body);
    let (status, message) = send(&db, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message, "Invalid HMAC signature.");

    let _ = std::fs::remove_file(url.trim_start_matches("sqlite://"));
}

#[actix_web::test]
async fn unknown_transactions_are_not_found() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database");
    let (status, body) = send(&db, gateway_notification("ORD-0000000000-1", "settlement")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body_json(&body)["error"].as_str().is_some_and(|e| e.ends_with("not found")));
    let _ = std::fs::remove_file(url.trim_start_matches("sqlite://"));
}
