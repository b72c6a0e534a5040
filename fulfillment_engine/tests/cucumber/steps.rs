use std::time::Duration;

use cucumber::{then, when};
use fulfillment_engine::{
    db_types::{MerchantPaymentStatus, OrderStatus, PaymentMethod, PaymentStatus, TrackingStatus},
    order_objects::CheckoutRequest,
    payment_objects::GatewayNotification,
    tracking_objects::{DeliveryProof, PickupProof},
    withdrawal_objects::WithdrawalRequest,
    Actor,
    MarketplaceQueries,
};
use market_common::Money;

use crate::cucumber::MarketWorld;

#[when(expr = "the customer adds {int} {string} to the cart")]
async fn add_to_cart(world: &mut MarketWorld, quantity: i64, name: String) {
    let system = world.system();
    let product_id = system.product(&name).id;
    system.db.add_to_cart(system.market.customer.id, product_id, quantity).await.expect("Error adding to cart");
}

async fn checkout(world: &mut MarketWorld, method: PaymentMethod, voucher: Option<String>) {
    let system = world.system_mut();
    let mut request = CheckoutRequest::new(system.market.address.id, method);
    if let Some(code) = voucher {
        request = request.with_voucher(code);
    }
    let result = system.orders.checkout(system.market.customer.id, request).await;
    if let Some(details) = system.record(result) {
        system.order = Some(details.order);
    }
}

#[when(expr = "the customer checks out paying with {word}")]
async fn checkout_with(world: &mut MarketWorld, method: PaymentMethod) {
    checkout(world, method, None).await;
}

#[when(expr = "the customer checks out paying with {word} using voucher {word}")]
async fn checkout_with_voucher(world: &mut MarketWorld, method: PaymentMethod, code: String) {
    checkout(world, method, Some(code)).await;
}

#[when(expr = "the payment gateway reports {string} for the order")]
async fn gateway_reports(world: &mut MarketWorld, status: String) {
    let system = world.system_mut();
    let order = system.order().clone();
    let payment = system.orders.initiate_payment(order.customer_id, order.id).await.expect("Error opening payment");
    let notification = GatewayNotification::new(payment.transaction_id.as_str(), status.as_str());
    let result = system.orders.process_gateway_notification(notification).await;
    system.record(result);
}

#[when("the merchant approves the order")]
async fn merchant_approves(world: &mut MarketWorld) {
    let system = world.system_mut();
    let result = system.orders.approve_order(system.market.merchant.id, system.order().id).await;
    system.record(result);
}

#[when(expr = "the merchant rejects the order because {string}")]
async fn merchant_rejects(world: &mut MarketWorld, reason: String) {
    let system = world.system_mut();
    let result = system.orders.reject_order(system.market.merchant.id, system.order().id, &reason).await;
    system.record(result);
}

#[when("the customer cancels the order")]
async fn customer_cancels(world: &mut MarketWorld) {
    let system = world.system_mut();
    let actor = Actor::customer(system.market.customer.id);
    let result = system.orders.cancel_order(&actor, system.order().id, "").await;
    system.record(result);
}

#[when("the driver accepts the order")]
async fn driver_accepts(world: &mut MarketWorld) {
    let system = world.system_mut();
    let result = system.deliveries.accept_order(system.market.driver.id, system.order().id).await;
    system.record(result);
}

#[when("the driver picks up the order")]
async fn driver_picks_up(world: &mut MarketWorld) {
    let system = world.system_mut();
    let proof = PickupProof::new(-6.1754, 106.8272);
    let result = system.deliveries.start_delivery(system.market.driver.id, system.order().id, proof).await;
    system.record(result);
}

#[when("the driver delivers the order")]
async fn driver_delivers(world: &mut MarketWorld) {
    let system = world.system_mut();
    let proof = DeliveryProof::new(-6.2088, 106.8456, "delivery/door.jpg");
    let result = system.deliveries.complete_delivery(system.market.driver.id, system.order().id, proof).await;
    system.record(result);
}

#[when(expr = "the merchant asks to withdraw {int}")]
async fn merchant_withdraws(world: &mut MarketWorld, amount: i64) {
    let system = world.system_mut();
    let request = WithdrawalRequest { amount: Money::from_major(amount), notes: None };
    let result = system.withdrawals.request_withdrawal(system.market.merchant.id, request).await;
    system.record(result);
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut MarketWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then("the step succeeds")]
async fn step_succeeds(world: &mut MarketWorld) {
    let system = world.system();
    assert!(system.last_error.is_none(), "Unexpected error: {:?}", system.last_error);
}

#[then(expr = "the step fails with {string}")]
async fn step_fails(world: &mut MarketWorld, message: String) {
    let err = world.system().last_error.as_ref().expect("The step did not fail");
    assert!(err.to_string().contains(&message), "Expected an error containing '{message}', got '{err}'");
}

#[then(expr = "the order has {word} of {int}")]
async fn order_amount(world: &mut MarketWorld, field: String, value: i64) {
    let order = world.system().order();
    let expected = Money::from_major(value);
    match field.as_str() {
        "subtotal" => assert_eq!(order.subtotal, expected, "Subtotal is incorrect"),
        "shipping_cost" => assert_eq!(order.shipping_cost, expected, "Shipping cost is incorrect"),
        "discount" => assert_eq!(order.discount, expected, "Discount is incorrect"),
        "total_price" => assert_eq!(order.total_price, expected, "Total price is incorrect"),
        _ => panic!("Unknown field {field}"),
    }
}

#[then(expr = "the order status is {word}")]
async fn order_status(world: &mut MarketWorld, status: OrderStatus) {
    let system = world.system();
    let order = system.db.fetch_order(system.order().id).await.expect("Error fetching order").expect("No order");
    assert_eq!(order.status, status, "Order status is incorrect");
}

#[then(expr = "the payment status is {word}")]
async fn payment_status(world: &mut MarketWorld, status: PaymentStatus) {
    let system = world.system();
    let order = system.db.fetch_order(system.order().id).await.expect("Error fetching order").expect("No order");
    assert_eq!(order.payment_status, status, "Payment status is incorrect");
}

#[then(expr = "the tracking status is {word}")]
async fn tracking_status(world: &mut MarketWorld, status: TrackingStatus) {
    let system = world.system();
    let tracking = system.db.fetch_tracking(system.order().id).await.expect("Error fetching tracking");
    let tracking = tracking.expect("Order has no tracking");
    assert_eq!(tracking.tracking.status, status, "Tracking status is incorrect");
}

#[then(expr = "the tracking history has {int} entries")]
async fn tracking_history(world: &mut MarketWorld, count: usize) {
    let system = world.system();
    let tracking = system.db.fetch_tracking(system.order().id).await.expect("Error fetching tracking");
    assert_eq!(tracking.expect("Order has no tracking").histories.len(), count);
}

#[then(expr = "{string} has {int} in stock")]
async fn stock_level(world: &mut MarketWorld, name: String, stock: i64) {
    let system = world.system();
    let product = system.db.fetch_product(system.product(&name).id).await.expect("Error fetching product");
    assert_eq!(product.expect("Product missing").stock, stock, "Stock for {name} is incorrect");
}

#[then(expr = "the merchant payment is {word} with {int} commission")]
async fn merchant_payment(world: &mut MarketWorld, status: MerchantPaymentStatus, commission: i64) {
    let system = world.system();
    let details = system.db.fetch_order_details(system.order().id).await.expect("Error fetching order");
    let details = details.expect("No order");
    let ledger = details
        .merchant_payments
        .iter()
        .find(|p| p.merchant_id == system.market.merchant.id)
        .expect("No merchant payment for the merchant");
    assert_eq!(ledger.status, status, "Merchant payment status is incorrect");
    assert_eq!(ledger.commission_amount, Money::from_major(commission), "Commission is incorrect");
}

#[then(expr = "the merchant has an available balance of {int}")]
async fn available_balance(world: &mut MarketWorld, amount: i64) {
    let system = world.system();
    let balance = system.withdrawals.balance(system.market.merchant.id).await.expect("Error fetching balance");
    assert_eq!(balance.available_balance, Money::from_major(amount), "Available balance is incorrect");
}

#[then("the customer's cart is empty")]
async fn cart_is_empty(world: &mut MarketWorld) {
    let system = world.system();
    let cart = system.db.fetch_cart(system.market.customer.id).await.expect("Error fetching cart");
    assert!(cart.is_empty(), "Cart still holds {} items", cart.len());
}
