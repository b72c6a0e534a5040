#![allow(dead_code)]

use fulfillment_engine::{
    db_types::{Order, Payment, PaymentMethod},
    events::EventProducers,
    order_objects::{CheckoutRequest, OrderDetails},
    payment_objects::GatewayNotification,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_marketplace, Marketplace},
    },
    traits::NoRoutePlanner,
    DeliveryApi,
    FulfillmentDatabase,
    FulfillmentSettings,
    OrderFlowApi,
    SqliteDatabase,
    WithdrawalApi,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub struct TestSystem {
    pub db: SqliteDatabase,
    pub market: Marketplace,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub deliveries: DeliveryApi<SqliteDatabase, NoRoutePlanner>,
    pub withdrawals: WithdrawalApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_settings(FulfillmentSettings::default(), EventProducers::default()).await
    }

    pub async fn with_settings(settings: FulfillmentSettings, producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let market = seed_marketplace(&db).await;
        let orders = OrderFlowApi::new(db.clone(), producers.clone(), settings);
        let deliveries = DeliveryApi::new(db.clone(), producers, NoRoutePlanner, &settings);
        let withdrawals = WithdrawalApi::new(db.clone(), &settings);
        Self { db, market, orders, deliveries, withdrawals }
    }

    /// Puts `quantity` of the seeded product in the customer's cart and checks out.
    pub async fn place_order(&self, quantity: i64, method: PaymentMethod) -> OrderDetails {
        let customer_id = self.market.customer.id;
        self.db.add_to_cart(customer_id, self.market.product.id, quantity).await.expect("Error adding to cart");
        let request = CheckoutRequest::new(self.market.address.id, method);
        self.orders.checkout(customer_id, request).await.expect("Error checking out")
    }

    /// Opens a gateway payment for the order and settles it.
    pub async fn pay(&self, order: &Order) -> Payment {
        let payment =
            self.orders.initiate_payment(order.customer_id, order.id).await.expect("Error initiating payment");
        let notification =
            GatewayNotification::new(payment.transaction_id.as_str(), "settlement").with_payment_type("bank_transfer");
        let update = self.orders.process_gateway_notification(notification).await.expect("Error applying notification");
        update.payment
    }

    /// A gateway order, paid and approved by the merchant, waiting for a driver.
    pub async fn order_waiting_for_driver(&self) -> Order {
        let details = self.place_order(1, PaymentMethod::Midtrans).await;
        self.pay(&details.order).await;
        let result =
            self.orders.approve_order(self.market.merchant.id, details.order.id).await.expect("Error approving order");
        result.order
    }

    pub async fn tear_down(mut self) {
        let url = self.db.url().to_string();
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        let _ = Sqlite::drop_database(&url).await;
    }
}
