use std::collections::HashMap;

use cucumber::World;
use fulfillment_engine::{
    db_types::{Order, Product},
    events::EventProducers,
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        seed::{seed_marketplace, Marketplace},
    },
    traits::NoRoutePlanner,
    DeliveryApi,
    FulfillmentError,
    FulfillmentSettings,
    OrderFlowApi,
    SqliteDatabase,
    WithdrawalApi,
};
use log::*;

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<MarketSystem>,
}

#[derive(Debug)]
pub struct MarketSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub market: Marketplace,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub deliveries: DeliveryApi<SqliteDatabase, NoRoutePlanner>,
    pub withdrawals: WithdrawalApi<SqliteDatabase>,
    pub products: HashMap<String, Product>,
    /// The most recent order placed in the scenario
    pub order: Option<Order>,
    /// The error returned by the most recent step that was allowed to fail
    pub last_error: Option<FulfillmentError>,
}

impl MarketWorld {
    pub fn system(&self) -> &MarketSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn system_mut(&mut self) -> &mut MarketSystem {
        self.system.as_mut().expect("Marketplace not initialised")
    }
}

impl MarketSystem {
    pub async fn new() -> Self {
        let db_path = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&db_path, 5).await.expect("Error creating connection to database");
        debug!("Created database: {db_path}");
        let market = seed_marketplace(&db).await;
        let settings = FulfillmentSettings::default();
        let producers = EventProducers::default();
        let orders = OrderFlowApi::new(db.clone(), producers.clone(), settings);
        let deliveries = DeliveryApi::new(db.clone(), producers, NoRoutePlanner, &settings);
        let withdrawals = WithdrawalApi::new(db.clone(), &settings);
        let mut products = HashMap::new();
        products.insert(market.product.name.clone(), market.product.clone());
        Self { db_path, db, market, orders, deliveries, withdrawals, products, order: None, last_error: None }
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("No product called {name}"))
    }

    pub fn order(&self) -> &Order {
        self.order.as_ref().expect("No order has been placed")
    }

    /// Keeps the outcome of a step that is allowed to fail.
    pub fn record<T>(&mut self, result: Result<T, FulfillmentError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Step failed as recorded: {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
