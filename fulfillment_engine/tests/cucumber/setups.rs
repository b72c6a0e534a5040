use cucumber::given;
use fulfillment_engine::test_utils::seed::create_product;

use crate::cucumber::{market_world::MarketSystem, MarketWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketWorld) {
    let system = MarketSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "the merchant sells {string} at {int} with {int} in stock")]
async fn merchant_product(world: &mut MarketWorld, name: String, price: i64, stock: i64) {
    let system = world.system_mut();
    let product = create_product(&system.db, &system.market.merchant, &name, price, stock).await;
    system.products.insert(name, product);
}
