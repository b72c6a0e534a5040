//! A small marketplace to run scenarios against.
use market_common::{Money, Percentage};

use crate::{
    db_types::{Address, NewAddress, NewUser, Product, Role, User},
    SqliteDatabase,
};

/// One of each kind of user, plus a product from the merchant with plenty of stock.
#[derive(Debug, Clone)]
pub struct Marketplace {
    pub customer: User,
    pub address: Address,
    pub merchant: User,
    pub product: Product,
    pub driver: User,
    pub admin: User,
}

/// Seeds a customer with an address, a merchant charging 10% commission with a product priced at 65000, a driver and
/// an admin.
pub async fn seed_marketplace(db: &SqliteDatabase) -> Marketplace {
    let (customer, address) = create_customer(db, "Alice").await;
    let merchant = create_merchant(db, "Bob's Bakery", 10).await;
    let product = create_product(db, &merchant, "Sourdough", 65_000, 100).await;
    let driver = create_driver(db, "Dave").await;
    let admin = create_user(db, NewUser::new("Admin", "admin@example.com", Role::Admin)).await;
    Marketplace { customer, address, merchant, product, driver, admin }
}

pub async fn create_user(db: &SqliteDatabase, user: NewUser) -> User {
    db.create_user(user).await.expect("Error creating user")
}

/// A customer with a push token and a delivery address in central Jakarta.
pub async fn create_customer(db: &SqliteDatabase, name: &str) -> (User, Address) {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    let token = format!("ExponentPushToken[{}]", name.to_lowercase());
    let user = NewUser::new(name.to_string(), email, Role::Customer).with_push_token(token);
    let customer = create_user(db, user).await;
    let address = NewAddress {
        user_id: customer.id,
        recipient_name: name.to_string(),
        phone: Some("+628123456789".to_string()),
        street: "Jl. Sudirman 1".to_string(),
        city: "Jakarta".to_string(),
        postal_code: Some("10220".to_string()),
        latitude: Some(-6.2088),
        longitude: Some(106.8456),
    };
    let address = db.create_address(address).await.expect("Error creating address");
    (customer, address)
}

/// A merchant with bank details on file.
pub async fn create_merchant(db: &SqliteDatabase, store_name: &str, commission_percent: i64) -> User {
    let email = format!("{}@example.com", store_name.to_lowercase().replace([' ', '\''], ""));
    let user = NewUser::new(store_name.to_string(), email, Role::Merchant)
        .with_push_token(format!("ExponentPushToken[{}]", store_name.len()))
        .with_store(store_name, Percentage::from_percent(commission_percent))
        .with_bank_details("BCA", "1234567890", store_name);
    create_user(db, user).await
}

pub async fn create_driver(db: &SqliteDatabase, name: &str) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    let user = NewUser::new(name.to_string(), email, Role::Driver)
        .with_phone("+628987654321")
        .with_push_token(format!("ExponentPushToken[{}]", name.to_lowercase()))
        .with_vehicle(format!("B {} XYZ", name.len()));
    create_user(db, user).await
}

/// `price` is in major units.
pub async fn create_product(db: &SqliteDatabase, merchant: &User, name: &str, price: i64, stock: i64) -> Product {
    db.create_product(merchant.id, name, Money::from_major(price), stock).await.expect("Error creating product")
}
