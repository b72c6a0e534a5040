use log::{debug, trace};
use market_common::Money;
use sqlx::SqliteConnection;

use crate::{db_types::Product, traits::FulfillmentError};

pub async fn insert_product(
    merchant_id: i64,
    name: &str,
    price: Money,
    stock: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, sqlx::Error> {
    sqlx::query_as("INSERT INTO products (merchant_id, name, price, stock) VALUES ($1, $2, $3, $4) RETURNING *")
        .bind(merchant_id)
        .bind(name)
        .bind(price)
        .bind(stock)
        .fetch_one(conn)
        .await
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn set_product_active(
    id: i64,
    is_active: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("UPDATE products SET is_active = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(is_active)
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Decrements stock in a single conditional statement. The check and the decrement cannot be separated by a
/// concurrent writer, so stock can never go negative.
pub async fn reserve_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, FulfillmentError> {
    if quantity <= 0 {
        return Err(FulfillmentError::validation(format!("Cannot reserve a quantity of {quantity}")));
    }
    let reserved: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET stock = stock - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND stock >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match reserved {
        Some(product) => {
            trace!("📝️ Reserved {quantity} x {}. {} left", product.name, product.stock);
            Ok(product)
        },
        None => {
            let product =
                fetch_product(product_id, conn).await?.ok_or_else(|| FulfillmentError::not_found("Product"))?;
            debug!("📝️ Cannot reserve {quantity} x {}. Only {} in stock", product.name, product.stock);
            Err(FulfillmentError::InsufficientStock { product: product.name, available: product.stock })
        },
    }
}

/// Returns previously reserved units to stock.
pub async fn release_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, FulfillmentError> {
    if quantity <= 0 {
        return Err(FulfillmentError::validation(format!("Cannot release a quantity of {quantity}")));
    }
    let product: Product = sqlx::query_as(
        "UPDATE products SET stock = stock + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| FulfillmentError::not_found("Product"))?;
    trace!("📝️ Released {quantity} x {}. {} in stock", product.name, product.stock);
    Ok(product)
}
