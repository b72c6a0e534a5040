use sqlx::SqliteConnection;

use crate::db_types::CartItem;

/// Adds to the quantity if the product is already in the cart.
pub async fn add_to_cart(
    user_id: i64,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<CartItem, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = quantity + excluded.quantity
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(conn)
    .await
}

pub async fn fetch_cart(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM cart_items WHERE user_id = $1 ORDER BY id").bind(user_id).fetch_all(conn).await
}

/// Empties the cart and returns what was in it. Used as the opening write of checkout.
pub async fn take_cart(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    let mut items: Vec<CartItem> =
        sqlx::query_as("DELETE FROM cart_items WHERE user_id = $1 RETURNING *").bind(user_id).fetch_all(conn).await?;
    // RETURNING order is unspecified in SQLite
    items.sort_by_key(|i| i.id);
    Ok(items)
}
