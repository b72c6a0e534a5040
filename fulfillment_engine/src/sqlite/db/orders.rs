use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{MerchantStatus, NewOrder, Order, OrderItem, OrderStatus, Product};

/// Inserts a new order row. Statuses take their column defaults: `pending`, `unpaid` and `pending`.
///
/// This is not atomic. Embed the call inside a transaction and pass `&mut tx` as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                customer_id,
                address_id,
                subtotal,
                shipping_cost,
                discount,
                total_price,
                payment_method,
                voucher_id,
                notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(&order.order_number)
    .bind(order.customer_id)
    .bind(order.address_id)
    .bind(order.subtotal)
    .bind(order.shipping_cost)
    .bind(order.discount)
    .bind(order.total_price())
    .bind(order.payment_method)
    .bind(order.voucher_id)
    .bind(&order.notes)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order {} inserted with id {}", order.order_number, order.id);
    Ok(order)
}

/// Copies the product's name, price and merchant onto a new line item.
pub async fn insert_order_item(
    order_id: i64,
    product: &Product,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, merchant_id, product_name, price, quantity, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(product.id)
    .bind(product.merchant_id)
    .bind(&product.name)
    .bind(product.price)
    .bind(quantity)
    .bind(product.price * quantity)
    .fetch_one(conn)
    .await
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(order_number).fetch_optional(conn).await
}

/// Takes the write lock on the customer's order without changing it. `None` if the order does not exist or belongs to
/// someone else.
pub async fn claim_order_for_customer(
    id: i64,
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("UPDATE orders SET status = status WHERE id = $1 AND customer_id = $2 RETURNING *")
        .bind(id)
        .bind(customer_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

/// Records a confirmed payment. A pending order moves to `paid`; an order that has moved on (or was cancelled) keeps
/// its status, but the payment itself is always recorded.
pub async fn mark_paid(id: i64, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = CASE WHEN status = 'pending' THEN 'paid' ELSE status END,
                payment_status = 'paid',
                paid_at = COALESCE(paid_at, CURRENT_TIMESTAMP),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(id)
    .fetch_one(conn)
    .await?;
    trace!("📝️ Order {} marked as paid", order.order_number);
    Ok(order)
}

/// Marks the order's payment as failed. Orders that have already been paid are left alone.
pub async fn mark_payment_failed(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET payment_status = 'failed', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND payment_status <> 'paid'
            RETURNING *;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// All merchants have approved: the order is now being processed.
pub async fn mark_approved(id: i64, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'processing', merchant_status = 'approved', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(id)
    .fetch_one(conn)
    .await
}

/// Moves the order on to `status`, stamping `delivered_at` on delivery.
pub async fn set_status(id: i64, status: OrderStatus, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                delivered_at = CASE WHEN $1 = 'delivered' THEN CURRENT_TIMESTAMP ELSE delivered_at END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(id)
    .fetch_one(conn)
    .await
}

/// Cancels the order, setting the reason and timestamp together. A merchant rejection also sets `merchant_status`.
pub async fn cancel(
    id: i64,
    reason: &str,
    merchant_status: Option<MerchantStatus>,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'cancelled',
                merchant_status = COALESCE($1, merchant_status),
                cancel_reason = $2,
                cancelled_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(merchant_status)
    .bind(reason)
    .bind(id)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order {} cancelled. {reason}", order.order_number);
    Ok(order)
}

pub async fn fetch_orders_for_customer(
    customer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(customer_id)
        .fetch_all(conn)
        .await
}

/// Orders that contain at least one of the merchant's products, newest first.
pub async fn fetch_orders_for_merchant(
    merchant_id: i64,
    status: Option<OrderStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        "SELECT * FROM orders WHERE id IN (SELECT DISTINCT order_id FROM order_items WHERE merchant_id = ",
    );
    builder.push_bind(merchant_id);
    builder.push(")");
    if let Some(status) = status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("📝️ Executing query: {}", builder.sql());
    builder.build_query_as::<Order>().fetch_all(conn).await
}

/// Paid orders that every merchant has approved and that are waiting for a driver, oldest first.
pub async fn fetch_available_for_delivery(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT orders.* FROM orders
            JOIN delivery_trackings ON delivery_trackings.order_id = orders.id
            WHERE delivery_trackings.status = 'waiting_driver'
                AND orders.payment_status = 'paid'
                AND orders.merchant_status = 'approved'
            ORDER BY orders.created_at, orders.id;
        "#,
    )
    .fetch_all(conn)
    .await
}
