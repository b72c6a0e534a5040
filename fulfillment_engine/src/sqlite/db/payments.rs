use log::{debug, trace};
use market_common::Money;
use sqlx::SqliteConnection;

use crate::db_types::{GatewayPaymentStatus, Payment, PaymentMethod};

pub async fn insert_payment(
    order_id: i64,
    gateway: PaymentMethod,
    transaction_id: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, gateway, transaction_id, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(gateway)
    .bind(transaction_id)
    .bind(amount)
    .fetch_one(conn)
    .await?;
    debug!("📝️ {gateway} payment {transaction_id} for {amount} created for order #{order_id}");
    Ok(payment)
}

/// Re-issues the order's pending gateway payment under a new transaction id, or creates one if there is none.
pub async fn upsert_pending_gateway_payment(
    order_id: i64,
    transaction_id: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let refreshed: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET transaction_id = $1, amount = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = (
                SELECT id FROM payments
                WHERE order_id = $3 AND gateway = 'midtrans' AND status = 'pending'
                ORDER BY id DESC LIMIT 1
            )
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(amount)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    match refreshed {
        Some(p) => {
            trace!("📝️ Pending payment for order #{order_id} re-issued as {transaction_id}");
            Ok(p)
        },
        None => insert_payment(order_id, PaymentMethod::Midtrans, transaction_id, amount, conn).await,
    }
}

/// Takes the write lock on the payment without changing it.
pub async fn claim_by_transaction_id(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("UPDATE payments SET status = status WHERE transaction_id = $1 RETURNING *")
        .bind(transaction_id)
        .fetch_optional(conn)
        .await
}

/// Records a gateway status on the payment, along with the raw notification. `paid_at` is stamped on success.
pub async fn update_status(
    id: i64,
    status: GatewayPaymentStatus,
    payment_type: Option<&str>,
    metadata: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                payment_type = COALESCE($2, payment_type),
                metadata = COALESCE($3, metadata),
                paid_at = CASE WHEN $1 = 'success' THEN COALESCE(paid_at, CURRENT_TIMESTAMP) ELSE paid_at END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(payment_type)
    .bind(metadata)
    .bind(id)
    .fetch_one(conn)
    .await
}

/// Fails every payment on the order that is still pending.
pub async fn fail_pending(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET status = 'failed', updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

/// Cash changes hands at the door. Marks the order's pending COD payment as collected.
pub async fn collect_cash(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET status = 'success', paid_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND gateway = 'cod' AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}
