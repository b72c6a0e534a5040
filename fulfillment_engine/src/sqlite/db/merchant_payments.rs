//! The merchant payment ledger. One row per (order, merchant).
//!
//! `pending → paid` happens only when the order is paid *and* the merchant has approved. Since either can happen first,
//! both the payment path and the approval path call [`settle_ready`], which checks the joint condition in SQL.
use log::{debug, trace};
use market_common::Percentage;
use sqlx::SqliteConnection;

use crate::{
    db_types::MerchantPayment,
    helpers::CommissionSplit,
    market_api::withdrawal_objects::MerchantBalance,
};

pub async fn insert_merchant_payment(
    order_id: i64,
    merchant_id: i64,
    commission_rate: Percentage,
    split: CommissionSplit,
    conn: &mut SqliteConnection,
) -> Result<MerchantPayment, sqlx::Error> {
    let payment: MerchantPayment = sqlx::query_as(
        r#"
            INSERT INTO merchant_payments (
                order_id,
                merchant_id,
                order_amount,
                commission_rate,
                commission_amount,
                merchant_amount
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(merchant_id)
    .bind(split.order_amount)
    .bind(commission_rate)
    .bind(split.commission_amount)
    .bind(split.merchant_amount)
    .fetch_one(conn)
    .await?;
    trace!(
        "📝️ Merchant payment for merchant #{merchant_id} on order #{order_id}: {} less {} commission",
        payment.order_amount,
        payment.commission_amount
    );
    Ok(payment)
}

/// Takes the write lock on the merchant's ledger row for the order, without changing it.
pub async fn claim(
    order_id: i64,
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantPayment>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE merchant_payments SET status = status WHERE order_id = $1 AND merchant_id = $2 RETURNING *",
    )
    .bind(order_id)
    .bind(merchant_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<MerchantPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM merchant_payments WHERE order_id = $1 ORDER BY merchant_id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Records the merchant's approval. `None` if the merchant had already approved.
pub async fn record_approval(
    order_id: i64,
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantPayment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE merchant_payments SET approved_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND merchant_id = $2 AND approved_at IS NULL AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(merchant_id)
    .fetch_optional(conn)
    .await
}

/// True once every merchant on the order has approved.
pub async fn all_approved(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let outstanding: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM merchant_payments WHERE order_id = $1 AND approved_at IS NULL")
            .bind(order_id)
            .fetch_one(conn)
            .await?;
    Ok(outstanding == 0)
}

/// Settles every pending ledger row on the order whose merchant has approved, provided the order has been paid.
pub async fn settle_ready(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<MerchantPayment>, sqlx::Error> {
    let settled: Vec<MerchantPayment> = sqlx::query_as(
        r#"
            UPDATE merchant_payments SET status = 'paid', paid_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1
                AND status = 'pending'
                AND approved_at IS NOT NULL
                AND EXISTS (SELECT 1 FROM orders WHERE orders.id = $1 AND orders.payment_status = 'paid')
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    if !settled.is_empty() {
        debug!("📝️ {} merchant payments settled for order #{order_id}", settled.len());
    }
    Ok(settled)
}

/// Fails every ledger row on the order that has not already failed. Terminal.
pub async fn fail_all(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<MerchantPayment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE merchant_payments SET status = 'failed', updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND status <> 'failed'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

/// The ledger totals for the merchant. `available_balance` is left for the caller to derive.
pub async fn balance(merchant_id: i64, conn: &mut SqliteConnection) -> Result<MerchantBalance, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT
                (SELECT COALESCE(SUM(merchant_amount), 0) FROM merchant_payments
                    WHERE merchant_id = $1 AND status = 'paid') AS total_earnings,
                (SELECT COALESCE(SUM(merchant_amount), 0) FROM merchant_payments
                    WHERE merchant_id = $1 AND status = 'pending') AS pending_balance,
                (SELECT COALESCE(SUM(order_amount), 0) FROM merchant_payments
                    WHERE merchant_id = $1 AND status = 'paid') AS total_revenue,
                (SELECT COALESCE(SUM(amount), 0) FROM merchant_withdrawals
                    WHERE merchant_id = $1 AND status = 'completed') AS withdrawn_amount,
                (SELECT COALESCE(SUM(amount), 0) FROM merchant_withdrawals
                    WHERE merchant_id = $1 AND status IN ('pending', 'processing')) AS pending_withdrawal;
        "#,
    )
    .bind(merchant_id)
    .fetch_one(conn)
    .await
}
