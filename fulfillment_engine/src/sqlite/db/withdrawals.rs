use log::{debug, trace};
use market_common::Money;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{MerchantWithdrawal, WithdrawalStatus},
    market_api::withdrawal_objects::WithdrawalDecision,
};

/// Creates a pending withdrawal, copying the merchant's current bank details onto it.
///
/// Returns `None` if `merchant_id` is not a merchant. A unique violation means the merchant already has an
/// outstanding withdrawal.
pub async fn insert_withdrawal(
    merchant_id: i64,
    amount: Money,
    notes: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantWithdrawal>, sqlx::Error> {
    let withdrawal: Option<MerchantWithdrawal> = sqlx::query_as(
        r#"
            INSERT INTO merchant_withdrawals (
                merchant_id,
                amount,
                bank_name,
                bank_account_number,
                bank_account_name,
                notes
            )
            SELECT id, $1, bank_name, bank_account_number, bank_account_name, $2
            FROM users WHERE id = $3 AND role = 'merchant'
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(notes)
    .bind(merchant_id)
    .fetch_optional(conn)
    .await?;
    if let Some(w) = &withdrawal {
        debug!("📝️ Withdrawal #{} of {amount} requested by merchant #{merchant_id}", w.id);
    }
    Ok(withdrawal)
}

pub async fn fetch_withdrawal(id: i64, conn: &mut SqliteConnection) -> Result<Option<MerchantWithdrawal>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM merchant_withdrawals WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Applies an admin decision, but only while the withdrawal is still pending or processing.
pub async fn apply_decision(
    id: i64,
    admin_id: i64,
    decision: &WithdrawalDecision,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantWithdrawal>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE merchant_withdrawals SET status = ");
    builder.push_bind(decision.status);
    builder.push(", processed_by = ");
    builder.push_bind(admin_id);
    builder.push(", updated_at = CURRENT_TIMESTAMP");
    if decision.is_final() {
        builder.push(", processed_at = CURRENT_TIMESTAMP");
    }
    if let Some(reason) = &decision.reason {
        builder.push(", reject_reason = ");
        builder.push_bind(reason.clone());
    }
    if let Some(notes) = &decision.notes {
        builder.push(", notes = ");
        builder.push_bind(notes.clone());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND status IN ('pending', 'processing') RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    builder.build_query_as::<MerchantWithdrawal>().fetch_optional(conn).await
}

/// The merchant takes back their own pending request.
pub async fn cancel_pending(
    id: i64,
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantWithdrawal>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE merchant_withdrawals SET
                status = 'rejected',
                reject_reason = 'Cancelled by merchant',
                processed_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND merchant_id = $2 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(merchant_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_for_merchant(
    merchant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<MerchantWithdrawal>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM merchant_withdrawals WHERE merchant_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await
}

pub async fn search(
    status: Option<WithdrawalStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<MerchantWithdrawal>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM merchant_withdrawals");
    if let Some(status) = status {
        builder.push(" WHERE status = ");
        builder.push_bind(status);
    }
    builder.push(" ORDER BY created_at, id");
    builder.build_query_as::<MerchantWithdrawal>().fetch_all(conn).await
}
