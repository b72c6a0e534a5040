use sqlx::SqliteConnection;

use crate::db_types::Voucher;

pub async fn fetch_voucher_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM vouchers WHERE code = $1").bind(code).fetch_optional(conn).await
}

/// Increments the usage count, unless the usage limit has been reached in the meantime. Returns `None` in that case.
pub async fn increment_usage(id: i64, conn: &mut SqliteConnection) -> Result<Option<Voucher>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE vouchers SET used_count = used_count + 1
            WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)
            RETURNING *;
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}
