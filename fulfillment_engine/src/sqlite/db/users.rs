use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Address, NewAddress, NewUser, Role, User};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, sqlx::Error> {
    let user: User = sqlx::query_as(
        r#"
            INSERT INTO users (
                name,
                email,
                phone,
                role,
                push_token,
                store_name,
                commission_rate,
                bank_name,
                bank_account_number,
                bank_account_name,
                vehicle_number
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(user.name)
    .bind(user.email)
    .bind(user.phone)
    .bind(user.role)
    .bind(user.push_token)
    .bind(user.store_name)
    .bind(user.commission_rate)
    .bind(user.bank_name)
    .bind(user.bank_account_number)
    .bind(user.bank_account_name)
    .bind(user.vehicle_number)
    .fetch_one(conn)
    .await?;
    debug!("📝️ {} #{} ({}) created", user.role, user.id, user.email);
    Ok(user)
}

pub async fn fetch_user(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Fetches the user only if they hold the given role.
pub async fn fetch_user_with_role(
    id: i64,
    role: Role,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1 AND role = $2").bind(id).bind(role).fetch_optional(conn).await
}

pub async fn fetch_active_drivers(conn: &mut SqliteConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE role = 'driver' AND is_active = 1 ORDER BY id")
        .fetch_all(conn)
        .await
}

pub async fn set_active(id: i64, is_active: bool, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("UPDATE users SET is_active = $1 WHERE id = $2 RETURNING *")
        .bind(is_active)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_address(address: NewAddress, conn: &mut SqliteConnection) -> Result<Address, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO addresses (user_id, recipient_name, phone, street, city, postal_code, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(address.user_id)
    .bind(address.recipient_name)
    .bind(address.phone)
    .bind(address.street)
    .bind(address.city)
    .bind(address.postal_code)
    .bind(address.latitude)
    .bind(address.longitude)
    .fetch_one(conn)
    .await
}

pub async fn fetch_address(id: i64, conn: &mut SqliteConnection) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM addresses WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Returns the address only if it belongs to `user_id`.
pub async fn fetch_address_for_user(
    id: i64,
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Address>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}
