//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions that accept a `&mut SqliteConnection` argument. Callers can obtain a
//! connection from a pool, or open an atomic transaction and pass `&mut tx` through without any other changes.
//!
//! ## Write first
//!
//! SQLite allows one writer at a time. A transaction that reads before it writes holds a read snapshot, and cannot
//! upgrade it to a write lock if another connection committed in the meantime; it fails with `SQLITE_BUSY` instead of
//! waiting. So every state-changing transaction in [`super::SqliteDatabase`] opens with its guarding write: a
//! conditional `UPDATE ... RETURNING *` (a compare-and-set on the status column) or an equivalent `DELETE` or
//! `INSERT`. Where a transaction only needs to lock a row before deciding what to do, it uses a no-op claim such as
//! `UPDATE payments SET status = status WHERE ... RETURNING *`. Once the write lock is held, every subsequent read in
//! the transaction sees the latest committed state and no other writer can interleave.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod carts;
pub mod merchant_payments;
pub mod orders;
pub mod payments;
pub mod products;
pub mod tracking;
pub mod users;
pub mod vouchers;
pub mod withdrawals;

const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";

pub fn db_url() -> String {
    let result = env::var("MKT_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ MKT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// True if the error is a UNIQUE constraint violation, e.g. a duplicate order number.
pub fn is_unique_violation(e: &SqlxError) -> bool {
    match e {
        SqlxError::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
