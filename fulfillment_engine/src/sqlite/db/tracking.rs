//! Delivery tracking rows and their append-only history.
//!
//! Every status change goes through a compare-and-set: the `UPDATE` only matches while the row is still in one of the
//! allowed source states, so two racing callers can never both win.
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{DeliveryTracking, TrackingHistory, TrackingStatus},
    market_api::tracking_objects::TrackingPatch,
    traits::DriverStatistics,
};

/// Every new order starts its journey in `pending_payment`.
pub async fn insert_tracking(order_id: i64, conn: &mut SqliteConnection) -> Result<DeliveryTracking, sqlx::Error> {
    sqlx::query_as("INSERT INTO delivery_trackings (order_id, status) VALUES ($1, 'pending_payment') RETURNING *")
        .bind(order_id)
        .fetch_one(conn)
        .await
}

pub async fn insert_history(
    tracking: &DeliveryTracking,
    description: &str,
    conn: &mut SqliteConnection,
) -> Result<TrackingHistory, sqlx::Error> {
    let entry: TrackingHistory = sqlx::query_as(
        r#"
            INSERT INTO tracking_histories (delivery_tracking_id, status, description, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(tracking.id)
    .bind(tracking.status)
    .bind(description)
    .bind(tracking.current_latitude)
    .bind(tracking.current_longitude)
    .fetch_one(conn)
    .await?;
    trace!("📝️ Tracking #{} history: [{}] {description}", tracking.id, entry.status);
    Ok(entry)
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<DeliveryTracking>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM delivery_trackings WHERE order_id = $1").bind(order_id).fetch_optional(conn).await
}

/// Oldest first
pub async fn fetch_histories(tracking_id: i64, conn: &mut SqliteConnection) -> Result<Vec<TrackingHistory>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM tracking_histories WHERE delivery_tracking_id = $1 ORDER BY created_at, id")
        .bind(tracking_id)
        .fetch_all(conn)
        .await
}

/// Takes the write lock on the order's tracking row without changing it.
pub async fn claim(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<DeliveryTracking>, sqlx::Error> {
    sqlx::query_as("UPDATE delivery_trackings SET status = status WHERE order_id = $1 RETURNING *")
        .bind(order_id)
        .fetch_optional(conn)
        .await
}

/// As [`claim`], but only while the tracking row is in `status`.
pub async fn claim_in_status(
    order_id: i64,
    status: TrackingStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryTracking>, sqlx::Error> {
    sqlx::query_as("UPDATE delivery_trackings SET status = status WHERE order_id = $1 AND status = $2 RETURNING *")
        .bind(order_id)
        .bind(status)
        .fetch_optional(conn)
        .await
}

/// Moves the tracking row to `to`, but only if it is currently in one of `to`'s allowed source states.
///
/// Returns `None`, having changed nothing, if the row is in any other state.
pub async fn compare_and_set(
    order_id: i64,
    to: TrackingStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryTracking>, sqlx::Error> {
    transition(order_id, None, to, &TrackingPatch::default(), conn).await
}

/// The general form of [`compare_and_set`], used for driver transitions. When `driver_id` is given, only that driver's
/// delivery matches. Any fields set in `patch` are written along with the status; `picked_up_at` and `delivered_at`
/// are stamped by the transitions that own them.
pub async fn transition(
    order_id: i64,
    driver_id: Option<i64>,
    to: TrackingStatus,
    patch: &TrackingPatch,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryTracking>, sqlx::Error> {
    let sources = to.allowed_sources();
    if sources.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE delivery_trackings SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = CURRENT_TIMESTAMP");
    push_patch(&mut builder, patch);
    match to {
        TrackingStatus::OnTheWay => {
            builder.push(", picked_up_at = CURRENT_TIMESTAMP");
        },
        TrackingStatus::Delivered => {
            builder.push(", delivered_at = CURRENT_TIMESTAMP");
        },
        _ => {},
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id);
    if let Some(driver_id) = driver_id {
        builder.push(" AND driver_id = ");
        builder.push_bind(driver_id);
    }
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in sources {
        statuses.push_bind(*status);
    }
    statuses.push_unseparated(") RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let tracking = builder.build_query_as::<DeliveryTracking>().fetch_optional(conn).await?;
    if let Some(t) = &tracking {
        debug!("📝️ Order #{order_id} tracking moved to {}", t.status);
    }
    Ok(tracking)
}

fn push_patch(builder: &mut QueryBuilder<'_, Sqlite>, patch: &TrackingPatch) {
    if let (Some(lat), Some(lon)) = (patch.latitude, patch.longitude) {
        builder.push(", current_latitude = ");
        builder.push_bind(lat);
        builder.push(", current_longitude = ");
        builder.push_bind(lon);
    }
    let text_columns = [
        ("notes", &patch.notes),
        ("pickup_photo", &patch.pickup_photo),
        ("delivery_photo", &patch.delivery_photo),
        ("signature", &patch.signature),
    ];
    for (column, value) in text_columns {
        if let Some(v) = value {
            builder.push(format!(", {column} = "));
            builder.push_bind(v.clone());
        }
    }
}

/// Assigns the driver to a `waiting_driver` order, copying the driver's name, phone and vehicle onto the row.
pub async fn assign_driver(
    order_id: i64,
    driver_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryTracking>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE delivery_trackings SET
                status = 'driver_assigned',
                driver_id = $1,
                driver_name = (SELECT name FROM users WHERE id = $1),
                driver_phone = (SELECT phone FROM users WHERE id = $1),
                vehicle_number = (SELECT vehicle_number FROM users WHERE id = $1),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status = 'waiting_driver'
            RETURNING *;
        "#,
    )
    .bind(driver_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

/// Moves the driver's marker without changing the delivery status. Only matches while the delivery is active and
/// assigned to `driver_id`.
pub async fn update_position(
    order_id: i64,
    driver_id: i64,
    latitude: f64,
    longitude: f64,
    notes: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryTracking>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE delivery_trackings SET
                current_latitude = $1,
                current_longitude = $2,
                notes = COALESCE($3, notes),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $4
                AND driver_id = $5
                AND status IN ('driver_assigned', 'on_the_way', 'arrived')
            RETURNING *;
        "#,
    )
    .bind(latitude)
    .bind(longitude)
    .bind(notes)
    .bind(order_id)
    .bind(driver_id)
    .fetch_optional(conn)
    .await
}

pub async fn count_active_for_driver(driver_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
            SELECT COUNT(*) FROM delivery_trackings
            WHERE driver_id = $1 AND status IN ('driver_assigned', 'on_the_way', 'arrived');
        "#,
    )
    .bind(driver_id)
    .fetch_one(conn)
    .await
}

pub async fn fetch_active_for_driver(
    driver_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeliveryTracking>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM delivery_trackings
            WHERE driver_id = $1 AND status IN ('driver_assigned', 'on_the_way', 'arrived')
            ORDER BY updated_at DESC, id DESC;
        "#,
    )
    .bind(driver_id)
    .fetch_all(conn)
    .await
}

pub async fn fetch_finished_for_driver(
    driver_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeliveryTracking>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM delivery_trackings
            WHERE driver_id = $1 AND status IN ('delivered', 'cancelled')
            ORDER BY updated_at DESC, id DESC;
        "#,
    )
    .bind(driver_id)
    .fetch_all(conn)
    .await
}

pub async fn driver_statistics(driver_id: i64, conn: &mut SqliteConnection) -> Result<DriverStatistics, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT
                COALESCE(SUM(status = 'delivered'), 0) AS total_deliveries,
                COALESCE(SUM(status IN ('driver_assigned', 'on_the_way', 'arrived')), 0) AS active_deliveries,
                COALESCE(SUM(status = 'delivered' AND date(delivered_at) = date('now')), 0) AS today_deliveries
            FROM delivery_trackings
            WHERE driver_id = $1;
        "#,
    )
    .bind(driver_id)
    .fetch_one(conn)
    .await
}
