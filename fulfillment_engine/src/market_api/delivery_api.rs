use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{DeliveryTracking, Order, TrackingStatus},
    events::EventProducers,
    market_api::{
        notices::Notices,
        settings::FulfillmentSettings,
        tracking_objects::{DeliveryProof, DriverLocation, DriverSnapshot, LocationUpdate, PickupProof},
    },
    traits::{
        DriverStatistics,
        FulfillmentDatabase,
        FulfillmentError,
        GeoPoint,
        LocationChange,
        RouteEstimate,
        RoutePlanner,
    },
};

/// `DeliveryApi` covers the driver's side of fulfillment: claiming orders, reporting position and progress, and
/// proving pickup and delivery. It also serves the customer's live view of the driver.
pub struct DeliveryApi<B, R> {
    db: B,
    producers: EventProducers,
    router: R,
    max_active_deliveries: i64,
}

impl<B, R> Debug for DeliveryApi<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeliveryApi")
    }
}

impl<B, R> DeliveryApi<B, R> {
    pub fn new(db: B, producers: EventProducers, router: R, settings: &FulfillmentSettings) -> Self {
        Self { db, producers, router, max_active_deliveries: settings.max_active_deliveries }
    }
}

impl<B, R> DeliveryApi<B, R>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    /// Orders that every merchant has approved and that no driver has claimed yet, oldest first.
    pub async fn available_orders(&self) -> Result<Vec<Order>, FulfillmentError> {
        self.db.fetch_available_deliveries().await
    }

    pub async fn active_deliveries(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError> {
        self.db.fetch_active_deliveries(driver_id).await
    }

    pub async fn delivery_history(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError> {
        self.db.fetch_delivery_history(driver_id).await
    }

    pub async fn statistics(&self, driver_id: i64) -> Result<DriverStatistics, FulfillmentError> {
        self.db.fetch_driver_statistics(driver_id).await
    }

    /// Claims a waiting order for the driver. When two drivers race for the same order, exactly one wins; the other
    /// gets `InvalidTransition`.
    pub async fn accept_order(&self, driver_id: i64, order_id: i64) -> Result<DeliveryTracking, FulfillmentError> {
        let tracking = self.db.accept_delivery(driver_id, order_id, self.max_active_deliveries).await?;
        info!("🚚️ Driver #{driver_id} accepted order #{order_id}");
        self.notices().delivery_progress(order_id, tracking.status, tracking.driver_name.as_deref()).await;
        Ok(tracking)
    }

    /// The driver passes on the order. It stays available to everyone else.
    pub async fn reject_order(
        &self,
        driver_id: i64,
        order_id: i64,
        reason: &str,
    ) -> Result<DeliveryTracking, FulfillmentError> {
        let tracking = self.db.decline_delivery(driver_id, order_id, reason).await?;
        debug!("🚚️ Driver #{driver_id} declined order #{order_id}");
        Ok(tracking)
    }

    /// Records the driver's position, and applies a status change when one is reported.
    pub async fn update_location(
        &self,
        driver_id: i64,
        order_id: i64,
        update: LocationUpdate,
    ) -> Result<LocationChange, FulfillmentError> {
        let change = self.db.update_location(driver_id, order_id, &update).await?;
        if change.status_changed() {
            info!(
                "🚚️ Delivery for order #{order_id} moved from {} to {}",
                change.previous_status, change.tracking.status
            );
            self.notices().delivery_progress(order_id, change.tracking.status, None).await;
        }
        Ok(change)
    }

    pub async fn start_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        proof: PickupProof,
    ) -> Result<DeliveryTracking, FulfillmentError> {
        let tracking = self.db.start_delivery(driver_id, order_id, &proof).await?;
        info!("🚚️ Order #{order_id} is on its way");
        self.notices().delivery_progress(order_id, TrackingStatus::OnTheWay, None).await;
        Ok(tracking)
    }

    pub async fn complete_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        proof: DeliveryProof,
    ) -> Result<DeliveryTracking, FulfillmentError> {
        let tracking = self.db.complete_delivery(driver_id, order_id, &proof).await?;
        info!("🚚️ Order #{order_id} has been delivered");
        self.notices().delivery_progress(order_id, TrackingStatus::Delivered, None).await;
        Ok(tracking)
    }

    /// The customer's view of where their driver is.
    ///
    /// Only available while a driver is assigned and has reported a position. The ETA is best-effort: if the route
    /// planner fails or has no answer, the distance and ETA fields are empty.
    pub async fn driver_location(&self, customer_id: i64, order_id: i64) -> Result<DriverLocation, FulfillmentError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| FulfillmentError::not_found("Order"))?;
        let tracking = self
            .db
            .fetch_tracking(order_id)
            .await?
            .map(|t| t.tracking)
            .filter(|t| t.driver_id.is_some() && t.status.is_active_delivery())
            .ok_or_else(|| FulfillmentError::not_found("Driver location"))?;
        let location = GeoPoint::from_parts(tracking.current_latitude, tracking.current_longitude)
            .ok_or_else(|| FulfillmentError::not_found("Driver location"))?;
        let destination = self
            .db
            .fetch_address(order.address_id)
            .await?
            .and_then(|a| GeoPoint::from_parts(a.latitude, a.longitude));
        let route = match destination {
            Some(to) => self.estimate_route(location, to).await,
            None => None,
        };
        let view = DriverLocation {
            order_id,
            status: tracking.status,
            driver: DriverSnapshot::from_tracking(&tracking),
            location,
            destination,
            distance_meters: None,
            eta_seconds: None,
            eta_minutes: None,
            updated_at: tracking.updated_at,
        };
        Ok(view.with_route(route))
    }

    async fn estimate_route(&self, from: GeoPoint, to: GeoPoint) -> Option<RouteEstimate> {
        match self.router.route(from, to).await {
            Ok(route) => route,
            Err(e) => {
                warn!("🗺️ No ETA available. {e}");
                None
            },
        }
    }

    fn notices(&self) -> Notices<'_, B> {
        Notices::new(&self.db, &self.producers)
    }
}
