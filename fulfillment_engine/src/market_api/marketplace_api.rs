use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, Role, TrackingStatus},
    helpers::is_valid_order_number,
    market_api::{
        actor::Actor,
        order_objects::{MerchantOrderQuery, OrderDetails},
        tracking_objects::TrackingView,
    },
    traits::{FulfillmentError, MarketplaceQueries},
};

/// Read-only access to orders and their tracking, filtered by who is asking.
///
/// An order the actor may not see is reported as not found, exactly as if it did not exist.
pub struct MarketplaceApi<B> {
    db: B,
}

impl<B> Debug for MarketplaceApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MarketplaceApi")
    }
}

impl<B> MarketplaceApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> MarketplaceApi<B>
where B: MarketplaceQueries
{
    pub async fn orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, FulfillmentError> {
        self.db.fetch_orders_for_customer(customer_id).await
    }

    /// Orders containing at least one of the merchant's items, newest first.
    pub async fn orders_for_merchant(
        &self,
        merchant_id: i64,
        query: MerchantOrderQuery,
    ) -> Result<Vec<Order>, FulfillmentError> {
        self.db.fetch_orders_for_merchant(merchant_id, query.status).await
    }

    pub async fn order_details(&self, actor: &Actor, order_id: i64) -> Result<OrderDetails, FulfillmentError> {
        let details = self.db.fetch_order_details(order_id).await?.ok_or_else(|| FulfillmentError::not_found("Order"))?;
        if can_view(actor, &details) {
            Ok(details)
        } else {
            debug!("🔄️ {actor} asked for order #{order_id}, which they may not see");
            Err(FulfillmentError::not_found("Order"))
        }
    }

    pub async fn order_details_by_number(
        &self,
        actor: &Actor,
        order_number: &str,
    ) -> Result<OrderDetails, FulfillmentError> {
        let order_number = order_number.trim().to_uppercase();
        if !is_valid_order_number(&order_number) {
            return Err(FulfillmentError::not_found("Order"));
        }
        let order = self
            .db
            .fetch_order_by_number(&order_number)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Order"))?;
        self.order_details(actor, order.id).await
    }

    /// The customer-facing tracking timeline for an order.
    pub async fn tracking(&self, actor: &Actor, order_id: i64) -> Result<TrackingView, FulfillmentError> {
        let details = self.order_details(actor, order_id).await?;
        let tracking = details.tracking.ok_or_else(|| FulfillmentError::not_found("Tracking"))?;
        Ok(TrackingView::new(details.order.order_number, &tracking.tracking, &tracking.histories))
    }
}

/// Admins see everything. Otherwise the order's customer, the merchants with items in it and the assigned driver may
/// see it. Any driver may look at an order that is still waiting for one.
fn can_view(actor: &Actor, details: &OrderDetails) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Customer => details.order.customer_id == actor.id,
        Role::Merchant => details.has_merchant(actor.id),
        Role::Driver => {
            details.driver_id() == Some(actor.id) ||
                details.tracking.as_ref().is_some_and(|t| t.tracking.status == TrackingStatus::WaitingDriver)
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db_types::{DeliveryTracking, OrderItem},
        market_api::order_objects::TrackingWithHistory,
    };

    fn details(customer_id: i64, merchants: &[i64], driver: Option<i64>, status: TrackingStatus) -> OrderDetails {
        let order = Order { id: 1, customer_id, ..Default::default() };
        let items = merchants.iter().map(|&m| OrderItem { merchant_id: m, ..Default::default() }).collect();
        let tracking = DeliveryTracking { order_id: 1, driver_id: driver, status, ..Default::default() };
        OrderDetails {
            order,
            items,
            merchant_payments: vec![],
            payments: vec![],
            tracking: Some(TrackingWithHistory { tracking, histories: vec![] }),
        }
    }

    #[test]
    fn visibility_follows_involvement() {
        let d = details(10, &[20, 21], Some(30), TrackingStatus::OnTheWay);
        assert!(can_view(&Actor::customer(10), &d));
        assert!(!can_view(&Actor::customer(11), &d));
        assert!(can_view(&Actor::merchant(21), &d));
        assert!(!can_view(&Actor::merchant(22), &d));
        assert!(can_view(&Actor::driver(30), &d));
        assert!(!can_view(&Actor::driver(31), &d));
        assert!(can_view(&Actor::admin(1), &d));
    }

    #[test]
    fn any_driver_may_see_a_waiting_order() {
        let d = details(10, &[20], None, TrackingStatus::WaitingDriver);
        assert!(can_view(&Actor::driver(31), &d));
        let d = details(10, &[20], None, TrackingStatus::WaitingMerchant);
        assert!(!can_view(&Actor::driver(31), &d));
    }
}
