//! Customer, merchant and driver push notices.
//!
//! Every notice is composed after the transaction that caused it has committed. Nothing here returns an error: a
//! missing recipient or push token is logged and skipped.
use std::collections::BTreeSet;

use log::*;

use crate::{
    db_types::{Order, TrackingStatus},
    events::{EventProducers, NotificationEvent},
    traits::MarketplaceQueries,
};

pub(crate) struct Notices<'a, B> {
    db: &'a B,
    producers: &'a EventProducers,
}

impl<'a, B> Notices<'a, B>
where B: MarketplaceQueries
{
    pub fn new(db: &'a B, producers: &'a EventProducers) -> Self {
        Self { db, producers }
    }

    /// The order's payment has been confirmed. Each merchant on the order hears about it once.
    pub async fn payment_confirmed(&self, order: &Order, merchant_ids: &[i64]) {
        let n = &order.order_number;
        let body = format!("Your order #{n} payment has been confirmed!");
        self.send(order.customer_id, order.id, "paid", "Payment Confirmed", body).await;
        let merchants = merchant_ids.iter().copied().collect::<BTreeSet<i64>>();
        for merchant_id in merchants {
            let body = format!("New order #{n} is waiting for your approval");
            self.send(merchant_id, order.id, "paid", "New Order", body).await;
        }
    }

    /// Every merchant has approved. The customer is told, and every active driver is offered the delivery.
    pub async fn order_processing(&self, order: &Order) {
        let n = &order.order_number;
        let body = format!("Your order #{n} is being processed");
        self.send(order.customer_id, order.id, "processing", "Order Processing", body).await;
        let drivers = match self.db.fetch_active_drivers().await {
            Ok(drivers) => drivers,
            Err(e) => {
                warn!("🔔️ Could not fetch drivers to announce order {n}. {e}");
                return;
            },
        };
        debug!("🔔️ Announcing order {n} to {} drivers", drivers.len());
        for driver in drivers {
            let body = format!("Order #{n} is ready for pickup");
            self.send(driver.id, order.id, "waiting_driver", "New Delivery Available", body).await;
        }
    }

    pub async fn order_cancelled(&self, order: &Order) {
        let n = &order.order_number;
        let body = format!("Your order #{n} has been cancelled");
        self.send(order.customer_id, order.id, "cancelled", "Order Cancelled", body).await;
    }

    /// Tells the customer about a driver-driven tracking change. Statuses without a customer notice are ignored.
    pub async fn delivery_progress(&self, order_id: i64, status: TrackingStatus, driver_name: Option<&str>) {
        let order = match self.db.fetch_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!("🔔️ Order #{order_id} disappeared before its {status} notice was sent");
                return;
            },
            Err(e) => {
                warn!("🔔️ Could not fetch order #{order_id} for its {status} notice. {e}");
                return;
            },
        };
        let n = &order.order_number;
        let (title, body) = match status {
            TrackingStatus::DriverAssigned => {
                ("Driver Assigned", format!("Driver {} is handling order #{n}", driver_name.unwrap_or("")))
            },
            TrackingStatus::OnTheWay => ("On the Way", format!("Driver is on the way to deliver order #{n}")),
            TrackingStatus::Arrived => ("Driver Arrived", format!("Driver has arrived at your location for order #{n}")),
            TrackingStatus::Delivered => ("Order Delivered", format!("Your order #{n} has been delivered!")),
            _ => return,
        };
        self.send(order.customer_id, order.id, &status.to_string(), title, body).await;
    }

    async fn send(&self, recipient_id: i64, order_id: i64, status: &str, title: &str, body: String) {
        if self.producers.notification_producer.is_empty() {
            return;
        }
        let user = match self.db.fetch_user(recipient_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("🔔️ User #{recipient_id} does not exist. Notice '{title}' dropped");
                return;
            },
            Err(e) => {
                warn!("🔔️ Could not fetch user #{recipient_id}. Notice '{title}' dropped. {e}");
                return;
            },
        };
        let Some(token) = user.push_token.filter(|t| !t.trim().is_empty()) else {
            warn!("🔔️ User #{recipient_id} has no push token. Notice '{title}' skipped");
            return;
        };
        let event = NotificationEvent::new(recipient_id, token, title.to_string(), body).for_order(order_id, status);
        for producer in &self.producers.notification_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}
