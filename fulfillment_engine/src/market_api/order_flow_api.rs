use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, Payment, PaymentStatus},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent},
    market_api::{
        actor::Actor,
        notices::Notices,
        order_objects::{CheckoutRequest, OrderDetails},
        payment_objects::{GatewayNotification, WebhookOutcome},
        settings::FulfillmentSettings,
    },
    traits::{ApprovalResult, FulfillmentDatabase, FulfillmentError, PaymentUpdate},
};

/// `OrderFlowApi` drives an order from checkout through payment and merchant approval, and handles cancellations.
///
/// Each call is a single transaction in the backend. Events and notices go out only once that transaction has
/// committed, and their failure never affects the result.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    settings: FulfillmentSettings,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, settings: FulfillmentSettings) -> Self {
        Self { db, producers, settings }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn settings(&self) -> &FulfillmentSettings {
        &self.settings
    }
}

impl<B> OrderFlowApi<B>
where B: FulfillmentDatabase
{
    /// Turns the customer's cart into an order.
    ///
    /// Stock is reserved, the merchant ledger entries and tracking are created and the cart is cleared in one
    /// transaction. Cash-on-delivery orders come back already confirmed and waiting for merchant approval.
    pub async fn checkout(&self, customer_id: i64, request: CheckoutRequest) -> Result<OrderDetails, FulfillmentError> {
        let details = self.db.checkout(customer_id, &request, self.settings.shipping_cost).await?;
        debug!(
            "🔄️📦️ Order {} created for customer #{customer_id} with {} merchant(s)",
            details.order.order_number,
            details.merchant_payments.len()
        );
        if details.order.payment_status == PaymentStatus::Paid {
            self.on_order_paid(&details.order, &details.merchant_ids()).await;
        }
        Ok(details)
    }

    /// Opens (or refreshes) the gateway payment for an unpaid order.
    pub async fn initiate_payment(&self, customer_id: i64, order_id: i64) -> Result<Payment, FulfillmentError> {
        let payment = self.db.initiate_payment(customer_id, order_id).await?;
        debug!("🔄️💰️ Payment {} of {} opened for order #{order_id}", payment.transaction_id, payment.amount);
        Ok(payment)
    }

    /// Applies a verified gateway notification. Redelivery of a notification that has already been applied is a
    /// successful no-op.
    pub async fn process_gateway_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<PaymentUpdate, FulfillmentError> {
        let update = self.db.apply_gateway_notification(&notification).await?;
        match update.outcome {
            WebhookOutcome::Confirmed => {
                info!("🔄️💰️ Order {} has been paid", update.order.order_number);
                let merchant_ids = self.merchant_ids(update.order.id).await;
                self.on_order_paid(&update.order, &merchant_ids).await;
            },
            WebhookOutcome::RefundRequired => {
                error!(
                    "🔄️💰️ Order {} was cancelled before payment {} of {} succeeded. Refund required.",
                    update.order.order_number, update.payment.transaction_id, update.payment.amount
                );
            },
            WebhookOutcome::Failed => {
                info!("🔄️💰️ Payment {} for order {} failed", update.payment.transaction_id, update.order.order_number);
            },
            outcome => {
                trace!("🔄️💰️ Payment {} notification result: {outcome}", update.payment.transaction_id);
            },
        }
        Ok(update)
    }

    /// Records a merchant's approval. When it is the last approval outstanding, the order becomes available to
    /// drivers.
    pub async fn approve_order(&self, merchant_id: i64, order_id: i64) -> Result<ApprovalResult, FulfillmentError> {
        let result = self.db.approve_order(merchant_id, order_id).await?;
        if result.order_approved {
            info!("🔄️✅️ Order {} approved by all merchants", result.order.order_number);
            Notices::new(&self.db, &self.producers).order_processing(&result.order).await;
        } else {
            debug!("🔄️✅️ Merchant #{merchant_id} approved order {}. Waiting on others.", result.order.order_number);
        }
        Ok(result)
    }

    /// A merchant turns the order down. The whole order is cancelled and every item's stock is returned.
    pub async fn reject_order(&self, merchant_id: i64, order_id: i64, reason: &str) -> Result<Order, FulfillmentError> {
        let order = self.db.reject_order(merchant_id, order_id, reason).await?;
        info!("🔄️❌️ Merchant #{merchant_id} rejected order {}", order.order_number);
        self.on_order_annulled(&order).await;
        Ok(order)
    }

    /// Cancels an order on behalf of its customer or an admin. An empty reason is replaced with a default for the
    /// actor's role.
    pub async fn cancel_order(&self, actor: &Actor, order_id: i64, reason: &str) -> Result<Order, FulfillmentError> {
        let order = self.db.cancel_order(actor, order_id, reason).await?;
        info!("🔄️❌️ Order {} cancelled by {actor}", order.order_number);
        self.on_order_annulled(&order).await;
        Ok(order)
    }

    async fn merchant_ids(&self, order_id: i64) -> Vec<i64> {
        match self.db.fetch_order_details(order_id).await {
            Ok(Some(details)) => details.merchant_ids(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("🔄️ Could not fetch the merchants for order #{order_id}. {e}");
                Vec::new()
            },
        }
    }

    async fn on_order_paid(&self, order: &Order, merchant_ids: &[i64]) {
        for producer in &self.producers.order_paid_producer {
            debug!("🔄️📦️ Notifying order paid hook subscribers");
            producer.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
        Notices::new(&self.db, &self.producers).payment_confirmed(order, merchant_ids).await;
    }

    async fn on_order_annulled(&self, order: &Order) {
        for producer in &self.producers.order_annulled_producer {
            debug!("🔄️📦️ Notifying order annulled hook subscribers");
            producer.publish_event(OrderAnnulledEvent::new(order.clone())).await;
        }
        Notices::new(&self.db, &self.producers).order_cancelled(order).await;
    }
}
