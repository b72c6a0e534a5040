use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryTracking, MerchantPayment, Order, Payment, TrackingStatus},
    market_api::payment_objects::WebhookOutcome,
};

/// The result of applying a gateway notification.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub outcome: WebhookOutcome,
    pub order: Order,
    pub payment: Payment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResult {
    pub order: Order,
    pub merchant_payment: MerchantPayment,
    /// True when this approval was the last one outstanding and the order moved on to `waiting_driver`.
    pub order_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationChange {
    pub tracking: DeliveryTracking,
    pub previous_status: TrackingStatus,
}

impl LocationChange {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.tracking.status
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DriverStatistics {
    pub total_deliveries: i64,
    pub active_deliveries: i64,
    pub today_deliveries: i64,
}
