use serde::{Deserialize, Serialize};

use crate::db_types::{
    DeliveryTracking,
    MerchantPayment,
    Order,
    OrderItem,
    OrderStatus,
    Payment,
    PaymentMethod,
    TrackingHistory,
};

/// What the customer submits at checkout. The line items come from their cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub voucher_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn new(address_id: i64, payment_method: PaymentMethod) -> Self {
        Self { address_id, payment_method, voucher_code: None, notes: None }
    }

    pub fn with_voucher<S: Into<String>>(mut self, code: S) -> Self {
        self.voucher_code = Some(code.into());
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// The voucher code, trimmed and upper-cased. Blank codes count as no code.
    pub fn normalized_voucher_code(&self) -> Option<String> {
        self.voucher_code.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_uppercase)
    }
}

/// A delivery tracking record with its full history, oldest entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingWithHistory {
    #[serde(flatten)]
    pub tracking: DeliveryTracking,
    pub histories: Vec<TrackingHistory>,
}

/// The order aggregate: the order with everything it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub merchant_payments: Vec<MerchantPayment>,
    pub payments: Vec<Payment>,
    pub tracking: Option<TrackingWithHistory>,
}

impl OrderDetails {
    /// The distinct merchants with items in this order, in ascending id order.
    pub fn merchant_ids(&self) -> Vec<i64> {
        let mut ids = self.items.iter().map(|i| i.merchant_id).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn has_merchant(&self, merchant_id: i64) -> bool {
        self.items.iter().any(|i| i.merchant_id == merchant_id)
    }

    pub fn driver_id(&self) -> Option<i64> {
        self.tracking.as_ref().and_then(|t| t.tracking.driver_id)
    }
}

/// Filter for the merchant order list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantOrderQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}
