use market_common::Money;
use thiserror::Error;

use crate::{
    db_types::{DeliveryTracking, Order, Payment, TrackingStatus},
    helpers::VoucherError,
    market_api::{
        actor::Actor,
        order_objects::{CheckoutRequest, OrderDetails},
        payment_objects::GatewayNotification,
        tracking_objects::{DeliveryProof, LocationUpdate, PickupProof},
    },
    traits::{
        data_objects::{ApprovalResult, LocationChange, PaymentUpdate},
        MarketplaceQueries,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    #[error("{0}")]
    ValidationError(String),
    /// Deliberately vague. Callers cannot tell "does not exist" from "is not yours".
    #[error("{0} not found")]
    NotFound(String),
    #[error("Insufficient stock for {product}. Available: {available}")]
    InsufficientStock { product: String, available: i64 },
    #[error("Invalid transition. {0}")]
    InvalidTransition(String),
    #[error("Payment has not been confirmed for order {0}")]
    PaymentNotConfirmed(String),
    #[error("Insufficient balance. Available: {0}")]
    InsufficientBalance(Money),
    #[error("Driver already has the maximum of {0} active deliveries")]
    DriverCapacityExceeded(i64),
    #[error("{0}")]
    AlreadyProcessed(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl FulfillmentError {
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<VoucherError> for FulfillmentError {
    fn from(e: VoucherError) -> Self {
        Self::ValidationError(e.to_string())
    }
}

/// This trait defines the highest level of behaviour for backends supporting the fulfillment engine.
///
/// Every method is a single atomic unit: either all of its writes land, or none do. Methods never call out to external
/// services; the API layer does that after the method returns.
///
/// This behaviour includes:
/// * Checkout: turning a customer's cart into an order, reserving stock and opening the settlement ledger.
/// * Payment confirmation from gateway notifications.
/// * Merchant decisions on paid orders.
/// * The driver side of the delivery state machine.
/// * Cancellation.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase: Clone + MarketplaceQueries {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Converts the customer's cart into an order.
    ///
    /// In one transaction: the cart is emptied, the order and its items are created, stock is reserved for every
    /// item, one merchant payment is opened per merchant, the delivery tracking record is created in
    /// `pending_payment` with its first history entry, and the voucher's usage count is incremented.
    ///
    /// Cash-on-delivery orders are confirmed immediately and move straight on to `waiting_merchant`.
    async fn checkout(
        &self,
        customer_id: i64,
        request: &CheckoutRequest,
        shipping_cost: Money,
    ) -> Result<OrderDetails, FulfillmentError>;

    /// Creates, or refreshes, the pending gateway payment for an unpaid order.
    async fn initiate_payment(&self, customer_id: i64, order_id: i64) -> Result<Payment, FulfillmentError>;

    /// Applies a verified gateway notification. Idempotent: a notification that has already been applied changes
    /// nothing.
    async fn apply_gateway_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<PaymentUpdate, FulfillmentError>;

    /// Records the merchant's approval. When the last merchant on the order approves, the order moves on to
    /// `waiting_driver`.
    async fn approve_order(&self, merchant_id: i64, order_id: i64) -> Result<ApprovalResult, FulfillmentError>;

    /// A merchant rejection cancels the entire order, restoring all stock and failing every merchant payment.
    async fn reject_order(&self, merchant_id: i64, order_id: i64, reason: &str) -> Result<Order, FulfillmentError>;

    /// Cancels the order from any non-terminal state, on behalf of the owning customer or an admin.
    async fn cancel_order(&self, actor: &Actor, order_id: i64, reason: &str) -> Result<Order, FulfillmentError>;

    /// Assigns the driver to an order that is waiting for one. Only one driver can ever win this race.
    async fn accept_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        max_active_deliveries: i64,
    ) -> Result<DeliveryTracking, FulfillmentError>;

    /// Records that a driver has passed on an order, and why. The order stays available to other drivers.
    async fn decline_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        reason: &str,
    ) -> Result<DeliveryTracking, FulfillmentError>;

    /// Updates the driver's position, and optionally moves the delivery on to `status`.
    async fn update_location(
        &self,
        driver_id: i64,
        order_id: i64,
        update: &LocationUpdate,
    ) -> Result<LocationChange, FulfillmentError>;

    async fn start_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        proof: &PickupProof,
    ) -> Result<DeliveryTracking, FulfillmentError>;

    async fn complete_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        proof: &DeliveryProof,
    ) -> Result<DeliveryTracking, FulfillmentError>;

    async fn close(&mut self) -> Result<(), FulfillmentError> {
        Ok(())
    }
}

/// Describes a failed compare-and-set on the tracking row.
pub fn transition_error(current: TrackingStatus, target: TrackingStatus) -> FulfillmentError {
    FulfillmentError::InvalidTransition(format!("Cannot move a delivery from {current} to {target}"))
}
