use crate::{
    db_types::{Address, DeliveryTracking, Order, OrderStatus, Payment, Product, User},
    market_api::order_objects::{OrderDetails, TrackingWithHistory},
    traits::{data_objects::DriverStatistics, FulfillmentError},
};

/// Read-only queries over orders, tracking and the reference data the engine relies on.
///
/// Every method returns fully populated values. Nothing is loaded lazily.
#[allow(async_fn_in_trait)]
pub trait MarketplaceQueries {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, FulfillmentError>;

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, FulfillmentError>;

    /// The order with its items, merchant payments, payments and tracking history.
    async fn fetch_order_details(&self, order_id: i64) -> Result<Option<OrderDetails>, FulfillmentError>;

    /// Newest first
    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, FulfillmentError>;

    /// Orders containing at least one of the merchant's products, newest first.
    async fn fetch_orders_for_merchant(
        &self,
        merchant_id: i64,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, FulfillmentError>;

    async fn fetch_tracking(&self, order_id: i64) -> Result<Option<TrackingWithHistory>, FulfillmentError>;

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, FulfillmentError>;

    /// Paid, approved orders that are waiting for a driver, oldest first.
    async fn fetch_available_deliveries(&self) -> Result<Vec<Order>, FulfillmentError>;

    async fn fetch_active_deliveries(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError>;

    /// Delivered and cancelled deliveries for the driver, newest first.
    async fn fetch_delivery_history(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError>;

    async fn fetch_driver_statistics(&self, driver_id: i64) -> Result<DriverStatistics, FulfillmentError>;

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, FulfillmentError>;

    async fn fetch_active_drivers(&self) -> Result<Vec<User>, FulfillmentError>;

    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, FulfillmentError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, FulfillmentError>;
}
