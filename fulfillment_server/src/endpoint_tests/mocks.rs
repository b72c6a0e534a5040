use fulfillment_engine::{
    db_types::{
        Address,
        DeliveryTracking,
        MerchantWithdrawal,
        Order,
        OrderStatus,
        Payment,
        Product,
        User,
        WithdrawalStatus,
    },
    order_objects::{OrderDetails, TrackingWithHistory},
    traits::DriverStatistics,
    withdrawal_objects::{MerchantBalance, WithdrawalDecision},
    FulfillmentError,
    MarketplaceQueries,
    WithdrawalManagement,
};
use market_common::Money;
use mockall::mock;

mock! {
    pub Marketplace {}
    impl MarketplaceQueries for Marketplace {
        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, FulfillmentError>;
        async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, FulfillmentError>;
        async fn fetch_order_details(&self, order_id: i64) -> Result<Option<OrderDetails>, FulfillmentError>;
        async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, FulfillmentError>;
        async fn fetch_orders_for_merchant(&self, merchant_id: i64, status: Option<OrderStatus>) -> Result<Vec<Order>, FulfillmentError>;
        async fn fetch_tracking(&self, order_id: i64) -> Result<Option<TrackingWithHistory>, FulfillmentError>;
        async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, FulfillmentError>;
        async fn fetch_available_deliveries(&self) -> Result<Vec<Order>, FulfillmentError>;
        async fn fetch_active_deliveries(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError>;
        async fn fetch_delivery_history(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError>;
        async fn fetch_driver_statistics(&self, driver_id: i64) -> Result<DriverStatistics, FulfillmentError>;
        async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, FulfillmentError>;
        async fn fetch_active_drivers(&self) -> Result<Vec<User>, FulfillmentError>;
        async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, FulfillmentError>;
        async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, FulfillmentError>;
    }
}

mock! {
    pub Withdrawals {}
    impl WithdrawalManagement for Withdrawals {
        async fn request_withdrawal<'a>(&self, merchant_id: i64, amount: Money, notes: Option<&'a str>) -> Result<MerchantWithdrawal, FulfillmentError>;
        async fn process_withdrawal(&self, admin_id: i64, withdrawal_id: i64, decision: &WithdrawalDecision) -> Result<MerchantWithdrawal, FulfillmentError>;
        async fn cancel_withdrawal(&self, merchant_id: i64, withdrawal_id: i64) -> Result<MerchantWithdrawal, FulfillmentError>;
        async fn fetch_balance(&self, merchant_id: i64) -> Result<MerchantBalance, FulfillmentError>;
        async fn fetch_withdrawals_for_merchant(&self, merchant_id: i64) -> Result<Vec<MerchantWithdrawal>, FulfillmentError>;
        async fn search_withdrawals(&self, status: Option<WithdrawalStatus>) -> Result<Vec<MerchantWithdrawal>, FulfillmentError>;
    }
}
