//! Marketplace Fulfillment Engine
//!
//! The fulfillment engine takes a multi-vendor marketplace order from the customer's cart to their door. Customers
//! order from several independent merchants at once, pay through an external gateway (or cash on delivery), each
//! merchant approves or rejects its part, and an independent driver picks the order up and delivers it.
//!
//! The library is divided into three main sections:
//! 1. The backend contracts ([`mod@traits`]) and the SQLite backend that implements them ([`SqliteDatabase`]). Every
//!    state-changing operation is a single transaction: order, items, stock, merchant ledger, tracking and history
//!    change together or not at all. The data types used in the database are defined in [`mod@db_types`].
//! 2. The engine's public API ([`mod@market_api`]). This is what a server should call. The API structs add the parts
//!    that happen after a transaction commits: events, push notices and display-only ETAs.
//! 3. Events ([`mod@events`]). Subscribers hook into order payment, cancellation and notification events without
//!    blocking the request that caused them.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod market_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use market_api::{
    actor::Actor,
    order_objects,
    payment_objects,
    settings::FulfillmentSettings,
    tracking_objects,
    withdrawal_objects,
    DeliveryApi,
    InventoryApi,
    MarketplaceApi,
    OrderFlowApi,
    WithdrawalApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    FulfillmentDatabase,
    FulfillmentError,
    InventoryManagement,
    MarketplaceQueries,
    WithdrawalManagement,
};
