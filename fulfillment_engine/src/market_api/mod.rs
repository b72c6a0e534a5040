//! The fulfillment engine's public API.
//!
//! Each API struct wraps a backend that implements the relevant [`crate::traits`] and adds the parts that do not
//! belong in a transaction: configured limits, events and customer notices.
pub mod actor;
pub mod order_objects;
pub mod payment_objects;
pub mod settings;
pub mod tracking_objects;
pub mod withdrawal_objects;

mod delivery_api;
mod inventory_api;
mod marketplace_api;
mod notices;
mod order_flow_api;
mod withdrawal_api;

pub use delivery_api::DeliveryApi;
pub use inventory_api::InventoryApi;
pub use marketplace_api::MarketplaceApi;
pub use order_flow_api::OrderFlowApi;
pub use withdrawal_api::WithdrawalApi;
