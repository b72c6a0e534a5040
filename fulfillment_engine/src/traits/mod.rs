//! # Backend contracts
//!
//! This module defines the interface contracts that fulfillment engine database *backends* must honour.
//!
//! * [`FulfillmentDatabase`] defines the state-changing operations of the order lifecycle. Each one is atomic.
//! * [`MarketplaceQueries`] provides read access to orders, tracking and reference data.
//! * [`InventoryManagement`] is the stock ledger.
//! * [`WithdrawalManagement`] covers merchant cash-outs and balances.
//!
//! The collaborator traits, [`NotificationGateway`] and [`RoutePlanner`], describe external services the engine calls
//! after a transaction has committed.
mod collaborators;
mod data_objects;
mod fulfillment_database;
mod inventory_management;
mod marketplace_queries;
mod withdrawal_management;

pub use collaborators::{
    ExternalServiceError,
    GeoPoint,
    NoRoutePlanner,
    NotificationGateway,
    RouteEstimate,
    RoutePlanner,
};
pub use data_objects::{ApprovalResult, DriverStatistics, LocationChange, PaymentUpdate};
pub use fulfillment_database::{transition_error, FulfillmentDatabase, FulfillmentError};
pub use inventory_management::InventoryManagement;
pub use marketplace_queries::MarketplaceQueries;
pub use withdrawal_management::WithdrawalManagement;
