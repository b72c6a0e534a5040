use market_common::Money;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SHIPPING_COST: i64 = 10_000;
pub const DEFAULT_MAX_ACTIVE_DELIVERIES: i64 = 5;
pub const DEFAULT_MIN_WITHDRAWAL: i64 = 10_000;

/// Business rules that vary between deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentSettings {
    /// Flat shipping cost added to every order
    pub shipping_cost: Money,
    /// The most deliveries a driver may hold in `driver_assigned`, `on_the_way` or `arrived` at once
    pub max_active_deliveries: i64,
    pub min_withdrawal: Money,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            shipping_cost: Money::from_major(DEFAULT_SHIPPING_COST),
            max_active_deliveries: DEFAULT_MAX_ACTIVE_DELIVERIES,
            min_withdrawal: Money::from_major(DEFAULT_MIN_WITHDRAWAL),
        }
    }
}
