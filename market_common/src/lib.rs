//! Shared value types for the marketplace fulfillment workspace.
//!
//! * [`Money`] is the single currency representation used everywhere. Amounts are whole minor units (hundredths).
//! * [`Percentage`] holds commission rates and voucher percentages in hundredths of a percent.
//! * [`Secret`] masks sensitive configuration values in logs.
mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, Percentage, CURRENCY_CODE, MINOR_UNITS};
pub use secret::Secret;
