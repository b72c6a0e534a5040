//! Database record types and the status enums that drive the order lifecycle.
//!
//! Every status enum is stored as lower snake-case text, so the string returned by `Display` is exactly the value held
//! in the database and sent over the wire.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use market_common::{Money, Percentage};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a text-backed status enum. The first variant is the `Default`.
///
/// The text for each variant must be the snake-case form of the variant name, since that is what the sqlx and serde
/// derives use.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $(#[$fmeta:meta])* $first:ident => $first_text:literal $(, $(#[$vmeta:meta])* $variant:ident => $text:literal)* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
        #[sqlx(rename_all = "snake_case")]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $(#[$fmeta])*
            $first,
            $( $(#[$vmeta])* $variant, )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$first
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    Self::$first => $first_text,
                    $( Self::$variant => $text, )*
                };
                f.write_str(s)
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $first_text => Ok(Self::$first),
                    $( $text => Ok(Self::$variant), )*
                    _ => Err(ConversionError { kind: stringify!($name), value: s.to_string() }),
                }
            }
        }
    };
}

//--------------------------------------        Role         ---------------------------------------------------------
text_enum!(
    /// The role of a user. Each user has exactly one.
    Role {
        Customer => "customer",
        Merchant => "merchant",
        Driver => "driver",
        Admin => "admin",
    }
);

//--------------------------------------    Status axes      ---------------------------------------------------------
text_enum!(
    /// The customer-facing lifecycle of an order.
    OrderStatus {
        Pending => "pending",
        Paid => "paid",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// Whether the order has been paid for. Only payment confirmation events change this.
    PaymentStatus {
        Unpaid => "unpaid",
        Paid => "paid",
        Failed => "failed",
        Expired => "expired",
    }
);

text_enum!(
    /// The merchants' decision on the order. Only merchant decisions change this.
    MerchantStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

text_enum!(
    PaymentMethod {
        /// Paid online through the payment gateway
        Midtrans => "midtrans",
        /// Cash on delivery
        Cod => "cod",
    }
);

text_enum!(
    MerchantPaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
    }
);

text_enum!(
    /// Status of a single gateway transaction.
    GatewayPaymentStatus {
        Pending => "pending",
        Success => "success",
        Failed => "failed",
        Expired => "expired",
    }
);

text_enum!(
    WithdrawalStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Rejected => "rejected",
    }
);

text_enum!(
    VoucherType {
        Percentage => "percentage",
        Fixed => "fixed",
    }
);

//--------------------------------------   TrackingStatus    ---------------------------------------------------------
text_enum!(
    /// The physical fulfillment pipeline of an order.
    ///
    /// `pending_payment → waiting_merchant → waiting_driver → driver_assigned → on_the_way → arrived → delivered`,
    /// with `cancelled` reachable from every non-terminal state.
    TrackingStatus {
        PendingPayment => "pending_payment",
        WaitingMerchant => "waiting_merchant",
        WaitingDriver => "waiting_driver",
        DriverAssigned => "driver_assigned",
        OnTheWay => "on_the_way",
        Arrived => "arrived",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
);

impl TrackingStatus {
    /// Statuses in which a delivery counts against a driver's capacity.
    pub const ACTIVE_DELIVERY: [TrackingStatus; 3] =
        [TrackingStatus::DriverAssigned, TrackingStatus::OnTheWay, TrackingStatus::Arrived];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn is_active_delivery(&self) -> bool {
        Self::ACTIVE_DELIVERY.contains(self)
    }

    /// The states from which a transition into `self` is permitted.
    ///
    /// | To               | From                                       |
    /// |------------------|--------------------------------------------|
    /// | waiting_merchant | pending_payment                            |
    /// | waiting_driver   | waiting_merchant                           |
    /// | driver_assigned  | waiting_driver                             |
    /// | on_the_way       | driver_assigned                            |
    /// | arrived          | on_the_way                                 |
    /// | delivered        | on_the_way, arrived                        |
    /// | cancelled        | any non-terminal state                     |
    /// | pending_payment  | (initial state only)                       |
    pub fn allowed_sources(&self) -> &'static [TrackingStatus] {
        use TrackingStatus::*;
        match self {
            PendingPayment => &[],
            WaitingMerchant => &[PendingPayment],
            WaitingDriver => &[WaitingMerchant],
            DriverAssigned => &[WaitingDriver],
            OnTheWay => &[DriverAssigned],
            Arrived => &[OnTheWay],
            Delivered => &[OnTheWay, Arrived],
            Cancelled => &[PendingPayment, WaitingMerchant, WaitingDriver, DriverAssigned, OnTheWay, Arrived],
        }
    }

    pub fn can_transition_to(&self, new_status: TrackingStatus) -> bool {
        new_status.allowed_sources().contains(self)
    }

    /// Rough completion percentage shown to customers.
    pub fn progress(&self) -> u8 {
        match self {
            Self::PendingPayment => 10,
            Self::WaitingMerchant => 30,
            Self::WaitingDriver => 50,
            Self::DriverAssigned => 60,
            Self::OnTheWay => 80,
            Self::Arrived => 90,
            Self::Delivered => 100,
            Self::Cancelled => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PendingPayment => "Waiting for Payment",
            Self::WaitingMerchant => "Waiting for Merchant",
            Self::WaitingDriver => "Waiting for Driver",
            Self::DriverAssigned => "Driver Assigned",
            Self::OnTheWay => "On the Way",
            Self::Arrived => "Driver Arrived",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// The history description used when the caller does not supply one.
    pub fn default_description(&self) -> &'static str {
        match self {
            Self::PendingPayment => "Order placed, waiting for payment",
            Self::WaitingMerchant => "Payment confirmed, waiting for merchant approval",
            Self::WaitingDriver => "Order approved by merchant, waiting for driver",
            Self::DriverAssigned => "Driver assigned to the order",
            Self::OnTheWay => "Driver picked up the order and is on the way",
            Self::Arrived => "Driver has arrived at the delivery location",
            Self::Delivered => "Order delivered successfully",
            Self::Cancelled => "Order cancelled",
        }
    }
}

//--------------------------------------     OrderNumber     ---------------------------------------------------------
/// The human-readable order identifier, e.g. `ORD-7K2M9QX4TZ`. Assigned at checkout and never changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

//--------------------------------------       Users         ---------------------------------------------------------
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub push_token: Option<String>,
    pub is_active: bool,
    /// Merchants only
    pub store_name: Option<String>,
    /// Merchants only. The platform's cut of each order.
    pub commission_rate: Percentage,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
    /// Drivers only
    pub vehicle_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_bank_details(&self) -> bool {
        [&self.bank_name, &self.bank_account_number, &self.bank_account_name]
            .iter()
            .all(|v| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub push_token: Option<String>,
    pub store_name: Option<String>,
    pub commission_rate: Percentage,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
    pub vehicle_number: Option<String>,
}

impl NewUser {
    pub fn new<S: Into<String>>(name: S, email: S, role: Role) -> Self {
        Self { name: name.into(), email: email.into(), role, ..Default::default() }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_push_token<S: Into<String>>(mut self, token: S) -> Self {
        self.push_token = Some(token.into());
        self
    }

    pub fn with_store(mut self, store_name: &str, commission_rate: Percentage) -> Self {
        self.store_name = Some(store_name.to_string());
        self.commission_rate = commission_rate;
        self
    }

    pub fn with_bank_details(mut self, bank: &str, account_number: &str, account_name: &str) -> Self {
        self.bank_name = Some(bank.to_string());
        self.bank_account_number = Some(account_number.to_string());
        self.bank_account_name = Some(account_name.to_string());
        self
    }

    pub fn with_vehicle<S: Into<String>>(mut self, vehicle_number: S) -> Self {
        self.vehicle_number = Some(vehicle_number.into());
        self
    }
}

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub recipient_name: String,
    pub phone: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAddress {
    pub user_id: i64,
    pub recipient_name: String,
    pub phone: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

//--------------------------------------  Catalog & carts    ---------------------------------------------------------
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    pub voucher_type: VoucherType,
    /// Hundredths of a percent for percentage vouchers, minor currency units for fixed vouchers.
    pub discount_value: i64,
    pub min_purchase: Money,
    pub max_discount: Option<Money>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

//--------------------------------------       Orders        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub customer_id: i64,
    pub address_id: i64,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    /// Always `subtotal + shipping_cost - discount`
    pub total_price: Money,
    pub payment_method: PaymentMethod,
    pub voucher_id: Option<i64>,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub merchant_status: MerchantStatus,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The values needed to insert a new order row. Statuses always start at their defaults.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer_id: i64,
    pub address_id: i64,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub payment_method: PaymentMethod,
    pub voucher_id: Option<i64>,
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn total_price(&self) -> Money {
        self.subtotal + self.shipping_cost - self.discount
    }
}

/// Line item. Product name and price are snapshots taken at checkout.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub merchant_id: i64,
    pub product_name: String,
    pub price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MerchantPayment {
    pub id: i64,
    pub order_id: i64,
    pub merchant_id: i64,
    pub order_amount: Money,
    pub commission_rate: Percentage,
    pub commission_amount: Money,
    pub merchant_amount: Money,
    pub status: MerchantPaymentStatus,
    /// When this merchant approved the order
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A gateway (or cash-on-delivery) transaction for an order.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub gateway: PaymentMethod,
    pub transaction_id: String,
    pub payment_type: Option<String>,
    pub amount: Money,
    pub status: GatewayPaymentStatus,
    /// The last raw notification received from the gateway, as JSON
    pub metadata: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      Delivery       ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DeliveryTracking {
    pub id: i64,
    pub order_id: i64,
    pub driver_id: Option<i64>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub vehicle_number: Option<String>,
    pub status: TrackingStatus,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub pickup_photo: Option<String>,
    pub delivery_photo: Option<String>,
    pub signature: Option<String>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit entry. The database rejects updates to these rows.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TrackingHistory {
    pub id: i64,
    pub delivery_tracking_id: i64,
    pub status: TrackingStatus,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Withdrawals     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MerchantWithdrawal {
    pub id: i64,
    pub merchant_id: i64,
    pub amount: Money,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_account_name: Option<String>,
    pub status: WithdrawalStatus,
    pub notes: Option<String>,
    pub reject_reason: Option<String>,
    pub processed_by: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
