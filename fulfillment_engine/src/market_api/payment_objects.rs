use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A payment status notification, as posted by the payment gateway.
///
/// The gateway calls our transaction id `order_id`; its own `transaction_id`, and every other field it sends, end up
/// in `extra` so that the full notification can be stored with the payment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayNotification {
    #[serde(rename = "order_id")]
    pub transaction_id: String,
    pub transaction_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatewayNotification {
    pub fn new<S: Into<String>>(transaction_id: S, transaction_status: S) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            transaction_status: transaction_status.into(),
            ..Default::default()
        }
    }

    pub fn with_fraud_status<S: Into<String>>(mut self, fraud_status: S) -> Self {
        self.fraud_status = Some(fraud_status.into());
        self
    }

    pub fn with_payment_type<S: Into<String>>(mut self, payment_type: S) -> Self {
        self.payment_type = Some(payment_type.into());
        self
    }

    /// Interprets the gateway's transaction and fraud statuses.
    ///
    /// | transaction_status      | fraud_status | verdict  |
    /// |-------------------------|--------------|----------|
    /// | capture                 | accept       | Success  |
    /// | capture                 | anything else| Ignore   |
    /// | settlement              |              | Success  |
    /// | pending                 |              | Pending  |
    /// | deny, expire, cancel    |              | Failure  |
    /// | anything else           |              | Ignore   |
    pub fn verdict(&self) -> GatewayVerdict {
        match self.transaction_status.as_str() {
            "capture" if self.fraud_status.as_deref() == Some("accept") => GatewayVerdict::Success,
            "settlement" => GatewayVerdict::Success,
            "pending" => GatewayVerdict::Pending,
            "deny" | "expire" | "cancel" => GatewayVerdict::Failure,
            _ => GatewayVerdict::Ignore,
        }
    }

    /// The notification as stored in the payment's metadata column.
    pub fn to_metadata(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayVerdict {
    Success,
    Pending,
    Failure,
    Ignore,
}

/// What applying a gateway notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The order is now paid, and tracking has moved on to `waiting_merchant`.
    Confirmed,
    /// The order had already been paid. Nothing changed.
    AlreadyConfirmed,
    /// Money arrived for an order that had been cancelled in the meantime. The customer is owed a refund.
    RefundRequired,
    Pending,
    Failed,
    /// The notification carries nothing actionable.
    Ignored,
}

impl Display for WebhookOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Confirmed => "confirmed",
            Self::AlreadyConfirmed => "already_confirmed",
            Self::RefundRequired => "refund_required",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        };
        f.write_str(s)
    }
}
