use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db_types::{Order, OrderStatus};

/// A push notification destined for one user's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient_id: i64,
    pub push_token: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl NotificationEvent {
    pub fn new<S: Into<String>>(recipient_id: i64, push_token: S, title: S, body: S) -> Self {
        Self {
            recipient_id,
            push_token: push_token.into(),
            title: title.into(),
            body: body.into(),
            data: Value::Null,
        }
    }

    /// Attaches the standard order status payload that the mobile apps use for deep links.
    pub fn for_order(mut self, order_id: i64, status: &str) -> Self {
        self.data = json!({ "type": "order_status", "order_id": order_id, "status": status });
        self
    }
}

/// Emitted once, when an order's payment is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted when an order is cancelled, whether by the customer, an admin, or a merchant rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatus,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    Notification(NotificationEvent),
    OrderPaid(OrderPaidEvent),
    OrderAnnulled(OrderAnnulledEvent),
}
