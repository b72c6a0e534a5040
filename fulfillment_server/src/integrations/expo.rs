use std::sync::Arc;

use fulfillment_engine::{
    events::NotificationEvent,
    traits::{ExternalServiceError, NotificationGateway},
};
use log::*;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::PushConfig;

pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";
const SERVICE: &str = "Expo push";

/// The message format the Expo push service expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage<'a> {
    pub to: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub data: &'a Value,
    pub sound: &'static str,
    pub badge: u32,
    pub priority: &'static str,
    pub channel_id: &'a str,
}

impl<'a> PushMessage<'a> {
    pub fn from_event(event: &'a NotificationEvent) -> Self {
        let channel_id = event.data.get("type").and_then(Value::as_str).unwrap_or("default");
        Self {
            to: event.push_token.as_str(),
            title: event.title.as_str(),
            body: event.body.as_str(),
            data: &event.data,
            sound: "default",
            badge: 1,
            priority: "high",
            channel_id,
        }
    }
}

/// Sends push notifications to the mobile apps through Expo.
#[derive(Clone)]
pub struct ExpoNotifier {
    config: PushConfig,
    client: Arc<Client>,
}

impl ExpoNotifier {
    pub fn new(config: PushConfig) -> Self {
        Self { config, client: Arc::new(Client::new()) }
    }
}

impl NotificationGateway for ExpoNotifier {
    async fn notify(&self, notification: &NotificationEvent) -> Result<(), ExternalServiceError> {
        if !self.config.enabled {
            debug!(
                "🔔️ Push is disabled. Not sending '{}' to user #{}",
                notification.title, notification.recipient_id
            );
            return Ok(());
        }
        let message = PushMessage::from_event(notification);
        let response = self.client.post(&self.config.endpoint).json(&message).send().await.map_err(|e| {
            ExternalServiceError::RequestFailed { service: SERVICE.into(), reason: e.to_string() }
        })?;
        let status = response.status();
        let body = response.json::<Value>().await.map_err(|e| ExternalServiceError::InvalidResponse {
            service: SERVICE.into(),
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(ExternalServiceError::RequestFailed {
                service: SERVICE.into(),
                reason: format!("HTTP {status}. {body}"),
            });
        }
        check_ticket(&body)?;
        info!("🔔️ '{}' sent to user #{}", notification.title, notification.recipient_id);
        Ok(())
    }
}

/// Expo answers 200 even when it could not accept the message. The ticket in `data` says whether it did.
fn check_ticket(body: &Value) -> Result<(), ExternalServiceError> {
    let ticket = &body["data"];
    if ticket["status"].as_str() == Some("error") {
        let reason = ticket["message"].as_str().unwrap_or("Unknown error").to_string();
        return Err(ExternalServiceError::InvalidResponse { service: SERVICE.into(), reason });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_format() {
        let event = NotificationEvent::new(7, "ExponentPushToken[abc]", "On the Way", "Driver is on the way")
            .for_order(42, "on_the_way");
        let message = serde_json::to_value(PushMessage::from_event(&event)).unwrap();
        assert_eq!(message["to"], "ExponentPushToken[abc]");
        assert_eq!(message["title"], "On the Way");
        assert_eq!(message["channelId"], "order_status");
        assert_eq!(message["priority"], "high");
        assert_eq!(message["data"]["order_id"], 42);
    }

    #[test]
    fn channel_defaults_without_a_type() {
        let event = NotificationEvent::new(7, "ExponentPushToken[abc]", "Hello", "World");
        let message = PushMessage::from_event(&event);
        assert_eq!(message.channel_id, "default");
    }

    #[test]
    fn error_tickets_are_failures() {
        assert!(check_ticket(&json!({"data": {"status": "ok", "id": "XXXX"}})).is_ok());
        let err = check_ticket(&json!({"data": {"status": "error", "message": "DeviceNotRegistered"}})).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response from Expo push. DeviceNotRegistered");
    }

    #[tokio::test]
    async fn disabled_notifier_does_nothing() {
        let notifier = ExpoNotifier::new(PushConfig { enabled: false, endpoint: "http://127.0.0.1:1".into() });
        let event = NotificationEvent::new(7, "ExponentPushToken[abc]", "Hello", "World");
        assert!(notifier.notify(&event).await.is_ok());
    }
}
