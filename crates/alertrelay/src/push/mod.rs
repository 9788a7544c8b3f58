//! Web push delivery.
//!
//! This module defines the browser subscription and notification payload
//! types, and the [`PushSender`] seam the webhook relays through. The
//! production sender is [`WebPushSender`].

mod sender;
mod vapid;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use sender::WebPushSender;
pub use vapid::VapidKeys;

/// Errors that can occur while delivering a push message.
#[derive(Debug, Error)]
pub enum PushError {
    /// The push service no longer accepts this subscription (404 / 410).
    #[error("subscription is no longer valid")]
    Gone,

    /// The VAPID key material is unusable.
    #[error("invalid VAPID key: {0}")]
    Vapid(String),

    /// The stored subscription cannot be used to address a browser.
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),

    /// Any other delivery failure.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl PushError {
    /// Whether the subscription should be forgotten.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone)
    }
}

/// Result type for push operations.
pub type Result<T> = std::result::Result<T, PushError>;

/// A browser push subscription, as produced by `PushSubscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    /// Push service URL for this browser.
    pub endpoint: String,
    /// When the subscription expires, epoch milliseconds.
    #[serde(default)]
    pub expiration_time: Option<f64>,
    /// Message encryption keys.
    pub keys: SubscriptionKeys,
}

/// Client keys used to encrypt the message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Client P-256 public key, URL-safe base64.
    pub p256dh: String,
    /// Client authentication secret, URL-safe base64.
    pub auth: String,
}

impl PushSubscription {
    /// Check that the subscription can address a browser.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::InvalidSubscription`] if the endpoint is not an
    /// http(s) URL or a key is empty.
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(PushError::InvalidSubscription(
                "endpoint must be an http(s) URL".to_string(),
            ));
        }
        if self.keys.p256dh.is_empty() || self.keys.auth.is_empty() {
            return Err(PushError::InvalidSubscription(
                "p256dh and auth keys are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a subscription previously stored as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::InvalidSubscription`] if the JSON does not
    /// describe a usable subscription.
    pub fn from_stored(json: &str) -> Result<Self> {
        let subscription: Self = serde_json::from_str(json)
            .map_err(|err| PushError::InvalidSubscription(err.to_string()))?;
        subscription.validate()?;
        Ok(subscription)
    }
}

/// Title and icon applied to every alert notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTemplate {
    /// Notification title.
    pub title: String,
    /// Notification icon path.
    pub icon: String,
}

/// The JSON document the service worker receives for one alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertNotification {
    /// Notification title.
    pub title: String,
    /// The alert exactly as the webhook supplied it.
    pub body: Value,
    /// Notification icon path.
    pub icon: String,
    /// Routing data the service worker matches against its session.
    pub data: AlertData,
}

/// Routing data attached to an alert notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertData {
    /// Vehicle the alert is about.
    pub vehicle_number: String,
    /// Owner of the vehicle.
    #[serde(rename = "userId")]
    pub user_id: i64,
    /// When the alert was relayed, epoch milliseconds.
    pub timestamp: i64,
}

impl AlertNotification {
    /// Build the notification for one alert.
    #[must_use]
    pub fn new(
        template: &AlertTemplate,
        alert: Value,
        vehicle_number: &str,
        user_id: i64,
        timestamp: i64,
    ) -> Self {
        Self {
            title: template.title.clone(),
            body: alert,
            icon: template.icon.clone(),
            data: AlertData {
                vehicle_number: vehicle_number.to_string(),
                user_id,
                timestamp,
            },
        }
    }

    /// Serialize to the bytes handed to the push service.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Delivers an encrypted payload to one browser subscription.
#[async_trait::async_trait]
pub trait PushSender: Send + Sync + std::fmt::Debug {
    /// Send `payload` to `subscription`.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Gone`] if the push service reports the
    /// subscription expired, or another [`PushError`] on failure.
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWSER_JSON: &str = r#"{
        "endpoint": "https://fcm.googleapis.com/fcm/send/abc123",
        "expirationTime": null,
        "keys": {"p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM", "auth": "tBHItJI5svbpez7KI4CCXg"}
    }"#;

    #[test]
    fn test_parse_browser_subscription() {
        let sub: PushSubscription = serde_json::from_str(BROWSER_JSON).unwrap();

        assert_eq!(sub.endpoint, "https://fcm.googleapis.com/fcm/send/abc123");
        assert!(sub.expiration_time.is_none());
        assert_eq!(sub.keys.auth, "tBHItJI5svbpez7KI4CCXg");
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn test_serialize_uses_browser_field_names() {
        let sub: PushSubscription = serde_json::from_str(BROWSER_JSON).unwrap();
        let json = serde_json::to_value(&sub).unwrap();

        assert!(json.get("expirationTime").is_some());
        assert!(json["keys"].get("p256dh").is_some());
    }

    #[test]
    fn test_from_stored_round_trips() {
        let sub: PushSubscription = serde_json::from_str(BROWSER_JSON).unwrap();
        let stored = serde_json::to_string(&sub).unwrap();

        assert_eq!(PushSubscription::from_stored(&stored).unwrap(), sub);
    }

    #[test]
    fn test_from_stored_rejects_garbage() {
        let err = PushSubscription::from_stored("not json").unwrap_err();
        assert!(matches!(err, PushError::InvalidSubscription(_)));

        let err = PushSubscription::from_stored(r#"{"endpoint": "https://x"}"#).unwrap_err();
        assert!(matches!(err, PushError::InvalidSubscription(_)));
    }

    #[test]
    fn test_validate_rejects_bad_endpoint_and_keys() {
        let mut sub: PushSubscription = serde_json::from_str(BROWSER_JSON).unwrap();
        sub.endpoint = "ftp://push.example".to_string();
        assert!(sub.validate().is_err());

        let mut sub: PushSubscription = serde_json::from_str(BROWSER_JSON).unwrap();
        sub.keys.auth.clear();
        assert!(sub.validate().is_err());
    }

    #[test]
    fn test_alert_notification_shape() {
        let template = AlertTemplate {
            title: "Vehicle Alert".to_string(),
            icon: "/icon.png".to_string(),
        };
        let notification = AlertNotification::new(
            &template,
            Value::String("Speed limit exceeded".to_string()),
            "KA01AB1234",
            7,
            1_700_000_000_000,
        );

        let json: Value = serde_json::from_slice(&notification.to_payload().unwrap()).unwrap();
        assert_eq!(json["title"], "Vehicle Alert");
        assert_eq!(json["body"], "Speed limit exceeded");
        assert_eq!(json["icon"], "/icon.png");
        assert_eq!(json["data"]["vehicle_number"], "KA01AB1234");
        assert_eq!(json["data"]["userId"], 7);
        assert_eq!(json["data"]["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_alert_body_keeps_structured_alerts() {
        let template = AlertTemplate {
            title: "t".to_string(),
            icon: "i".to_string(),
        };
        let alert = serde_json::json!({"code": "TPMS", "pressure": 21});
        let notification = AlertNotification::new(&template, alert.clone(), "V", 1, 0);

        assert_eq!(notification.body, alert);
    }

    #[test]
    fn test_push_error_is_gone() {
        assert!(PushError::Gone.is_gone());
        assert!(!PushError::Delivery("timeout".to_string()).is_gone());
    }
}
