//! The production [`PushSender`], backed by the `web-push` crate.

use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

use super::{PushError, PushSender, PushSubscription, Result, VapidKeys};

/// Sends VAPID-signed, `aes128gcm`-encrypted messages to push services.
pub struct WebPushSender {
    client: IsahcWebPushClient,
    private_key: String,
    subject: String,
    ttl_seconds: u32,
}

impl std::fmt::Debug for WebPushSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebPushSender")
            .field("subject", &self.subject)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl WebPushSender {
    /// Create a sender signing with the given VAPID private key.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Vapid`] if the key is unusable, or
    /// [`PushError::Delivery`] if the HTTP client cannot be built.
    pub fn new(private_key: &str, subject: &str, ttl_seconds: u32) -> Result<Self> {
        VapidKeys::public_key_for(private_key)?;
        let client =
            IsahcWebPushClient::new().map_err(|err| PushError::Delivery(err.to_string()))?;

        Ok(Self {
            client,
            private_key: private_key.to_string(),
            subject: subject.to_string(),
            ttl_seconds,
        })
    }
}

#[async_trait::async_trait]
impl PushSender for WebPushSender {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<()> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(&self.private_key, web_push::URL_SAFE_NO_PAD, &info)
                .map_err(|err| PushError::Vapid(err.to_string()))?;
        signature.add_claim("sub", self.subject.as_str());
        let signature = signature
            .build()
            .map_err(|err| PushError::Vapid(err.to_string()))?;

        let mut message = WebPushMessageBuilder::new(&info);
        message.set_ttl(self.ttl_seconds);
        message.set_payload(ContentEncoding::Aes128Gcm, payload);
        message.set_vapid_signature(signature);
        let message = message.build().map_err(classify)?;

        self.client.send(message).await.map_err(classify)
    }
}

fn classify(err: WebPushError) -> PushError {
    match err {
        WebPushError::EndpointNotValid { .. } | WebPushError::EndpointNotFound { .. } => {
            PushError::Gone
        }
        WebPushError::InvalidUri
        | WebPushError::MissingCryptoKeys
        | WebPushError::InvalidCryptoKeys => PushError::InvalidSubscription(err.to_string()),
        other => PushError::Delivery(other.to_string()),
    }
}
