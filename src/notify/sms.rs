//! Africa's Talking SMS notifier.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::{EventInfo, SmsConfig};
use crate::error::NotifyError;
use crate::registration::model::Registration;

use super::{Notifier, confirmation_message};

/// Sends confirmations through the Africa's Talking messaging API.
pub struct AfricasTalkingNotifier {
    config: SmsConfig,
    helpline: String,
    client: reqwest::Client,
}

impl AfricasTalkingNotifier {
    pub fn new(config: SmsConfig, helpline: &str) -> Self {
        Self {
            config,
            helpline: helpline.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn send_sms(&self, to: &str, message: &str) -> Result<(), NotifyError> {
        let mut form = vec![
            ("username", self.config.username.as_str()),
            ("to", to),
            ("message", message),
        ];
        if let Some(sender_id) = self.config.sender_id.as_deref() {
            form.push(("from", sender_id));
        }

        let resp = self
            .client
            .post(&self.config.url)
            .header("apiKey", self.config.api_key.expose_secret())
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "SMS gateway rejected message");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to, "SMS accepted by gateway");
        Ok(())
    }
}

#[async_trait]
impl Notifier for AfricasTalkingNotifier {
    fn name(&self) -> &str {
        "africastalking"
    }

    async fn send_confirmation(
        &self,
        registration: &Registration,
        event: &EventInfo,
    ) -> Result<(), NotifyError> {
        let message = confirmation_message(registration, event, &self.helpline);
        self.send_sms(&registration.phone_number, &message).await
    }
}
