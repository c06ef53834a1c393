//! Outbound confirmation notifications.
//!
//! The finalizer hands every confirmed registration to a [`Notifier`]
//! without waiting for it; failures are logged and never reach the caller.

pub mod sms;

use async_trait::async_trait;
use tracing::info;

use crate::config::EventInfo;
use crate::error::NotifyError;
use crate::registration::model::Registration;

pub use sms::AfricasTalkingNotifier;

/// Sends the "you are registered" message to the registrant.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send_confirmation(
        &self,
        registration: &Registration,
        event: &EventInfo,
    ) -> Result<(), NotifyError>;
}

/// Body of the confirmation SMS.
pub fn confirmation_message(registration: &Registration, event: &EventInfo, helpline: &str) -> String {
    format!(
        "Dear {name},\n\n\
         Your registration for {event_name} is confirmed!\n\n\
         Registration ID: {id}\n\
         Date: {date}\n\
         Venue: {venue}\n\
         Time: {time}\n\n\
         Please bring this SMS as confirmation.\n\n\
         For inquiries: {helpline}\n\
         Elimuhub Education Consultants",
        name = registration.full_name,
        event_name = event.name,
        id = registration.id,
        date = event.display_date,
        venue = event.venue,
        time = event.time,
    )
}

/// Notifier that only logs. Used when no SMS gateway is configured.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    helpline: String,
}

impl LogNotifier {
    pub fn new(helpline: &str) -> Self {
        Self {
            helpline: helpline.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_confirmation(
        &self,
        registration: &Registration,
        event: &EventInfo,
    ) -> Result<(), NotifyError> {
        let message = confirmation_message(registration, event, &self.helpline);
        info!(
            to = %registration.phone_number,
            registration_id = %registration.id,
            chars = message.chars().count(),
            "SMS gateway not configured; confirmation logged only"
        );
        Ok(())
    }
}
