//! Menu catalog: static menu text and the list of selectable schools.
//!
//! Every screen is rendered here as plain text without the `CON `/`END `
//! marker; the marker is added by [`UssdResponse::to_wire`].
//!
//! [`UssdResponse::to_wire`]: super::response::UssdResponse::to_wire

use serde::{Deserialize, Serialize};

use crate::config::{EventInfo, UssdConfig};
use crate::registration::model::{Registration, RegistrationType};

use super::session::SessionData;

/// Number of catalog entries offered on the school selection screen.
pub const LISTED_SCHOOLS: usize = 9;

/// A selectable school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: u32,
    pub name: String,
    pub location: String,
}

impl School {
    pub fn new(id: u32, name: &str, location: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            location: location.to_string(),
        }
    }
}

/// The built-in school list.
pub fn default_schools() -> Vec<School> {
    vec![
        School::new(1, "Wamy High School", "South B, Nairobi"),
        School::new(2, "Kenya Muslim Academy", "Park Road, Nairobi"),
        School::new(3, "Nairobi Muslim Academy", "Eastleigh, Nairobi"),
        School::new(4, "Islamic Foundation Academy", "Parklands, Nairobi"),
        School::new(5, "Nakuru Islamic School", "Nakuru"),
        School::new(6, "Mombasa Islamic School", "Mombasa"),
        School::new(7, "Kisumu Islamic Academy", "Kisumu"),
        School::new(8, "Eldoret Muslim Institute", "Eldoret"),
        School::new(9, "Nyeri Islamic Academy", "Nyeri"),
    ]
}

/// Static menu definitions. Rendering never mutates anything.
#[derive(Debug, Clone)]
pub struct MenuCatalog {
    schools: Vec<School>,
    event: EventInfo,
    ussd_code: String,
    helpline: String,
}

impl MenuCatalog {
    /// Catalog with the built-in school list.
    pub fn new(config: &UssdConfig) -> Self {
        Self::with_schools(config, default_schools())
    }

    pub fn with_schools(config: &UssdConfig, schools: Vec<School>) -> Self {
        Self {
            schools,
            event: config.event.clone(),
            ussd_code: config.ussd_code.clone(),
            helpline: config.helpline.clone(),
        }
    }

    pub fn school_count(&self) -> usize {
        self.schools.len()
    }

    /// How many schools the selection screen offers (`1..=n`).
    pub fn offered_count(&self) -> usize {
        self.schools.len().min(LISTED_SCHOOLS)
    }

    /// Look up a school by its zero-based catalog index.
    pub fn school(&self, index: usize) -> Option<&School> {
        self.schools.get(index)
    }

    // ── Continue screens ────────────────────────────────────────────

    pub fn main_menu(&self) -> String {
        format!(
            "Welcome to {name} Registration\n\n\
             📅 {date}\n\
             📍 {venue}\n\n\
             Choose option:\n\
             1. Student Registration\n\
             2. Teacher/Chaperone Registration\n\
             3. Event Information\n\
             4. Contact Us\n\
             0. Exit",
            name = self.event.name,
            date = self.event.display_date,
            venue = self.event.venue,
        )
    }

    pub fn name_prompt(&self, kind: RegistrationType) -> String {
        let example = match kind {
            RegistrationType::Student => "Ahmed Mohamed Ali",
            RegistrationType::Teacher => "Fatima Hassan Mohamed",
        };
        format!(
            "{} Registration\n\nPlease enter your full name:\n(Example: {example})",
            kind.label()
        )
    }

    pub fn invalid_name_prompt(&self) -> String {
        "Invalid name. Please enter your full name:\n(Minimum 3 characters)".to_string()
    }

    pub fn school_list(&self) -> String {
        let list = self
            .schools
            .iter()
            .take(LISTED_SCHOOLS)
            .enumerate()
            .map(|(i, school)| format!("{}. {}", i + 1, school.name))
            .collect::<Vec<_>>()
            .join("\n");

        format!("Select your school:\n\n{list}\n0. My school is not listed")
    }

    pub fn custom_school_prompt(&self) -> String {
        "Enter your school name:\n(Please type the full name of your school)".to_string()
    }

    pub fn invalid_custom_school_prompt(&self) -> String {
        "Invalid school name. Please type the full name of your school:\n(Minimum 3 characters)"
            .to_string()
    }

    /// Summary of the collected fields, with confirm/edit/cancel options.
    pub fn summary(&self, phone_number: &str, data: &SessionData) -> String {
        let kind = data
            .registration_type
            .map(RegistrationType::label)
            .unwrap_or_default();

        format!(
            "Registration Summary:\n\n\
             Name: {name}\n\
             Type: {kind}\n\
             School: {school}\n\
             Phone: {phone_number}\n\n\
             Event: {event}\n\
             Date: {date}\n\
             Venue: {venue}\n\n\
             1. Confirm Registration\n\
             2. Edit Information\n\
             0. Cancel",
            name = data.full_name.as_deref().unwrap_or_default(),
            school = data.school_name().unwrap_or_default(),
            event = self.event.name,
            date = self.event.display_date,
            venue = self.event.venue,
        )
    }

    /// Prefix a screen with the invalid-input attempt counter.
    pub fn retry(&self, attempt: u32, max_attempts: u32, screen: &str) -> String {
        format!("Invalid input. Please try again.\n(Attempt {attempt}/{max_attempts})\n\n{screen}")
    }

    // ── Terminal screens ────────────────────────────────────────────

    pub fn confirmation(&self, registration: &Registration) -> String {
        format!(
            "Registration Successful! ✅\n\n\
             Registration ID: {id}\n\
             Name: {name}\n\
             Event: {event}\n\
             Date: {date}\n\
             Venue: {venue}\n\n\
             A confirmation SMS will be sent shortly.\n\
             For inquiries: {helpline}\n\n\
             Thank you for registering!",
            id = registration.id,
            name = registration.full_name,
            event = self.event.name,
            date = self.event.display_date,
            venue = self.event.venue,
            helpline = self.helpline,
        )
    }

    pub fn event_information(&self) -> String {
        format!(
            "{name}\n\n\
             📅 Date: {date}\n\
             🕘 Time: {time}\n\
             📍 Venue: {venue_name}\n\
             \u{20}    {address}\n\n\
             🎓 15+ Islamic Universities\n\
             📚 Scholarship Information\n\
             🎯 Career Guidance\n\
             🆓 FREE Attendance\n\n\
             Registration: Dial {code}\n\
             Info: {helpline}\n\n\
             Thank you!",
            name = self.event.name,
            date = self.event.display_date,
            time = self.event.time,
            venue_name = self.event.venue.split(',').next().unwrap_or_default(),
            address = self.event.venue_address,
            code = self.ussd_code,
            helpline = self.helpline,
        )
    }

    pub fn contact_information(&self) -> String {
        format!(
            "Contact Information\n\n\
             Elimuhub Education Consultants\n\
             📧 elimuhubconsultant@gmail.com\n\
             📞 {helpline} / 0721922836\n\n\
             Office:\n\
             Muhoho Avenue, South C\n\
             P.O. Box 10765-00100, Nairobi\n\n\
             Hassan Natembea Kibiti - CEO\n\n\
             For event inquiries, call or WhatsApp:\n\
             {helpline}\n\n\
             Thank you!",
            helpline = self.helpline,
        )
    }

    pub fn exit(&self) -> String {
        format!(
            "Thank you for your interest in the {name}.\n\n\
             To register later: Dial {code}\n\
             For information: {helpline}\n\n\
             Barakallahu feeki!",
            name = self.event.name,
            code = self.ussd_code,
            helpline = self.helpline,
        )
    }

    pub fn too_many_attempts(&self) -> String {
        format!(
            "Too many invalid attempts.\n\
             Please dial {code} to start again.\n\n\
             For assistance: {helpline}",
            code = self.ussd_code,
            helpline = self.helpline,
        )
    }

    pub fn system_error(&self) -> String {
        format!(
            "System error occurred.\nPlease try again later.\n\nFor assistance: {}",
            self.helpline
        )
    }
}
