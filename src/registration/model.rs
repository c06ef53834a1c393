//! Registration data model and id generation.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ussd::catalog::School;

/// Who is registering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    Student,
    Teacher,
}

impl RegistrationType {
    /// Label shown on screens.
    pub fn label(self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Teacher => "Teacher/Chaperone",
        }
    }
}

impl std::fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Teacher => write!(f, "teacher"),
        }
    }
}

impl std::str::FromStr for RegistrationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            _ => Err(format!("Unknown registration type: {}", s)),
        }
    }
}

/// Status of a registration. Only confirmed registrations are ever created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Confirmed,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl std::str::FromStr for RegistrationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            _ => Err(format!("Unknown registration status: {}", s)),
        }
    }
}

/// The school on a registration: a catalog entry, or just a typed name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl SchoolRef {
    pub fn custom(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            location: None,
        }
    }
}

impl From<&School> for SchoolRef {
    fn from(school: &School) -> Self {
        Self {
            id: Some(school.id),
            name: school.name.clone(),
            location: Some(school.location.clone()),
        }
    }
}

/// A confirmed registration. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub phone_number: String,
    pub full_name: String,
    pub registration_type: RegistrationType,
    pub school: SchoolRef,
    pub registration_date: DateTime<Utc>,
    pub status: RegistrationStatus,
    /// ISO event date from configuration.
    pub event_date: String,
}

/// Generate a registration id: prefix, base-36 millisecond timestamp and a
/// 5-character random base-36 suffix, uppercased.
pub fn generate_registration_id(prefix: &str, now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| base36_digit(rng.gen_range(0..36)))
        .collect();

    format!("{prefix}{}{suffix}", to_base36(millis)).to_uppercase()
}

fn base36_digit(d: u32) -> char {
    char::from_digit(d, 36).unwrap_or('0')
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(base36_digit((n % 36) as u32));
        n /= 36;
    }
    digits.iter().rev().collect()
}
