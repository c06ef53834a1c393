//! Registration ledger: the in-process collection of confirmed
//! registrations, with statistics and export.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Timelike;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::model::{Registration, RegistrationType, generate_registration_id};

/// How many times to regenerate an id that collides with a recorded one.
const MAX_ID_ATTEMPTS: usize = 8;

/// Aggregate counts over all recorded registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStats {
    pub total_registrations: usize,
    pub student_registrations: usize,
    pub teacher_registrations: usize,
    pub school_breakdown: BTreeMap<String, usize>,
    /// Keyed by UTC hour of day.
    pub hourly_registrations: BTreeMap<u32, usize>,
}

/// Export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unsupported export format: {}", s)),
        }
    }
}

/// Append-only, in-memory list of confirmed registrations.
#[derive(Debug, Default)]
pub struct RegistrationLedger {
    registrations: RwLock<Vec<Registration>>,
}

impl RegistrationLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a registration, regenerating its id from `prefix` while it
    /// collides with one already recorded. Returns the stored registration.
    pub async fn record(&self, mut registration: Registration, prefix: &str) -> Registration {
        let mut registrations = self.registrations.write().await;

        let mut tries = 1;
        while registrations.iter().any(|r| r.id == registration.id) {
            if tries >= MAX_ID_ATTEMPTS {
                warn!(id = %registration.id, "Registration id still collides; keeping it");
                break;
            }
            registration.id = generate_registration_id(prefix, registration.registration_date);
            tries += 1;
        }

        registrations.push(registration.clone());
        info!(
            registration_id = %registration.id,
            kind = %registration.registration_type,
            total = registrations.len(),
            "Registration recorded"
        );
        registration
    }

    /// Load registrations persisted by an earlier run. Ids already present
    /// are skipped.
    pub async fn restore(&self, persisted: Vec<Registration>) -> usize {
        let mut registrations = self.registrations.write().await;
        let mut restored = 0;
        for registration in persisted {
            if !registrations.iter().any(|r| r.id == registration.id) {
                registrations.push(registration);
                restored += 1;
            }
        }
        restored
    }

    pub async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registrations.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<Registration> {
        self.registrations.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Registration> {
        self.registrations
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub async fn stats(&self) -> RegistrationStats {
        let registrations = self.registrations.read().await;
        let mut stats = RegistrationStats {
            total_registrations: registrations.len(),
            ..RegistrationStats::default()
        };

        for registration in registrations.iter() {
            match registration.registration_type {
                RegistrationType::Student => stats.student_registrations += 1,
                RegistrationType::Teacher => stats.teacher_registrations += 1,
            }
            *stats
                .school_breakdown
                .entry(registration.school.name.clone())
                .or_default() += 1;
            *stats
                .hourly_registrations
                .entry(registration.registration_date.hour())
                .or_default() += 1;
        }

        stats
    }

    pub async fn export(&self, format: ExportFormat) -> Result<String, serde_json::Error> {
        let registrations = self.registrations.read().await;
        match format {
            ExportFormat::Json => serde_json::to_string_pretty(&*registrations),
            ExportFormat::Csv => Ok(to_csv(&registrations)),
        }
    }
}

const CSV_HEADERS: [&str; 6] = [
    "Registration ID",
    "Full Name",
    "Phone Number",
    "Type",
    "School",
    "Registration Date",
];

fn to_csv(registrations: &[Registration]) -> String {
    let mut lines = vec![CSV_HEADERS.join(",")];
    for r in registrations {
        let row = [
            r.id.clone(),
            r.full_name.clone(),
            r.phone_number.clone(),
            r.registration_type.to_string(),
            r.school.name.clone(),
            r.registration_date.to_rfc3339(),
        ];
        lines.push(
            row.iter()
                .map(|field| csv_field(field))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::registration::model::{RegistrationStatus, SchoolRef};

    fn registration(id: &str, kind: RegistrationType, school: &str, hour: u32) -> Registration {
        Registration {
            id: id.to_string(),
            phone_number: "+254712345678".into(),
            full_name: "Ahmed Mohamed Ali".into(),
            registration_type: kind,
            school: SchoolRef::custom(school),
            registration_date: Utc.with_ymd_and_hms(2024, 9, 1, hour, 15, 0).unwrap(),
            status: RegistrationStatus::Confirmed,
            event_date: "2024-09-14".into(),
        }
    }

    #[tokio::test]
    async fn record_appends() {
        let ledger = RegistrationLedger::new();
        assert!(ledger.is_empty().await);

        let stored = ledger
            .record(registration("KEF1", RegistrationType::Student, "A", 9), "KEF")
            .await;
        assert_eq!(stored.id, "KEF1");
        assert_eq!(ledger.len().await, 1);
        assert_eq!(ledger.get("KEF1").await, Some(stored));
    }

    #[tokio::test]
    async fn record_regenerates_colliding_id() {
        let ledger = RegistrationLedger::new();
        ledger
            .record(registration("DUP", RegistrationType::Student, "A", 9), "KEF")
            .await;
        let second = ledger
            .record(registration("DUP", RegistrationType::Teacher, "B", 9), "KEF")
            .await;

        assert_ne!(second.id, "DUP");
        assert!(second.id.starts_with("KEF"));
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn restore_skips_known_ids() {
        let ledger = RegistrationLedger::new();
        ledger
            .record(registration("KEF1", RegistrationType::Student, "A", 9), "KEF")
            .await;

        let restored = ledger
            .restore(vec![
                registration("KEF1", RegistrationType::Student, "A", 9),
                registration("KEF2", RegistrationType::Teacher, "B", 10),
            ])
            .await;
        assert_eq!(restored, 1);
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn stats_break_down_by_type_school_and_hour() {
        let ledger = RegistrationLedger::new();
        ledger
            .restore(vec![
                registration("1", RegistrationType::Student, "Wamy High School", 9),
                registration("2", RegistrationType::Student, "Wamy High School", 9),
                registration("3", RegistrationType::Teacher, "Nyeri Islamic Academy", 14),
            ])
            .await;

        let stats = ledger.stats().await;
        assert_eq!(stats.total_registrations, 3);
        assert_eq!(stats.student_registrations, 2);
        assert_eq!(stats.teacher_registrations, 1);
        assert_eq!(stats.school_breakdown["Wamy High School"], 2);
        assert_eq!(stats.school_breakdown["Nyeri Islamic Academy"], 1);
        assert_eq!(stats.hourly_registrations[&9], 2);
        assert_eq!(stats.hourly_registrations[&14], 1);
    }

    #[tokio::test]
    async fn csv_export_quotes_awkward_fields() {
        let ledger = RegistrationLedger::new();
        ledger
            .restore(vec![registration(
                "KEF1",
                RegistrationType::Teacher,
                "Academy, \"Main\" Campus",
                9,
            )])
            .await;

        let csv = ledger.export(ExportFormat::Csv).await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Registration ID,Full Name,Phone Number,Type,School,Registration Date"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("KEF1,Ahmed Mohamed Ali,+254712345678,teacher,"));
        assert!(row.contains("\"Academy, \"\"Main\"\" Campus\""));
        assert!(row.ends_with("2024-09-01T09:15:00+00:00"));
    }

    #[tokio::test]
    async fn json_export_is_an_array() {
        let ledger = RegistrationLedger::new();
        ledger
            .restore(vec![registration("KEF1", RegistrationType::Student, "A", 9)])
            .await;

        let json = ledger.export(ExportFormat::Json).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["id"], "KEF1");
    }

    #[test]
    fn export_format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert!("excel".parse::<ExportFormat>().is_err());
    }
}
