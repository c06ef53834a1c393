//! libSQL backend: async `RegistrationStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::registration::model::{Registration, RegistrationStatus, RegistrationType, SchoolRef};
use crate::store::migrations;
use crate::store::RegistrationStore;

/// Column list shared by every SELECT, in `row_to_registration` order.
const REGISTRATION_COLUMNS: &str = "id, phone_number, full_name, registration_type, school_name, \
     registration_date, status, event_date, school_id, school_location";

/// libSQL registration store.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlRegistrationStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlRegistrationStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::connect(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::connect(db).await
    }

    async fn connect(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_integer(n: Option<u32>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(i64::from(n)),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a Registration.
///
/// Column order matches REGISTRATION_COLUMNS.
fn row_to_registration(row: &libsql::Row) -> Result<Registration, DatabaseError> {
    let text = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Serialization(format!("column {idx}: {e}")))
    };

    let kind_str = text(3)?;
    let status_str = text(6)?;
    let school_id: Option<i64> = row.get(8).ok();

    Ok(Registration {
        id: text(0)?,
        phone_number: text(1)?,
        full_name: text(2)?,
        registration_type: kind_str
            .parse::<RegistrationType>()
            .map_err(DatabaseError::Serialization)?,
        school: SchoolRef {
            id: school_id.and_then(|id| u32::try_from(id).ok()),
            name: text(4)?,
            location: row.get::<String>(9).ok(),
        },
        registration_date: parse_datetime(&text(5)?),
        status: status_str
            .parse::<RegistrationStatus>()
            .map_err(DatabaseError::Serialization)?,
        event_date: text(7)?,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl RegistrationStore for LibSqlRegistrationStore {
    async fn save(&self, registration: &Registration) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO registrations (id, phone_number, full_name, registration_type,
                    school_name, registration_date, status, event_date, school_id, school_location)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    registration.id.clone(),
                    registration.phone_number.clone(),
                    registration.full_name.clone(),
                    registration.registration_type.to_string(),
                    registration.school.name.clone(),
                    registration.registration_date.to_rfc3339(),
                    registration.status.to_string(),
                    registration.event_date.clone(),
                    opt_integer(registration.school.id),
                    opt_text(registration.school.location.as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save registration: {e}")))?;

        debug!(registration_id = %registration.id, "Registration persisted");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Registration>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get registration: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_registration(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get registration: {e}"))),
        }
    }

    async fn list(&self) -> Result<Vec<Registration>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {REGISTRATION_COLUMNS} FROM registrations ORDER BY registration_date DESC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list registrations: {e}")))?;

        let mut registrations = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_registration(&row) {
                Ok(registration) => registrations.push(registration),
                Err(e) => {
                    tracing::warn!("Skipping registration row: {e}");
                }
            }
        }
        Ok(registrations)
    }

    async fn count(&self) -> Result<usize, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM registrations", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count registrations: {e}")))?;

        let count: i64 = match rows.next().await {
            Ok(Some(row)) => row.get(0).unwrap_or(0),
            _ => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    async fn test_db() -> LibSqlRegistrationStore {
        LibSqlRegistrationStore::new_memory().await.unwrap()
    }

    fn registration(id: &str, school: SchoolRef, minutes: i64) -> Registration {
        Registration {
            id: id.to_string(),
            phone_number: "+254712345678".into(),
            full_name: "Ahmed Mohamed Ali".into(),
            registration_type: RegistrationType::Student,
            school,
            registration_date: Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
            status: RegistrationStatus::Confirmed,
            event_date: "2024-09-14".into(),
        }
    }

    fn catalog_school() -> SchoolRef {
        SchoolRef {
            id: Some(2),
            name: "Kenya Muslim Academy".into(),
            location: Some("Park Road, Nairobi".into()),
        }
    }

    #[tokio::test]
    async fn save_and_get_catalog_school() {
        let db = test_db().await;
        let original = registration("KEF1", catalog_school(), 0);
        db.save(&original).await.unwrap();

        let loaded = db.get("KEF1").await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn save_and_get_custom_school() {
        let db = test_db().await;
        let original = registration("KEF2", SchoolRef::custom("Garissa High"), 0);
        db.save(&original).await.unwrap();

        let loaded = db.get("KEF2").await.unwrap().unwrap();
        assert_eq!(loaded.school.id, None);
        assert_eq!(loaded.school.location, None);
        assert_eq!(loaded.school.name, "Garissa High");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let db = test_db().await;
        assert!(db.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let db = test_db().await;
        db.save(&registration("KEF1", catalog_school(), 0)).await.unwrap();
        let err = db
            .save(&registration("KEF1", catalog_school(), 5))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let db = test_db().await;
        db.save(&registration("A", catalog_school(), 0)).await.unwrap();
        db.save(&registration("B", catalog_school(), 30)).await.unwrap();
        db.save(&registration("C", catalog_school(), 10)).await.unwrap();

        let ids: Vec<String> = db.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
        assert_eq!(db.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn local_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("registrations.db");

        {
            let db = LibSqlRegistrationStore::new_local(&path).await.unwrap();
            db.save(&registration("KEF1", catalog_school(), 0)).await.unwrap();
        }

        let reopened = LibSqlRegistrationStore::new_local(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
