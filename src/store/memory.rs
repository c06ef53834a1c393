//! In-memory registration store, for tests and dry runs.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::registration::model::Registration;

use super::RegistrationStore;

#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    registrations: RwLock<Vec<Registration>>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn save(&self, registration: &Registration) -> Result<(), DatabaseError> {
        let mut registrations = self.registrations.write().await;
        if registrations.iter().any(|r| r.id == registration.id) {
            return Err(DatabaseError::Query(format!(
                "registration {} already exists",
                registration.id
            )));
        }
        registrations.push(registration.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Registration>, DatabaseError> {
        Ok(self
            .registrations
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Registration>, DatabaseError> {
        let mut all = self.registrations.read().await.clone();
        all.sort_by(|a, b| b.registration_date.cmp(&a.registration_date));
        Ok(all)
    }

    async fn count(&self) -> Result<usize, DatabaseError> {
        Ok(self.registrations.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::registration::model::{RegistrationStatus, RegistrationType, SchoolRef};

    fn registration(id: &str, minutes_ago: i64) -> Registration {
        Registration {
            id: id.to_string(),
            phone_number: "+254712345678".into(),
            full_name: "Yusuf Abdi".into(),
            registration_type: RegistrationType::Student,
            school: SchoolRef::custom("Garissa High"),
            registration_date: Utc::now() - Duration::minutes(minutes_ago),
            status: RegistrationStatus::Confirmed,
            event_date: "2024-09-14".into(),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_and_rejects_duplicates() {
        let store = MemoryRegistrationStore::new();
        store.save(&registration("old", 10)).await.unwrap();
        store.save(&registration("new", 1)).await.unwrap();
        assert!(store.save(&registration("old", 0)).await.is_err());

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.get("new").await.unwrap().is_some());
    }
}
