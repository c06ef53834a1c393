//! Registration finalizer: turns a confirmed session into a registration.
//!
//! Building the record is synchronous and may fail on an incomplete
//! session. Recording it in the ledger is awaited. Persistence and the
//! confirmation SMS run on spawned tasks that the caller never waits for.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{EventInfo, UssdConfig};
use crate::error::FlowError;
use crate::notify::Notifier;
use crate::store::RegistrationStore;
use crate::ussd::session::{Clock, Session};

use super::ledger::RegistrationLedger;
use super::model::{Registration, RegistrationStatus, SchoolRef, generate_registration_id};

pub struct RegistrationFinalizer {
    ledger: Arc<RegistrationLedger>,
    store: Arc<dyn RegistrationStore>,
    notifier: Arc<dyn Notifier>,
    event: EventInfo,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl RegistrationFinalizer {
    pub fn new(
        config: &UssdConfig,
        ledger: Arc<RegistrationLedger>,
        store: Arc<dyn RegistrationStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            store,
            notifier,
            event: config.event.clone(),
            prefix: config.registration_prefix.clone(),
            clock,
        }
    }

    pub fn ledger(&self) -> &Arc<RegistrationLedger> {
        &self.ledger
    }

    /// Build the registration for a session whose summary was confirmed.
    pub fn prepare(&self, session: &Session) -> Result<Registration, FlowError> {
        let data = &session.data;
        let registration_type = data
            .registration_type
            .ok_or(FlowError::IncompleteSession {
                field: "registrationType",
            })?;
        let full_name = data
            .full_name
            .clone()
            .ok_or(FlowError::IncompleteSession { field: "fullName" })?;
        let school = match (&data.school, &data.custom_school) {
            (Some(school), _) => SchoolRef::from(school),
            (None, Some(name)) => SchoolRef::custom(name),
            (None, None) => return Err(FlowError::IncompleteSession { field: "school" }),
        };

        let now = self.clock.now();
        Ok(Registration {
            id: generate_registration_id(&self.prefix, now),
            phone_number: session.phone_number.clone(),
            full_name,
            registration_type,
            school,
            registration_date: now,
            status: RegistrationStatus::Confirmed,
            event_date: self.event.date.clone(),
        })
    }

    /// Record the registration and hand it to the store and the notifier.
    ///
    /// Returns the registration as recorded; its id may differ from the
    /// prepared one if that collided with an earlier registration.
    pub async fn finalize(&self, registration: Registration) -> Registration {
        let registration = self.ledger.record(registration, &self.prefix).await;
        self.dispatch(&registration);
        registration
    }

    fn dispatch(&self, registration: &Registration) {
        let store = Arc::clone(&self.store);
        let stored = registration.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save(&stored).await {
                warn!(registration_id = %stored.id, "Failed to persist registration: {}", e);
            }
        });

        let notifier = Arc::clone(&self.notifier);
        let event = self.event.clone();
        let notified = registration.clone();
        tokio::spawn(async move {
            match notifier.send_confirmation(&notified, &event).await {
                Ok(()) => debug!(
                    registration_id = %notified.id,
                    notifier = notifier.name(),
                    "Confirmation sent"
                ),
                Err(e) => warn!(
                    registration_id = %notified.id,
                    notifier = notifier.name(),
                    "Failed to send confirmation: {}",
                    e
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::Mutex;

    use super::*;
    use crate::error::{DatabaseError, NotifyError};
    use crate::registration::model::RegistrationType;
    use crate::store::MemoryRegistrationStore;
    use crate::ussd::catalog::School;
    use crate::ussd::session::ManualClock;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_confirmation(
            &self,
            registration: &Registration,
            _event: &EventInfo,
        ) -> Result<(), NotifyError> {
            self.sent.lock().await.push(registration.id.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send_confirmation(
            &self,
            _registration: &Registration,
            _event: &EventInfo,
        ) -> Result<(), NotifyError> {
            Err(NotifyError::SendFailed {
                reason: "gateway down".into(),
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RegistrationStore for FailingStore {
        async fn save(&self, _registration: &Registration) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("disk full".into()))
        }
        async fn get(&self, _id: &str) -> Result<Option<Registration>, DatabaseError> {
            Ok(None)
        }
        async fn list(&self) -> Result<Vec<Registration>, DatabaseError> {
            Ok(Vec::new())
        }
        async fn count(&self) -> Result<usize, DatabaseError> {
            Ok(0)
        }
    }

    fn finalizer(
        store: Arc<dyn RegistrationStore>,
        notifier: Arc<dyn Notifier>,
    ) -> RegistrationFinalizer {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap(),
        ));
        RegistrationFinalizer::new(
            &UssdConfig::default(),
            RegistrationLedger::new(),
            store,
            notifier,
            clock,
        )
    }

    fn complete_session() -> Session {
        let mut session = Session::new("s1", "+254712345678", Utc::now());
        session.data.registration_type = Some(RegistrationType::Student);
        session.data.full_name = Some("Ahmed Mohamed Ali".into());
        session.data.school = Some(School::new(
            2,
            "Kenya Muslim Academy",
            "Park Road, Nairobi",
        ));
        session
    }

    /// Poll until `check` passes or a second elapses.
    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[test]
    fn prepare_builds_confirmed_registration() {
        let finalizer = finalizer(
            Arc::new(MemoryRegistrationStore::new()),
            Arc::new(RecordingNotifier::default()),
        );
        let registration = finalizer.prepare(&complete_session()).unwrap();

        assert!(registration.id.starts_with("KEF"));
        assert_eq!(registration.phone_number, "+254712345678");
        assert_eq!(registration.full_name, "Ahmed Mohamed Ali");
        assert_eq!(registration.school.id, Some(2));
        assert_eq!(registration.status, RegistrationStatus::Confirmed);
        assert_eq!(registration.event_date, "2024-09-14");
        assert_eq!(
            registration.registration_date,
            Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn prepare_uses_custom_school_name() {
        let finalizer = finalizer(
            Arc::new(MemoryRegistrationStore::new()),
            Arc::new(RecordingNotifier::default()),
        );
        let mut session = complete_session();
        session.data.school = None;
        session.data.custom_school = Some("Garissa High".into());

        let registration = finalizer.prepare(&session).unwrap();
        assert_eq!(registration.school, SchoolRef::custom("Garissa High"));
    }

    #[test]
    fn prepare_rejects_incomplete_session() {
        let finalizer = finalizer(
            Arc::new(MemoryRegistrationStore::new()),
            Arc::new(RecordingNotifier::default()),
        );

        let mut no_name = complete_session();
        no_name.data.full_name = None;
        assert_eq!(
            finalizer.prepare(&no_name),
            Err(FlowError::IncompleteSession { field: "fullName" })
        );

        let mut no_school = complete_session();
        no_school.data.school = None;
        assert_eq!(
            finalizer.prepare(&no_school),
            Err(FlowError::IncompleteSession { field: "school" })
        );
    }

    #[tokio::test]
    async fn finalize_records_persists_and_notifies() {
        let store = Arc::new(MemoryRegistrationStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let finalizer = finalizer(store.clone(), notifier.clone());

        let prepared = finalizer.prepare(&complete_session()).unwrap();
        let registration = finalizer.finalize(prepared).await;

        assert_eq!(finalizer.ledger().len().await, 1);
        let id = registration.id.clone();
        eventually(|| {
            let store = store.clone();
            let id = id.clone();
            async move { store.get(&id).await.unwrap().is_some() }
        })
        .await;
        eventually(|| {
            let notifier = notifier.clone();
            let id = id.clone();
            async move { notifier.sent.lock().await.contains(&id) }
        })
        .await;
    }

    #[tokio::test]
    async fn collaborator_failures_do_not_fail_finalize() {
        let finalizer = finalizer(Arc::new(FailingStore), Arc::new(FailingNotifier));

        let prepared = finalizer.prepare(&complete_session()).unwrap();
        let registration = finalizer.finalize(prepared).await;

        assert!(!registration.id.is_empty());
        assert_eq!(finalizer.ledger().len().await, 1);
    }
}
