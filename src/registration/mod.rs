//! Confirmed registrations: the record, its finalization, and the ledger.

pub mod finalizer;
pub mod ledger;
pub mod model;

pub use finalizer::RegistrationFinalizer;
pub use ledger::{ExportFormat, RegistrationLedger, RegistrationStats};
pub use model::{Registration, RegistrationStatus, RegistrationType, SchoolRef};
