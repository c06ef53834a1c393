//! Persistence layer for confirmed registrations.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::registration::model::Registration;

pub use libsql_backend::LibSqlRegistrationStore;
pub use memory::MemoryRegistrationStore;

/// Backend-agnostic storage for registrations.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Persist a newly confirmed registration.
    async fn save(&self, registration: &Registration) -> Result<(), DatabaseError>;

    /// Get a registration by id.
    async fn get(&self, id: &str) -> Result<Option<Registration>, DatabaseError>;

    /// All registrations, newest first.
    async fn list(&self) -> Result<Vec<Registration>, DatabaseError>;

    async fn count(&self) -> Result<usize, DatabaseError>;
}
