//! Error types for the USSD registration service.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send notification: {reason}")]
    SendFailed { reason: String },

    #[error("Gateway rejected notification ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Decoding inconsistencies in the dialog flow.
///
/// These never reach the caller verbatim: the engine logs them and answers
/// with the generic system-error screen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("No handler for step {step}")]
    UnknownStep { step: usize },

    #[error("Session is missing {field} at confirmation")]
    IncompleteSession { field: &'static str },
}
