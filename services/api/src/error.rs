//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and the
//! mapping from port errors to HTTP responses.

use crate::config::ConfigError;
use axum::http::StatusCode;
use prep_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The status code a handler answers with when a port call fails.
pub fn status_for(error: &PortError) -> StatusCode {
    match error {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PortError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        PortError::Persistence(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Converts a port error into the `(StatusCode, String)` pair the REST handlers return.
pub fn port_rejection(error: PortError) -> (StatusCode, String) {
    (status_for(&error), error.to_string())
}
