//! Error types module
//!
//! This module provides the error taxonomy surfaced to UI collaborators by the
//! sync engine. Every failure of the record workflow, the role resolver and the
//! store client is expressed as a `SyncError` variant; the storage crate maps its
//! own `StoreError` into this enum.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like an unreachable store
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error presentation - defines how an error should be surfaced
/// to the screen that triggered it.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "STORE_UNAVAILABLE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the caller may retry)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Malformed document {collection}/{id}: {reason}")]
    Malformed {
        collection: String,
        id: String,
        reason: String,
    },
}

impl SyncError {
    pub fn malformed(
        collection: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SyncError::Malformed {
            collection: collection.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// True for transport/backend failures, including timeouts.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, SyncError::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Validation(format!("JSON error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn sync_error_static_metadata(
    err: &SyncError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        SyncError::Unauthenticated(_) => (
            "UNAUTHENTICATED",
            false,
            Some("Sign in again"),
            LogLevel::Debug,
        ),
        SyncError::Forbidden(_) => (
            "FORBIDDEN",
            false,
            Some("Ask an administrator to perform this action"),
            LogLevel::Debug,
        ),
        SyncError::InvalidState(_) => (
            "INVALID_STATE",
            false,
            Some("Refresh the list; the record was already decided"),
            LogLevel::Debug,
        ),
        SyncError::Validation(_) => (
            "VALIDATION_ERROR",
            false,
            Some("Check the entered data and try again"),
            LogLevel::Debug,
        ),
        SyncError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Verify the record still exists"),
            LogLevel::Debug,
        ),
        SyncError::StoreUnavailable(_) => (
            "STORE_UNAVAILABLE",
            true,
            Some("Retry after checking the connection"),
            LogLevel::Warn,
        ),
        SyncError::Conflict(_) => (
            "CONFLICT",
            true,
            Some("Retry after a short delay"),
            LogLevel::Warn,
        ),
        SyncError::Malformed { .. } => (
            "MALFORMED_DOCUMENT",
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for SyncError {
    fn error_code(&self) -> &'static str {
        sync_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        sync_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        sync_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        sync_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            SyncError::Unauthenticated(_) => "Debes iniciar sesión.".to_string(),
            SyncError::Forbidden(_) => {
                "Solo un administrador puede realizar esta acción.".to_string()
            }
            SyncError::InvalidState(_) => "El reporte ya fue respondido.".to_string(),
            SyncError::Validation(ref msg) => msg.clone(),
            SyncError::NotFound(_) => "El reporte no existe.".to_string(),
            SyncError::StoreUnavailable(_) => {
                "No se pudo conectar con el servidor.".to_string()
            }
            SyncError::Conflict(_) => "Inténtalo de nuevo más tarde.".to_string(),
            SyncError::Malformed { .. } => "El reporte tiene datos inválidos.".to_string(),
        }
    }
}
