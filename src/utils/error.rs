//! Error types and handling
//!
//! Provisioning operations return [`ProvisionError`]; reboot and destroy return
//! [`OperationError`] so that a vendor refusing the operation is a distinct,
//! checkable outcome rather than a silently ignored `false`.

use thiserror::Error;

/// Errors raised by provider registration, sync and node creation
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No driver (built-in or plugin) resolves the provider type
    #[error("Unknown provider type: {0}")]
    UnknownProvider(String),

    /// Capability metadata or application configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operator input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The vendor connection could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// A vendor call failed
    #[error("Vendor error: {0}")]
    Vendor(String),

    /// A local row or vendor entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness or integrity constraint was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The provider does not declare the capability
    #[error("Unsupported action: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProvisionError {
    /// Stable identifier for logs and machine-readable output
    pub fn error_type(&self) -> &'static str {
        match self {
            ProvisionError::UnknownProvider(_) => "unknown_provider",
            ProvisionError::Config(_) => "config_error",
            ProvisionError::Validation(_) => "validation_error",
            ProvisionError::Connection(_) => "connection_error",
            ProvisionError::Vendor(_) => "vendor_error",
            ProvisionError::NotFound(_) => "not_found",
            ProvisionError::Conflict(_) => "conflict",
            ProvisionError::Unsupported(_) => "unsupported",
            ProvisionError::Database(_) => "database_error",
            ProvisionError::Serialization(_) => "serialization_error",
        }
    }
}

/// Failure of a reboot or destroy request
#[derive(Debug, Error)]
pub enum OperationError {
    /// The vendor no longer lists a node with this uuid
    #[error("Node {0} is not listed by the provider")]
    NodeNotFound(String),

    /// The vendor answered the call but reported failure
    #[error("Provider refused to {action} node {uuid}")]
    Rejected { action: &'static str, uuid: String },

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl OperationError {
    pub fn error_type(&self) -> &'static str {
        match self {
            OperationError::NodeNotFound(_) => "node_not_found",
            OperationError::Rejected { .. } => "rejected",
            OperationError::Provision(e) => e.error_type(),
        }
    }
}

// Implement From for common error types

impl From<sqlx::Error> for ProvisionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ProvisionError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if message.contains("UNIQUE constraint failed")
                    || message.contains("CHECK constraint failed")
                {
                    ProvisionError::Conflict(message.to_string())
                } else {
                    ProvisionError::Database(db_err.to_string())
                }
            }
            _ => ProvisionError::Database(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for ProvisionError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        ProvisionError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProvisionError::Vendor("Vendor request timed out".to_string())
        } else if err.is_connect() {
            ProvisionError::Connection("Failed to connect to vendor endpoint".to_string())
        } else {
            ProvisionError::Vendor(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ProvisionError {
    fn from(err: validator::ValidationErrors) -> Self {
        ProvisionError::Validation(err.to_string())
    }
}

/// Result type alias for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;
