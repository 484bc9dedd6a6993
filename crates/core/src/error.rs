use thiserror::Error;

use crate::config::OdmMode;
use crate::events::WriteEventKind;

/// Errors that can occur while mapping, staging or committing objects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OdmError {
    /// The runtime shape of an object does not match its schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Part of a schema is malformed.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// A property value cannot be stored.
    #[error("Invalid property: {0}")]
    InvalidProperty(String),
    #[error(
        "{actions} actions included in the transaction. \
        The maximum allowed actions in a single transaction is {max_allowed}."
    )]
    MaxWriteActionExceeded { actions: usize, max_allowed: usize },
    /// A stored record cannot be mapped back to an object.
    #[error("Non-compatible record: {0}")]
    NonCompatibleRecord(String),
    #[error("Database action can't be performed as database client is not attached")]
    NotAttached,
    #[error("Specified ODM instance has already attached to a database client")]
    AlreadyAttached,
    #[error("Specified ODM instance is configured for {actual}, not {expected}")]
    WrongBackendMode { expected: OdmMode, actual: OdmMode },
    #[error("Number of listeners exceeded the maximum listeners allowed for event {0}")]
    MaxListenerExceeded(WriteEventKind),
    #[error("Function {0} is not yet implemented")]
    NotImplemented(&'static str),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for ODM operations.
pub type Result<T> = std::result::Result<T, OdmError>;
