//! # Engine Error Types
//!
//! What callers of [`crate::InventoryService`] match on.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       InventoryError Categories                         │
//! │                                                                         │
//! │  ┌───────────────────────────────┐  ┌───────────────────────────────┐  │
//! │  │  Core (recoverable)           │  │  Db (fatal for the call)      │  │
//! │  │                               │  │                               │  │
//! │  │  Validation                   │  │  Conflict (retry the call)    │  │
//! │  │  InsufficientStock            │  │  PoolExhausted (retry)        │  │
//! │  │  NegativeStock                │  │  ConnectionFailed             │  │
//! │  │  InvalidState                 │  │  QueryFailed                  │  │
//! │  │  NotFound                     │  │  TransactionFailed            │  │
//! │  └───────────────────────────────┘  └───────────────────────────────┘  │
//! │                                                                         │
//! │  Either way the unit of work is dropped and nothing was written.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockroom_core::{CoreError, ValidationError};
use stockroom_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Domain error; the caller can correct the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Persistence failure; the whole call was rolled back.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for InventoryError {
    fn from(err: ValidationError) -> Self {
        InventoryError::Core(CoreError::Validation(err))
    }
}

impl InventoryError {
    /// True for domain errors. Persistence failures are not recoverable
    /// by changing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, InventoryError::Core(_))
    }

    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, InventoryError::Core(CoreError::InsufficientStock { .. }))
    }

    /// True when re-running the same call may succeed (lock contention).
    pub fn is_retryable(&self) -> bool {
        match self {
            InventoryError::Db(err) => err.is_retryable(),
            InventoryError::Core(_) => false,
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value failed validation.
    #[error("Invalid inventory configuration: {0}")]
    Invalid(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}
