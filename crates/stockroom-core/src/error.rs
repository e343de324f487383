//! # Error Types
//!
//! Domain-specific error types for stockroom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockroom-core errors (this file)                                     │
//! │  ├── CoreError        - Recoverable domain errors                      │
//! │  └── ValidationError  - Input rejected before any database access      │
//! │                                                                         │
//! │  stockroom-db errors (separate crate)                                  │
//! │  └── DbError          - Persistence failures (fatal for the call)      │
//! │                                                                         │
//! │  stockroom-engine                                                      │
//! │  └── InventoryError   - Core | Db, what callers match on               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → InventoryError → caller           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reconciliation variances are NOT errors. They are recorded as open cases
//! and never abort the triggering operation.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Recoverable domain errors.
///
/// None of these leave partial writes behind: the engine raises them inside
/// a unit of work that is then rolled back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity does not exist for this tenant.
    ///
    /// ## When This Occurs
    /// - Product / location / item / reservation ID unknown
    /// - ID belongs to another tenant (indistinguishable by design of the
    ///   tenant-scoped queries)
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Not enough stock to satisfy the request.
    ///
    /// ## When This Occurs
    /// - Reservation exceeds available stock (location or item level)
    /// - Transfer exceeds on-hand stock at the source location
    ///
    /// ## Caller Workflow
    /// ```text
    /// reserve_stock(qty: 60)
    ///      │
    ///      ▼
    /// Check available at WH-A: 50
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "SKU-1", location: Some("WH-A"), 60, 50 }
    ///      │
    ///      ▼
    /// Order use case offers the 50 or another location
    /// ```
    #[error("Insufficient stock for {sku}{}: available {available}, requested {requested}", location_suffix(.location))]
    InsufficientStock {
        sku: String,
        location: Option<String>,
        requested: f64,
        available: f64,
    },

    /// An adjustment would drive on-hand stock below zero.
    #[error("Adjusting {sku} at {location} by {delta} would leave {current} + ({delta}) below zero")]
    NegativeStock {
        sku: String,
        location: String,
        current: f64,
        delta: f64,
    },

    /// The entity is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Releasing a reservation that is already released
    /// - Moving stock through a retired location
    /// - Retiring a ledger row that still holds reserved stock
    #[error("{entity} {id} is {state}, cannot {operation}")]
    InvalidState {
        entity: String,
        id: String,
        state: String,
        operation: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn location_suffix(location: &Option<String>) -> String {
    match location {
        Some(code) => format!(" at {}", code),
        None => String::new(),
    }
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        state: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.into(),
            id: id.into(),
            state: state.into(),
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a unit of work is opened; always caller-correctable.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or positive.
    #[error("{field} must be zero or positive")]
    MustNotBeNegative { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustNotBeZero { field: String },

    /// NaN or infinite quantity.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Invalid format (e.g., location code with spaces).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Transfer source and destination are the same location.
    #[error("Source and destination locations must differ: {location_id}")]
    SameLocation { location_id: String },

    /// Duplicate value (e.g., duplicate location code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
