//! # Validation Module
//!
//! Input checks run by the engine before it opens a unit of work.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Quantities finite, positive / non-negative / non-zero             │
//! │  ├── Transfer endpoints distinct                                       │
//! │  └── Codes, names, reasons, reference kind/id lengths                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine, inside the unit of work                              │
//! │  ├── Stock sufficiency (InsufficientStock / NegativeStock)             │
//! │  └── State checks (InvalidState)                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (item, location), (tenant, code), one open case per item   │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockroom_core::validation::{validate_location_code, validate_positive_quantity};
//!
//! validate_location_code("WH-A").unwrap();
//! validate_positive_quantity("quantity", 5.0).unwrap();
//! assert!(validate_positive_quantity("quantity", 0.0).is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_CODE_LENGTH: usize = 50;
pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_REASON_LENGTH: usize = 255;
pub const MAX_REFERENCE_LENGTH: usize = 100;

// =============================================================================
// Numeric Validators
// =============================================================================

fn validate_finite(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Quantity for reserve and transfer. Must be > 0.
pub fn validate_positive_quantity(field: &str, value: f64) -> ValidationResult<()> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Absolute on-hand for `set_location_stock`. Zero is allowed.
pub fn validate_non_negative_quantity(field: &str, value: f64) -> ValidationResult<()> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Signed delta for `adjust_location_stock`.
pub fn validate_delta(field: &str, value: f64) -> ValidationResult<()> {
    validate_finite(field, value)?;
    if value == 0.0 {
        return Err(ValidationError::MustNotBeZero {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Cost or threshold value. Zero is allowed.
pub fn validate_amount(field: &str, value: f64) -> ValidationResult<()> {
    validate_non_negative_quantity(field, value)
}

// =============================================================================
// Identity Validators
// =============================================================================

/// Transfer source and destination must differ.
pub fn validate_distinct_locations(from_id: &str, to_id: &str) -> ValidationResult<()> {
    if from_id == to_id {
        return Err(ValidationError::SameLocation {
            location_id: from_id.to_string(),
        });
    }
    Ok(())
}

fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a location code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens, underscores only
///
/// ## Example
/// ```rust
/// use stockroom_core::validation::validate_location_code;
///
/// assert!(validate_location_code("WH-A").is_ok());
/// assert!(validate_location_code("").is_err());
/// assert!(validate_location_code("shelf 3").is_err());
/// ```
pub fn validate_location_code(code: &str) -> ValidationResult<()> {
    validate_required("code", code, MAX_CODE_LENGTH)?;

    if !code
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

pub fn validate_location_name(name: &str) -> ValidationResult<()> {
    validate_required("name", name, MAX_NAME_LENGTH)
}

/// Reason text on adjustments, transfers and releases.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    validate_required("reason", reason, MAX_REASON_LENGTH)
}

/// The (kind, id) pair a reservation is held for, e.g. ("order", "O-1").
pub fn validate_reference(kind: &str, id: &str) -> ValidationResult<()> {
    validate_required("reserved_for_type", kind, MAX_REFERENCE_LENGTH)?;
    validate_required("reserved_for_id", id, MAX_REFERENCE_LENGTH)
}

/// Tenant and actor IDs must be present.
pub fn validate_actor(tenant_id: &str, actor: &str) -> ValidationResult<()> {
    validate_required("tenant_id", tenant_id, MAX_REFERENCE_LENGTH)?;
    validate_required("actor", actor, MAX_REFERENCE_LENGTH)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity("quantity", 0.5).is_ok());
        assert!(matches!(
            validate_positive_quantity("quantity", 0.0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_positive_quantity("quantity", -1.0).is_err());
        assert!(matches!(
            validate_positive_quantity("quantity", f64::NAN),
            Err(ValidationError::NotFinite { .. })
        ));
    }

    #[test]
    fn test_non_negative_quantity() {
        assert!(validate_non_negative_quantity("quantity", 0.0).is_ok());
        assert!(matches!(
            validate_non_negative_quantity("quantity", -0.1),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
        assert!(validate_non_negative_quantity("quantity", f64::INFINITY).is_err());
    }

    #[test]
    fn test_delta() {
        assert!(validate_delta("delta", -3.0).is_ok());
        assert!(matches!(
            validate_delta("delta", 0.0),
            Err(ValidationError::MustNotBeZero { .. })
        ));
    }

    #[test]
    fn test_distinct_locations() {
        assert!(validate_distinct_locations("a", "b").is_ok());
        assert!(matches!(
            validate_distinct_locations("a", "a"),
            Err(ValidationError::SameLocation { .. })
        ));
    }

    #[test]
    fn test_location_code() {
        assert!(validate_location_code("MAIN_01").is_ok());
        assert!(validate_location_code("  ").is_err());
        assert!(validate_location_code(&"A".repeat(51)).is_err());
        assert!(matches!(
            validate_location_code("WH/A"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_reference_and_reason() {
        assert!(validate_reference("order", "O-1").is_ok());
        assert!(validate_reference("", "O-1").is_err());
        assert!(validate_reference("order", &"9".repeat(101)).is_err());
        assert!(validate_reason("damaged in transit").is_ok());
        assert!(validate_reason("").is_err());
        assert!(validate_actor("tenant-1", "").is_err());
    }
}
