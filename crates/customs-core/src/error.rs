//! # Error Types
//!
//! Domain-specific error types for customs-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  customs-core errors (this file)                                       │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  customs-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  customs-engine errors                                                 │
//! │  └── EngineError      - What the calling request handler sees          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → EngineError → caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unparsable numbers are zero and missing tariff data is a skip, not an
//! error (see [`crate::plan`]). The cascade fails only on decimal overflow.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stored status string is not a known calculation status.
    #[error("Unknown calculation status: {0}")]
    UnknownStatus(String),

    /// No 3-digit customs declaration code is known for the country.
    ///
    /// ## When This Occurs
    /// - The origin country is missing from the default table
    /// - No per-deployment override was configured for it
    #[error("No customs country code for origin '{0}'")]
    UnknownCountryCode(String),

    /// A cascade value left the range of `Decimal`.
    #[error("Decimal overflow computing {0}")]
    Overflow(&'static str),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised when CRUD input for tariffs, A.TR rates, calculations or items
/// does not meet requirements. Used before anything is persisted.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// A rate fraction is outside `[0, 1]`.
    #[error("{field} must be a fraction between 0 and 1, got {value}")]
    RateOutOfRange { field: String, value: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// A derived amount does not fit in a decimal.
    #[error("{field} is out of range")]
    OutOfRange { field: String },

    /// Invalid format (e.g., HS code with letters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
