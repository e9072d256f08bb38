//! # Validation Module
//!
//! Input checks for the CRUD side of the application.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin forms                                                  │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (customs-db)                                    │
//! │  └── THIS MODULE: checked before every insert / upsert                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE constraints                                     │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tax engine itself never validates: it parses leniently and skips
//! what it cannot use. These checks keep bad rows out in the first place.

use rust_decimal::Decimal;

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const HS_CODE_MIN_LEN: usize = 4;
const HS_CODE_MAX_LEN: usize = 20;

// =============================================================================
// Code Validators
// =============================================================================

/// Validates a tariff (HS / GTIP) code.
///
/// ## Rules
/// - Between 4 and 20 characters after trimming
/// - Digits and dots only, starting with a digit
///
/// ## Example
/// ```rust
/// use customs_core::validation::validate_hs_code;
///
/// assert!(validate_hs_code("6109.10.00.00.00").is_ok());
/// assert!(validate_hs_code("61AB").is_err());
/// assert!(validate_hs_code("").is_err());
/// ```
pub fn validate_hs_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "tr_hs_code".to_string(),
        });
    }

    if code.len() < HS_CODE_MIN_LEN {
        return Err(ValidationError::TooShort {
            field: "tr_hs_code".to_string(),
            min: HS_CODE_MIN_LEN,
        });
    }

    if code.len() > HS_CODE_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "tr_hs_code".to_string(),
            max: HS_CODE_MAX_LEN,
        });
    }

    let starts_with_digit = code.chars().next().is_some_and(|c| c.is_ascii_digit());
    if !starts_with_digit || !code.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(ValidationError::InvalidFormat {
            field: "tr_hs_code".to_string(),
            reason: "must contain only digits and dots".to_string(),
        });
    }

    Ok(())
}

/// Validates an ISO 3166 alpha-2 country code.
pub fn validate_country_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "country_of_origin".to_string(),
        });
    }

    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "country_of_origin".to_string(),
            reason: "must be a two-letter country code".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a rate fraction (`0.18` for 18%).
///
/// ## Rules
/// - Between 0 and 1 inclusive
/// - A value like `18` is almost always a percentage typed by mistake
///
/// ## Example
/// ```rust
/// use customs_core::validation::validate_rate;
/// use customs_core::Decimal;
///
/// assert!(validate_rate("vat_percent", Decimal::new(18, 2)).is_ok());
/// assert!(validate_rate("vat_percent", Decimal::new(18, 0)).is_err());
/// ```
pub fn validate_rate(field: &str, rate: Decimal) -> ValidationResult<()> {
    if rate.is_sign_negative() || rate > Decimal::ONE {
        return Err(ValidationError::RateOutOfRange {
            field: field.to_string(),
            value: rate.to_string(),
        });
    }

    Ok(())
}

/// Validates a monetary amount. Zero is allowed (no storage cost, etc.).
pub fn validate_amount(field: &str, amount: Decimal) -> ValidationResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates an item's unit count.
pub fn validate_unit_count(units: i64) -> ValidationResult<()> {
    if units <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "unit_count".to_string(),
        });
    }

    Ok(())
}

/// Validates the USD/TL conversion rate.
pub fn validate_currency_rate(rate: Decimal) -> ValidationResult<()> {
    if rate <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "currency_rate".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
