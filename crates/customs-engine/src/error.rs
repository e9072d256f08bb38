//! # Engine Error Types
//!
//! Errors a caller of [`crate::TaxCalculator`] or the config loader can see.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────────┐  ┌─────────────────┐  ┌─────────────────────┐ │
//! │  │     Calculation     │  │     Store       │  │   Configuration     │ │
//! │  │                     │  │                 │  │                     │ │
//! │  │ CalculationNotFound │  │  Store(DbError) │  │  Config, Io,        │ │
//! │  │                     │  │                 │  │  TomlDe, TomlSer    │ │
//! │  └─────────────────────┘  └─────────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Items that cannot be calculated are not errors; they are reported as
//! skipped outcomes.

use customs_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Calculation Errors
    // =========================================================================
    /// The calculation id does not exist.
    #[error("Tax calculation not found: {0}")]
    CalculationNotFound(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// A read or write against the store failed.
    ///
    /// When this happens during the batch write nothing was persisted and the
    /// calculation status is unchanged.
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to read the config file.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`crate::EngineConfig`].
    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// The effective config could not be rendered.
    #[error("Failed to render config: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl EngineError {
    /// Returns true if the error is the caller's fault (bad id or config)
    /// rather than a storage failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::CalculationNotFound(_) | EngineError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = EngineError::CalculationNotFound("calc-9".to_string());
        assert_eq!(err.to_string(), "Tax calculation not found: calc-9");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_store_errors_wrap_db_errors() {
        let err: EngineError = DbError::PoolExhausted.into();
        assert!(matches!(err, EngineError::Store(DbError::PoolExhausted)));
        assert!(!err.is_client_error());
    }
}
