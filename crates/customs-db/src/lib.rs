//! # customs-db: Database Layer for the Customs Tax Engine
//!
//! This crate provides database access for the customs desk.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Customs Desk Data Flow                           │
//! │                                                                         │
//! │  TaxCalculator::calculate(id)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   customs-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │    Repositories    │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ HsCodeRepository   │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ AtrRateRepository  │  │ 001_init   │  │   │
//! │  │   │               │    │ CalculationRepo    │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (tariffs, A.TR rates, calculations)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use customs_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/customs.db")).await?;
//!
//! let calc = db.calculations().get_by_id(&id).await?;
//! let items = db.calculations().get_items(&id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::atr_rate::AtrRateRepository;
pub use repository::calculation::{CalculationRepository, NewCalculation, NewCalculationItem};
pub use repository::hs_code::HsCodeRepository;
