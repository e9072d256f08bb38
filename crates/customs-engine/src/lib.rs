//! # customs-engine: Import Tax Calculation Engine
//!
//! Runs the tax cascade of `customs-core` over a whole calculation stored by
//! `customs-db`.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         customs-engine                                  │
//! │                                                                         │
//! │   customs-calc (bin)                                                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌──────────────┐      ┌──────────────┐      ┌──────────────────────┐  │
//! │   │ EngineConfig │─────►│TaxCalculator │─────►│  TaxStore (trait)    │  │
//! │   │ TOML + env   │      │ lock per id  │      │  impl for Database   │  │
//! │   └──────────────┘      └──────┬───────┘      └──────────────────────┘  │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                      customs-core::plan (pure)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use customs_db::Database;
//! use customs_engine::{EngineConfig, TaxCalculator};
//!
//! let config = EngineConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let calculator = TaxCalculator::new(db, config.exempt_countries());
//!
//! let report = calculator.calculate(&calculation_id).await?;
//! println!("{} items, {} USD", report.computed, report.totals.total_tax_usd);
//! ```

pub mod calculator;
pub mod config;
pub mod error;
pub mod store;

pub use calculator::{CalculationReport, TaxCalculator};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use store::TaxStore;
