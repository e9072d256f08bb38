//! # customs-core: Pure Import Tax Logic
//!
//! This crate is the **heart** of the customs desk. It holds the import tax
//! engine as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Customs Desk Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Procedure / calculation admin pages                  │   │
//! │  │    Invoice form ──► Item rows ──► "Calculate" ──► Excel export │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 customs-engine (TaxCalculator)                  │   │
//! │  │     calculate(id), check_missing_atr_rates(id)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ customs-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │   tax   │ │ precheck │ │ policy │  │   │
//! │  │   │ HsCode  │ │ Decimal │ │ cascade │ │ A.TR gap │ │ exempt │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  customs-db (Database Layer)                    │   │
//! │  │             SQLite queries, migrations, repositories            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (TaxCalculation, CalculationItem, HsCode, AtrRate)
//! - [`money`] - The decimal-string boundary ("parse or zero")
//! - [`tax`] - Duty rate resolution and the per-item tax cascade
//! - [`plan`] - Per-calculation batch planning with skip reasons
//! - [`precheck`] - Detection of missing A.TR preferential rates
//! - [`totals`] - Calculation-level sums (KKDF included / excluded)
//! - [`policy`] - Origin-country policy tables
//! - [`validation`] - Input checks for CRUD ingestion
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use customs_core::money::decimal_or_zero;
//! use customs_core::policy::ExemptCountries;
//! use customs_core::tax::{compute_item_taxes, InvoiceEnvelope, ItemInput};
//! use customs_core::types::HsCode;
//!
//! let envelope = InvoiceEnvelope {
//!     total_value: decimal_or_zero(Some("2000")),
//!     transport_cost: decimal_or_zero(Some("100")),
//!     ..InvoiceEnvelope::default()
//! };
//! let tariff = HsCode::with_rates("6109.10.00.00.00", "0.05", "0.03", "0.02", "0.18");
//! let item = ItemInput {
//!     total_value: decimal_or_zero(Some("1000")),
//!     tr_hs_code: "6109.10.00.00.00",
//!     country_of_origin: Some("CN"),
//! };
//!
//! let taxes = compute_item_taxes(&item, &envelope, &tariff, None, &ExemptCountries::default())?;
//! assert_eq!(taxes.transport_share, decimal_or_zero(Some("50")));
//! assert_eq!(taxes.kkdf, decimal_or_zero(Some("20")));
//! # Ok::<(), customs_core::CoreError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod plan;
pub mod policy;
pub mod precheck;
pub mod tax;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use plan::{ComputedItem, ItemOutcome, ItemResult, ItemTaxUpdate, SkipReason};
pub use policy::{CountryCodeMap, ExemptCountries};
pub use precheck::{MissingAtrRate, MissingAtrRates};
pub use tax::{AtrContext, DutyRates, InvoiceEnvelope, ItemTaxes, RateSource};
pub use totals::CalculationTotals;
pub use types::*;

// Re-exported so downstream crates name one decimal type.
pub use rust_decimal::Decimal;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Origin countries for which an A.TR certificate zeroes both duty rates.
///
/// Used by [`ExemptCountries::default`]; deployments may inject another set.
pub const DEFAULT_EXEMPT_COUNTRIES: [&str; 5] = ["IT", "TR", "PT", "TN", "BA"];

/// Separator used when joining requirement labels into one string.
pub const REQUIREMENTS_SEPARATOR: &str = ", ";
