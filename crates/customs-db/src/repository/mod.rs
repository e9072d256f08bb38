//! # Repository Module
//!
//! Database repository implementations for the customs desk.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and their tables                        │
//! │                                                                         │
//! │  TaxCalculator (customs-engine)                                        │
//! │       │                                                                 │
//! │       │  db.hs_codes().get_many(&codes)                                │
//! │       ▼                                                                 │
//! │  HsCodeRepository        ──► hs_codes                                  │
//! │  AtrRateRepository       ──► atr_rates                                 │
//! │  CalculationRepository   ──► tax_calculations, tax_calculation_items   │
//! │                                                                         │
//! │  Lookups used by a calculation run take the whole code set and issue   │
//! │  a single `IN (...)` query.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decimal Columns
//! Money and rates are TEXT. Writes go through
//! [`customs_core::money::to_decimal_string`]; reads go through
//! [`customs_core::money::decimal_or_zero`], so a hand-edited or empty cell
//! reads as zero instead of failing the whole query.

use customs_core::money::{decimal_or_zero, to_decimal_string};
use customs_core::Decimal;
use sqlx::{QueryBuilder, Sqlite};

pub mod atr_rate;
pub mod calculation;
pub mod hs_code;

/// Reads a TEXT decimal column.
pub(crate) fn read_decimal(raw: &str) -> Decimal {
    decimal_or_zero(Some(raw))
}

/// Reads a nullable TEXT decimal column.
pub(crate) fn read_optional_decimal(raw: Option<&str>) -> Decimal {
    decimal_or_zero(raw)
}

/// Formats a decimal for a TEXT column.
pub(crate) fn write_decimal(value: Decimal) -> String {
    to_decimal_string(value)
}

/// Appends `IN (?, ?, ...)` binding every code, trimmed.
pub(crate) fn push_code_list<'args>(
    query: &mut QueryBuilder<'args, Sqlite>,
    codes: &'args [String],
) {
    query.push(" IN (");
    let mut separated = query.separated(", ");
    for code in codes {
        separated.push_bind(code.trim());
    }
    separated.push_unseparated(")");
}
