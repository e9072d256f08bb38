//! # Domain Types
//!
//! Records the tax engine reads and writes.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐  1   n  ┌──────────────────┐                      │
//! │  │  TaxCalculation  │────────►│ CalculationItem  │                      │
//! │  │  ──────────────  │         │  ──────────────  │                      │
//! │  │  total_value     │         │  cost × units    │                      │
//! │  │  transport/ins/  │         │  tr_hs_code ─────┼──┐                   │
//! │  │  storage costs   │         │  country_of_orig │  │                   │
//! │  │  currency_rate   │         │  taxes (after)   │  │                   │
//! │  │  is_prepaid      │         └──────────────────┘  │                   │
//! │  │  is_atr, status  │                               │ keyed by code     │
//! │  └──────────────────┘         ┌──────────────────┐  │                   │
//! │                               │     HsCode       │◄─┤                   │
//! │                               │  4 rate fractions│  │                   │
//! │                               │  requirement flags  │                   │
//! │                               └──────────────────┘  │                   │
//! │                               ┌──────────────────┐  │                   │
//! │                               │     AtrRate      │◄─┘                   │
//! │                               │  preferential    │                      │
//! │                               │  customs rate    │                      │
//! │                               └──────────────────┘                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All rates are fractions (`0.18` for 18%). All money is [`Decimal`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::decimal_or_zero;
use crate::tax::{InvoiceEnvelope, ItemInput, ItemTaxes};
use crate::REQUIREMENTS_SEPARATOR;

// =============================================================================
// Calculation Status
// =============================================================================

/// Lifecycle of a tax calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    /// Envelope and items are being edited.
    #[default]
    Draft,
    /// Every eligible item carries freshly computed taxes.
    Calculated,
}

impl CalculationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationStatus::Draft => "draft",
            CalculationStatus::Calculated => "calculated",
        }
    }
}

impl fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(CalculationStatus::Draft),
            "calculated" => Ok(CalculationStatus::Calculated),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Tax Calculation (invoice envelope)
// =============================================================================

/// One invoice worth of import taxes.
///
/// Holds the shared costs that are spread over the items in proportion to
/// their invoice value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxCalculation {
    pub id: String,

    /// Human reference shown in lists and export file names.
    pub reference: String,

    pub invoice_no: Option<String>,

    #[ts(as = "Option<String>")]
    pub invoice_date: Option<NaiveDate>,

    /// Declared value of all items (foreign currency).
    #[ts(as = "String")]
    pub total_value: Decimal,

    pub total_quantity: i64,

    #[ts(as = "String")]
    pub transport_cost: Decimal,

    #[ts(as = "String")]
    pub insurance_cost: Decimal,

    #[ts(as = "String")]
    pub storage_cost: Decimal,

    /// Local currency per foreign unit (USD → TL).
    #[ts(as = "String")]
    pub currency_rate: Decimal,

    /// Prepaid shipments carry no KKDF levy.
    pub is_prepaid: bool,

    /// Shipment travels with an A.TR certificate.
    pub is_atr: bool,

    pub status: CalculationStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl TaxCalculation {
    /// The shared-cost envelope consumed by the tax cascade.
    pub fn envelope(&self) -> InvoiceEnvelope {
        InvoiceEnvelope {
            total_value: self.total_value,
            transport_cost: self.transport_cost,
            insurance_cost: self.insurance_cost,
            storage_cost: self.storage_cost,
            currency_rate: self.currency_rate,
            is_prepaid: self.is_prepaid,
            is_atr: self.is_atr,
        }
    }

    #[inline]
    pub fn is_calculated(&self) -> bool {
        self.status == CalculationStatus::Calculated
    }
}

// =============================================================================
// Calculation Item
// =============================================================================

/// A line of the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CalculationItem {
    pub id: String,
    pub tax_calculation_id: String,
    pub line_number: i64,
    pub style: Option<String>,
    pub description: Option<String>,
    /// HS code as declared by the supplier's country.
    pub hts_code: Option<String>,
    /// Turkish tariff code; items without one are never calculated.
    pub tr_hs_code: Option<String>,
    pub country_of_origin: Option<String>,
    #[ts(as = "String")]
    pub cost: Decimal,
    pub unit_count: i64,
    /// `cost × unit_count`, the base of the allocation ratio.
    #[ts(as = "String")]
    pub total_value: Decimal,
    /// Computed fields; `None` until the first successful calculation.
    pub taxes: Option<ItemTaxes>,
    pub requirements: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CalculationItem {
    /// Trimmed tariff code, `None` when missing or blank.
    pub fn hs_code(&self) -> Option<&str> {
        non_blank(self.tr_hs_code.as_deref())
    }

    /// Trimmed origin country, `None` when missing or blank.
    pub fn origin(&self) -> Option<&str> {
        non_blank(self.country_of_origin.as_deref())
    }

    /// Engine input for this item, if it has a tariff code.
    pub fn tax_input(&self) -> Option<ItemInput<'_>> {
        Some(ItemInput {
            total_value: self.total_value,
            tr_hs_code: self.hs_code()?,
            country_of_origin: self.origin(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Tariff Record
// =============================================================================

pub const REQUIREMENT_EX_REGISTRY_FORM: &str = "EX REGISTRY FORM";
pub const REQUIREMENT_AZO_DYE_TEST: &str = "AZO DYE TEST";
pub const REQUIREMENT_SPECIAL_CUSTOM: &str = "SPECIAL CUSTOM";

/// Tariff reference data for one Turkish HS code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HsCode {
    pub code: String,
    pub description_tr: Option<String>,
    /// Declaration quantity unit (e.g. "ADET", "KG").
    pub unit: Option<String>,
    #[ts(as = "String")]
    pub customs_tax_percent: Decimal,
    #[ts(as = "String")]
    pub additional_customs_tax_percent: Decimal,
    #[ts(as = "String")]
    pub kkdf_percent: Decimal,
    #[ts(as = "String")]
    pub vat_percent: Decimal,
    pub ex_registry_form: bool,
    pub azo_dye_test: bool,
    pub special_custom: bool,
}

impl HsCode {
    /// A tariff record with only the four rates set, parsed as decimal strings.
    pub fn with_rates(code: &str, customs: &str, additional: &str, kkdf: &str, vat: &str) -> Self {
        HsCode {
            code: code.to_string(),
            description_tr: None,
            unit: None,
            customs_tax_percent: decimal_or_zero(Some(customs)),
            additional_customs_tax_percent: decimal_or_zero(Some(additional)),
            kkdf_percent: decimal_or_zero(Some(kkdf)),
            vat_percent: decimal_or_zero(Some(vat)),
            ex_registry_form: false,
            azo_dye_test: false,
            special_custom: false,
        }
    }

    /// Human-readable requirement list, `None` when no flag is set.
    ///
    /// ```rust
    /// use customs_core::types::HsCode;
    ///
    /// let mut hs = HsCode::with_rates("6204.62", "0.12", "0.2", "0.06", "0.1");
    /// assert_eq!(hs.requirements(), None);
    ///
    /// hs.ex_registry_form = true;
    /// hs.special_custom = true;
    /// assert_eq!(hs.requirements().as_deref(), Some("EX REGISTRY FORM, SPECIAL CUSTOM"));
    /// ```
    pub fn requirements(&self) -> Option<String> {
        let labels: Vec<&str> = [
            (self.ex_registry_form, REQUIREMENT_EX_REGISTRY_FORM),
            (self.azo_dye_test, REQUIREMENT_AZO_DYE_TEST),
            (self.special_custom, REQUIREMENT_SPECIAL_CUSTOM),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect();

        if labels.is_empty() {
            None
        } else {
            Some(labels.join(REQUIREMENTS_SEPARATOR))
        }
    }
}

// =============================================================================
// Preferential-Origin Rate
// =============================================================================

/// Alternate customs duty for A.TR shipments from non-exempt origins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AtrRate {
    pub tr_hs_code: String,
    #[ts(as = "String")]
    pub customs_tax_percent: Decimal,
}
