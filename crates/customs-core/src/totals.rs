//! # Calculation Totals
//!
//! Invoice-level sums shown on the calculation summary and its exports,
//! with the KKDF-included and KKDF-excluded views side by side.
//!
//! `total_value` and `total_quantity` are the invoice header figures, not
//! sums over the item lines; the two may differ when lines are incomplete.
//! Tax sums saturate at the decimal bounds instead of overflowing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{CalculationItem, TaxCalculation};

/// Invoice header figures plus sums over the computed items.
///
/// Items without computed taxes contribute nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CalculationTotals {
    #[ts(as = "String")]
    pub total_value: Decimal,
    pub total_quantity: i64,
    #[ts(as = "String")]
    pub customs_tax: Decimal,
    #[ts(as = "String")]
    pub additional_customs_tax: Decimal,
    #[ts(as = "String")]
    pub kkdf: Decimal,
    /// Sum of item VAT, reported as "VAT (KKDF excluded)".
    #[ts(as = "String")]
    pub vat: Decimal,
    /// `vat + kkdf`, the figure reported as "VAT (KKDF included)".
    #[ts(as = "String")]
    pub vat_including_kkdf: Decimal,
    #[ts(as = "String")]
    pub total_tax_usd: Decimal,
    #[ts(as = "String")]
    pub total_tax_usd_excluding_kkdf: Decimal,
    #[ts(as = "String")]
    pub total_tax_tl: Decimal,
}

impl CalculationTotals {
    pub fn for_calculation(calculation: &TaxCalculation, items: &[CalculationItem]) -> Self {
        let mut totals = CalculationTotals {
            total_value: calculation.total_value,
            total_quantity: calculation.total_quantity,
            ..CalculationTotals::default()
        };

        for taxes in items.iter().filter_map(|item| item.taxes.as_ref()) {
            totals.customs_tax = totals.customs_tax.saturating_add(taxes.customs_tax);
            totals.additional_customs_tax = totals
                .additional_customs_tax
                .saturating_add(taxes.additional_customs_tax);
            totals.kkdf = totals.kkdf.saturating_add(taxes.kkdf);
            totals.vat = totals.vat.saturating_add(taxes.vat);
            totals.total_tax_usd = totals.total_tax_usd.saturating_add(taxes.total_tax_usd);
            totals.total_tax_tl = totals.total_tax_tl.saturating_add(taxes.total_tax_tl);
        }

        totals.vat_including_kkdf = totals.vat.saturating_add(totals.kkdf);
        totals.total_tax_usd_excluding_kkdf = totals.total_tax_usd.saturating_sub(totals.kkdf);
        totals
    }
}
