//! # Tax Module
//!
//! Duty rate resolution and the per-item import tax cascade.
//!
//! ## The Cascade
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Per-Item Import Tax Cascade                        │
//! │                                                                         │
//! │  ratio = item.total_value / invoice.total_value   (0 if total is 0)    │
//! │     │                                                                   │
//! │     ├──► transport_share = ratio × transport_cost                       │
//! │     ├──► insurance_share = ratio × insurance_cost                       │
//! │     └──► storage_share   = ratio × storage_cost                         │
//! │                                                                         │
//! │  cif_value = item value + transport_share + insurance_share             │
//! │              (storage is NOT part of the duty base)                     │
//! │     │                                                                   │
//! │     ├──► customs_tax            = cif × customs rate                    │
//! │     └──► additional_customs_tax = cif × additional rate                 │
//! │                                                                         │
//! │  kkdf = item value × kkdf rate        (only when NOT prepaid)           │
//! │                                                                         │
//! │  vat_base = cif + storage_share + customs + additional (+ kkdf)         │
//! │  vat      = vat_base × vat rate                                         │
//! │                                                                         │
//! │  total_tax_usd = customs + additional + kkdf + vat                      │
//! │  total_tax_tl  = total_tax_usd × currency_rate                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## A.TR Rate Resolution
//! ```text
//! envelope.is_atr && context present?
//!   ├── no  ──► tariff rates                                   (Tariff)
//!   └── yes ──► origin exempt?
//!                ├── yes ──► customs = 0, additional = 0       (AtrExempt)
//!                └── no  ──► preferential rate for code?
//!                             ├── yes ──► customs = preferential,
//!                             │           additional unchanged (AtrPreferential)
//!                             └── no  ──► tariff rates         (AtrFallback)
//! ```
//!
//! Everything here runs at full decimal precision. Nothing is rounded, so the
//! sums and products the downstream reports show add up exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::ratio;
use crate::policy::ExemptCountries;
use crate::types::{AtrRate, HsCode};

// =============================================================================
// Inputs
// =============================================================================

/// Invoice-level values shared by every item of a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InvoiceEnvelope {
    pub total_value: Decimal,
    pub transport_cost: Decimal,
    pub insurance_cost: Decimal,
    pub storage_cost: Decimal,
    pub currency_rate: Decimal,
    pub is_prepaid: bool,
    pub is_atr: bool,
}

/// The parts of a line item the cascade reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemInput<'a> {
    pub total_value: Decimal,
    pub tr_hs_code: &'a str,
    pub country_of_origin: Option<&'a str>,
}

/// Preferential customs rates for one A.TR calculation, keyed by HS code.
///
/// Only built when the envelope is A.TR-flagged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtrContext {
    rates: HashMap<String, Decimal>,
}

impl AtrContext {
    pub fn from_rates<I>(rates: I) -> Self
    where
        I: IntoIterator<Item = AtrRate>,
    {
        let rates = rates
            .into_iter()
            .map(|r| (r.tr_hs_code.trim().to_string(), r.customs_tax_percent))
            .collect();
        AtrContext { rates }
    }

    pub fn preferential_rate(&self, tr_hs_code: &str) -> Option<Decimal> {
        self.rates.get(tr_hs_code.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

// =============================================================================
// Rate Resolution
// =============================================================================

/// Where the applied duty rates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Regular tariff rates, no A.TR involved.
    Tariff,
    /// A.TR from an exempt origin: both duties zeroed.
    AtrExempt,
    /// A.TR with a preferential customs rate on file.
    AtrPreferential,
    /// A.TR but no preferential rate on file; tariff rates kept.
    AtrFallback,
}

/// The two duty rates actually applied to an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DutyRates {
    pub customs: Decimal,
    pub additional: Decimal,
    pub source: RateSource,
}

/// Picks the standard and additional duty rates for one item.
pub fn resolve_duty_rates(
    item: &ItemInput<'_>,
    envelope: &InvoiceEnvelope,
    tariff: &HsCode,
    atr: Option<&AtrContext>,
    exempt: &ExemptCountries,
) -> DutyRates {
    let standard = DutyRates {
        customs: tariff.customs_tax_percent,
        additional: tariff.additional_customs_tax_percent,
        source: RateSource::Tariff,
    };

    let Some(atr) = atr.filter(|_| envelope.is_atr) else {
        return standard;
    };

    if item.country_of_origin.is_some_and(|c| exempt.contains(c)) {
        return DutyRates {
            customs: Decimal::ZERO,
            additional: Decimal::ZERO,
            source: RateSource::AtrExempt,
        };
    }

    match atr.preferential_rate(item.tr_hs_code) {
        Some(preferential) => DutyRates {
            customs: preferential,
            source: RateSource::AtrPreferential,
            ..standard
        },
        // TODO: decide with the customs team whether this should block the run
        // instead of charging the full tariff rate.
        None => DutyRates {
            source: RateSource::AtrFallback,
            ..standard
        },
    }
}

// =============================================================================
// Computed Item Taxes
// =============================================================================

/// Every intermediate and final value of the cascade for one item.
///
/// All of it is persisted; the export sheets show each column.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemTaxes {
    #[ts(as = "String")]
    pub transport_share: Decimal,
    #[ts(as = "String")]
    pub insurance_share: Decimal,
    #[ts(as = "String")]
    pub storage_share: Decimal,
    #[ts(as = "String")]
    pub cif_value: Decimal,
    #[ts(as = "String")]
    pub customs_tax: Decimal,
    #[ts(as = "String")]
    pub additional_customs_tax: Decimal,
    #[ts(as = "String")]
    pub kkdf: Decimal,
    #[ts(as = "String")]
    pub vat_base: Decimal,
    #[ts(as = "String")]
    pub vat: Decimal,
    #[ts(as = "String")]
    pub total_tax_usd: Decimal,
    #[ts(as = "String")]
    pub total_tax_tl: Decimal,
}

impl ItemTaxes {
    /// VAT base with the KKDF term taken out.
    pub fn vat_base_excluding_kkdf(&self) -> Decimal {
        self.vat_base - self.kkdf
    }

    /// VAT as it would be on the KKDF-free base.
    pub fn vat_excluding_kkdf(&self, vat_rate: Decimal) -> Decimal {
        self.vat_base_excluding_kkdf().saturating_mul(vat_rate)
    }

    /// Total tax in foreign currency without the KKDF levy.
    pub fn total_tax_usd_excluding_kkdf(&self) -> Decimal {
        self.total_tax_usd - self.kkdf
    }
}

/// Runs the cascade with already resolved duty rates.
///
/// ## Returns
/// * `Err(CoreError::Overflow)` - A product or sum leaves the range of
///   [`Decimal`]; nothing is clamped.
pub fn apply_cascade(
    item_total: Decimal,
    envelope: &InvoiceEnvelope,
    tariff: &HsCode,
    rates: DutyRates,
) -> CoreResult<ItemTaxes> {
    let share = ratio(item_total, envelope.total_value);
    let transport_share = mul("transport_share", share, envelope.transport_cost)?;
    let insurance_share = mul("insurance_share", share, envelope.insurance_cost)?;
    let storage_share = mul("storage_share", share, envelope.storage_cost)?;

    let cif_value = sum("cif_value", &[item_total, transport_share, insurance_share])?;

    let customs_tax = mul("customs_tax", cif_value, rates.customs)?;
    let additional_customs_tax = mul("additional_customs_tax", cif_value, rates.additional)?;

    let kkdf = if envelope.is_prepaid {
        Decimal::ZERO
    } else {
        mul("kkdf", item_total, tariff.kkdf_percent)?
    };
    let vat_base = sum(
        "vat_base",
        &[cif_value, storage_share, customs_tax, additional_customs_tax, kkdf],
    )?;

    let vat = mul("vat", vat_base, tariff.vat_percent)?;
    let total_tax_usd = sum(
        "total_tax_usd",
        &[customs_tax, additional_customs_tax, kkdf, vat],
    )?;
    let total_tax_tl = mul("total_tax_tl", total_tax_usd, envelope.currency_rate)?;

    Ok(ItemTaxes {
        transport_share,
        insurance_share,
        storage_share,
        cif_value,
        customs_tax,
        additional_customs_tax,
        kkdf,
        vat_base,
        vat,
        total_tax_usd,
        total_tax_tl,
    })
}

fn mul(field: &'static str, a: Decimal, b: Decimal) -> CoreResult<Decimal> {
    a.checked_mul(b).ok_or(CoreError::Overflow(field))
}

fn sum(field: &'static str, terms: &[Decimal]) -> CoreResult<Decimal> {
    terms
        .iter()
        .try_fold(Decimal::ZERO, |acc, term| acc.checked_add(*term))
        .ok_or(CoreError::Overflow(field))
}

/// Computes all tax fields for one item.
///
/// Pure function of its inputs. Fails only when a value overflows.
pub fn compute_item_taxes(
    item: &ItemInput<'_>,
    envelope: &InvoiceEnvelope,
    tariff: &HsCode,
    atr: Option<&AtrContext>,
    exempt: &ExemptCountries,
) -> CoreResult<ItemTaxes> {
    let rates = resolve_duty_rates(item, envelope, tariff, atr, exempt);
    apply_cascade(item.total_value, envelope, tariff, rates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CODE: &str = "6109.10.00.00.00";

    fn tariff() -> HsCode {
        HsCode::with_rates(CODE, "0.05", "0.03", "0.02", "0.18")
    }

    fn envelope() -> InvoiceEnvelope {
        InvoiceEnvelope {
            total_value: dec!(2000),
            transport_cost: dec!(100),
            insurance_cost: dec!(40),
            storage_cost: dec!(60),
            currency_rate: dec!(32.5),
            is_prepaid: false,
            is_atr: false,
        }
    }

    fn item(country: &'static str) -> ItemInput<'static> {
        ItemInput {
            total_value: dec!(1000),
            tr_hs_code: CODE,
            country_of_origin: Some(country),
        }
    }

    fn atr_envelope() -> InvoiceEnvelope {
        InvoiceEnvelope {
            is_atr: true,
            ..envelope()
        }
    }

    fn atr_context(rate: Decimal) -> AtrContext {
        AtrContext::from_rates([AtrRate {
            tr_hs_code: CODE.to_string(),
            customs_tax_percent: rate,
        }])
    }

    #[test]
    fn test_full_cascade_for_one_item() {
        let taxes = compute_item_taxes(
            &item("CN"),
            &envelope(),
            &tariff(),
            None,
            &ExemptCountries::default(),
        )
        .unwrap();

        assert_eq!(taxes.transport_share, dec!(50));
        assert_eq!(taxes.insurance_share, dec!(20));
        assert_eq!(taxes.storage_share, dec!(30));
        assert_eq!(taxes.cif_value, dec!(1070));
        assert_eq!(taxes.customs_tax, dec!(53.50));
        assert_eq!(taxes.additional_customs_tax, dec!(32.10));
        assert_eq!(taxes.kkdf, dec!(20));
        // 1070 + 30 + 53.5 + 32.1 + 20
        assert_eq!(taxes.vat_base, dec!(1205.60));
        assert_eq!(taxes.vat, dec!(217.008));
        assert_eq!(taxes.total_tax_usd, dec!(322.608));
        assert_eq!(taxes.total_tax_tl, dec!(10484.76));
    }

    #[test]
    fn test_totals_are_sums_of_components() {
        let taxes = compute_item_taxes(
            &item("VN"),
            &envelope(),
            &tariff(),
            None,
            &ExemptCountries::default(),
        )
        .unwrap();
        assert_eq!(
            taxes.total_tax_usd,
            taxes.customs_tax + taxes.additional_customs_tax + taxes.kkdf + taxes.vat
        );
        assert_eq!(taxes.total_tax_tl, taxes.total_tax_usd * dec!(32.5));
        assert_eq!(
            taxes.cif_value,
            dec!(1000) + taxes.transport_share + taxes.insurance_share
        );
    }

    #[test]
    fn test_zero_invoice_total_gives_zero_shares() {
        let env = InvoiceEnvelope {
            total_value: Decimal::ZERO,
            ..envelope()
        };
        let taxes =
            compute_item_taxes(&item("CN"), &env, &tariff(), None, &ExemptCountries::default())
                .unwrap();

        assert_eq!(taxes.transport_share, Decimal::ZERO);
        assert_eq!(taxes.insurance_share, Decimal::ZERO);
        assert_eq!(taxes.storage_share, Decimal::ZERO);
        assert_eq!(taxes.cif_value, dec!(1000));
    }

    #[test]
    fn test_prepaid_has_no_kkdf() {
        let env = InvoiceEnvelope {
            is_prepaid: true,
            ..envelope()
        };
        let taxes =
            compute_item_taxes(&item("CN"), &env, &tariff(), None, &ExemptCountries::default())
                .unwrap();

        assert_eq!(taxes.kkdf, Decimal::ZERO);
        assert_eq!(
            taxes.vat_base,
            taxes.cif_value + taxes.storage_share + taxes.customs_tax + taxes.additional_customs_tax
        );
        assert_eq!(taxes.vat_base_excluding_kkdf(), taxes.vat_base);
    }

    #[test]
    fn test_atr_exempt_origin_zeroes_both_duties() {
        let taxes = compute_item_taxes(
            &item("TR"),
            &atr_envelope(),
            &tariff(),
            Some(&atr_context(dec!(0.01))),
            &ExemptCountries::default(),
        )
        .unwrap();

        assert_eq!(taxes.customs_tax, Decimal::ZERO);
        assert_eq!(taxes.additional_customs_tax, Decimal::ZERO);
        // KKDF and VAT still apply.
        assert_eq!(taxes.kkdf, dec!(20));
        assert!(taxes.vat.is_sign_positive() && !taxes.vat.is_zero());
    }

    #[test]
    fn test_atr_preferential_rate_replaces_only_standard_duty() {
        let rates = resolve_duty_rates(
            &item("CN"),
            &atr_envelope(),
            &tariff(),
            Some(&atr_context(dec!(0.01))),
            &ExemptCountries::default(),
        );
        assert_eq!(rates.source, RateSource::AtrPreferential);
        assert_eq!(rates.customs, dec!(0.01));
        assert_eq!(rates.additional, dec!(0.03));

        let taxes = apply_cascade(dec!(1000), &atr_envelope(), &tariff(), rates).unwrap();
        assert_eq!(taxes.customs_tax, dec!(10.70));
        assert_eq!(taxes.additional_customs_tax, dec!(32.10));
    }

    #[test]
    fn test_atr_without_preferential_rate_falls_back() {
        let rates = resolve_duty_rates(
            &item("CN"),
            &atr_envelope(),
            &tariff(),
            Some(&AtrContext::default()),
            &ExemptCountries::default(),
        );
        assert_eq!(rates.source, RateSource::AtrFallback);
        assert_eq!(rates.customs, dec!(0.05));
        assert_eq!(rates.additional, dec!(0.03));
    }

    #[test]
    fn test_atr_context_ignored_without_atr_flag() {
        let rates = resolve_duty_rates(
            &item("TR"),
            &envelope(),
            &tariff(),
            Some(&atr_context(dec!(0.01))),
            &ExemptCountries::default(),
        );
        assert_eq!(rates.source, RateSource::Tariff);
        assert_eq!(rates.customs, dec!(0.05));
    }

    #[test]
    fn test_injected_exempt_set() {
        let exempt = ExemptCountries::new(["CN"]);
        let rates = resolve_duty_rates(
            &item("CN"),
            &atr_envelope(),
            &tariff(),
            Some(&AtrContext::default()),
            &exempt,
        );
        assert_eq!(rates.source, RateSource::AtrExempt);

        let rates = resolve_duty_rates(
            &item("TR"),
            &atr_envelope(),
            &tariff(),
            Some(&AtrContext::default()),
            &exempt,
        );
        assert_eq!(rates.source, RateSource::AtrFallback);
    }

    #[test]
    fn test_missing_origin_is_not_exempt() {
        let input = ItemInput {
            country_of_origin: None,
            ..item("TR")
        };
        let rates = resolve_duty_rates(
            &input,
            &atr_envelope(),
            &tariff(),
            Some(&atr_context(dec!(0.02))),
            &ExemptCountries::default(),
        );
        assert_eq!(rates.source, RateSource::AtrPreferential);
    }

    #[test]
    fn test_kkdf_excluded_views() {
        let taxes = compute_item_taxes(
            &item("CN"),
            &envelope(),
            &tariff(),
            None,
            &ExemptCountries::default(),
        )
        .unwrap();
        assert_eq!(taxes.vat_base_excluding_kkdf(), dec!(1185.60));
        assert_eq!(taxes.vat_excluding_kkdf(dec!(0.18)), dec!(213.408));
        assert_eq!(taxes.total_tax_usd_excluding_kkdf(), dec!(302.608));
    }

    #[test]
    fn test_overflowing_cascade_is_an_error() {
        let huge: Decimal = "50000000000000000000000000000".parse().unwrap();
        let env = InvoiceEnvelope {
            total_value: huge,
            ..envelope()
        };
        let input = ItemInput {
            total_value: huge,
            ..item("CN")
        };

        let err = compute_item_taxes(&input, &env, &tariff(), None, &ExemptCountries::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::Overflow(_)));
    }

    #[test]
    fn test_large_value_within_range() {
        let big = dec!(1000000000000);
        let env = InvoiceEnvelope {
            total_value: big,
            ..envelope()
        };
        let input = ItemInput {
            total_value: big,
            ..item("CN")
        };

        let taxes =
            compute_item_taxes(&input, &env, &tariff(), None, &ExemptCountries::default()).unwrap();
        assert_eq!(taxes.kkdf, dec!(20000000000));
        assert_eq!(taxes.transport_share, dec!(100));
    }
}
