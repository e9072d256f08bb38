//! # Calculation Planning
//!
//! Runs the tax cascade over every item of one calculation, given tariff and
//! A.TR data that were already fetched in batch.
//!
//! Items that cannot be calculated are not errors. They come back as
//! [`ItemResult::Skipped`] with a reason, and the caller leaves their stored
//! fields untouched.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::policy::ExemptCountries;
use crate::tax::{apply_cascade, resolve_duty_rates, AtrContext, DutyRates, ItemTaxes};
use crate::types::{CalculationItem, HsCode, TaxCalculation};

/// Why an item was left out of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "tr_hs_code", rename_all = "snake_case")]
pub enum SkipReason {
    /// The item has no Turkish HS code.
    MissingHsCode,
    /// The code has no tariff record.
    UnknownHsCode(String),
    /// A value of the cascade does not fit in a decimal.
    ValueOutOfRange,
}

/// A successfully calculated item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedItem {
    pub taxes: ItemTaxes,
    pub requirements: Option<String>,
    pub rates: DutyRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Computed(ComputedItem),
    Skipped(SkipReason),
}

/// Outcome for one item of the calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub result: ItemResult,
}

impl ItemOutcome {
    pub fn computed(&self) -> Option<&ComputedItem> {
        match &self.result {
            ItemResult::Computed(c) => Some(c),
            ItemResult::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.result {
            ItemResult::Computed(_) => None,
            ItemResult::Skipped(r) => Some(r),
        }
    }
}

/// One computed item as it is written back to storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTaxUpdate {
    pub item_id: String,
    pub taxes: ItemTaxes,
    pub requirements: Option<String>,
}

/// The writes for every computed outcome; skipped items produce none.
pub fn tax_updates(outcomes: &[ItemOutcome]) -> Vec<ItemTaxUpdate> {
    outcomes
        .iter()
        .filter_map(|outcome| {
            outcome.computed().map(|computed| ItemTaxUpdate {
                item_id: outcome.item_id.clone(),
                taxes: computed.taxes,
                requirements: computed.requirements.clone(),
            })
        })
        .collect()
}

/// Distinct tariff codes referenced by the items, in first-seen order.
pub fn distinct_hs_codes(items: &[CalculationItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(CalculationItem::hs_code)
        .filter(|code| seen.insert(*code))
        .map(str::to_string)
        .collect()
}

/// Indexes tariff records by their trimmed code.
pub fn index_tariffs<I>(records: I) -> HashMap<String, HsCode>
where
    I: IntoIterator<Item = HsCode>,
{
    records
        .into_iter()
        .map(|hs| (hs.code.trim().to_string(), hs))
        .collect()
}

/// Computes every eligible item of `calculation`.
///
/// `atr` should be `Some` only for A.TR-flagged calculations; it is ignored
/// otherwise.
pub fn plan_calculation(
    calculation: &TaxCalculation,
    items: &[CalculationItem],
    tariffs: &HashMap<String, HsCode>,
    atr: Option<&AtrContext>,
    exempt: &ExemptCountries,
) -> Vec<ItemOutcome> {
    let envelope = calculation.envelope();

    items
        .iter()
        .map(|item| {
            let result = match item.tax_input() {
                None => ItemResult::Skipped(SkipReason::MissingHsCode),
                Some(input) => match tariffs.get(input.tr_hs_code) {
                    None => ItemResult::Skipped(SkipReason::UnknownHsCode(
                        input.tr_hs_code.to_string(),
                    )),
                    Some(tariff) => {
                        let rates = resolve_duty_rates(&input, &envelope, tariff, atr, exempt);
                        match apply_cascade(input.total_value, &envelope, tariff, rates) {
                            Ok(taxes) => ItemResult::Computed(ComputedItem {
                                taxes,
                                requirements: tariff.requirements(),
                                rates,
                            }),
                            Err(_) => ItemResult::Skipped(SkipReason::ValueOutOfRange),
                        }
                    }
                },
            };

            ItemOutcome {
                item_id: item.id.clone(),
                result,
            }
        })
        .collect()
}
