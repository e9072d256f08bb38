//! # Missing A.TR Rate Precheck
//!
//! Finds A.TR-eligible items whose HS code has no preferential rate on file,
//! so the caller can ask for the missing rates before running a calculation
//! that would otherwise silently charge the full tariff rate.
//!
//! ## Flow
//! ```text
//! items ──► atr_candidates()          code → distinct non-exempt countries
//!              │
//!              ▼ codes()              one batch lookup of existing AtrRate rows
//!              │
//!              ▼ missing_rates()      codes without a row → (code, country) pairs
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::policy::{normalize_country, ExemptCountries};
use crate::types::CalculationItem;

/// One HS code / origin pair that needs a preferential rate entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MissingAtrRate {
    pub tr_hs_code: String,
    pub country_of_origin: String,
}

/// Precheck result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MissingAtrRates {
    pub has_missing_rates: bool,
    pub missing_hs_codes: Vec<MissingAtrRate>,
}

impl MissingAtrRates {
    /// The empty result (non-A.TR calculations, or nothing missing).
    pub fn none() -> Self {
        Self::default()
    }

    fn from_missing(missing_hs_codes: Vec<MissingAtrRate>) -> Self {
        MissingAtrRates {
            has_missing_rates: !missing_hs_codes.is_empty(),
            missing_hs_codes,
        }
    }
}

/// HS codes of A.TR-eligible items with the distinct origins seen for each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtrCandidates {
    // First-seen order for codes and for countries within a code.
    entries: Vec<(String, Vec<String>)>,
}

impl AtrCandidates {
    /// The codes to look up, in first-seen order.
    pub fn codes(&self) -> Vec<String> {
        self.entries.iter().map(|(code, _)| code.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every candidate whose code is not in `existing` becomes one pair per
    /// distinct country.
    pub fn missing_rates(&self, existing: &HashSet<String>) -> MissingAtrRates {
        let missing = self
            .entries
            .iter()
            .filter(|(code, _)| !existing.contains(code))
            .flat_map(|(code, countries)| {
                countries.iter().map(move |country| MissingAtrRate {
                    tr_hs_code: code.clone(),
                    country_of_origin: country.clone(),
                })
            })
            .collect();

        MissingAtrRates::from_missing(missing)
    }

    fn push(&mut self, code: &str, country: String) {
        match self.entries.iter_mut().find(|(c, _)| c == code) {
            Some((_, countries)) => {
                if !countries.contains(&country) {
                    countries.push(country);
                }
            }
            None => self.entries.push((code.to_string(), vec![country])),
        }
    }
}

/// Groups the non-exempt origin countries of every item that has both an
/// HS code and an origin.
pub fn atr_candidates(items: &[CalculationItem], exempt: &ExemptCountries) -> AtrCandidates {
    let mut candidates = AtrCandidates::default();

    for item in items {
        let (Some(code), Some(country)) = (item.hs_code(), item.origin()) else {
            continue;
        };
        if exempt.contains(country) {
            continue;
        }
        candidates.push(code, normalize_country(country));
    }

    candidates
}
