//! # Origin-Country Policy
//!
//! Static domain tables keyed by origin country, injected rather than global
//! so tests and deployments can swap them.
//!
//! - [`ExemptCountries`] - A.TR origins whose duties drop to zero
//! - [`CountryCodeMap`] - ISO alpha-2 → 3-digit customs declaration code

use std::collections::{BTreeSet, HashMap};

use crate::error::{CoreError, CoreResult};
use crate::DEFAULT_EXEMPT_COUNTRIES;

/// Canonical form used for every country comparison.
pub fn normalize_country(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// =============================================================================
// Exempt Countries
// =============================================================================

/// Origin countries for which an A.TR certificate zeroes *both* the standard
/// and the additional customs duty, instead of substituting a preferential
/// rate.
///
/// ```rust
/// use customs_core::policy::ExemptCountries;
///
/// let exempt = ExemptCountries::default();
/// assert!(exempt.contains("TR"));
/// assert!(exempt.contains(" it "));
/// assert!(!exempt.contains("CN"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptCountries {
    codes: BTreeSet<String>,
}

impl ExemptCountries {
    /// Builds a policy set from any list of country codes.
    ///
    /// Blank entries are dropped.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = codes
            .into_iter()
            .map(|c| normalize_country(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        ExemptCountries { codes }
    }

    /// Returns true if `country` is exempt.
    pub fn contains(&self, country: &str) -> bool {
        self.codes.contains(&normalize_country(country))
    }

    /// Iterates the codes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for ExemptCountries {
    fn default() -> Self {
        ExemptCountries::new(DEFAULT_EXEMPT_COUNTRIES)
    }
}

// =============================================================================
// Customs Country Codes
// =============================================================================

/// Default alpha-2 → 3-digit mapping used on import declarations.
const DEFAULT_COUNTRY_CODES: &[(&str, &str)] = &[
    ("CN", "720"),
    ("ID", "700"),
    ("KH", "696"),
    ("VN", "690"),
    ("US", "400"),
    ("TW", "736"),
    ("IT", "005"),
    ("RO", "066"),
    ("JO", "628"),
    ("NI", "432"),
    ("AQ", "891"),
    ("TH", "680"),
    ("LK", "669"),
    ("AL", "070"),
    ("SG", "706"),
    ("GT", "416"),
    ("CO", "480"),
    ("CM", "302"),
    ("PH", "708"),
    ("TR", "052"),
    ("CA", "404"),
    ("SV", "428"),
    ("HK", "740"),
];

/// Maps an origin country to the numeric code the customs declaration wants.
///
/// Per-deployment overrides are merged on top of the default table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCodeMap {
    codes: HashMap<String, String>,
}

impl CountryCodeMap {
    /// Returns the default table with `overrides` merged on top.
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut map = CountryCodeMap::default();
        for (country, code) in overrides {
            map.codes
                .insert(normalize_country(country), code.trim().to_string());
        }
        map
    }

    /// Looks up the declaration code for an origin country.
    pub fn customs_code(&self, country: &str) -> Option<&str> {
        self.codes
            .get(&normalize_country(country))
            .map(String::as_str)
    }

    /// Like [`customs_code`](Self::customs_code) but failing on unknown origins.
    pub fn require_customs_code(&self, country: &str) -> CoreResult<&str> {
        self.customs_code(country)
            .ok_or_else(|| CoreError::UnknownCountryCode(normalize_country(country)))
    }
}

impl Default for CountryCodeMap {
    fn default() -> Self {
        let codes = DEFAULT_COUNTRY_CODES
            .iter()
            .map(|(country, code)| (country.to_string(), code.to_string()))
            .collect();
        CountryCodeMap { codes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exempt_set() {
        let exempt = ExemptCountries::default();
        assert_eq!(exempt.len(), 5);
        for code in ["IT", "TR", "PT", "TN", "BA"] {
            assert!(exempt.contains(code), "{code} should be exempt");
        }
        assert!(!exempt.contains("CN"));
        assert!(!exempt.contains(""));
    }

    #[test]
    fn test_injected_exempt_set() {
        let exempt = ExemptCountries::new(["de", " fr ", ""]);
        assert_eq!(exempt.iter().collect::<Vec<_>>(), vec!["DE", "FR"]);
        assert!(exempt.contains("DE"));
        assert!(!exempt.contains("TR"));
    }

    #[test]
    fn test_country_code_lookup() {
        let map = CountryCodeMap::default();
        assert_eq!(map.customs_code("cn"), Some("720"));
        assert_eq!(map.customs_code("IT"), Some("005"));
        assert_eq!(map.customs_code("ZZ"), None);
        assert!(matches!(
            map.require_customs_code("zz"),
            Err(CoreError::UnknownCountryCode(c)) if c == "ZZ"
        ));
    }

    #[test]
    fn test_country_code_overrides() {
        let overrides: HashMap<String, String> = [
            ("bd".to_string(), "666".to_string()),
            ("CN".to_string(), "721".to_string()),
        ]
        .into_iter()
        .collect();

        let map = CountryCodeMap::with_overrides(&overrides);
        assert_eq!(map.customs_code("BD"), Some("666"));
        assert_eq!(map.customs_code("CN"), Some("721"));
        assert_eq!(map.customs_code("VN"), Some("690"));
    }
}
