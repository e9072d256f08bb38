//! # Tax Calculator
//!
//! Orchestrates one calculation run and the missing A.TR rate precheck.
//!
//! ## Calculation Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    calculate(calculation_id)                            │
//! │                                                                         │
//! │  per-id lock ──► load calculation ──► not found? ──► CalculationNotFound│
//! │                        │                                                │
//! │                        ▼                                                │
//! │                  load items                                             │
//! │                        │                                                │
//! │                        ▼                                                │
//! │       distinct HS codes ──► ONE tariff lookup                           │
//! │                        │                                                │
//! │                        ├── is_atr ──► ONE preferential-rate lookup      │
//! │                        ▼                                                │
//! │       plan_calculation (pure, customs-core)                             │
//! │         each item ──► Computed { taxes, requirements }                  │
//! │                   └─► Skipped(MissingHsCode | UnknownHsCode)            │
//! │                        │                                                │
//! │                        ▼                                                │
//! │       ONE transaction writing every computed item                       │
//! │                        │                                                │
//! │                        ▼                                                │
//! │       status = calculated ──► CalculationReport                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure before the batch write leaves storage untouched. A failure of
//! the batch write itself persists nothing and leaves the status as it was.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use customs_core::plan::{distinct_hs_codes, index_tariffs, plan_calculation, tax_updates};
use customs_core::precheck::atr_candidates;
use customs_core::{
    AtrContext, CalculationItem, CalculationStatus, CalculationTotals, ExemptCountries,
    ItemOutcome, ItemResult, MissingAtrRates, RateSource, SkipReason, TaxCalculation,
};

use crate::error::{EngineError, EngineResult};
use crate::store::TaxStore;

// =============================================================================
// Report
// =============================================================================

/// What one calculation run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationReport {
    pub calculation_id: String,
    pub reference: String,
    /// Items written by this run.
    pub computed: usize,
    /// Items left with whatever they had before.
    pub skipped: usize,
    /// One outcome per item, in item order.
    pub outcomes: Vec<ItemOutcome>,
    /// Sums over the items computed by this run.
    pub totals: CalculationTotals,
}

// =============================================================================
// Calculator
// =============================================================================

/// Runs calculations against a [`TaxStore`].
///
/// ## Usage
/// ```rust,ignore
/// let calculator = TaxCalculator::new(db, config.exempt_countries());
///
/// let missing = calculator.check_missing_atr_rates(&id).await?;
/// if !missing.has_missing_rates {
///     let report = calculator.calculate(&id).await?;
/// }
/// ```
pub struct TaxCalculator<S> {
    store: S,
    exempt: ExemptCountries,
    // One lock per calculation id with a run in flight.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: TaxStore> TaxCalculator<S> {
    pub fn new(store: S, exempt: ExemptCountries) -> Self {
        TaxCalculator {
            store,
            exempt,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn exempt_countries(&self) -> &ExemptCountries {
        &self.exempt
    }

    /// Computes and persists the taxes of every eligible item.
    ///
    /// Idempotent: running it twice on unchanged data writes the same values.
    /// Concurrent runs for the same id are serialized.
    ///
    /// ## Returns
    /// * `Err(EngineError::CalculationNotFound)` - Unknown id
    /// * `Err(EngineError::Store)` - A read or the batch write failed
    pub async fn calculate(&self, calculation_id: &str) -> EngineResult<CalculationReport> {
        let lock = self.lock_for(calculation_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run(calculation_id).await
        };
        self.release(calculation_id, lock).await;
        result
    }

    /// Lists A.TR-eligible items whose HS code has no preferential rate.
    ///
    /// Non-A.TR calculations always give the empty result. Read-only.
    pub async fn check_missing_atr_rates(
        &self,
        calculation_id: &str,
    ) -> EngineResult<MissingAtrRates> {
        let calculation = self
            .store
            .get_calculation(calculation_id)
            .await?
            .ok_or_else(|| EngineError::CalculationNotFound(calculation_id.to_string()))?;

        if !calculation.is_atr {
            debug!(calculation_id = %calculation_id, "Not an A.TR calculation, nothing to check");
            return Ok(MissingAtrRates::none());
        }

        let items = self.store.get_calculation_items(calculation_id).await?;
        let candidates = atr_candidates(&items, &self.exempt);
        if candidates.is_empty() {
            return Ok(MissingAtrRates::none());
        }

        let existing: HashSet<String> = self
            .store
            .get_atr_rates(&candidates.codes())
            .await?
            .into_iter()
            .map(|rate| rate.tr_hs_code.trim().to_string())
            .collect();

        let result = candidates.missing_rates(&existing);
        info!(
            calculation_id = %calculation_id,
            missing = result.missing_hs_codes.len(),
            "A.TR precheck finished"
        );
        Ok(result)
    }

    async fn run(&self, calculation_id: &str) -> EngineResult<CalculationReport> {
        let calculation = self
            .store
            .get_calculation(calculation_id)
            .await?
            .ok_or_else(|| EngineError::CalculationNotFound(calculation_id.to_string()))?;

        info!(
            calculation_id = %calculation.id,
            reference = %calculation.reference,
            is_atr = calculation.is_atr,
            is_prepaid = calculation.is_prepaid,
            "Starting tax calculation"
        );

        let items = self.store.get_calculation_items(calculation_id).await?;
        let codes = distinct_hs_codes(&items);
        let tariffs = index_tariffs(self.store.get_hs_codes(&codes).await?);

        let atr = if calculation.is_atr {
            let rates = self.store.get_atr_rates(&codes).await?;
            Some(AtrContext::from_rates(rates))
        } else {
            None
        };

        debug!(
            items = items.len(),
            codes = codes.len(),
            tariffs = tariffs.len(),
            atr_rates = atr.as_ref().map_or(0, AtrContext::len),
            "Reference data loaded"
        );

        let outcomes =
            plan_calculation(&calculation, &items, &tariffs, atr.as_ref(), &self.exempt);
        log_outcomes(&items, &outcomes);

        let updates = tax_updates(&outcomes);
        self.store.save_item_taxes(&updates).await?;
        self.store
            .set_calculation_status(calculation_id, CalculationStatus::Calculated)
            .await?;

        let totals = totals_after_run(&calculation, &items, &outcomes);
        let report = CalculationReport {
            calculation_id: calculation.id,
            reference: calculation.reference,
            computed: updates.len(),
            skipped: outcomes.len() - updates.len(),
            totals,
            outcomes,
        };

        info!(
            calculation_id = %report.calculation_id,
            computed = report.computed,
            skipped = report.skipped,
            total_tax_usd = %report.totals.total_tax_usd,
            "Tax calculation finished"
        );
        Ok(report)
    }

    async fn lock_for(&self, calculation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(calculation_id.to_string()).or_default().clone()
    }

    async fn release(&self, calculation_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // The map and `lock` are the only holders: nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(calculation_id);
        }
    }
}

fn log_outcomes(items: &[CalculationItem], outcomes: &[ItemOutcome]) {
    for (item, outcome) in items.iter().zip(outcomes) {
        match &outcome.result {
            ItemResult::Skipped(SkipReason::ValueOutOfRange) => {
                warn!(
                    item_id = %item.id,
                    line = item.line_number,
                    total_value = %item.total_value,
                    "Item taxes overflow the decimal range, item skipped"
                );
            }
            ItemResult::Skipped(reason) => {
                debug!(item_id = %item.id, line = item.line_number, ?reason, "Item skipped");
            }
            ItemResult::Computed(computed) if computed.rates.source == RateSource::AtrFallback => {
                debug!(
                    item_id = %item.id,
                    tr_hs_code = item.hs_code().unwrap_or_default(),
                    "No preferential rate on file, tariff rate applied"
                );
            }
            ItemResult::Computed(_) => {}
        }
    }
}

/// Totals over this run's results; skipped items add no tax, whatever they
/// carried before.
fn totals_after_run(
    calculation: &TaxCalculation,
    items: &[CalculationItem],
    outcomes: &[ItemOutcome],
) -> CalculationTotals {
    let current: Vec<CalculationItem> = items
        .iter()
        .zip(outcomes)
        .map(|(item, outcome)| CalculationItem {
            taxes: outcome.computed().map(|c| c.taxes),
            requirements: outcome.computed().and_then(|c| c.requirements.clone()),
            ..item.clone()
        })
        .collect();
    CalculationTotals::for_calculation(calculation, &current)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use customs_core::{AtrRate, HsCode, ItemTaxUpdate};
    use customs_db::{Database, DbConfig, DbError, NewCalculation, NewCalculationItem};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KNIT: &str = "6109.10.00.00.00";
    const DENIM: &str = "6204.62.31.00.00";

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    async fn database() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut knit = HsCode::with_rates(KNIT, "0.05", "0.03", "0.02", "0.18");
        knit.azo_dye_test = true;
        db.hs_codes().upsert(&knit).await.unwrap();

        let mut denim = HsCode::with_rates(DENIM, "0.12", "0.3", "0.06", "0.1");
        denim.ex_registry_form = true;
        denim.special_custom = true;
        db.hs_codes().upsert(&denim).await.unwrap();

        db
    }

    fn envelope(is_prepaid: bool, is_atr: bool) -> NewCalculation {
        NewCalculation {
            reference: format!("IMP-{}", uuid::Uuid::new_v4()),
            invoice_no: None,
            invoice_date: None,
            total_value: dec!(2000),
            total_quantity: 200,
            transport_cost: dec!(100),
            insurance_cost: dec!(40),
            storage_cost: dec!(60),
            currency_rate: dec!(32.5),
            is_prepaid,
            is_atr,
        }
    }

    fn line(n: i64, code: Option<&str>, country: &str) -> NewCalculationItem {
        NewCalculationItem {
            line_number: n,
            style: Some(format!("ST-{n}")),
            description: None,
            hts_code: None,
            tr_hs_code: code.map(str::to_string),
            country_of_origin: Some(country.to_string()),
            cost: dec!(10),
            unit_count: 100,
        }
    }

    async fn calculation(
        db: &Database,
        new: NewCalculation,
        lines: &[NewCalculationItem],
    ) -> TaxCalculation {
        let calc = db.calculations().create(&new).await.unwrap();
        for l in lines {
            db.calculations().add_item(&calc.id, l).await.unwrap();
        }
        calc
    }

    fn calculator(db: &Database) -> TaxCalculator<Database> {
        TaxCalculator::new(db.clone(), ExemptCountries::default())
    }

    /// Counts store calls; optionally fails the batch write.
    struct CountingStore {
        db: Database,
        hs_lookups: AtomicUsize,
        atr_lookups: AtomicUsize,
        saves: AtomicUsize,
        fail_save: bool,
    }

    impl CountingStore {
        fn new(db: &Database, fail_save: bool) -> Self {
            CountingStore {
                db: db.clone(),
                hs_lookups: AtomicUsize::new(0),
                atr_lookups: AtomicUsize::new(0),
                saves: AtomicUsize::new(0),
                fail_save,
            }
        }
    }

    impl TaxStore for CountingStore {
        async fn get_hs_codes(&self, codes: &[String]) -> EngineResult<Vec<HsCode>> {
            self.hs_lookups.fetch_add(1, Ordering::SeqCst);
            self.db.get_hs_codes(codes).await
        }

        async fn get_atr_rates(&self, codes: &[String]) -> EngineResult<Vec<AtrRate>> {
            self.atr_lookups.fetch_add(1, Ordering::SeqCst);
            self.db.get_atr_rates(codes).await
        }

        async fn get_calculation(&self, id: &str) -> EngineResult<Option<TaxCalculation>> {
            self.db.get_calculation(id).await
        }

        async fn set_calculation_status(
            &self,
            id: &str,
            status: CalculationStatus,
        ) -> EngineResult<()> {
            self.db.set_calculation_status(id, status).await
        }

        async fn get_calculation_items(&self, id: &str) -> EngineResult<Vec<CalculationItem>> {
            self.db.get_calculation_items(id).await
        }

        async fn save_item_taxes(&self, updates: &[ItemTaxUpdate]) -> EngineResult<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail_save {
                return Err(DbError::TransactionFailed("disk full".to_string()).into());
            }
            self.db.save_item_taxes(updates).await
        }
    }

    // -------------------------------------------------------------------------
    // calculate
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_calculates_and_persists_invoice() {
        let db = database().await;
        let calc = calculation(
            &db,
            envelope(false, false),
            &[line(1, Some(KNIT), "CN"), line(2, None, "CN")],
        )
        .await;

        let report = calculator(&db).calculate(&calc.id).await.unwrap();
        assert_eq!(report.computed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcomes[1].skip_reason(), Some(&SkipReason::MissingHsCode));

        let items = db.calculations().get_items(&calc.id).await.unwrap();
        let taxes = items[0].taxes.unwrap();
        assert_eq!(taxes.transport_share, dec!(50));
        assert_eq!(taxes.insurance_share, dec!(20));
        assert_eq!(taxes.storage_share, dec!(30));
        assert_eq!(taxes.cif_value, dec!(1070));
        assert_eq!(taxes.customs_tax, dec!(53.5));
        assert_eq!(taxes.additional_customs_tax, dec!(32.1));
        assert_eq!(taxes.kkdf, dec!(20));
        assert_eq!(taxes.vat_base, dec!(1205.6));
        assert_eq!(taxes.vat, dec!(217.008));
        assert_eq!(taxes.total_tax_usd, dec!(322.608));
        assert_eq!(taxes.total_tax_tl, dec!(10484.76));
        assert_eq!(items[0].requirements.as_deref(), Some("AZO DYE TEST"));
        assert!(items[1].taxes.is_none());

        let stored = db.calculations().get_by_id(&calc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CalculationStatus::Calculated);

        assert_eq!(report.totals.total_tax_usd, dec!(322.608));
        assert_eq!(report.totals.total_value, dec!(2000));
    }

    #[tokio::test]
    async fn test_unknown_calculation() {
        let db = database().await;
        let err = calculator(&db).calculate("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::CalculationNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_recalculation_is_idempotent() {
        let db = database().await;
        let calc = calculation(
            &db,
            envelope(false, true),
            &[line(1, Some(KNIT), "CN"), line(2, Some(DENIM), "IT")],
        )
        .await;
        let calculator = calculator(&db);

        let first = calculator.calculate(&calc.id).await.unwrap();
        let after_first: Vec<_> = db
            .calculations()
            .get_items(&calc.id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| (i.taxes, i.requirements))
            .collect();

        let second = calculator.calculate(&calc.id).await.unwrap();
        let after_second: Vec<_> = db
            .calculations()
            .get_items(&calc.id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| (i.taxes, i.requirements))
            .collect();

        assert_eq!(first, second);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_recalculation_overwrites_after_tariff_change() {
        let db = database().await;
        let calc = calculation(&db, envelope(false, false), &[line(1, Some(KNIT), "CN")]).await;
        let calculator = calculator(&db);
        calculator.calculate(&calc.id).await.unwrap();

        db.hs_codes()
            .upsert(&HsCode::with_rates(KNIT, "0.1", "0", "0", "0.2"))
            .await
            .unwrap();
        calculator.calculate(&calc.id).await.unwrap();

        let items = db.calculations().get_items(&calc.id).await.unwrap();
        let taxes = items[0].taxes.unwrap();
        assert_eq!(taxes.customs_tax, dec!(107));
        assert_eq!(taxes.additional_customs_tax, dec!(0));
        assert_eq!(taxes.kkdf, dec!(0));
        assert_eq!(items[0].requirements, None);
    }

    #[tokio::test]
    async fn test_prepaid_has_no_kkdf() {
        let db = database().await;
        let calc = calculation(&db, envelope(true, false), &[line(1, Some(KNIT), "CN")]).await;
        calculator(&db).calculate(&calc.id).await.unwrap();

        let taxes = db.calculations().get_items(&calc.id).await.unwrap()[0]
            .taxes
            .unwrap();
        assert_eq!(taxes.kkdf, dec!(0));
        assert_eq!(
            taxes.vat_base,
            taxes.cif_value + taxes.storage_share + taxes.customs_tax + taxes.additional_customs_tax
        );
    }

    #[tokio::test]
    async fn test_atr_rate_resolution_per_origin() {
        let db = database().await;
        db.atr_rates()
            .upsert(&AtrRate {
                tr_hs_code: KNIT.to_string(),
                customs_tax_percent: dec!(0.01),
            })
            .await
            .unwrap();
        let calc = calculation(
            &db,
            envelope(false, true),
            &[
                line(1, Some(KNIT), "TR"),
                line(2, Some(KNIT), "CN"),
                line(3, Some(DENIM), "VN"),
            ],
        )
        .await;

        let report = calculator(&db).calculate(&calc.id).await.unwrap();
        let sources: Vec<RateSource> = report
            .outcomes
            .iter()
            .map(|o| o.computed().unwrap().rates.source)
            .collect();
        assert_eq!(
            sources,
            vec![
                RateSource::AtrExempt,
                RateSource::AtrPreferential,
                RateSource::AtrFallback
            ]
        );

        let items = db.calculations().get_items(&calc.id).await.unwrap();
        let exempt = items[0].taxes.unwrap();
        assert_eq!(exempt.customs_tax, dec!(0));
        assert_eq!(exempt.additional_customs_tax, dec!(0));

        // CIF is 1070 for every 1000-value line of this invoice.
        let preferential = items[1].taxes.unwrap();
        assert_eq!(preferential.customs_tax, dec!(10.7));
        assert_eq!(preferential.additional_customs_tax, dec!(32.1));

        let fallback = items[2].taxes.unwrap();
        assert_eq!(fallback.customs_tax, dec!(128.4));
        assert_eq!(fallback.additional_customs_tax, dec!(321));
    }

    #[tokio::test]
    async fn test_injected_exempt_set() {
        let db = database().await;
        let calc = calculation(&db, envelope(false, true), &[line(1, Some(KNIT), "CN")]).await;

        let calculator = TaxCalculator::new(db.clone(), ExemptCountries::new(["CN"]));
        let report = calculator.calculate(&calc.id).await.unwrap();

        assert_eq!(
            report.outcomes[0].computed().unwrap().rates.source,
            RateSource::AtrExempt
        );
    }

    #[tokio::test]
    async fn test_unknown_code_keeps_stale_values() {
        let db = database().await;
        let calc = calculation(&db, envelope(false, false), &[line(1, Some(KNIT), "CN")]).await;
        let calculator = calculator(&db);
        calculator.calculate(&calc.id).await.unwrap();
        let before = db.calculations().get_items(&calc.id).await.unwrap()[0].taxes;

        sqlx::query("UPDATE tax_calculation_items SET tr_hs_code = '9999.99'")
            .execute(db.pool())
            .await
            .unwrap();
        let report = calculator.calculate(&calc.id).await.unwrap();

        assert_eq!(
            report.outcomes[0].skip_reason(),
            Some(&SkipReason::UnknownHsCode("9999.99".to_string()))
        );
        assert_eq!(report.totals.total_tax_usd, dec!(0));
        let after = db.calculations().get_items(&calc.id).await.unwrap()[0].taxes;
        assert_eq!(before, after);
        assert!(after.is_some());
    }

    #[tokio::test]
    async fn test_overflowing_item_is_skipped_not_fatal() {
        let db = database().await;
        let huge: customs_core::Decimal = "70000000000000000000000000000".parse().unwrap();
        let calc = calculation(
            &db,
            NewCalculation {
                total_value: huge,
                ..envelope(false, false)
            },
            &[
                NewCalculationItem {
                    cost: huge,
                    unit_count: 1,
                    ..line(1, Some(KNIT), "CN")
                },
                line(2, Some(KNIT), "CN"),
            ],
        )
        .await;

        let report = calculator(&db).calculate(&calc.id).await.unwrap();
        assert_eq!(report.outcomes[0].skip_reason(), Some(&SkipReason::ValueOutOfRange));
        assert_eq!(report.computed, 1);
        assert_eq!(report.skipped, 1);

        let items = db.calculations().get_items(&calc.id).await.unwrap();
        assert!(items[0].taxes.is_none());
        assert!(items[1].taxes.is_some());
    }

    #[tokio::test]
    async fn test_reference_data_is_fetched_in_batch() {
        let db = database().await;
        let calc = calculation(
            &db,
            envelope(false, true),
            &[
                line(1, Some(KNIT), "CN"),
                line(2, Some(DENIM), "CN"),
                line(3, Some(KNIT), "VN"),
                line(4, Some(DENIM), "BD"),
            ],
        )
        .await;

        let calculator =
            TaxCalculator::new(CountingStore::new(&db, false), ExemptCountries::default());
        calculator.calculate(&calc.id).await.unwrap();

        let store = calculator.store();
        assert_eq!(store.hs_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(store.atr_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_atr_lookup_without_atr_flag() {
        let db = database().await;
        let calc = calculation(&db, envelope(false, false), &[line(1, Some(KNIT), "CN")]).await;

        let calculator =
            TaxCalculator::new(CountingStore::new(&db, false), ExemptCountries::default());
        calculator.calculate(&calc.id).await.unwrap();

        assert_eq!(calculator.store().atr_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_status_unchanged() {
        let db = database().await;
        let calc = calculation(&db, envelope(false, false), &[line(1, Some(KNIT), "CN")]).await;

        let calculator =
            TaxCalculator::new(CountingStore::new(&db, true), ExemptCountries::default());
        let err = calculator.calculate(&calc.id).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));

        let stored = db.calculations().get_by_id(&calc.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CalculationStatus::Draft);
        assert!(db.calculations().get_items(&calc.id).await.unwrap()[0]
            .taxes
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_runs_for_same_calculation() {
        let db = database().await;
        let calc = calculation(
            &db,
            envelope(false, false),
            &[line(1, Some(KNIT), "CN"), line(2, Some(DENIM), "CN")],
        )
        .await;
        let calculator = calculator(&db);

        let (a, b) = tokio::join!(calculator.calculate(&calc.id), calculator.calculate(&calc.id));
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(calculator.locks.lock().await.is_empty());
    }

    // -------------------------------------------------------------------------
    // check_missing_atr_rates
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_precheck_reports_code_without_rate() {
        let db = database().await;
        let calc = calculation(&db, envelope(false, true), &[line(1, Some(KNIT), "CN")]).await;

        let result = calculator(&db).check_missing_atr_rates(&calc.id).await.unwrap();
        assert!(result.has_missing_rates);
        assert_eq!(result.missing_hs_codes.len(), 1);
        assert_eq!(result.missing_hs_codes[0].tr_hs_code, KNIT);
        assert_eq!(result.missing_hs_codes[0].country_of_origin, "CN");
    }

    #[tokio::test]
    async fn test_precheck_ignores_exempt_and_covered_items() {
        let db = database().await;
        db.atr_rates()
            .upsert(&AtrRate {
                tr_hs_code: DENIM.to_string(),
                customs_tax_percent: dec!(0.05),
            })
            .await
            .unwrap();
        let calc = calculation(
            &db,
            envelope(false, true),
            &[
                line(1, Some(KNIT), "IT"),
                line(2, Some(DENIM), "CN"),
                line(3, None, "CN"),
            ],
        )
        .await;

        let result = calculator(&db).check_missing_atr_rates(&calc.id).await.unwrap();
        assert_eq!(result, MissingAtrRates::none());
    }

    #[tokio::test]
    async fn test_precheck_groups_countries_per_code() {
        let db = database().await;
        let calc = calculation(
            &db,
            envelope(false, true),
            &[
                line(1, Some(KNIT), "CN"),
                line(2, Some(KNIT), "VN"),
                line(3, Some(KNIT), "cn"),
                line(4, Some(DENIM), "BD"),
            ],
        )
        .await;

        let result = calculator(&db).check_missing_atr_rates(&calc.id).await.unwrap();
        let pairs: Vec<(&str, &str)> = result
            .missing_hs_codes
            .iter()
            .map(|m| (m.tr_hs_code.as_str(), m.country_of_origin.as_str()))
            .collect();
        assert_eq!(pairs, vec![(KNIT, "CN"), (KNIT, "VN"), (DENIM, "BD")]);
    }

    #[tokio::test]
    async fn test_precheck_non_atr_is_empty() {
        let db = database().await;
        let calc = calculation(&db, envelope(false, false), &[line(1, Some(KNIT), "CN")]).await;

        let result = calculator(&db).check_missing_atr_rates(&calc.id).await.unwrap();
        assert!(!result.has_missing_rates);
        assert!(result.missing_hs_codes.is_empty());
    }

    #[tokio::test]
    async fn test_precheck_unknown_calculation() {
        let db = database().await;
        let err = calculator(&db)
            .check_missing_atr_rates("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CalculationNotFound(_)));
    }
}
