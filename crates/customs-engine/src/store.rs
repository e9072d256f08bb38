//! # Tax Store
//!
//! The persistence seam of the engine. [`TaxCalculator`](crate::TaxCalculator)
//! only talks to a [`TaxStore`]; the SQLite [`Database`] is the production
//! implementation.
//!
//! ## Call Pattern of One Run
//! ```text
//! get_calculation(id)           1 read
//! get_calculation_items(id)     1 read
//! get_hs_codes(codes)           1 batch read  (all distinct codes)
//! get_atr_rates(codes)          1 batch read  (A.TR calculations only)
//! save_item_taxes(updates)      1 transaction (all computed items)
//! set_calculation_status(id)    1 write
//! ```

use customs_core::{
    AtrRate, CalculationItem, CalculationStatus, HsCode, ItemTaxUpdate, TaxCalculation,
};
use customs_db::Database;

use crate::error::EngineResult;

/// Storage operations a calculation run needs.
///
/// Batch methods take the full code set and must answer with a single
/// lookup; codes with no record are left out of the result.
#[allow(async_fn_in_trait)]
pub trait TaxStore {
    /// Tariff records for every known code in `codes`.
    async fn get_hs_codes(&self, codes: &[String]) -> EngineResult<Vec<HsCode>>;

    /// Preferential rates for every code in `codes` that has one.
    async fn get_atr_rates(&self, codes: &[String]) -> EngineResult<Vec<AtrRate>>;

    async fn get_calculation(&self, id: &str) -> EngineResult<Option<TaxCalculation>>;

    async fn set_calculation_status(&self, id: &str, status: CalculationStatus)
        -> EngineResult<()>;

    async fn get_calculation_items(&self, id: &str) -> EngineResult<Vec<CalculationItem>>;

    /// Writes all updates atomically.
    async fn save_item_taxes(&self, updates: &[ItemTaxUpdate]) -> EngineResult<()>;
}

impl TaxStore for Database {
    async fn get_hs_codes(&self, codes: &[String]) -> EngineResult<Vec<HsCode>> {
        Ok(self.hs_codes().get_many(codes).await?)
    }

    async fn get_atr_rates(&self, codes: &[String]) -> EngineResult<Vec<AtrRate>> {
        Ok(self.atr_rates().get_many(codes).await?)
    }

    async fn get_calculation(&self, id: &str) -> EngineResult<Option<TaxCalculation>> {
        Ok(self.calculations().get_by_id(id).await?)
    }

    async fn set_calculation_status(
        &self,
        id: &str,
        status: CalculationStatus,
    ) -> EngineResult<()> {
        Ok(self.calculations().set_status(id, status).await?)
    }

    async fn get_calculation_items(&self, id: &str) -> EngineResult<Vec<CalculationItem>> {
        Ok(self.calculations().get_items(id).await?)
    }

    async fn save_item_taxes(&self, updates: &[ItemTaxUpdate]) -> EngineResult<()> {
        self.calculations().save_item_taxes(updates).await?;
        Ok(())
    }
}
