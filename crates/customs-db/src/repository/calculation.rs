//! # Calculation Repository
//!
//! Database operations for tax calculations and their items.
//!
//! ## Calculation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Calculation Lifecycle                                │
//! │                                                                         │
//! │  1. create()              → status = draft                              │
//! │  2. add_item() × N        → item rows, computed columns NULL           │
//! │  3. save_item_taxes()     → all computed rows, ONE transaction          │
//! │  4. set_status(calculated)                                             │
//! │                                                                         │
//! │  Editing items later and recalculating repeats 3 and 4; the computed   │
//! │  columns are fully overwritten.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::{read_decimal, read_optional_decimal, write_decimal};
use crate::error::{DbError, DbResult};
use customs_core::money::line_total;
use customs_core::policy::normalize_country;
use customs_core::validation::{
    validate_amount, validate_country_code, validate_currency_rate, validate_hs_code,
    validate_unit_count,
};
use customs_core::{
    CalculationItem, CalculationStatus, Decimal, ItemTaxUpdate, ItemTaxes, TaxCalculation,
    ValidationError,
};

// =============================================================================
// Inputs
// =============================================================================

/// Invoice data for a new calculation.
#[derive(Debug, Clone, Default)]
pub struct NewCalculation {
    pub reference: String,
    pub invoice_no: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub total_value: Decimal,
    pub total_quantity: i64,
    pub transport_cost: Decimal,
    pub insurance_cost: Decimal,
    pub storage_cost: Decimal,
    pub currency_rate: Decimal,
    pub is_prepaid: bool,
    pub is_atr: bool,
}

impl NewCalculation {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.reference.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "reference".to_string(),
            });
        }
        validate_amount("total_value", self.total_value)?;
        validate_amount("transport_cost", self.transport_cost)?;
        validate_amount("insurance_cost", self.insurance_cost)?;
        validate_amount("storage_cost", self.storage_cost)?;
        validate_currency_rate(self.currency_rate)?;
        if self.total_quantity < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "total_quantity".to_string(),
            });
        }
        Ok(())
    }
}

/// One invoice line to add to a calculation.
///
/// `total_value` is derived as `cost × unit_count`.
#[derive(Debug, Clone, Default)]
pub struct NewCalculationItem {
    pub line_number: i64,
    pub style: Option<String>,
    pub description: Option<String>,
    pub hts_code: Option<String>,
    pub tr_hs_code: Option<String>,
    pub country_of_origin: Option<String>,
    pub cost: Decimal,
    pub unit_count: i64,
}

impl NewCalculationItem {
    // Code and origin may be blank while the invoice is being typed in; they
    // are only checked when present.
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(code) = non_blank(self.tr_hs_code.as_deref()) {
            validate_hs_code(code)?;
        }
        if let Some(country) = non_blank(self.country_of_origin.as_deref()) {
            validate_country_code(country)?;
        }
        validate_amount("cost", self.cost)?;
        validate_unit_count(self.unit_count)?;
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CalculationRow {
    id: String,
    reference: String,
    invoice_no: Option<String>,
    invoice_date: Option<NaiveDate>,
    total_value: String,
    total_quantity: i64,
    transport_cost: String,
    insurance_cost: String,
    storage_cost: String,
    currency_rate: String,
    is_prepaid: bool,
    is_atr: bool,
    status: CalculationStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CalculationRow> for TaxCalculation {
    fn from(row: CalculationRow) -> Self {
        TaxCalculation {
            id: row.id,
            reference: row.reference,
            invoice_no: row.invoice_no,
            invoice_date: row.invoice_date,
            total_value: read_decimal(&row.total_value),
            total_quantity: row.total_quantity,
            transport_cost: read_decimal(&row.transport_cost),
            insurance_cost: read_decimal(&row.insurance_cost),
            storage_cost: read_decimal(&row.storage_cost),
            currency_rate: read_decimal(&row.currency_rate),
            is_prepaid: row.is_prepaid,
            is_atr: row.is_atr,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    tax_calculation_id: String,
    line_number: i64,
    style: Option<String>,
    description: Option<String>,
    hts_code: Option<String>,
    tr_hs_code: Option<String>,
    country_of_origin: Option<String>,
    cost: String,
    unit_count: i64,
    total_value: String,
    transport_share: Option<String>,
    insurance_share: Option<String>,
    storage_share: Option<String>,
    cif_value: Option<String>,
    customs_tax: Option<String>,
    additional_customs_tax: Option<String>,
    kkdf: Option<String>,
    vat_base: Option<String>,
    vat: Option<String>,
    total_tax_usd: Option<String>,
    total_tax_tl: Option<String>,
    requirements: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    /// Computed columns are written together, so `cif_value` marks them all.
    fn taxes(&self) -> Option<ItemTaxes> {
        self.cif_value.as_ref()?;
        Some(ItemTaxes {
            transport_share: read_optional_decimal(self.transport_share.as_deref()),
            insurance_share: read_optional_decimal(self.insurance_share.as_deref()),
            storage_share: read_optional_decimal(self.storage_share.as_deref()),
            cif_value: read_optional_decimal(self.cif_value.as_deref()),
            customs_tax: read_optional_decimal(self.customs_tax.as_deref()),
            additional_customs_tax: read_optional_decimal(self.additional_customs_tax.as_deref()),
            kkdf: read_optional_decimal(self.kkdf.as_deref()),
            vat_base: read_optional_decimal(self.vat_base.as_deref()),
            vat: read_optional_decimal(self.vat.as_deref()),
            total_tax_usd: read_optional_decimal(self.total_tax_usd.as_deref()),
            total_tax_tl: read_optional_decimal(self.total_tax_tl.as_deref()),
        })
    }
}

impl From<ItemRow> for CalculationItem {
    fn from(row: ItemRow) -> Self {
        let taxes = row.taxes();
        CalculationItem {
            id: row.id,
            tax_calculation_id: row.tax_calculation_id,
            line_number: row.line_number,
            style: row.style,
            description: row.description,
            hts_code: row.hts_code,
            tr_hs_code: row.tr_hs_code,
            country_of_origin: row.country_of_origin,
            cost: read_decimal(&row.cost),
            unit_count: row.unit_count,
            total_value: read_decimal(&row.total_value),
            taxes,
            requirements: row.requirements,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_CALCULATION: &str = r#"
    SELECT
        id, reference, invoice_no, invoice_date,
        total_value, total_quantity,
        transport_cost, insurance_cost, storage_cost, currency_rate,
        is_prepaid, is_atr, status,
        created_at, updated_at
    FROM tax_calculations
    WHERE id = ?1
"#;

const SELECT_ITEMS: &str = r#"
    SELECT
        id, tax_calculation_id, line_number,
        style, description, hts_code, tr_hs_code, country_of_origin,
        cost, unit_count, total_value,
        transport_share, insurance_share, storage_share, cif_value,
        customs_tax, additional_customs_tax, kkdf,
        vat_base, vat, total_tax_usd, total_tax_tl,
        requirements,
        created_at, updated_at
    FROM tax_calculation_items
    WHERE tax_calculation_id = ?1
    ORDER BY line_number, created_at
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for calculations and their items.
#[derive(Debug, Clone)]
pub struct CalculationRepository {
    pool: SqlitePool,
}

impl CalculationRepository {
    /// Creates a new CalculationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CalculationRepository { pool }
    }

    /// Creates a new draft calculation.
    ///
    /// ## Returns
    /// * `Ok(TaxCalculation)` - The stored calculation with generated id
    /// * `Err(DbError::Invalid)` - Blank reference, negative costs, or a
    ///   non-positive currency rate
    /// * `Err(DbError::UniqueViolation)` - Reference already used
    pub async fn create(&self, new: &NewCalculation) -> DbResult<TaxCalculation> {
        new.validate()?;

        let now = Utc::now();
        let calculation = TaxCalculation {
            id: Uuid::new_v4().to_string(),
            reference: new.reference.trim().to_string(),
            invoice_no: new.invoice_no.clone(),
            invoice_date: new.invoice_date,
            total_value: new.total_value,
            total_quantity: new.total_quantity,
            transport_cost: new.transport_cost,
            insurance_cost: new.insurance_cost,
            storage_cost: new.storage_cost,
            currency_rate: new.currency_rate,
            is_prepaid: new.is_prepaid,
            is_atr: new.is_atr,
            status: CalculationStatus::Draft,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %calculation.id, reference = %calculation.reference, "Creating calculation");

        sqlx::query(
            r#"
            INSERT INTO tax_calculations (
                id, reference, invoice_no, invoice_date,
                total_value, total_quantity,
                transport_cost, insurance_cost, storage_cost, currency_rate,
                is_prepaid, is_atr, status,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13,
                ?14, ?15
            )
            "#,
        )
        .bind(&calculation.id)
        .bind(&calculation.reference)
        .bind(&calculation.invoice_no)
        .bind(calculation.invoice_date)
        .bind(write_decimal(calculation.total_value))
        .bind(calculation.total_quantity)
        .bind(write_decimal(calculation.transport_cost))
        .bind(write_decimal(calculation.insurance_cost))
        .bind(write_decimal(calculation.storage_cost))
        .bind(write_decimal(calculation.currency_rate))
        .bind(calculation.is_prepaid)
        .bind(calculation.is_atr)
        .bind(calculation.status)
        .bind(calculation.created_at)
        .bind(calculation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, calculation.reference.clone())
            }
            other => other,
        })?;

        Ok(calculation)
    }

    /// Gets a calculation by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(TaxCalculation))` - Calculation found
    /// * `Ok(None)` - Calculation not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TaxCalculation>> {
        let row = sqlx::query_as::<_, CalculationRow>(SELECT_CALCULATION)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TaxCalculation::from))
    }

    /// Sets the calculation status.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Calculation doesn't exist
    pub async fn set_status(&self, id: &str, status: CalculationStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating calculation status");

        let result = sqlx::query(
            r#"
            UPDATE tax_calculations
            SET status = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TaxCalculation", id));
        }

        Ok(())
    }

    /// Adds an item to a calculation.
    ///
    /// The HS code is stored trimmed and the origin trimmed and upper-cased.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - Calculation doesn't exist
    pub async fn add_item(
        &self,
        calculation_id: &str,
        new: &NewCalculationItem,
    ) -> DbResult<CalculationItem> {
        new.validate()?;
        let total_value =
            line_total(new.cost, new.unit_count).ok_or_else(|| ValidationError::OutOfRange {
                field: "total_value".to_string(),
            })?;

        let now = Utc::now();
        let item = CalculationItem {
            id: Uuid::new_v4().to_string(),
            tax_calculation_id: calculation_id.to_string(),
            line_number: new.line_number,
            style: new.style.clone(),
            description: new.description.clone(),
            hts_code: new.hts_code.clone(),
            tr_hs_code: non_blank(new.tr_hs_code.as_deref()).map(str::to_string),
            country_of_origin: non_blank(new.country_of_origin.as_deref()).map(normalize_country),
            cost: new.cost,
            unit_count: new.unit_count,
            total_value,
            taxes: None,
            requirements: None,
            created_at: now,
            updated_at: now,
        };

        debug!(
            calculation_id = %calculation_id,
            line = item.line_number,
            "Adding calculation item"
        );

        sqlx::query(
            r#"
            INSERT INTO tax_calculation_items (
                id, tax_calculation_id, line_number,
                style, description, hts_code, tr_hs_code, country_of_origin,
                cost, unit_count, total_value,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.tax_calculation_id)
        .bind(item.line_number)
        .bind(&item.style)
        .bind(&item.description)
        .bind(&item.hts_code)
        .bind(&item.tr_hs_code)
        .bind(&item.country_of_origin)
        .bind(write_decimal(item.cost))
        .bind(item.unit_count)
        .bind(write_decimal(item.total_value))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Gets all items of a calculation, ordered by line number.
    pub async fn get_items(&self, calculation_id: &str) -> DbResult<Vec<CalculationItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(SELECT_ITEMS)
            .bind(calculation_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CalculationItem::from).collect())
    }

    /// Writes the computed columns of many items in ONE transaction.
    ///
    /// Either every update lands or none does. An update naming an unknown
    /// item rolls the whole batch back.
    ///
    /// ## Returns
    /// Number of items written.
    pub async fn save_item_taxes(&self, updates: &[ItemTaxUpdate]) -> DbResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        debug!(count = updates.len(), "Saving computed item taxes");

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for update in updates {
            let taxes = &update.taxes;
            let result = sqlx::query(
                r#"
                UPDATE tax_calculation_items SET
                    transport_share = ?2,
                    insurance_share = ?3,
                    storage_share = ?4,
                    cif_value = ?5,
                    customs_tax = ?6,
                    additional_customs_tax = ?7,
                    kkdf = ?8,
                    vat_base = ?9,
                    vat = ?10,
                    total_tax_usd = ?11,
                    total_tax_tl = ?12,
                    requirements = ?13,
                    updated_at = ?14
                WHERE id = ?1
                "#,
            )
            .bind(&update.item_id)
            .bind(write_decimal(taxes.transport_share))
            .bind(write_decimal(taxes.insurance_share))
            .bind(write_decimal(taxes.storage_share))
            .bind(write_decimal(taxes.cif_value))
            .bind(write_decimal(taxes.customs_tax))
            .bind(write_decimal(taxes.additional_customs_tax))
            .bind(write_decimal(taxes.kkdf))
            .bind(write_decimal(taxes.vat_base))
            .bind(write_decimal(taxes.vat))
            .bind(write_decimal(taxes.total_tax_usd))
            .bind(write_decimal(taxes.total_tax_tl))
            .bind(&update.requirements)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping `tx` rolls back
                return Err(DbError::not_found("CalculationItem", &update.item_id));
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(updates.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
