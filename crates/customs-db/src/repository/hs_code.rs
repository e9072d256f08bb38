//! # HS Code Repository
//!
//! Tariff records keyed by Turkish HS code: the four rate fractions and the
//! import requirement flags.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::{push_code_list, read_decimal, write_decimal};
use crate::error::DbResult;
use customs_core::validation::{validate_hs_code, validate_rate};
use customs_core::HsCode;

const SELECT_HS_CODES: &str = r#"
    SELECT
        code,
        description_tr,
        unit,
        customs_tax_percent,
        additional_customs_tax_percent,
        kkdf_percent,
        vat_percent,
        ex_registry_form,
        azo_dye_test,
        special_custom
    FROM hs_codes
"#;

#[derive(Debug, sqlx::FromRow)]
struct HsCodeRow {
    code: String,
    description_tr: Option<String>,
    unit: Option<String>,
    customs_tax_percent: String,
    additional_customs_tax_percent: String,
    kkdf_percent: String,
    vat_percent: String,
    ex_registry_form: bool,
    azo_dye_test: bool,
    special_custom: bool,
}

impl From<HsCodeRow> for HsCode {
    fn from(row: HsCodeRow) -> Self {
        HsCode {
            code: row.code,
            description_tr: row.description_tr,
            unit: row.unit,
            customs_tax_percent: read_decimal(&row.customs_tax_percent),
            additional_customs_tax_percent: read_decimal(&row.additional_customs_tax_percent),
            kkdf_percent: read_decimal(&row.kkdf_percent),
            vat_percent: read_decimal(&row.vat_percent),
            ex_registry_form: row.ex_registry_form,
            azo_dye_test: row.azo_dye_test,
            special_custom: row.special_custom,
        }
    }
}

/// Repository for tariff records.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.hs_codes();
/// repo.upsert(&hs).await?;
/// let tariffs = repo.get_many(&["6109.10.00.00.00".to_string()]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HsCodeRepository {
    pool: SqlitePool,
}

impl HsCodeRepository {
    /// Creates a new HsCodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HsCodeRepository { pool }
    }

    /// Gets one tariff record by code.
    ///
    /// ## Returns
    /// * `Ok(Some(HsCode))` - Record found
    /// * `Ok(None)` - No tariff data for this code
    pub async fn get(&self, code: &str) -> DbResult<Option<HsCode>> {
        let row = sqlx::query_as::<_, HsCodeRow>(&format!("{SELECT_HS_CODES} WHERE code = ?1"))
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(HsCode::from))
    }

    /// Gets every tariff record whose code is in `codes`, in one query.
    ///
    /// Codes without a record are simply absent from the result.
    pub async fn get_many(&self, codes: &[String]) -> DbResult<Vec<HsCode>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = codes.len(), "Fetching tariff records");

        let mut query = QueryBuilder::<Sqlite>::new(SELECT_HS_CODES);
        query.push(" WHERE code");
        push_code_list(&mut query, codes);

        let rows = query
            .build_query_as::<HsCodeRow>()
            .fetch_all(&self.pool)
            .await?;

        debug!(found = rows.len(), "Tariff records fetched");
        Ok(rows.into_iter().map(HsCode::from).collect())
    }

    /// Inserts a tariff record or replaces the one with the same code.
    ///
    /// ## Returns
    /// * `Err(DbError::Invalid)` - Malformed code or a rate outside `[0, 1]`
    pub async fn upsert(&self, hs: &HsCode) -> DbResult<()> {
        validate_hs_code(&hs.code)?;
        validate_rate("customs_tax_percent", hs.customs_tax_percent)?;
        validate_rate(
            "additional_customs_tax_percent",
            hs.additional_customs_tax_percent,
        )?;
        validate_rate("kkdf_percent", hs.kkdf_percent)?;
        validate_rate("vat_percent", hs.vat_percent)?;

        debug!(code = %hs.code, "Upserting tariff record");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO hs_codes (
                code, description_tr, unit,
                customs_tax_percent, additional_customs_tax_percent,
                kkdf_percent, vat_percent,
                ex_registry_form, azo_dye_test, special_custom,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5,
                ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?11
            )
            ON CONFLICT(code) DO UPDATE SET
                description_tr = excluded.description_tr,
                unit = excluded.unit,
                customs_tax_percent = excluded.customs_tax_percent,
                additional_customs_tax_percent = excluded.additional_customs_tax_percent,
                kkdf_percent = excluded.kkdf_percent,
                vat_percent = excluded.vat_percent,
                ex_registry_form = excluded.ex_registry_form,
                azo_dye_test = excluded.azo_dye_test,
                special_custom = excluded.special_custom,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(hs.code.trim())
        .bind(&hs.description_tr)
        .bind(&hs.unit)
        .bind(write_decimal(hs.customs_tax_percent))
        .bind(write_decimal(hs.additional_customs_tax_percent))
        .bind(write_decimal(hs.kkdf_percent))
        .bind(write_decimal(hs.vat_percent))
        .bind(hs.ex_registry_form)
        .bind(hs.azo_dye_test)
        .bind(hs.special_custom)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts tariff records (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hs_codes")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::{Database, DbConfig};
    use customs_core::HsCode;
    use rust_decimal_macros::dec;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = db().await;
        let mut hs = HsCode::with_rates("6109.10.00.00.00", "0.12", "0.2", "0.06", "0.1");
        hs.description_tr = Some("Pamuklu tisort".to_string());
        hs.azo_dye_test = true;

        db.hs_codes().upsert(&hs).await.unwrap();

        let stored = db.hs_codes().get("6109.10.00.00.00").await.unwrap().unwrap();
        assert_eq!(stored, hs);
        assert_eq!(stored.vat_percent, dec!(0.1));
        assert!(db.hs_codes().get("6204.62.00.00.00").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_rates() {
        let db = db().await;
        let repo = db.hs_codes();
        repo.upsert(&HsCode::with_rates("6109.10", "0.12", "0.2", "0.06", "0.1"))
            .await
            .unwrap();
        repo.upsert(&HsCode::with_rates("6109.10", "0.08", "0.2", "0.06", "0.2"))
            .await
            .unwrap();

        let stored = repo.get("6109.10").await.unwrap().unwrap();
        assert_eq!(stored.customs_tax_percent, dec!(0.08));
        assert_eq!(stored.vat_percent, dec!(0.2));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_many_returns_only_known_codes() {
        let db = db().await;
        let repo = db.hs_codes();
        for code in ["6109.10", "6204.62", "6110.20"] {
            repo.upsert(&HsCode::with_rates(code, "0.12", "0.2", "0.06", "0.1"))
                .await
                .unwrap();
        }

        let codes = vec![
            "6109.10".to_string(),
            " 6204.62 ".to_string(),
            "9999.99".to_string(),
        ];
        let mut found: Vec<String> = repo
            .get_many(&codes)
            .await
            .unwrap()
            .into_iter()
            .map(|hs| hs.code)
            .collect();
        found.sort();

        assert_eq!(found, vec!["6109.10", "6204.62"]);
        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_percentages() {
        let db = db().await;
        let err = db
            .hs_codes()
            .upsert(&HsCode::with_rates("6109.10", "12", "0.2", "0.06", "0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_unparsable_cells_read_as_zero() {
        let db = db().await;
        db.hs_codes()
            .upsert(&HsCode::with_rates("6109.10", "0.12", "0.2", "0.06", "0.1"))
            .await
            .unwrap();
        sqlx::query("UPDATE hs_codes SET kkdf_percent = 'n/a', vat_percent = ''")
            .execute(db.pool())
            .await
            .unwrap();

        let stored = db.hs_codes().get("6109.10").await.unwrap().unwrap();
        assert_eq!(stored.kkdf_percent, dec!(0));
        assert_eq!(stored.vat_percent, dec!(0));
        assert_eq!(stored.customs_tax_percent, dec!(0.12));
    }
}
