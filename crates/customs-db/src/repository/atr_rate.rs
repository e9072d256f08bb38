//! # A.TR Rate Repository
//!
//! Preferential customs rates applied to A.TR shipments from origins that
//! are not fully exempt.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::{push_code_list, read_decimal, write_decimal};
use crate::error::{DbError, DbResult};
use customs_core::validation::{validate_hs_code, validate_rate};
use customs_core::AtrRate;

#[derive(Debug, sqlx::FromRow)]
struct AtrRateRow {
    tr_hs_code: String,
    customs_tax_percent: String,
}

impl From<AtrRateRow> for AtrRate {
    fn from(row: AtrRateRow) -> Self {
        AtrRate {
            tr_hs_code: row.tr_hs_code,
            customs_tax_percent: read_decimal(&row.customs_tax_percent),
        }
    }
}

/// Repository for preferential-origin rates.
#[derive(Debug, Clone)]
pub struct AtrRateRepository {
    pool: SqlitePool,
}

impl AtrRateRepository {
    /// Creates a new AtrRateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AtrRateRepository { pool }
    }

    /// Gets the preferential rates for every code in `codes`, in one query.
    pub async fn get_many(&self, codes: &[String]) -> DbResult<Vec<AtrRate>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = codes.len(), "Fetching A.TR rates");

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT tr_hs_code, customs_tax_percent FROM atr_rates WHERE tr_hs_code",
        );
        push_code_list(&mut query, codes);

        let rows = query
            .build_query_as::<AtrRateRow>()
            .fetch_all(&self.pool)
            .await?;

        debug!(found = rows.len(), "A.TR rates fetched");
        Ok(rows.into_iter().map(AtrRate::from).collect())
    }

    /// Inserts a preferential rate or replaces the one for the same code.
    pub async fn upsert(&self, rate: &AtrRate) -> DbResult<()> {
        validate_hs_code(&rate.tr_hs_code)?;
        validate_rate("customs_tax_percent", rate.customs_tax_percent)?;

        debug!(code = %rate.tr_hs_code, "Upserting A.TR rate");

        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO atr_rates (tr_hs_code, customs_tax_percent, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(tr_hs_code) DO UPDATE SET
                customs_tax_percent = excluded.customs_tax_percent,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(rate.tr_hs_code.trim())
        .bind(write_decimal(rate.customs_tax_percent))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes the preferential rate for a code.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No rate on file for the code
    pub async fn delete(&self, tr_hs_code: &str) -> DbResult<()> {
        debug!(code = %tr_hs_code, "Deleting A.TR rate");

        let result = sqlx::query("DELETE FROM atr_rates WHERE tr_hs_code = ?1")
            .bind(tr_hs_code.trim())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("AtrRate", tr_hs_code));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::{Database, DbConfig};
    use customs_core::AtrRate;
    use rust_decimal_macros::dec;

    fn rate(code: &str, value: customs_core::Decimal) -> AtrRate {
        AtrRate {
            tr_hs_code: code.to_string(),
            customs_tax_percent: value,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_many() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.atr_rates();

        repo.upsert(&rate("6109.10", dec!(0.04))).await.unwrap();
        repo.upsert(&rate("6109.10", dec!(0.02))).await.unwrap();
        repo.upsert(&rate("6204.62", dec!(0.05))).await.unwrap();

        let found = repo
            .get_many(&["6109.10".to_string(), "6110.20".to_string()])
            .await
            .unwrap();

        assert_eq!(found, vec![rate("6109.10", dec!(0.02))]);
        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.atr_rates();
        repo.upsert(&rate("6109.10", dec!(0.04))).await.unwrap();

        repo.delete("6109.10").await.unwrap();
        assert!(repo
            .get_many(&["6109.10".to_string()])
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            repo.delete("6109.10").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
