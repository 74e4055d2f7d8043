//! # Exchange Rate Repository
//!
//! At most one row is active at any time (partial unique index). Activating
//! a rate deactivates the previous one in the same transaction.

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillpoint_core::{ExchangeRate, Rate};

const RATE_COLUMNS: &str = "id, base_code, secondary_code, rate_micros, source, effective_date, \
    is_active, created_at, updated_at";

/// Repository for exchange rates.
pub struct RateRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> RateRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        RateRepository { conn }
    }

    /// The active rate, if any.
    pub async fn active(&mut self) -> DbResult<Option<ExchangeRate>> {
        let sql = format!("SELECT {RATE_COLUMNS} FROM exchange_rates WHERE is_active = 1");
        let rate = sqlx::query_as::<_, ExchangeRate>(&sql)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(rate)
    }

    /// Makes `rate` the active one.
    ///
    /// A row already recorded for `effective_date` is updated in place and
    /// re-activated; otherwise a new row is inserted.
    pub async fn set_active(
        &mut self,
        rate: Rate,
        base_code: &str,
        secondary_code: &str,
        source: &str,
        effective_date: NaiveDate,
    ) -> DbResult<ExchangeRate> {
        let now = Utc::now();

        sqlx::query("UPDATE exchange_rates SET is_active = 0, updated_at = ?1 WHERE is_active = 1")
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        let updated = sqlx::query(
            r#"
            UPDATE exchange_rates
            SET rate_micros = ?2, base_code = ?3, secondary_code = ?4, source = ?5,
                is_active = 1, updated_at = ?6
            WHERE effective_date = ?1
            "#,
        )
        .bind(effective_date)
        .bind(rate.micros())
        .bind(base_code)
        .bind(secondary_code)
        .bind(source)
        .bind(now)
        .execute(&mut *self.conn)
        .await?
        .rows_affected();

        if updated == 0 {
            sqlx::query(
                r#"
                INSERT INTO exchange_rates (
                    id, base_code, secondary_code, rate_micros, source,
                    effective_date, is_active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(base_code)
            .bind(secondary_code)
            .bind(rate.micros())
            .bind(source)
            .bind(effective_date)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;
        }

        debug!(
            rate = %rate,
            %effective_date,
            source,
            replaced = updated > 0,
            "Exchange rate activated"
        );

        self.active().await?.ok_or_else(|| {
            DbError::Internal("active exchange rate vanished after activation".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_single_active_rate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        assert!(uow.rates().active().await.unwrap().is_none());

        uow.rates()
            .set_active(Rate::from_micros(36_500_000), "USD", "VES", "manual", day(1))
            .await
            .unwrap();
        let second = uow
            .rates()
            .set_active(Rate::from_micros(37_000_000), "USD", "VES", "central bank", day(2))
            .await
            .unwrap();

        let active = uow.rates().active().await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.rate(), Rate::from_micros(37_000_000));
    }

    #[tokio::test]
    async fn test_same_date_updates_in_place() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let first = uow
            .rates()
            .set_active(Rate::from_micros(36_500_000), "USD", "VES", "manual", day(1))
            .await
            .unwrap();
        uow.rates()
            .set_active(Rate::from_micros(38_000_000), "USD", "VES", "manual", day(2))
            .await
            .unwrap();
        let again = uow
            .rates()
            .set_active(Rate::from_micros(36_600_000), "USD", "VES", "manual", day(1))
            .await
            .unwrap();

        assert_eq!(again.id, first.id);
        assert_eq!(again.rate_micros, 36_600_000);
        assert!(again.is_active);
    }
}
