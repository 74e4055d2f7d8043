//! # Exchange Rate
//!
//! One rate is active at a time. Every operation reads it inside its own
//! unit of work and freezes it onto the rows it writes, so changing the
//! rate never rewrites history.

use chrono::NaiveDate;
use tracing::info;

use crate::error::EngineResult;
use crate::Engine;
use tillpoint_core::validation::validate_reason;
use tillpoint_core::{CommerceError, ExchangeRate, Rate};

impl Engine {
    /// Makes `rate` the active rate from `effective_date` on.
    pub async fn set_active_rate(
        &self,
        rate: Rate,
        source: &str,
        effective_date: NaiveDate,
    ) -> EngineResult<ExchangeRate> {
        validate_reason("source", source)?;

        let mut uow = self.db.begin().await?;
        let previous = uow.rates().active().await?;
        let active = uow
            .rates()
            .set_active(
                rate,
                &self.config.base_currency_code,
                &self.config.secondary_currency_code,
                source.trim(),
                effective_date,
            )
            .await?;
        uow.commit().await?;

        info!(
            rate = %rate,
            previous = ?previous.map(|p| p.rate_micros),
            %effective_date,
            source,
            "Exchange rate activated"
        );
        Ok(active)
    }

    /// The rate operations would use right now.
    pub async fn current_rate(&self) -> EngineResult<Rate> {
        let mut uow = self.db.begin_read().await?;
        let active = uow.rates().active().await?;
        uow.rollback().await?;
        active
            .map(|r| r.rate())
            .ok_or_else(|| CommerceError::NoActiveRate.into())
    }
}
