//! # Cash Drawer Sessions
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   (none) ──open_session──► Open ──close_session──► Closed (sealed)      │
//! │                             │                                           │
//! │                             ├── checkout            sale     (+)        │
//! │                             ├── receivable payment  payment  (+)        │
//! │                             ├── record_expense      expense  (−)        │
//! │                             ├── payable payment     expense  (−)        │
//! │                             └── return_items        refund   (−)        │
//! │                                                                         │
//! │   Only cash moves expected_*, and only in the currency handed over.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Close-out
//! 1. Re-derive expected from the ledger rows and compare with the running
//!    totals. Any difference aborts with `ReconciliationMismatch`.
//! 2. variance = counted − expected, per currency.
//! 3. Either currency off by more than the materiality threshold (in base)
//!    needs a note.
//! 4. Append a `closing` row with the counted amounts, then seal.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::events::DomainEvent;
use crate::Engine;
use tillpoint_core::reconciliation::{assess_variance, derive_expected, reconcile, DrawerBreakdown};
use tillpoint_core::validation::{
    has_text, validate_drawer_amounts, validate_id, validate_optional_note, validate_payment_amount,
    validate_reason,
};
use tillpoint_core::{
    CashLedgerEntry, CashSession, CashSessionStatus, CommerceError, Currency, DualMoney, EntryType,
    Money, NewLedgerEntry, PaymentMethod,
};
use tillpoint_db::{DbError, SessionClosing};

/// Running totals next to what the ledger rows add up to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionSummary {
    pub session: CashSession,
    pub breakdown: DrawerBreakdown,
    /// Running expected equals the ledger-derived expected.
    pub reconciled: bool,
}

impl Engine {
    /// Opens a drawer session for `operator_id` with the counted float.
    pub async fn open_session(
        &self,
        operator_id: &str,
        opening: DualMoney,
        notes: Option<&str>,
    ) -> EngineResult<CashSession> {
        validate_id("operator_id", operator_id)?;
        validate_drawer_amounts("opening balance", opening)?;
        validate_optional_note("notes", notes)?;

        let mut uow = self.db.begin().await?;

        if let Some(existing) = uow.cash().find_open(operator_id).await? {
            return Err(CommerceError::DuplicateOpenSession {
                operator_id: operator_id.to_string(),
                session_code: existing.session_code,
            }
            .into());
        }

        let rate = Self::require_rate(&mut uow).await?.rate();
        let now = Utc::now();

        let prefix = format!(
            "DRW-{}-{}-",
            now.format("%Y%m%d"),
            operator_id.chars().take(8).collect::<String>()
        );
        let sequence = uow.cash().count_codes_with_prefix(&prefix).await? + 1;

        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            session_code: format!("{prefix}{sequence:04}"),
            operator_id: operator_id.to_string(),
            status: CashSessionStatus::Open,
            opening_base_cents: opening.base.cents(),
            opening_secondary_cents: opening.secondary.cents(),
            // raised by the opening entries below
            expected_base_cents: 0,
            expected_secondary_cents: 0,
            actual_base_cents: None,
            actual_secondary_cents: None,
            variance_base_cents: None,
            variance_secondary_cents: None,
            opening_rate_micros: rate.micros(),
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            opened_at: now,
            closed_at: None,
        };

        match uow.cash().insert_session(&session).await {
            Err(e) if e.is_unique_on("operator_id") => {
                return Err(CommerceError::DuplicateOpenSession {
                    operator_id: operator_id.to_string(),
                    session_code: "unknown".to_string(),
                }
                .into())
            }
            other => other?,
        }

        for currency in Currency::ALL {
            let amount = opening.get(currency);
            if amount.is_zero() {
                continue;
            }
            uow.cash()
                .append_entry(&NewLedgerEntry {
                    session_id: session.id.clone(),
                    entry_type: EntryType::Opening,
                    currency,
                    method: PaymentMethod::Cash,
                    amount: rate.dual(amount, currency),
                    rate,
                    description: format!("Opening float ({})", currency),
                    reference_id: None,
                })
                .await?;
        }

        let opened = uow
            .cash()
            .get(&session.id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", &session.id))?;
        uow.commit().await?;

        info!(
            session_id = %opened.id,
            session_code = %opened.session_code,
            operator_id,
            opening_base = %opening.base,
            opening_secondary = %opening.secondary,
            "Cash session opened"
        );
        Ok(opened)
    }

    /// Counts the drawer out and seals the operator's open session.
    pub async fn close_session(
        &self,
        operator_id: &str,
        actual: DualMoney,
        notes: Option<&str>,
    ) -> EngineResult<CashSession> {
        validate_id("operator_id", operator_id)?;
        validate_drawer_amounts("counted balance", actual)?;
        validate_optional_note("notes", notes)?;

        let mut uow = self.db.begin().await?;
        let session = Self::require_open_session(&mut uow, operator_id).await?;
        let entries = uow.cash().entries(&session.id).await?;

        let breakdown = match reconcile(&session, &entries) {
            Ok(breakdown) => breakdown,
            Err(e) => {
                error!(
                    session_id = %session.id,
                    error = %e,
                    "Drawer does not reconcile; close aborted"
                );
                return Err(e.into());
            }
        };
        let expected = breakdown.expected();

        let rate = match uow.rates().active().await? {
            Some(active) => active.rate(),
            None => session.opening_rate(),
        };

        let threshold = self.config.materiality_threshold();
        let assessment = assess_variance(expected, actual, rate, threshold);
        if assessment.requires_explanation && !has_text(notes) {
            return Err(CommerceError::ExplanationRequired {
                session_id: session.id.clone(),
                variance_base: assessment.variance.base,
                variance_secondary_in_base: assessment.secondary_in_base,
                threshold,
            }
            .into());
        }

        let now = Utc::now();
        if session.opened_at.date_naive() != now.date_naive() {
            warn!(
                session_id = %session.id,
                opened = %session.opened_at.date_naive(),
                "Cash session closed on a different day than it was opened"
            );
        }

        uow.cash()
            .append_entry(&NewLedgerEntry {
                session_id: session.id.clone(),
                entry_type: EntryType::Closing,
                currency: Currency::Base,
                method: PaymentMethod::Cash,
                amount: actual,
                rate,
                description: "Closing count".to_string(),
                reference_id: None,
            })
            .await?;

        let closing = SessionClosing {
            actual,
            variance: assessment.variance,
            notes: merge_close_note(session.notes.as_deref(), notes),
            closed_at: now,
        };
        let closed = uow.cash().close(&session.id, &closing).await?;

        let event = DomainEvent::SessionClosed {
            session_id: closed.id.clone(),
            session_code: closed.session_code.clone(),
            operator_id: operator_id.to_string(),
            expected,
            actual,
            variance: assessment.variance,
            occurred_at: now,
        };
        let events = vec![event];
        Self::enqueue(&mut uow, &events).await?;
        self.commit_and_publish(uow, events).await?;

        info!(
            session_id = %closed.id,
            variance_base = %assessment.variance.base,
            variance_secondary = %assessment.variance.secondary,
            "Cash session closed"
        );
        Ok(closed)
    }

    /// Pays an expense out of the operator's session.
    pub async fn record_expense(
        &self,
        operator_id: &str,
        amount: Money,
        currency: Currency,
        method: PaymentMethod,
        description: &str,
    ) -> EngineResult<CashLedgerEntry> {
        validate_id("operator_id", operator_id)?;
        validate_payment_amount(amount)?;
        validate_reason("description", description)?;

        let mut uow = self.db.begin().await?;
        let session = Self::require_open_session(&mut uow, operator_id).await?;
        let rate = Self::require_rate(&mut uow).await?.rate();

        let entry = uow
            .cash()
            .append_entry(&NewLedgerEntry {
                session_id: session.id.clone(),
                entry_type: EntryType::Expense,
                currency,
                method,
                amount: rate.dual(amount, currency),
                rate,
                description: description.trim().to_string(),
                reference_id: None,
            })
            .await?;
        uow.commit().await?;

        info!(session_id = %session.id, %amount, %currency, ?method, "Expense recorded");
        Ok(entry)
    }

    /// The calculator's view of a session, open or closed.
    pub async fn session_summary(&self, session_id: &str) -> EngineResult<SessionSummary> {
        validate_id("session_id", session_id)?;

        let mut uow = self.db.begin_read().await?;
        let session = uow
            .cash()
            .get(session_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("CashSession", session_id))?;
        let entries = uow.cash().entries(session_id).await?;
        uow.rollback().await?;

        let breakdown = derive_expected(&entries);
        let reconciled = breakdown.expected() == session.expected();
        Ok(SessionSummary {
            session,
            breakdown,
            reconciled,
        })
    }

    /// The operator's open session, if any.
    pub async fn current_session(&self, operator_id: &str) -> EngineResult<Option<CashSession>> {
        validate_id("operator_id", operator_id)?;

        let mut uow = self.db.begin_read().await?;
        let session = uow.cash().find_open(operator_id).await?;
        uow.rollback().await?;
        Ok(session)
    }
}

/// Session notes after close: the opening note, then `Close: <note>`.
fn merge_close_note(existing: Option<&str>, close_note: Option<&str>) -> Option<String> {
    let close_note = close_note.map(str::trim).filter(|n| !n.is_empty());
    match (existing, close_note) {
        (Some(existing), Some(note)) => Some(format!("{existing} | Close: {note}")),
        (None, Some(note)) => Some(format!("Close: {note}")),
        (existing, None) => existing.map(str::to_string),
    }
}
