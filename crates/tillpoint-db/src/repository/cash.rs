//! # Cash Repository
//!
//! Drawer sessions and their append-only ledger.
//!
//! ## Running Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  append_entry(entry)                                                    │
//! │       │                                                                 │
//! │       ├── INSERT cash_ledger row (always)                               │
//! │       │                                                                 │
//! │       └── cash method and non-closing type?                             │
//! │              └── expected[tender ccy] += sign × amount[tender ccy]      │
//! │                  (only while the session is open)                       │
//! │                                                                         │
//! │  A session is inserted with expected = 0 and its opening entries        │
//! │  bring it to the float, so the running totals and the                   │
//! │  reconciliation calculator apply one rule to the same rows.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tillpoint_core::{
    CashLedgerEntry, CashSession, CashSessionStatus, Currency, DualMoney, NewLedgerEntry,
};

const SESSION_COLUMNS: &str = r#"
    id, session_code, operator_id, status,
    opening_base_cents, opening_secondary_cents,
    expected_base_cents, expected_secondary_cents,
    actual_base_cents, actual_secondary_cents,
    variance_base_cents, variance_secondary_cents,
    opening_rate_micros, notes, opened_at, closed_at
"#;

const ENTRY_COLUMNS: &str = r#"
    id, session_id, entry_type, currency, method,
    amount_base_cents, amount_secondary_cents, rate_micros,
    description, reference_id, created_at
"#;

/// Values stamped on a session when it closes.
#[derive(Debug, Clone)]
pub struct SessionClosing {
    pub actual: DualMoney,
    pub variance: DualMoney,
    pub notes: Option<String>,
    pub closed_at: DateTime<Utc>,
}

/// Repository for drawer sessions and the cash ledger.
pub struct CashRepository<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> CashRepository<'a> {
    pub fn new(conn: &'a mut SqliteConnection) -> Self {
        CashRepository { conn }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Inserts a new open session.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` on `operator_id` - the operator
    ///   already has an open session
    pub async fn insert_session(&mut self, session: &CashSession) -> DbResult<()> {
        debug!(id = %session.id, operator = %session.operator_id, "Inserting cash session");

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, session_code, operator_id, status,
                opening_base_cents, opening_secondary_cents,
                expected_base_cents, expected_secondary_cents,
                actual_base_cents, actual_secondary_cents,
                variance_base_cents, variance_secondary_cents,
                opening_rate_micros, notes, opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&session.id)
        .bind(&session.session_code)
        .bind(&session.operator_id)
        .bind(session.status)
        .bind(session.opening_base_cents)
        .bind(session.opening_secondary_cents)
        .bind(session.expected_base_cents)
        .bind(session.expected_secondary_cents)
        .bind(session.actual_base_cents)
        .bind(session.actual_secondary_cents)
        .bind(session.variance_base_cents)
        .bind(session.variance_secondary_cents)
        .bind(session.opening_rate_micros)
        .bind(&session.notes)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// The operator's open session, if any.
    pub async fn find_open(&mut self, operator_id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE operator_id = ?1 AND status = ?2"
        );
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(operator_id)
            .bind(CashSessionStatus::Open)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(session)
    }

    /// Gets a session by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<CashSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE id = ?1");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(session)
    }

    /// Number of sessions whose code starts with `prefix`.
    pub async fn count_codes_with_prefix(&mut self, prefix: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cash_sessions WHERE session_code LIKE ?1 || '%'",
        )
        .bind(prefix)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(count)
    }

    /// Seals an open session with its counted totals.
    pub async fn close(
        &mut self,
        session_id: &str,
        closing: &SessionClosing,
    ) -> DbResult<CashSession> {
        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = ?2,
                actual_base_cents = ?3, actual_secondary_cents = ?4,
                variance_base_cents = ?5, variance_secondary_cents = ?6,
                notes = ?7, closed_at = ?8
            WHERE id = ?1 AND status = ?9
            "#,
        )
        .bind(session_id)
        .bind(CashSessionStatus::Closed)
        .bind(closing.actual.base.cents())
        .bind(closing.actual.secondary.cents())
        .bind(closing.variance.base.cents())
        .bind(closing.variance.secondary.cents())
        .bind(&closing.notes)
        .bind(closing.closed_at)
        .bind(CashSessionStatus::Open)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("open CashSession", session_id));
        }

        debug!(session_id, "Cash session sealed");
        self.get(session_id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", session_id))
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Appends a ledger row and moves the running expected balance.
    pub async fn append_entry(&mut self, new: &NewLedgerEntry) -> DbResult<CashLedgerEntry> {
        let entry = CashLedgerEntry {
            id: Uuid::new_v4().to_string(),
            session_id: new.session_id.clone(),
            entry_type: new.entry_type,
            currency: new.currency,
            method: new.method,
            amount_base_cents: new.amount.base.cents(),
            amount_secondary_cents: new.amount.secondary.cents(),
            rate_micros: new.rate.micros(),
            description: new.description.clone(),
            reference_id: new.reference_id.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_ledger (
                id, session_id, entry_type, currency, method,
                amount_base_cents, amount_secondary_cents, rate_micros,
                description, reference_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.session_id)
        .bind(entry.entry_type)
        .bind(entry.currency)
        .bind(entry.method)
        .bind(entry.amount_base_cents)
        .bind(entry.amount_secondary_cents)
        .bind(entry.rate_micros)
        .bind(&entry.description)
        .bind(&entry.reference_id)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        let effect = entry.drawer_effect();
        if !effect.is_zero() {
            let (base_delta, secondary_delta) = match entry.currency {
                Currency::Base => (effect.cents(), 0),
                Currency::Secondary => (0, effect.cents()),
            };
            let moved = sqlx::query(
                r#"
                UPDATE cash_sessions
                SET expected_base_cents = expected_base_cents + ?2,
                    expected_secondary_cents = expected_secondary_cents + ?3
                WHERE id = ?1 AND status = ?4
                "#,
            )
            .bind(&entry.session_id)
            .bind(base_delta)
            .bind(secondary_delta)
            .bind(CashSessionStatus::Open)
            .execute(&mut *self.conn)
            .await?
            .rows_affected();

            if moved == 0 {
                return Err(DbError::not_found("open CashSession", entry.session_id.clone()));
            }
        }

        debug!(
            session_id = %entry.session_id,
            entry_type = ?entry.entry_type,
            currency = %entry.currency,
            effect = %effect,
            "Ledger entry appended"
        );
        Ok(entry)
    }

    /// Ledger rows of a session in insertion order.
    pub async fn entries(&mut self, session_id: &str) -> DbResult<Vec<CashLedgerEntry>> {
        let sql =
            format!("SELECT {ENTRY_COLUMNS} FROM cash_ledger WHERE session_id = ?1 ORDER BY rowid");
        let entries = sqlx::query_as::<_, CashLedgerEntry>(&sql)
            .bind(session_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tillpoint_core::{EntryType, Money, PaymentMethod, Rate};

    fn session(operator: &str, code: &str) -> CashSession {
        CashSession {
            id: Uuid::new_v4().to_string(),
            session_code: code.to_string(),
            operator_id: operator.to_string(),
            status: CashSessionStatus::Open,
            opening_base_cents: 10_000,
            opening_secondary_cents: 0,
            expected_base_cents: 0,
            expected_secondary_cents: 0,
            actual_base_cents: None,
            actual_secondary_cents: None,
            variance_base_cents: None,
            variance_secondary_cents: None,
            opening_rate_micros: 40_000_000,
            notes: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    fn entry(
        session_id: &str,
        entry_type: EntryType,
        currency: Currency,
        method: PaymentMethod,
        cents: i64,
    ) -> NewLedgerEntry {
        let rate = Rate::from_micros(40_000_000);
        NewLedgerEntry {
            session_id: session_id.to_string(),
            entry_type,
            currency,
            method,
            amount: rate.dual(Money::from_cents(cents), currency),
            rate,
            description: format!("{entry_type:?}"),
            reference_id: None,
        }
    }

    #[tokio::test]
    async fn test_one_open_session_per_operator() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        uow.cash().insert_session(&session("ana", "DRW-1")).await.unwrap();
        let err = uow.cash().insert_session(&session("ana", "DRW-2")).await.unwrap_err();
        assert!(err.is_unique_on("operator_id"));

        uow.cash().insert_session(&session("ben", "DRW-3")).await.unwrap();
        assert_eq!(uow.cash().count_codes_with_prefix("DRW-").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_moves_expected_for_cash_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let s = session("ana", "DRW-1");
        uow.cash().insert_session(&s).await.unwrap();

        let mut cash = uow.cash();
        let rows = [
            (EntryType::Opening, Currency::Base, PaymentMethod::Cash, 10_000),
            (EntryType::Sale, Currency::Base, PaymentMethod::Cash, 2_000),
            (EntryType::Sale, Currency::Base, PaymentMethod::Card, 5_000),
            (EntryType::Sale, Currency::Secondary, PaymentMethod::Cash, 40_000),
            (EntryType::Expense, Currency::Base, PaymentMethod::Cash, 500),
        ];
        for (entry_type, currency, method, cents) in rows {
            cash.append_entry(&entry(&s.id, entry_type, currency, method, cents))
                .await
                .unwrap();
        }

        let stored = cash.get(&s.id).await.unwrap().unwrap();
        assert_eq!(stored.expected(), DualMoney::from_cents(11_500, 40_000));
        assert_eq!(cash.entries(&s.id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_closed_session_is_sealed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let s = session("ana", "DRW-1");
        uow.cash().insert_session(&s).await.unwrap();

        let closed = uow
            .cash()
            .close(
                &s.id,
                &SessionClosing {
                    actual: DualMoney::zero(),
                    variance: DualMoney::zero(),
                    notes: None,
                    closed_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert!(!closed.is_open());
        assert!(uow.cash().find_open("ana").await.unwrap().is_none());

        let err = uow
            .cash()
            .append_entry(&entry(&s.id, EntryType::Sale, Currency::Base, PaymentMethod::Cash, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Immutable { .. }));
    }
}
