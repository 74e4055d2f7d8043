//! # Receivables and Payables
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register_receivable_payment(amount, currency)                          │
//! │       │                                                                 │
//! │       ├── open session? active rate?                                    │
//! │       ├── account paid already ──────────────► AccountAlreadySettled    │
//! │       ├── amount in base > balance + ε ──────► OverPayment              │
//! │       │                                                                 │
//! │       ├── paid += amount (clamped to balance within ε), status derived  │
//! │       ├── CustomerPayment row (balance before / after)                  │
//! │       ├── customer debt −= amount (floored at zero)                     │
//! │       ├── `payment` ledger entry  (cash → expected += amount)           │
//! │       └── account now paid and linked to a sale → sale.status = paid    │
//! │                                                                         │
//! │  register_payable_payment: same shape, supplier side, `expense` entry   │
//! │  (cash → expected −= amount).                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::events::{DomainEvent, LedgerSide};
use crate::Engine;
use tillpoint_core::calendar::due_date;
use tillpoint_core::validation::{validate_id, validate_optional_note, validate_payment_amount};
use tillpoint_core::{
    apply_payment, AccountStatus, AppliedPayment, CommerceError, Currency, Customer,
    CustomerPayment, EntryType, Money, NewLedgerEntry, PayableAccount, PaymentMethod, Rate,
    ReceivableAccount, SupplierPayment, ValidationError,
};
use tillpoint_db::{NewPayable, NewReceivable};

/// A customer's open receivables.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Statement {
    pub customer: Customer,
    /// Unpaid accounts, earliest due first.
    pub accounts: Vec<ReceivableAccount>,
    pub total_balance: Money,
    pub overdue_balance: Money,
    #[ts(as = "String")]
    pub as_of: NaiveDate,
}

impl Engine {
    // =========================================================================
    // Receivables
    // =========================================================================

    /// Takes a customer payment against one receivable account.
    pub async fn register_receivable_payment(
        &self,
        operator_id: &str,
        account_id: &str,
        amount: Money,
        method: PaymentMethod,
        currency: Currency,
    ) -> EngineResult<CustomerPayment> {
        validate_id("operator_id", operator_id)?;
        validate_id("account_id", account_id)?;
        validate_payment_amount(amount)?;

        let mut uow = self.db.begin().await?;
        let session = Self::require_open_session(&mut uow, operator_id).await?;
        let rate = Self::require_rate(&mut uow).await?.rate();

        let account = uow
            .receivables()
            .get(account_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("ReceivableAccount", account_id))?;

        let applied = self.settle(
            account_id,
            account.status,
            account.total(),
            account.paid(),
            amount,
            currency,
            rate,
        )?;
        let updated = uow.receivables().apply_payment(account_id, &applied).await?;

        let tendered = rate.dual(amount, currency);
        let payment = CustomerPayment {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            customer_id: account.customer_id.clone(),
            session_id: session.id.clone(),
            currency,
            method,
            amount_base_cents: applied.amount.cents(),
            amount_secondary_cents: tendered.secondary.cents(),
            rate_micros: rate.micros(),
            balance_before_cents: applied.balance_before.cents(),
            balance_after_cents: applied.balance_after.cents(),
            created_at: Utc::now(),
        };
        uow.receivables().insert_payment(&payment).await?;
        uow.customers()
            .adjust_debt(&account.customer_id, -applied.amount)
            .await?;

        uow.cash()
            .append_entry(&NewLedgerEntry {
                session_id: session.id.clone(),
                entry_type: EntryType::Payment,
                currency,
                method,
                amount: tendered,
                rate,
                description: format!("Payment on receivable {account_id}"),
                reference_id: Some(payment.id.clone()),
            })
            .await?;

        if updated.status == AccountStatus::Paid {
            if let Some(sale_id) = &updated.sale_id {
                uow.sales().mark_paid(sale_id).await?;
            }
        }

        let events = vec![DomainEvent::PaymentRegistered {
            payment_id: payment.id.clone(),
            account_id: account_id.to_string(),
            side: LedgerSide::Receivable,
            amount_base: applied.amount,
            balance_after: applied.balance_after,
            occurred_at: payment.created_at,
        }];
        Self::enqueue(&mut uow, &events).await?;
        self.commit_and_publish(uow, events).await?;

        info!(
            account_id,
            payment_id = %payment.id,
            amount = %applied.amount,
            balance = %applied.balance_after,
            "Receivable payment registered"
        );
        Ok(payment)
    }

    /// Records a debt that did not come from a checkout.
    pub async fn create_receivable(
        &self,
        customer_id: &str,
        total: Money,
        due: Option<NaiveDate>,
        notes: Option<&str>,
    ) -> EngineResult<ReceivableAccount> {
        validate_id("customer_id", customer_id)?;
        validate_payment_amount(total)?;
        validate_optional_note("notes", notes)?;

        let mut uow = self.db.begin().await?;
        let customer = uow
            .customers()
            .get(customer_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Customer", customer_id))?;

        let terms = u32::try_from(customer.payment_terms_days)
            .unwrap_or(self.config.default_terms_days);
        let account = uow
            .receivables()
            .insert(&NewReceivable {
                customer_id: customer.id.clone(),
                sale_id: None,
                total,
                paid: Money::zero(),
                due_date: due.unwrap_or_else(|| due_date(Utc::now().date_naive(), terms)),
                notes: notes.map(str::to_string),
            })
            .await?;
        uow.customers().adjust_debt(&customer.id, total).await?;
        uow.commit().await?;

        info!(
            account_id = %account.id,
            customer_id,
            %total,
            due = %account.due_date,
            "Receivable created"
        );
        Ok(account)
    }

    /// Open receivables of one customer.
    pub async fn statement(&self, customer_id: &str) -> EngineResult<Statement> {
        validate_id("customer_id", customer_id)?;

        let mut uow = self.db.begin_read().await?;
        let customer = uow
            .customers()
            .get(customer_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Customer", customer_id))?;
        let accounts = uow.receivables().open_for_customer(customer_id).await?;
        uow.rollback().await?;

        let today = Utc::now().date_naive();
        let total_balance = accounts.iter().map(ReceivableAccount::balance).sum();
        let overdue_balance = accounts
            .iter()
            .filter(|a| a.is_overdue(today))
            .map(ReceivableAccount::balance)
            .sum();

        Ok(Statement {
            customer,
            accounts,
            total_balance,
            overdue_balance,
            as_of: today,
        })
    }

    // =========================================================================
    // Payables
    // =========================================================================

    /// Pays a supplier, out of the drawer when the method is cash.
    pub async fn register_payable_payment(
        &self,
        operator_id: &str,
        account_id: &str,
        amount: Money,
        method: PaymentMethod,
        currency: Currency,
    ) -> EngineResult<SupplierPayment> {
        validate_id("operator_id", operator_id)?;
        validate_id("account_id", account_id)?;
        validate_payment_amount(amount)?;

        let mut uow = self.db.begin().await?;
        let session = Self::require_open_session(&mut uow, operator_id).await?;
        let rate = Self::require_rate(&mut uow).await?.rate();

        let account = uow
            .payables()
            .get(account_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("PayableAccount", account_id))?;

        let applied = self.settle(
            account_id,
            account.status,
            account.total(),
            account.paid(),
            amount,
            currency,
            rate,
        )?;
        uow.payables().apply_payment(account_id, &applied).await?;

        let tendered = rate.dual(amount, currency);
        let payment = SupplierPayment {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            supplier_id: account.supplier_id.clone(),
            session_id: session.id.clone(),
            currency,
            method,
            amount_base_cents: applied.amount.cents(),
            amount_secondary_cents: tendered.secondary.cents(),
            rate_micros: rate.micros(),
            balance_before_cents: applied.balance_before.cents(),
            balance_after_cents: applied.balance_after.cents(),
            created_at: Utc::now(),
        };
        uow.payables().insert_payment(&payment).await?;
        uow.suppliers()
            .adjust_debt(&account.supplier_id, -applied.amount)
            .await?;

        uow.cash()
            .append_entry(&NewLedgerEntry {
                session_id: session.id.clone(),
                entry_type: EntryType::Expense,
                currency,
                method,
                amount: tendered,
                rate,
                description: format!("Payment on payable {account_id}"),
                reference_id: Some(payment.id.clone()),
            })
            .await?;

        let events = vec![DomainEvent::PaymentRegistered {
            payment_id: payment.id.clone(),
            account_id: account_id.to_string(),
            side: LedgerSide::Payable,
            amount_base: applied.amount,
            balance_after: applied.balance_after,
            occurred_at: payment.created_at,
        }];
        Self::enqueue(&mut uow, &events).await?;
        self.commit_and_publish(uow, events).await?;

        info!(
            account_id,
            payment_id = %payment.id,
            amount = %applied.amount,
            balance = %applied.balance_after,
            "Payable payment registered"
        );
        Ok(payment)
    }

    /// Records a purchase on credit, due after the supplier's terms.
    pub async fn create_payable(
        &self,
        supplier_id: &str,
        total: Money,
        due: Option<NaiveDate>,
        purchase_reference: Option<&str>,
    ) -> EngineResult<PayableAccount> {
        validate_id("supplier_id", supplier_id)?;
        validate_payment_amount(total)?;
        validate_optional_note("purchase_reference", purchase_reference)?;

        let mut uow = self.db.begin().await?;
        let supplier = uow
            .suppliers()
            .get(supplier_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("Supplier", supplier_id))?;

        let terms = u32::try_from(supplier.payment_terms_days)
            .unwrap_or(self.config.default_terms_days);
        let account = uow
            .payables()
            .insert(&NewPayable {
                supplier_id: supplier.id.clone(),
                purchase_reference: purchase_reference.map(str::to_string),
                total,
                due_date: due.unwrap_or_else(|| due_date(Utc::now().date_naive(), terms)),
                notes: None,
            })
            .await?;
        uow.suppliers().adjust_debt(&supplier.id, total).await?;
        uow.commit().await?;

        info!(
            account_id = %account.id,
            supplier_id,
            %total,
            due = %account.due_date,
            "Payable created"
        );
        Ok(account)
    }

    // =========================================================================
    // Shared
    // =========================================================================

    /// Converts a payment to base and applies it to an account's totals.
    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        account_id: &str,
        status: AccountStatus,
        total: Money,
        paid: Money,
        amount: Money,
        currency: Currency,
        rate: Rate,
    ) -> EngineResult<AppliedPayment> {
        if status == AccountStatus::Paid || total <= paid {
            return Err(CommerceError::AccountAlreadySettled {
                account_id: account_id.to_string(),
            }
            .into());
        }

        let amount_base = rate.in_base(amount, currency);
        if !amount_base.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "payment amount in base currency".to_string(),
            }
            .into());
        }

        apply_payment(total, paid, amount_base, self.config.epsilon()).ok_or_else(|| {
            CommerceError::OverPayment {
                account_id: account_id.to_string(),
                amount: amount_base,
                balance: total - paid,
            }
            .into()
        })
    }
}
