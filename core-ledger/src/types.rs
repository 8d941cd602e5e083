use chrono::{DateTime, Utc};
use core_money::{Currency, MoneyValue};

use crate::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    /// Asset/expense accounts carry a debit-normal balance
    /// (`Σdebits − Σcredits`); liability/equity/revenue accounts carry a
    /// credit-normal balance (`Σcredits − Σdebits`).
    pub fn is_debit_normal(self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Expense)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct AccountLimits {
    pub daily_limit: Option<MoneyValue>,
    pub monthly_limit: Option<MoneyValue>,
    pub single_transaction_limit: Option<MoneyValue>,
    pub minimum_balance: Option<MoneyValue>,
    pub credit_limit: Option<MoneyValue>,
    pub overdraft_limit: Option<MoneyValue>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub customer_id: String,
    pub product_ref: String,
    pub currency: Currency,
    pub kind: AccountKind,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub limits: AccountLimits,
}

impl Account {
    pub fn is_operable(&self) -> bool {
        matches!(self.status, AccountStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Posted,
    Reversed,
}

#[derive(Debug, Clone)]
pub struct NewJournalLine {
    pub account_id: String,
    pub description: String,
    pub debit: MoneyValue,
    pub credit: MoneyValue,
}

#[derive(Debug, Clone)]
pub struct JournalEntryLine {
    pub account_id: String,
    pub description: String,
    pub debit: MoneyValue,
    pub credit: MoneyValue,
    pub posting_sequence: u64,
}

impl JournalEntryLine {
    /// Signed delta this line contributes to `account`'s balance, honoring
    /// the account kind's debit/credit-normal convention.
    pub fn signed_delta(&self, kind: AccountKind) -> LedgerResult<MoneyValue> {
        if kind.is_debit_normal() {
            self.debit.sub(&self.credit).map_err(|e| LedgerError::Internal(e.to_string()))
        } else {
            self.credit.sub(&self.debit).map_err(|e| LedgerError::Internal(e.to_string()))
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub id: String,
    pub reference: String,
    pub description: String,
    pub lines: Vec<NewJournalLine>,
    pub reverses: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub id: String,
    pub reference: String,
    pub description: String,
    pub state: EntryState,
    pub lines: Vec<JournalEntryLine>,
    pub reverses: Option<String>,
    pub reversed_by: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub posting_sequence: Option<u64>,
}

impl JournalEntry {
    /// For each currency appearing on the entry, Σdebits must equal
    /// Σcredits; multi-currency entries balance independently per
    /// currency.
    pub fn is_balanced(&self) -> LedgerResult<bool> {
        use std::collections::HashMap;
        let mut totals: HashMap<String, (MoneyValue, MoneyValue)> = HashMap::new();
        for line in &self.lines {
            let debit_entry = totals
                .entry(line.debit.currency().code.clone())
                .or_insert_with(|| {
                    (
                        MoneyValue::zero(line.debit.currency().clone()),
                        MoneyValue::zero(line.debit.currency().clone()),
                    )
                });
            debit_entry.0 = debit_entry
                .0
                .add(&line.debit)
                .map_err(|e| LedgerError::Validation(e.to_string()))?;

            let credit_entry = totals
                .entry(line.credit.currency().code.clone())
                .or_insert_with(|| {
                    (
                        MoneyValue::zero(line.credit.currency().clone()),
                        MoneyValue::zero(line.credit.currency().clone()),
                    )
                });
            credit_entry.1 = credit_entry
                .1
                .add(&line.credit)
                .map_err(|e| LedgerError::Validation(e.to_string()))?;
        }
        for (debits, credits) in totals.values() {
            if debits != credits {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `post`'s result: the posted (or, on idempotent replay, pre-existing)
/// entry, plus whether this call actually posted anything. Callers that
/// record side effects alongside a post (limits, audit, events) must
/// skip them entirely when `was_replayed` is true -- a repeated
/// `(tenant, reference)` is the same transaction being observed again,
/// not a new one.
#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub entry: JournalEntry,
    pub was_replayed: bool,
}

/// Validates the structural shape `spec.md` §3 requires of a candidate
/// entry before it reaches the ledger's critical section: at least two
/// lines, and every line carries exactly one nonzero side.
pub fn validate_new_entry(entry: &NewJournalEntry) -> LedgerResult<()> {
    if entry.lines.len() < 2 {
        return Err(LedgerError::Validation(
            "a journal entry requires at least two lines".into(),
        ));
    }
    for line in &entry.lines {
        let debit_nonzero = !line.debit.is_zero();
        let credit_nonzero = !line.credit.is_zero();
        if debit_nonzero == credit_nonzero {
            return Err(LedgerError::Validation(format!(
                "line on account {} must carry exactly one nonzero side",
                line.account_id
            )));
        }
    }
    Ok(())
}
