#![deny(clippy::print_stdout, clippy::print_stderr)]

//! The double-entry ledger: accounts, balanced journal entries, posting,
//! and balance derivation.
//!
//! Balances are never stored; they are always a function of posted
//! journal lines for an account and currency (`spec.md` §9's Open
//! Question is resolved in favor of the ledger being the sole source of
//! truth -- any cached balance elsewhere is a reconstructible view, and
//! disagreement with a recomputation is an internal invariant violation,
//! never a value to trust).

mod memory;
mod types;

pub use memory::InMemoryLedger;
pub use types::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type AccountId = String;
pub type JournalEntryId = String;
pub type TenantId = str;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn register_account(&self, tenant_id: &str, account: Account) -> LedgerResult<Account>;

    async fn get_account(&self, tenant_id: &str, account_id: &str) -> LedgerResult<Account>;

    async fn set_account_status(
        &self,
        tenant_id: &str,
        account_id: &str,
        status: AccountStatus,
    ) -> LedgerResult<Account>;

    /// Posts `entry`, validating per-currency balance, assigning the
    /// tenant's next posting sequence, and transitioning `pending` ->
    /// `posted`. Idempotent on `entry.reference`: a second post with the
    /// same reference and identical lines returns the original entry with
    /// `was_replayed = true` and without reposting; a same-reference post
    /// with different lines is a `conflict`.
    async fn post(&self, tenant_id: &str, entry: NewJournalEntry) -> LedgerResult<PostOutcome>;

    /// Builds the inverse of `entry_id` (debit/credit swapped on every
    /// line), links it via `reverses`, and posts it as `reversal_id`.
    /// Refuses to reverse an entry that is not `posted` or is already
    /// reversed.
    async fn reverse(
        &self,
        tenant_id: &str,
        entry_id: &str,
        reversal_id: String,
        reversal_reference: String,
        reason: &str,
    ) -> LedgerResult<JournalEntry>;

    async fn get_entry(&self, tenant_id: &str, entry_id: &str) -> LedgerResult<JournalEntry>;

    async fn balance(
        &self,
        tenant_id: &str,
        account_id: &str,
        currency: &core_money::Currency,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<core_money::MoneyValue>;

    async fn transactions(
        &self,
        tenant_id: &str,
        account_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<JournalEntry>>;

    async fn trial_balance(
        &self,
        tenant_id: &str,
        currency: &core_money::Currency,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<core_money::MoneyValue>;
}
