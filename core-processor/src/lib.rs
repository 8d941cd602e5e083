#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Composes high-level domain operations (deposit, withdraw, transfer,
//! charge, disbursement, interest accrual, fee) into exactly one balanced
//! journal entry each, enforcing account status, limits, and
//! idempotency, and publishing lifecycle events around the post.

pub mod clock;
mod limits;

pub use clock::{Clock, IdGenerator, SequentialIdGenerator, SystemClock, TestClock, UuidIdGenerator};
pub use limits::LimitTracker;

use std::collections::HashMap;
use std::sync::Arc;

use core_audit::{AppendRequest, AuditChain, AuditLogError};
use core_ledger::{Account, AccountStatus, Ledger, LedgerError, NewJournalEntry, NewJournalLine};
use core_money::MoneyValue;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Error, Clone)]
pub enum ProcessorError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("policy violation ({rule}): {detail}")]
    PolicyViolation { rule: String, detail: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("audit chain poisoned, writes refused: {0}")]
    AuditPoisoned(String),
    #[error("transient error, retry: {0}")]
    Transient(String),
    #[error("journal entry committed but the audit append failed; reconciliation required: {0}")]
    CommittedUnaudited(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

impl From<LedgerError> for ProcessorError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(msg) => ProcessorError::Validation(msg),
            LedgerError::NotFound(msg) => ProcessorError::NotFound(msg),
            LedgerError::Conflict(msg) => ProcessorError::Conflict(msg),
            LedgerError::Internal(msg) => ProcessorError::Internal(msg),
        }
    }
}

impl From<AuditLogError> for ProcessorError {
    fn from(e: AuditLogError) -> Self {
        match e {
            AuditLogError::Poisoned(tenant) => ProcessorError::AuditPoisoned(tenant),
            AuditLogError::Validation(msg) => ProcessorError::Validation(msg),
            AuditLogError::Internal(msg) => ProcessorError::Internal(msg),
        }
    }
}

/// One domain-level operation compiled into exactly one journal entry.
/// `primary_account_id` is the account whose status/limits gate the
/// operation; `limit_amount`, when present, is the amount counted
/// against that account's daily/monthly/single-transaction limits (an
/// outgoing movement -- deposits do not consume limit budget).
pub struct OperationRequest {
    pub tenant_id: String,
    pub actor: String,
    pub client_reference: Option<String>,
    pub description: String,
    pub lines: Vec<NewJournalLine>,
    pub primary_account_id: String,
    pub limit_amount: Option<MoneyValue>,
    pub audit_event_kind: String,
}

#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub entry: core_ledger::JournalEntry,
    pub client_reference: String,
}

pub struct TransactionProcessor {
    ledger: Arc<dyn Ledger>,
    audit: Arc<dyn AuditChain>,
    events: Arc<core_events::InMemoryDomainEventBus>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    limits: LimitTracker,
    account_locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TransactionProcessor {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        audit: Arc<dyn AuditChain>,
        events: Arc<core_events::InMemoryDomainEventBus>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        TransactionProcessor {
            ledger,
            audit,
            events,
            clock,
            ids,
            limits: LimitTracker::new(),
            account_locks: AsyncMutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    async fn lock_for(&self, account_id: &str) -> Arc<AsyncMutex<()>> {
        let mut guard = self.account_locks.lock().await;
        guard
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquires per-account locks for `account_ids` in a deterministic
    /// (sorted) order, so two concurrent operations that touch the same
    /// two accounts (e.g. a transfer in each direction) cannot deadlock.
    async fn lock_accounts(&self, account_ids: &[&str]) -> Vec<tokio::sync::OwnedMutexGuard<()>> {
        let mut sorted: Vec<&str> = account_ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            let lock = self.lock_for(id).await;
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    async fn check_operable(&self, tenant_id: &str, account_id: &str) -> ProcessorResult<Account> {
        let account = self.ledger.get_account(tenant_id, account_id).await?;
        if !account.is_operable() {
            return Err(ProcessorError::PolicyViolation {
                rule: "account-not-operable".into(),
                detail: format!("account {account_id} is {:?}", account.status),
            });
        }
        Ok(account)
    }

    async fn check_limits(
        &self,
        account: &Account,
        amount: &MoneyValue,
    ) -> ProcessorResult<()> {
        if let Some(single_limit) = &account.limits.single_transaction_limit {
            if amount
                .compare(single_limit)
                .map_err(|e| ProcessorError::Internal(e.to_string()))?
                == std::cmp::Ordering::Greater
            {
                return Err(ProcessorError::PolicyViolation {
                    rule: "single-transaction-limit".into(),
                    detail: format!("{amount} exceeds limit {single_limit}"),
                });
            }
        }
        let now = self.clock.now();
        let (day_total, month_total) = self
            .limits
            .peek_totals(&account.id, amount.currency(), now)
            .await;
        let prospective_day = day_total
            .add(amount)
            .map_err(|e| ProcessorError::Internal(e.to_string()))?;
        let prospective_month = month_total
            .add(amount)
            .map_err(|e| ProcessorError::Internal(e.to_string()))?;
        if let Some(daily_limit) = &account.limits.daily_limit {
            if prospective_day
                .compare(daily_limit)
                .map_err(|e| ProcessorError::Internal(e.to_string()))?
                == std::cmp::Ordering::Greater
            {
                return Err(ProcessorError::PolicyViolation {
                    rule: "daily-limit".into(),
                    detail: format!("{prospective_day} exceeds daily limit {daily_limit}"),
                });
            }
        }
        if let Some(monthly_limit) = &account.limits.monthly_limit {
            if prospective_month
                .compare(monthly_limit)
                .map_err(|e| ProcessorError::Internal(e.to_string()))?
                == std::cmp::Ordering::Greater
            {
                return Err(ProcessorError::PolicyViolation {
                    rule: "monthly-limit".into(),
                    detail: format!("{prospective_month} exceeds monthly limit {monthly_limit}"),
                });
            }
        }
        Ok(())
    }

    /// The shared execution path every high-level operation funnels
    /// through: status + limit checks, post, and -- only for a genuinely
    /// new entry -- `TRANSACTION_CREATED`/`TRANSACTION_POSTED` and an
    /// audit append. A repeated `(tenant, reference)` is a replay of a
    /// transaction already observed: `ledger.post` reports this via
    /// `was_replayed` and `execute` returns the original outcome without
    /// touching limits, the audit chain, or the event bus again, per the
    /// idempotency contract in `spec.md` §8. The account lock(s) for
    /// every line's account are held for the duration so concurrent
    /// operations on the same account serialize.
    pub async fn execute(&self, request: OperationRequest) -> ProcessorResult<TransactionOutcome> {
        let account_ids: Vec<&str> = request
            .lines
            .iter()
            .map(|l| l.account_id.as_str())
            .collect();
        let _guards = self.lock_accounts(&account_ids).await;

        let primary = self
            .check_operable(&request.tenant_id, &request.primary_account_id)
            .await?;
        if let Some(limit_amount) = &request.limit_amount {
            self.check_limits(&primary, limit_amount).await?;
        }

        let reference = request
            .client_reference
            .clone()
            .unwrap_or_else(|| self.ids.next_id("tx"));
        let entry_id = self.ids.next_id("je");

        let new_entry = NewJournalEntry {
            id: entry_id,
            reference: reference.clone(),
            description: request.description.clone(),
            lines: request.lines,
            reverses: None,
        };

        let outcome = match self.ledger.post(&request.tenant_id, new_entry).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.events.publish(core_events::NewDomainEvent {
                    kind: "TRANSACTION_FAILED".to_string(),
                    tenant_id: request.tenant_id.clone(),
                    entity_kind: "account".to_string(),
                    entity_id: request.primary_account_id.clone(),
                    payload: serde_json::json!({"reference": reference, "error": e.to_string()}),
                });
                return Err(e.into());
            }
        };

        if outcome.was_replayed {
            return Ok(TransactionOutcome {
                entry: outcome.entry,
                client_reference: reference,
            });
        }
        let posted = outcome.entry;

        self.events.publish(core_events::NewDomainEvent {
            kind: "TRANSACTION_CREATED".to_string(),
            tenant_id: request.tenant_id.clone(),
            entity_kind: "account".to_string(),
            entity_id: request.primary_account_id.clone(),
            payload: serde_json::json!({"reference": reference}),
        });

        if let Some(limit_amount) = &request.limit_amount {
            let now = self.clock.now();
            self.limits
                .record_and_get_totals(&request.primary_account_id, limit_amount, now)
                .await;
        }

        let audit_result = self
            .audit
            .append(
                &request.tenant_id,
                AppendRequest {
                    event_kind: request.audit_event_kind.clone(),
                    subject_kind: "journal_entry".to_string(),
                    subject_id: posted.id.clone(),
                    actor: request.actor.clone(),
                    details: serde_json::json!({"reference": reference}),
                },
            )
            .await;

        self.events.publish(core_events::NewDomainEvent {
            kind: "TRANSACTION_POSTED".to_string(),
            tenant_id: request.tenant_id.clone(),
            entity_kind: "journal_entry".to_string(),
            entity_id: posted.id.clone(),
            payload: serde_json::json!({"reference": reference}),
        });

        if let Err(audit_err) = audit_result {
            return Err(ProcessorError::CommittedUnaudited(format!(
                "entry {} posted but audit append failed: {audit_err}",
                posted.id
            )));
        }

        Ok(TransactionOutcome {
            entry: posted,
            client_reference: reference,
        })
    }

    pub async fn deposit(
        &self,
        tenant_id: &str,
        actor: &str,
        account_id: &str,
        cash_account_id: &str,
        amount: MoneyValue,
        source_description: &str,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let zero = MoneyValue::zero(amount.currency().clone());
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: format!("deposit: {source_description}"),
            lines: vec![
                NewJournalLine {
                    account_id: cash_account_id.to_string(),
                    description: source_description.to_string(),
                    debit: amount.clone(),
                    credit: zero.clone(),
                },
                NewJournalLine {
                    account_id: account_id.to_string(),
                    description: "deposit".to_string(),
                    debit: zero,
                    credit: amount,
                },
            ],
            primary_account_id: account_id.to_string(),
            limit_amount: None,
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    pub async fn withdraw(
        &self,
        tenant_id: &str,
        actor: &str,
        account_id: &str,
        cash_account_id: &str,
        amount: MoneyValue,
        destination_description: &str,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let zero = MoneyValue::zero(amount.currency().clone());
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: format!("withdraw: {destination_description}"),
            lines: vec![
                NewJournalLine {
                    account_id: account_id.to_string(),
                    description: "withdrawal".to_string(),
                    debit: amount.clone(),
                    credit: zero.clone(),
                },
                NewJournalLine {
                    account_id: cash_account_id.to_string(),
                    description: destination_description.to_string(),
                    debit: zero,
                    credit: amount.clone(),
                },
            ],
            primary_account_id: account_id.to_string(),
            limit_amount: Some(amount),
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    /// Same-currency transfer. Cross-currency transfers go through
    /// [`TransactionProcessor::transfer_fx`].
    pub async fn transfer(
        &self,
        tenant_id: &str,
        actor: &str,
        from_account_id: &str,
        to_account_id: &str,
        amount: MoneyValue,
        description: &str,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let zero = MoneyValue::zero(amount.currency().clone());
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: description.to_string(),
            lines: vec![
                NewJournalLine {
                    account_id: from_account_id.to_string(),
                    description: description.to_string(),
                    debit: amount.clone(),
                    credit: zero.clone(),
                },
                NewJournalLine {
                    account_id: to_account_id.to_string(),
                    description: description.to_string(),
                    debit: zero,
                    credit: amount.clone(),
                },
            ],
            primary_account_id: from_account_id.to_string(),
            limit_amount: Some(amount),
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    /// Cross-currency transfer: `from_account_id` is debited the full
    /// `from_amount` and `to_account_id` is credited `to_amount`. Since the
    /// two legs are in different currencies, an `fx_account_id` suspense
    /// account carries both sides of the conversion so each currency
    /// balances independently on the one entry: it absorbs
    /// `from_amount - fx_residual` against the converted leg and funds the
    /// `to_amount` credit, with any leftover `fx_residual` posted to it
    /// separately as the realized FX gain/loss.
    #[allow(clippy::too_many_arguments)]
    pub async fn transfer_fx(
        &self,
        tenant_id: &str,
        actor: &str,
        from_account_id: &str,
        to_account_id: &str,
        from_amount: MoneyValue,
        to_amount: MoneyValue,
        fx_account_id: &str,
        fx_residual: MoneyValue,
        description: &str,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let from_zero = MoneyValue::zero(from_amount.currency().clone());
        let to_zero = MoneyValue::zero(to_amount.currency().clone());
        let converted = from_amount
            .sub(&fx_residual)
            .map_err(|e| ProcessorError::Validation(e.to_string()))?;

        let mut lines = vec![NewJournalLine {
            account_id: from_account_id.to_string(),
            description: description.to_string(),
            debit: from_amount.clone(),
            credit: from_zero.clone(),
        }];
        if !converted.is_zero() {
            lines.push(NewJournalLine {
                account_id: fx_account_id.to_string(),
                description: "fx conversion".to_string(),
                debit: from_zero.clone(),
                credit: converted,
            });
        }
        if !fx_residual.is_zero() {
            lines.push(NewJournalLine {
                account_id: fx_account_id.to_string(),
                description: "fx gain/loss residual".to_string(),
                debit: from_zero,
                credit: fx_residual,
            });
        }
        lines.push(NewJournalLine {
            account_id: fx_account_id.to_string(),
            description: "fx conversion".to_string(),
            debit: to_amount.clone(),
            credit: to_zero.clone(),
        });
        lines.push(NewJournalLine {
            account_id: to_account_id.to_string(),
            description: description.to_string(),
            debit: to_zero,
            credit: to_amount,
        });

        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: description.to_string(),
            lines,
            primary_account_id: from_account_id.to_string(),
            limit_amount: Some(from_amount),
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    /// A credit-account charge: debits the receivable (the account now
    /// owes the bank more), credits merchant/clearing. Category and
    /// merchant metadata are recorded by `core-credit`'s statement-cycle
    /// bookkeeping alongside this posting, not by the ledger entry itself.
    pub async fn charge(
        &self,
        tenant_id: &str,
        actor: &str,
        credit_account_id: &str,
        clearing_account_id: &str,
        amount: MoneyValue,
        description: &str,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let zero = MoneyValue::zero(amount.currency().clone());
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: description.to_string(),
            lines: vec![
                NewJournalLine {
                    account_id: credit_account_id.to_string(),
                    description: description.to_string(),
                    debit: amount.clone(),
                    credit: zero.clone(),
                },
                NewJournalLine {
                    account_id: clearing_account_id.to_string(),
                    description: description.to_string(),
                    debit: zero,
                    credit: amount.clone(),
                },
            ],
            primary_account_id: credit_account_id.to_string(),
            limit_amount: Some(amount),
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    pub async fn loan_disburse(
        &self,
        tenant_id: &str,
        actor: &str,
        loan_receivable_account_id: &str,
        target_account_id: &str,
        amount: MoneyValue,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let zero = MoneyValue::zero(amount.currency().clone());
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: "loan disbursement".to_string(),
            lines: vec![
                NewJournalLine {
                    account_id: loan_receivable_account_id.to_string(),
                    description: "loan disbursement".to_string(),
                    debit: amount.clone(),
                    credit: zero.clone(),
                },
                NewJournalLine {
                    account_id: target_account_id.to_string(),
                    description: "loan disbursement".to_string(),
                    debit: zero,
                    credit: amount,
                },
            ],
            primary_account_id: loan_receivable_account_id.to_string(),
            limit_amount: None,
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    /// Posts a loan payment already split by the loan engine's waterfall.
    /// Late fees, interest, and principal all reduce what the receivable
    /// records the customer as owing: a late fee's original assessment
    /// already credited fee income (`fee`) and interest was already
    /// credited to income when it accrued (`interest_accrual`), so
    /// collecting either here relieves the receivable rather than
    /// recognizing revenue a second time. Any portion may be zero; the
    /// total must not be.
    #[allow(clippy::too_many_arguments)]
    pub async fn loan_payment(
        &self,
        tenant_id: &str,
        actor: &str,
        source_account_id: &str,
        receivable_account_id: &str,
        late_fee_portion: MoneyValue,
        interest_portion: MoneyValue,
        principal_portion: MoneyValue,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let currency = principal_portion.currency().clone();
        let zero = MoneyValue::zero(currency);
        let total = late_fee_portion
            .add(&interest_portion)
            .and_then(|t| t.add(&principal_portion))
            .map_err(|e| ProcessorError::Internal(e.to_string()))?;
        if total.is_zero() {
            return Err(ProcessorError::Validation(
                "loan payment amount must be positive".to_string(),
            ));
        }
        let mut lines = vec![NewJournalLine {
            account_id: source_account_id.to_string(),
            description: "loan payment".to_string(),
            debit: total.clone(),
            credit: zero.clone(),
        }];
        if !late_fee_portion.is_zero() {
            lines.push(NewJournalLine {
                account_id: receivable_account_id.to_string(),
                description: "late fees".to_string(),
                debit: zero.clone(),
                credit: late_fee_portion,
            });
        }
        if !interest_portion.is_zero() {
            lines.push(NewJournalLine {
                account_id: receivable_account_id.to_string(),
                description: "accrued interest".to_string(),
                debit: zero.clone(),
                credit: interest_portion,
            });
        }
        if !principal_portion.is_zero() {
            lines.push(NewJournalLine {
                account_id: receivable_account_id.to_string(),
                description: "principal".to_string(),
                debit: zero,
                credit: principal_portion,
            });
        }
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: "loan payment".to_string(),
            lines,
            primary_account_id: source_account_id.to_string(),
            limit_amount: Some(total),
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    /// Posts a credit-account payment already split by the credit
    /// engine's allocation: debits the source account for the total and
    /// credits the credit receivable for all three portions. Fees were
    /// already credited to fee income when assessed (`fee`) and interest
    /// when it accrued (`interest_accrual`); paying them down only
    /// relieves the receivable, it does not recognize income again.
    #[allow(clippy::too_many_arguments)]
    pub async fn credit_payment(
        &self,
        tenant_id: &str,
        actor: &str,
        source_account_id: &str,
        credit_account_id: &str,
        to_fees: MoneyValue,
        to_interest: MoneyValue,
        to_principal: MoneyValue,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let currency = to_principal.currency().clone();
        let zero = MoneyValue::zero(currency);
        let total = to_fees
            .add(&to_interest)
            .and_then(|t| t.add(&to_principal))
            .map_err(|e| ProcessorError::Internal(e.to_string()))?;
        if total.is_zero() {
            return Err(ProcessorError::Validation(
                "credit payment amount must be positive".to_string(),
            ));
        }
        let mut lines = vec![NewJournalLine {
            account_id: source_account_id.to_string(),
            description: "credit payment".to_string(),
            debit: total.clone(),
            credit: zero.clone(),
        }];
        if !to_fees.is_zero() {
            lines.push(NewJournalLine {
                account_id: credit_account_id.to_string(),
                description: "fees".to_string(),
                debit: zero.clone(),
                credit: to_fees,
            });
        }
        if !to_interest.is_zero() {
            lines.push(NewJournalLine {
                account_id: credit_account_id.to_string(),
                description: "interest".to_string(),
                debit: zero.clone(),
                credit: to_interest,
            });
        }
        if !to_principal.is_zero() {
            lines.push(NewJournalLine {
                account_id: credit_account_id.to_string(),
                description: "principal".to_string(),
                debit: zero,
                credit: to_principal,
            });
        }
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: "credit payment".to_string(),
            lines,
            primary_account_id: source_account_id.to_string(),
            limit_amount: Some(total),
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    pub async fn interest_accrual(
        &self,
        tenant_id: &str,
        actor: &str,
        receivable_account_id: &str,
        income_account_id: &str,
        amount: MoneyValue,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let zero = MoneyValue::zero(amount.currency().clone());
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: "interest accrual".to_string(),
            lines: vec![
                NewJournalLine {
                    account_id: receivable_account_id.to_string(),
                    description: "interest accrual".to_string(),
                    debit: amount.clone(),
                    credit: zero.clone(),
                },
                NewJournalLine {
                    account_id: income_account_id.to_string(),
                    description: "interest accrual".to_string(),
                    debit: zero,
                    credit: amount,
                },
            ],
            primary_account_id: receivable_account_id.to_string(),
            limit_amount: None,
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }

    pub async fn fee(
        &self,
        tenant_id: &str,
        actor: &str,
        account_id: &str,
        fee_income_account_id: &str,
        amount: MoneyValue,
        reason: &str,
        client_reference: Option<String>,
    ) -> ProcessorResult<TransactionOutcome> {
        let zero = MoneyValue::zero(amount.currency().clone());
        self.execute(OperationRequest {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            client_reference,
            description: format!("fee: {reason}"),
            lines: vec![
                NewJournalLine {
                    account_id: account_id.to_string(),
                    description: reason.to_string(),
                    debit: amount.clone(),
                    credit: zero.clone(),
                },
                NewJournalLine {
                    account_id: fee_income_account_id.to_string(),
                    description: reason.to_string(),
                    debit: zero,
                    credit: amount,
                },
            ],
            primary_account_id: account_id.to_string(),
            limit_amount: None,
            audit_event_kind: "journal-posted".to_string(),
        })
        .await
    }
}
