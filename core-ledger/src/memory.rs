use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_money::{Currency, MoneyValue};
use tokio::sync::Mutex;

use crate::types::{validate_new_entry, EntryState, JournalEntryLine};
use crate::{
    Account, AccountStatus, JournalEntry, Ledger, LedgerError, LedgerResult, NewJournalEntry,
    PostOutcome,
};

#[derive(Default)]
struct TenantState {
    accounts: HashMap<String, Account>,
    entries: HashMap<String, JournalEntry>,
    reference_index: HashMap<String, String>,
    next_sequence: u64,
}

impl TenantState {
    fn next_posting_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

/// Reference implementation: one ledger per tenant, each guarded by its
/// own lock so `post` is a critical section scoped to the tenant while
/// different tenants post concurrently.
#[derive(Default)]
pub struct InMemoryLedger {
    tenants: Mutex<HashMap<String, Arc<Mutex<TenantState>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn state_for(&self, tenant_id: &str) -> Arc<Mutex<TenantState>> {
        let mut map = self.tenants.lock().await;
        map.entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TenantState::default())))
            .clone()
    }

    fn lines_match(a: &[JournalEntryLine], b: &NewJournalEntry) -> bool {
        if a.len() != b.lines.len() {
            return false;
        }
        a.iter().zip(b.lines.iter()).all(|(existing, candidate)| {
            existing.account_id == candidate.account_id
                && existing.debit == candidate.debit
                && existing.credit == candidate.credit
        })
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn register_account(&self, tenant_id: &str, account: Account) -> LedgerResult<Account> {
        let state = self.state_for(tenant_id).await;
        let mut guard = state.lock().await;
        if guard.accounts.contains_key(&account.id) {
            return Err(LedgerError::Conflict(format!(
                "account {} already exists",
                account.id
            )));
        }
        guard.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn get_account(&self, tenant_id: &str, account_id: &str) -> LedgerResult<Account> {
        let state = self.state_for(tenant_id).await;
        let guard = state.lock().await;
        guard
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))
    }

    async fn set_account_status(
        &self,
        tenant_id: &str,
        account_id: &str,
        status: AccountStatus,
    ) -> LedgerResult<Account> {
        let state = self.state_for(tenant_id).await;
        let mut guard = state.lock().await;
        let account = guard
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))?;
        account.status = status;
        Ok(account.clone())
    }

    async fn post(&self, tenant_id: &str, entry: NewJournalEntry) -> LedgerResult<PostOutcome> {
        let state = self.state_for(tenant_id).await;
        let mut guard = state.lock().await;

        if let Some(existing_id) = guard.reference_index.get(&entry.reference).cloned() {
            let existing = guard
                .entries
                .get(&existing_id)
                .cloned()
                .ok_or_else(|| LedgerError::Internal("reference index points nowhere".into()))?;
            return if Self::lines_match(&existing.lines, &entry) {
                Ok(PostOutcome { entry: existing, was_replayed: true })
            } else {
                Err(LedgerError::Conflict(format!(
                    "reference {} was already posted with different lines",
                    entry.reference
                )))
            };
        }

        validate_new_entry(&entry)?;
        for line in &entry.lines {
            if !guard.accounts.contains_key(&line.account_id) {
                return Err(LedgerError::NotFound(format!(
                    "account {} referenced by journal line",
                    line.account_id
                )));
            }
        }

        let sequence = guard.next_posting_sequence();
        let posted_at = Utc::now();
        let lines: Vec<JournalEntryLine> = entry
            .lines
            .into_iter()
            .map(|l| JournalEntryLine {
                account_id: l.account_id,
                description: l.description,
                debit: l.debit,
                credit: l.credit,
                posting_sequence: sequence,
            })
            .collect();

        let posted = JournalEntry {
            id: entry.id,
            reference: entry.reference.clone(),
            description: entry.description,
            state: EntryState::Posted,
            lines,
            reverses: entry.reverses,
            reversed_by: None,
            posted_at: Some(posted_at),
            posting_sequence: Some(sequence),
        };

        if !posted.is_balanced()? {
            // next_sequence already advanced; sequence numbers are allowed
            // to have gaps from rejected candidates, only posted entries
            // must be contiguous among themselves, which this path does
            // not violate since nothing was inserted.
            return Err(LedgerError::Validation(
                "journal entry does not balance per currency".into(),
            ));
        }

        guard
            .reference_index
            .insert(entry.reference.clone(), posted.id.clone());
        guard.entries.insert(posted.id.clone(), posted.clone());
        Ok(PostOutcome { entry: posted, was_replayed: false })
    }

    async fn reverse(
        &self,
        tenant_id: &str,
        entry_id: &str,
        reversal_id: String,
        reversal_reference: String,
        reason: &str,
    ) -> LedgerResult<JournalEntry> {
        let state = self.state_for(tenant_id).await;
        let original = {
            let guard = state.lock().await;
            guard
                .entries
                .get(entry_id)
                .cloned()
                .ok_or_else(|| LedgerError::NotFound(format!("journal entry {entry_id}")))?
        };
        if original.state != EntryState::Posted {
            return Err(LedgerError::Validation(format!(
                "entry {entry_id} is not posted and cannot be reversed"
            )));
        }
        if original.reversed_by.is_some() {
            return Err(LedgerError::Conflict(format!(
                "entry {entry_id} was already reversed"
            )));
        }

        let reversal_lines: Vec<crate::types::NewJournalLine> = original
            .lines
            .iter()
            .map(|l| crate::types::NewJournalLine {
                account_id: l.account_id.clone(),
                description: format!("reversal ({reason}): {}", l.description),
                debit: l.credit.clone(),
                credit: l.debit.clone(),
            })
            .collect();

        let reversal_request = NewJournalEntry {
            id: reversal_id,
            reference: reversal_reference,
            description: format!("reversal of {entry_id}: {reason}"),
            lines: reversal_lines,
            reverses: Some(entry_id.to_string()),
        };

        let reversal_entry = self.post(tenant_id, reversal_request).await?.entry;

        let state = self.state_for(tenant_id).await;
        let mut guard = state.lock().await;
        if let Some(original) = guard.entries.get_mut(entry_id) {
            original.state = EntryState::Reversed;
            original.reversed_by = Some(reversal_entry.id.clone());
        }
        Ok(reversal_entry)
    }

    async fn get_entry(&self, tenant_id: &str, entry_id: &str) -> LedgerResult<JournalEntry> {
        let state = self.state_for(tenant_id).await;
        let guard = state.lock().await;
        guard
            .entries
            .get(entry_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("journal entry {entry_id}")))
    }

    async fn balance(
        &self,
        tenant_id: &str,
        account_id: &str,
        currency: &Currency,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<MoneyValue> {
        let state = self.state_for(tenant_id).await;
        let guard = state.lock().await;
        let account = guard
            .accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))?;

        let mut total = MoneyValue::zero(currency.clone());
        for entry in guard.entries.values() {
            if entry.state == EntryState::Pending {
                continue;
            }
            if let Some(cutoff) = as_of {
                if entry.posted_at.map(|t| t > cutoff).unwrap_or(true) {
                    continue;
                }
            }
            for line in &entry.lines {
                if line.account_id != account_id {
                    continue;
                }
                if line.debit.currency() != currency {
                    continue;
                }
                let delta = line
                    .signed_delta(account.kind)
                    .map_err(|e| LedgerError::Internal(e.to_string()))?;
                total = total
                    .add(&delta)
                    .map_err(|e| LedgerError::Internal(e.to_string()))?;
            }
        }
        Ok(total)
    }

    async fn transactions(
        &self,
        tenant_id: &str,
        account_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let state = self.state_for(tenant_id).await;
        let guard = state.lock().await;
        let mut matching: Vec<JournalEntry> = guard
            .entries
            .values()
            .filter(|e| e.lines.iter().any(|l| l.account_id == account_id))
            .filter(|e| {
                let ts = e.posted_at;
                match (ts, start, end) {
                    (Some(t), Some(s), Some(en)) => t >= s && t <= en,
                    (Some(t), Some(s), None) => t >= s,
                    (Some(t), None, Some(en)) => t <= en,
                    _ => true,
                }
            })
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.posting_sequence.unwrap_or(0));
        Ok(matching)
    }

    /// Sums every posted line's `debit - credit` in `currency`, the same
    /// sign for every account regardless of its normal balance side. A
    /// balanced ledger nets to zero here by construction, since `post`
    /// only ever accepts entries that already balance per currency; this
    /// is the cross-account check that no entry slipped through outside
    /// that path (e.g. a corrupted store).
    async fn trial_balance(
        &self,
        tenant_id: &str,
        currency: &Currency,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<MoneyValue> {
        let state = self.state_for(tenant_id).await;
        let guard = state.lock().await;
        let mut total = MoneyValue::zero(currency.clone());
        for entry in guard.entries.values() {
            if entry.state == EntryState::Pending {
                continue;
            }
            if let Some(cutoff) = as_of {
                if entry.posted_at.map(|t| t > cutoff).unwrap_or(true) {
                    continue;
                }
            }
            for line in &entry.lines {
                if line.debit.currency() != currency {
                    continue;
                }
                let delta = line
                    .debit
                    .sub(&line.credit)
                    .map_err(|e| LedgerError::Internal(e.to_string()))?;
                total = total
                    .add(&delta)
                    .map_err(|e| LedgerError::Internal(e.to_string()))?;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountKind, AccountLimits};
    use core_money::Currency;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn account(id: &str, kind: AccountKind) -> Account {
        Account {
            id: id.to_string(),
            customer_id: "cust-1".to_string(),
            product_ref: "prod-1".to_string(),
            currency: Currency::usd(),
            kind,
            status: AccountStatus::Active,
            created_at: Utc::now(),
            limits: AccountLimits::default(),
        }
    }

    fn line(account_id: &str, debit: &str, credit: &str) -> crate::types::NewJournalLine {
        crate::types::NewJournalLine {
            account_id: account_id.to_string(),
            description: "line".to_string(),
            debit: MoneyValue::new(debit.parse().unwrap(), Currency::usd()),
            credit: MoneyValue::new(credit.parse().unwrap(), Currency::usd()),
        }
    }

    async fn setup() -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        ledger
            .register_account("t1", account("cash", AccountKind::Asset))
            .await
            .unwrap();
        ledger
            .register_account("t1", account("customer", AccountKind::Liability))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn deposit_balances_both_accounts() {
        let ledger = setup().await;
        let entry = NewJournalEntry {
            id: "e1".into(),
            reference: "ref-1".into(),
            description: "deposit".into(),
            lines: vec![
                line("cash", "100.00", "0"),
                line("customer", "0", "100.00"),
            ],
            reverses: None,
        };
        let outcome = ledger.post("t1", entry).await.unwrap();
        assert!(!outcome.was_replayed);
        let posted = outcome.entry;
        assert_eq!(posted.posting_sequence, Some(1));

        let cash_balance = ledger.balance("t1", "cash", &Currency::usd(), None).await.unwrap();
        assert_eq!(cash_balance.amount(), dec!(100.00));
        let customer_balance = ledger
            .balance("t1", "customer", &Currency::usd(), None)
            .await
            .unwrap();
        assert_eq!(customer_balance.amount(), dec!(100.00));

        let trial = ledger.trial_balance("t1", &Currency::usd(), None).await.unwrap();
        // Asset balance (+100) minus liability balance counted negatively
        // in the trial sum would be nonzero if signs were wrong; the sum
        // of *signed* balances (asset debit-normal, liability
        // credit-normal) over a balanced entry is always zero.
        assert_eq!(trial.amount(), dec!(0));
    }

    #[tokio::test]
    async fn unbalanced_entry_is_rejected() {
        let ledger = setup().await;
        let entry = NewJournalEntry {
            id: "e1".into(),
            reference: "ref-1".into(),
            description: "bad".into(),
            lines: vec![
                line("cash", "100.00", "0"),
                line("customer", "0", "50.00"),
            ],
            reverses: None,
        };
        let result = ledger.post("t1", entry).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn replaying_same_reference_returns_original_entry() {
        let ledger = setup().await;
        let build = || NewJournalEntry {
            id: "e1".into(),
            reference: "ref-1".into(),
            description: "deposit".into(),
            lines: vec![
                line("cash", "100.00", "0"),
                line("customer", "0", "100.00"),
            ],
            reverses: None,
        };
        let first = ledger.post("t1", build()).await.unwrap();
        assert!(!first.was_replayed);
        let second = ledger.post("t1", build()).await.unwrap();
        assert!(second.was_replayed);
        assert_eq!(first.entry.id, second.entry.id);
        assert_eq!(first.entry.posting_sequence, second.entry.posting_sequence);

        let entries = ledger.transactions("t1", "cash", None, None).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn reversing_builds_a_swapped_linked_entry() {
        let ledger = setup().await;
        let entry = NewJournalEntry {
            id: "e1".into(),
            reference: "ref-1".into(),
            description: "deposit".into(),
            lines: vec![
                line("cash", "100.00", "0"),
                line("customer", "0", "100.00"),
            ],
            reverses: None,
        };
        ledger.post("t1", entry).await.unwrap();
        let reversal = ledger
            .reverse("t1", "e1", "e1-rev".into(), "ref-1-rev".into(), "correction")
            .await
            .unwrap();
        assert_eq!(reversal.reverses, Some("e1".to_string()));

        let original = ledger.get_entry("t1", "e1").await.unwrap();
        assert_eq!(original.state, EntryState::Reversed);
        assert_eq!(original.reversed_by, Some("e1-rev".to_string()));

        let cash_balance = ledger.balance("t1", "cash", &Currency::usd(), None).await.unwrap();
        assert_eq!(cash_balance.amount(), dec!(0));

        let again = ledger
            .reverse("t1", "e1", "e1-rev-2".into(), "ref-1-rev-2".into(), "twice")
            .await;
        assert!(matches!(again, Err(LedgerError::Conflict(_))));
    }
}
