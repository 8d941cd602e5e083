#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Wires `core-ledger`, `core-audit`, `core-events`, `core-processor`,
//! `core-loan`, `core-credit` and `core-tenancy` into one `CoreEngine`
//! facade, reading its settings from [`config::CoreConfig`]. No new
//! financial logic lives here; this crate is integration glue plus the
//! end-to-end seed scenarios and invariant tests.

pub mod config;
pub mod error;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};

use std::sync::Arc;

use core_audit::{AppendRequest, AuditChain, InMemoryAuditChain};
use core_credit::CreditEngine;
use core_events::{InMemoryDomainEventBus, NewDomainEvent};
use core_ledger::{InMemoryLedger, JournalEntry, Ledger};
use core_loan::LoanEngine;
use core_processor::{Clock, IdGenerator, SystemClock, TransactionProcessor, UuidIdGenerator};
use core_tenancy::{InMemoryTenantStorage, PiiRegistry};

use config::AnyEncryptor;

/// Tables in `core-tenancy`'s storage that carry PII, and the fields on
/// each that must be encrypted at rest. Registered once at construction,
/// in place of the runtime reflection `spec.md` §9 flags as needing
/// re-architecture.
fn default_pii_registry() -> PiiRegistry {
    PiiRegistry::new()
        .register("customers", &["legal_name", "tax_id", "address", "date_of_birth"])
}

pub struct CoreEngine {
    pub ledger: Arc<dyn Ledger>,
    pub audit: Arc<dyn AuditChain>,
    pub events: Arc<InMemoryDomainEventBus>,
    pub processor: Arc<TransactionProcessor>,
    pub loans: Arc<LoanEngine>,
    pub credit: Arc<CreditEngine>,
    pub tenant_storage: Arc<InMemoryTenantStorage<AnyEncryptor>>,
    clock: Arc<dyn Clock>,
}

impl CoreEngine {
    /// Production wiring: `SystemClock` and a `Uuid`-backed id generator.
    pub fn new(config: CoreConfig) -> Self {
        Self::build(
            config,
            Arc::new(SystemClock),
            Arc::new(UuidIdGenerator),
            Arc::new(InMemoryAuditChain::new()),
        )
    }

    /// Test/replay wiring with an injected clock and id generator, used
    /// by integration tests that need deterministic dates and ids (S3's
    /// amortization schedule, S4's statement cycle).
    pub fn with_providers(config: CoreConfig, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self::build(config, clock, ids, Arc::new(InMemoryAuditChain::new()))
    }

    /// Test wiring that also takes the audit chain, so a test can keep its
    /// own concrete handle for fault injection (S6's storage-tampering
    /// scenario) while the engine only ever sees the trait object.
    pub fn with_providers_and_audit(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        audit: Arc<dyn AuditChain>,
    ) -> Self {
        Self::build(config, clock, ids, audit)
    }

    fn build(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        audit: Arc<dyn AuditChain>,
    ) -> Self {
        let ledger: Arc<dyn Ledger> = Arc::new(InMemoryLedger::new());
        let events = Arc::new(InMemoryDomainEventBus::new());
        let processor = Arc::new(TransactionProcessor::new(
            ledger.clone(),
            audit.clone(),
            events.clone(),
            clock.clone(),
            ids.clone(),
        ));
        let loans = Arc::new(LoanEngine::new(processor.clone(), clock.clone(), ids.clone()));
        let credit = Arc::new(CreditEngine::new(processor.clone(), clock.clone(), ids.clone()));
        let encryptor = config.build_encryptor();
        let tenant_storage = Arc::new(InMemoryTenantStorage::new(
            encryptor,
            default_pii_registry(),
            config.tenant_isolation,
        ));
        CoreEngine {
            ledger,
            audit,
            events,
            processor,
            loans,
            credit,
            tenant_storage,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Reverses a posted journal entry: the ledger computes the inverse
    /// lines, the reversal is audit-appended, and `TRANSACTION_REVERSED`
    /// is published, mirroring `TransactionProcessor::execute`'s own
    /// post/audit/publish sequence without building new lines by hand.
    pub async fn reverse_entry(
        &self,
        tenant_id: &str,
        entry_id: &str,
        actor: &str,
        reason: &str,
    ) -> CoreResult<JournalEntry> {
        let reversal_id = self.processor.ids().next_id("je");
        let reversal_reference = format!("reversal-of-{entry_id}");
        let reversed = self
            .ledger
            .reverse(tenant_id, entry_id, reversal_id, reversal_reference.clone(), reason)
            .await?;
        self.audit
            .append(
                tenant_id,
                AppendRequest {
                    event_kind: "journal-reversed".to_string(),
                    subject_kind: "journal_entry".to_string(),
                    subject_id: reversed.id.clone(),
                    actor: actor.to_string(),
                    details: serde_json::json!({"reason": reason, "reverses": entry_id}),
                },
            )
            .await?;
        self.events.publish(NewDomainEvent {
            kind: "TRANSACTION_REVERSED".to_string(),
            tenant_id: tenant_id.to_string(),
            entity_kind: "journal_entry".to_string(),
            entity_id: reversed.id.clone(),
            payload: serde_json::json!({"reference": reversal_reference}),
        });
        Ok(reversed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_ledger::{Account, AccountKind, AccountLimits, AccountStatus};
    use core_money::{Currency, MoneyValue};
    use core_processor::SequentialIdGenerator;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn reverse_entry_restores_the_prior_balance() {
        let engine = CoreEngine::with_providers(
            CoreConfig::default(),
            Arc::new(SystemClock),
            Arc::new(SequentialIdGenerator::default()),
        );
        for (id, kind) in [("cash", AccountKind::Asset), ("customer", AccountKind::Liability)] {
            engine
                .ledger
                .register_account(
                    "t1",
                    Account {
                        id: id.into(),
                        customer_id: "cust-1".into(),
                        product_ref: "checking".into(),
                        currency: Currency::usd(),
                        kind,
                        status: AccountStatus::Active,
                        created_at: chrono::Utc::now(),
                        limits: AccountLimits::default(),
                    },
                )
                .await
                .unwrap();
        }

        let outcome = engine
            .processor
            .deposit("t1", "teller-1", "customer", "cash", MoneyValue::new(dec!(100.00), Currency::usd()), "cash deposit", None)
            .await
            .unwrap();

        engine
            .reverse_entry("t1", &outcome.entry.id, "teller-1", "posted in error")
            .await
            .unwrap();

        let balance = engine
            .ledger
            .balance("t1", "customer", &Currency::usd(), None)
            .await
            .unwrap();
        assert!(balance.is_zero());
    }
}
