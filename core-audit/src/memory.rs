use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    compute_hash, AppendRequest, AuditChain, AuditLogError, AuditRecord, AuditResult,
    VerifyOutcome, GENESIS_HASH,
};

#[derive(Default)]
struct TenantChain {
    records: Vec<AuditRecord>,
    poisoned: bool,
}

/// Reference implementation: one append-only vector per tenant, each
/// guarded by its own lock so appends are serialized per tenant while
/// different tenants proceed in parallel.
#[derive(Default)]
pub struct InMemoryAuditChain {
    chains: Mutex<HashMap<String, Arc<Mutex<TenantChain>>>>,
}

impl InMemoryAuditChain {
    pub fn new() -> Self {
        Self::default()
    }

    async fn chain_for(&self, tenant_id: &str) -> Arc<Mutex<TenantChain>> {
        let mut map = self.chains.lock().await;
        map.entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TenantChain::default())))
            .clone()
    }

    /// Test/operator hook modeling storage-level tampering (`spec.md`
    /// scenario S6: "Overwrite record 5's details in storage"). Bypasses
    /// the hash-chain machinery entirely, as a real storage corruption
    /// would.
    pub async fn debug_corrupt(&self, tenant_id: &str, sequence: u64, details: serde_json::Value) {
        let chain = self.chain_for(tenant_id).await;
        let mut guard = chain.lock().await;
        if let Some(record) = guard
            .records
            .iter_mut()
            .find(|r| r.sequence == sequence)
        {
            record.details = details;
        }
    }

    /// Test hook modeling a partial write: a sequence number consumed but
    /// no hash ever persisted, which must poison the chain per `spec.md`
    /// §4.3's failure model.
    pub async fn debug_poison(&self, tenant_id: &str) {
        let chain = self.chain_for(tenant_id).await;
        let mut guard = chain.lock().await;
        guard.poisoned = true;
    }
}

#[async_trait]
impl AuditChain for InMemoryAuditChain {
    async fn append(&self, tenant_id: &str, request: AppendRequest) -> AuditResult<AuditRecord> {
        if request.event_kind.trim().is_empty() || request.actor.trim().is_empty() {
            return Err(AuditLogError::Validation(
                "event_kind and actor must not be empty".into(),
            ));
        }
        let chain = self.chain_for(tenant_id).await;
        let mut guard = chain.lock().await;
        if guard.poisoned {
            return Err(AuditLogError::Poisoned(tenant_id.to_string()));
        }
        let sequence = guard.records.last().map(|r| r.sequence + 1).unwrap_or(1);
        let previous_hash = guard
            .records
            .last()
            .map(|r| r.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let timestamp = Utc::now();
        let hash = compute_hash(
            sequence,
            &timestamp,
            &request.event_kind,
            &request.subject_kind,
            &request.subject_id,
            &request.actor,
            &request.details,
            &previous_hash,
        );
        let record = AuditRecord {
            tenant_id: tenant_id.to_string(),
            sequence,
            timestamp,
            event_kind: request.event_kind,
            subject_kind: request.subject_kind,
            subject_id: request.subject_id,
            actor: request.actor,
            details: request.details,
            previous_hash,
            hash,
        };
        guard.records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, tenant_id: &str, sequence: u64) -> AuditResult<Option<AuditRecord>> {
        let chain = self.chain_for(tenant_id).await;
        let guard = chain.lock().await;
        Ok(guard.records.iter().find(|r| r.sequence == sequence).cloned())
    }

    async fn range(&self, tenant_id: &str, from: u64, to: u64) -> AuditResult<Vec<AuditRecord>> {
        let chain = self.chain_for(tenant_id).await;
        let guard = chain.lock().await;
        Ok(guard
            .records
            .iter()
            .filter(|r| r.sequence >= from && r.sequence <= to)
            .cloned()
            .collect())
    }

    async fn verify(
        &self,
        tenant_id: &str,
        from: Option<u64>,
        to: Option<u64>,
    ) -> AuditResult<VerifyOutcome> {
        let chain = self.chain_for(tenant_id).await;
        let guard = chain.lock().await;
        if guard.poisoned {
            return Ok(VerifyOutcome {
                valid: false,
                first_broken_sequence: guard.records.last().map(|r| r.sequence + 1),
            });
        }
        let from = from.unwrap_or(1);
        let to = to.unwrap_or_else(|| guard.records.last().map(|r| r.sequence).unwrap_or(0));
        let mut expected_previous = if from <= 1 {
            GENESIS_HASH.to_string()
        } else {
            guard
                .records
                .iter()
                .find(|r| r.sequence == from - 1)
                .map(|r| r.hash.clone())
                .unwrap_or_else(|| GENESIS_HASH.to_string())
        };
        for record in guard.records.iter().filter(|r| r.sequence >= from && r.sequence <= to) {
            if record.previous_hash != expected_previous {
                return Ok(VerifyOutcome {
                    valid: false,
                    first_broken_sequence: Some(record.sequence),
                });
            }
            let recomputed = compute_hash(
                record.sequence,
                &record.timestamp,
                &record.event_kind,
                &record.subject_kind,
                &record.subject_id,
                &record.actor,
                &record.details,
                &record.previous_hash,
            );
            if recomputed != record.hash {
                return Ok(VerifyOutcome {
                    valid: false,
                    first_broken_sequence: Some(record.sequence),
                });
            }
            expected_previous = record.hash.clone();
        }
        Ok(VerifyOutcome {
            valid: true,
            first_broken_sequence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(kind: &str) -> AppendRequest {
        AppendRequest {
            event_kind: kind.to_string(),
            subject_kind: "account".to_string(),
            subject_id: "acc-1".to_string(),
            actor: "system".to_string(),
            details: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn appends_form_an_unbroken_chain() {
        let chain = InMemoryAuditChain::new();
        let r1 = chain.append("t1", req("journal-posted")).await.unwrap();
        let r2 = chain.append("t1", req("journal-posted")).await.unwrap();
        assert_eq!(r1.previous_hash, GENESIS_HASH);
        assert_eq!(r2.previous_hash, r1.hash);
        assert_eq!(r1.sequence, 1);
        assert_eq!(r2.sequence, 2);
    }

    #[tokio::test]
    async fn sequences_are_independent_per_tenant() {
        let chain = InMemoryAuditChain::new();
        chain.append("t1", req("k")).await.unwrap();
        let r = chain.append("t2", req("k")).await.unwrap();
        assert_eq!(r.sequence, 1);
        assert_eq!(r.previous_hash, GENESIS_HASH);
    }

    #[tokio::test]
    async fn verify_detects_tampering_at_the_correct_sequence() {
        let chain = InMemoryAuditChain::new();
        for i in 0..10 {
            chain.append("t1", req(&format!("event-{i}"))).await.unwrap();
        }
        let before = chain.verify("t1", None, None).await.unwrap();
        assert!(before.valid);

        chain.debug_corrupt("t1", 5, serde_json::json!({"tampered": true})).await;
        let after = chain.verify("t1", None, None).await.unwrap();
        assert!(!after.valid);
        assert_eq!(after.first_broken_sequence, Some(5));
    }

    #[tokio::test]
    async fn poisoned_chain_refuses_further_appends() {
        let chain = InMemoryAuditChain::new();
        chain.append("t1", req("k")).await.unwrap();
        chain.debug_poison("t1").await;
        let result = chain.append("t1", req("k")).await;
        assert!(matches!(result, Err(AuditLogError::Poisoned(_))));
    }
}
