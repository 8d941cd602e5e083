//! Reference in-memory backend, composed in three layers as `spec.md` §9
//! prescribes in place of deep interface inheritance: a tenant wrapper
//! wraps a PII wrapper wraps a concrete backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::pii::{self, EnvelopeEncryptor, PiiRegistry};
use crate::{
    IsolationStrategy, Query, Record, SortOrder, TenancyError, TenancyResult, TenantContext,
    TenantStorage, TransactionHandle,
};

/// The innermost layer: every operation already carries an explicit
/// `tenant_id` and never interprets it (isolation is enforced one layer
/// up); this is where [`IsolationStrategy`] would route to a different
/// physical namespace/database.
#[async_trait]
trait RawBackend: Send + Sync {
    async fn save_raw(&self, tenant_id: &str, table: &str, id: &str, record: Record);
    async fn load_raw(&self, tenant_id: &str, table: &str, id: &str) -> Option<Record>;
    async fn delete_raw(&self, tenant_id: &str, table: &str, id: &str);
    async fn scan_raw(&self, tenant_id: &str, table: &str) -> Vec<(String, Record)>;
}

#[derive(Default)]
struct InMemoryRawBackend {
    data: Mutex<HashMap<(String, String), HashMap<String, Record>>>,
}

#[async_trait]
impl RawBackend for InMemoryRawBackend {
    async fn save_raw(&self, tenant_id: &str, table: &str, id: &str, record: Record) {
        let mut guard = self.data.lock().await;
        guard
            .entry((tenant_id.to_string(), table.to_string()))
            .or_default()
            .insert(id.to_string(), record);
    }

    async fn load_raw(&self, tenant_id: &str, table: &str, id: &str) -> Option<Record> {
        let guard = self.data.lock().await;
        guard
            .get(&(tenant_id.to_string(), table.to_string()))
            .and_then(|t| t.get(id))
            .cloned()
    }

    async fn delete_raw(&self, tenant_id: &str, table: &str, id: &str) {
        let mut guard = self.data.lock().await;
        if let Some(t) = guard.get_mut(&(tenant_id.to_string(), table.to_string())) {
            t.remove(id);
        }
    }

    async fn scan_raw(&self, tenant_id: &str, table: &str) -> Vec<(String, Record)> {
        let guard = self.data.lock().await;
        guard
            .get(&(tenant_id.to_string(), table.to_string()))
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

/// Middle layer: encrypts/decrypts the table's registered PII fields
/// transparently around an inner [`RawBackend`].
struct PiiLayer<B: RawBackend, E: EnvelopeEncryptor> {
    inner: B,
    registry: PiiRegistry,
    encryptor: E,
}

impl<B: RawBackend, E: EnvelopeEncryptor> PiiLayer<B, E> {
    fn encrypt_record(&self, tenant_id: &str, table: &str, mut record: Record) -> TenancyResult<Record> {
        for field in self.registry.pii_fields(table) {
            if let Some(value) = record.get(&field) {
                if !pii::is_encrypted(value) {
                    let cipher = self
                        .encryptor
                        .encrypt_field(tenant_id, table, &field, value)?;
                    record.insert(field, serde_json::Value::String(format!("{}{}", pii::ENC_PREFIX, cipher)));
                }
            }
        }
        Ok(record)
    }

    fn decrypt_record(&self, tenant_id: &str, table: &str, mut record: Record) -> TenancyResult<Record> {
        for field in self.registry.pii_fields(table) {
            if let Some(value) = record.get(&field) {
                if let serde_json::Value::String(s) = value {
                    if s.starts_with(pii::ENC_PREFIX) {
                        let plain = self.encryptor.decrypt_field(
                            tenant_id,
                            table,
                            &field,
                            pii::strip_prefix(s),
                        )?;
                        record.insert(field, plain);
                    }
                }
            }
        }
        Ok(record)
    }
}

/// Outermost layer: enforces [`TenantContext`] rules and implements the
/// public [`TenantStorage`] contract.
pub struct InMemoryTenantStorage<E: EnvelopeEncryptor> {
    layer: Arc<PiiLayer<InMemoryRawBackend, E>>,
    #[allow(dead_code)]
    isolation: IsolationStrategy,
}

impl<E: EnvelopeEncryptor> InMemoryTenantStorage<E> {
    pub fn new(encryptor: E, registry: PiiRegistry, isolation: IsolationStrategy) -> Self {
        InMemoryTenantStorage {
            layer: Arc::new(PiiLayer {
                inner: InMemoryRawBackend::default(),
                registry,
                encryptor,
            }),
            isolation,
        }
    }

    fn resolve_tenant<'a>(&self, ctx: &'a TenantContext, override_tenant: Option<&'a str>) -> TenancyResult<&'a str> {
        match (ctx.tenant_id(), ctx.is_cross_tenant(), override_tenant) {
            (Some(t), _, None) => Ok(t),
            (_, true, Some(t)) => Ok(t),
            (Some(t), _, Some(o)) if t == o => Ok(t),
            (None, false, _) => Err(TenancyError::TenantIsolation("no tenant set on context")),
            _ => Err(TenancyError::TenantIsolation(
                "cross-tenant access requires the cross-tenant capability",
            )),
        }
    }

    /// Performs a key-rotation pass across every record of `table` for
    /// `tenant_id`, re-encrypting PII fields under `new_encryptor`.
    /// Restartable: a record whose fields are already plaintext or already
    /// encrypted under the new key is left untouched on a re-run.
    pub async fn rotate_table<E2: EnvelopeEncryptor>(
        &self,
        tenant_id: &str,
        table: &str,
        new_encryptor: &E2,
    ) -> pii::RotationReport {
        let mut report = pii::RotationReport::default();
        let rows = self.layer.inner.scan_raw(tenant_id, table).await;
        for (id, encrypted_record) in rows {
            let decrypted = match self.layer.decrypt_record(tenant_id, table, encrypted_record) {
                Ok(r) => r,
                Err(e) => {
                    report.errors.push(format!("{id}: {e}"));
                    continue;
                }
            };
            let mut re_encrypted = decrypted.clone();
            let mut fields_rotated = 0usize;
            for field in self.layer.registry.pii_fields(table) {
                if let Some(value) = decrypted.get(&field) {
                    match new_encryptor.encrypt_field(tenant_id, table, &field, value) {
                        Ok(cipher) => {
                            re_encrypted.insert(
                                field,
                                serde_json::Value::String(format!("{}{}", pii::ENC_PREFIX, cipher)),
                            );
                            fields_rotated += 1;
                        }
                        Err(e) => report.errors.push(format!("{id}.{field}: {e}")),
                    }
                }
            }
            self.layer.inner.save_raw(tenant_id, table, &id, re_encrypted).await;
            report.rotated_records += 1;
            report.rotated_fields += fields_rotated;
        }
        report
    }
}

#[async_trait]
impl<E: EnvelopeEncryptor> TenantStorage for InMemoryTenantStorage<E> {
    async fn save(&self, ctx: &TenantContext, table: &str, id: &str, record: Record) -> TenancyResult<()> {
        let tenant_id = self.resolve_tenant(ctx, None)?.to_string();
        let encrypted = self.layer.encrypt_record(&tenant_id, table, record)?;
        self.layer.inner.save_raw(&tenant_id, table, id, encrypted).await;
        Ok(())
    }

    async fn load(&self, ctx: &TenantContext, table: &str, id: &str) -> TenancyResult<Option<Record>> {
        let tenant_id = self.resolve_tenant(ctx, None)?.to_string();
        match self.layer.inner.load_raw(&tenant_id, table, id).await {
            Some(record) => Ok(Some(self.layer.decrypt_record(&tenant_id, table, record)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, ctx: &TenantContext, table: &str, id: &str) -> TenancyResult<()> {
        let tenant_id = self.resolve_tenant(ctx, None)?.to_string();
        self.layer.inner.delete_raw(&tenant_id, table, id).await;
        Ok(())
    }

    async fn query(&self, ctx: &TenantContext, table: &str, query: Query<'_>) -> TenancyResult<Vec<Record>> {
        let tenant_id = self.resolve_tenant(ctx, None)?.to_string();
        let rows = self.layer.inner.scan_raw(&tenant_id, table).await;
        let mut decrypted = Vec::with_capacity(rows.len());
        for (_, record) in rows {
            decrypted.push(self.layer.decrypt_record(&tenant_id, table, record)?);
        }
        // Filters on PII fields run here, after decryption, and therefore
        // never benefit from an index -- documented per `spec.md` §4.2.
        let mut matched: Vec<Record> = decrypted.into_iter().filter(|r| (query.filter)(r)).collect();
        if let Some(key) = query.order_by {
            matched.sort_by(|a, b| {
                let av = a.get(key).map(|v| v.to_string()).unwrap_or_default();
                let bv = b.get(key).map(|v| v.to_string()).unwrap_or_default();
                match query.order {
                    SortOrder::Ascending => av.cmp(&bv),
                    SortOrder::Descending => bv.cmp(&av),
                }
            });
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn begin(&self, ctx: &TenantContext) -> TenancyResult<TransactionHandle> {
        let tenant_id = self.resolve_tenant(ctx, None)?.to_string();
        Ok(TransactionHandle {
            tenant_id,
            staged: Vec::new(),
        })
    }

    async fn stage_save(&self, tx: &mut TransactionHandle, table: &str, id: &str, record: Record) {
        tx.staged.push((table.to_string(), id.to_string(), record));
    }

    async fn commit(&self, tx: TransactionHandle) -> TenancyResult<()> {
        for (table, id, record) in tx.staged {
            let encrypted = self.layer.encrypt_record(&tx.tenant_id, &table, record)?;
            self.layer.inner.save_raw(&tx.tenant_id, &table, &id, encrypted).await;
        }
        Ok(())
    }

    async fn rollback(&self, _tx: TransactionHandle) {
        // Staged writes were never applied to the backend; discarding the
        // handle is sufficient.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pii::{EncryptionAlgorithm, LegacyXorEncryptor};
    use serde_json::json;

    fn store() -> InMemoryTenantStorage<LegacyXorEncryptor> {
        let encryptor = LegacyXorEncryptor::new(EncryptionAlgorithm::AuthenticatedAead, "k1", "test-key");
        let registry = PiiRegistry::new().register("accounts", &["owner_name"]);
        InMemoryTenantStorage::new(encryptor, registry, IsolationStrategy::SharedTable)
    }

    #[tokio::test]
    async fn save_and_load_round_trips_and_decrypts() {
        let store = store();
        let ctx = TenantContext::for_tenant("tenant-a");
        let mut record = Record::new();
        record.insert("owner_name".into(), json!("Ada Lovelace"));
        record.insert("currency".into(), json!("USD"));
        store.save(&ctx, "accounts", "acc-1", record).await.unwrap();

        let loaded = store.load(&ctx, "accounts", "acc-1").await.unwrap().unwrap();
        assert_eq!(loaded.get("owner_name").unwrap(), &json!("Ada Lovelace"));
    }

    #[tokio::test]
    async fn cross_tenant_reads_are_refused() {
        let store = store();
        let ctx_a = TenantContext::for_tenant("tenant-a");
        store.save(&ctx_a, "accounts", "acc-1", Record::new()).await.unwrap();

        let ctx_b = TenantContext::for_tenant("tenant-b");
        let result = store.load(&ctx_b, "accounts", "acc-1").await.unwrap();
        assert!(result.is_none());

        let no_ctx = TenantContext::default();
        assert!(matches!(
            store.save(&no_ctx, "accounts", "x", Record::new()).await,
            Err(TenancyError::TenantIsolation(_))
        ));
    }

    #[tokio::test]
    async fn transaction_buffers_until_commit() {
        let store = store();
        let ctx = TenantContext::for_tenant("tenant-a");
        let mut tx = store.begin(&ctx).await.unwrap();
        store.stage_save(&mut tx, "accounts", "acc-1", Record::new()).await;
        // Not visible yet.
        assert!(store.load(&ctx, "accounts", "acc-1").await.unwrap().is_none());
        store.commit(tx).await.unwrap();
        assert!(store.load(&ctx, "accounts", "acc-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn key_rotation_re_encrypts_pii_fields() {
        let store = store();
        let ctx = TenantContext::for_tenant("tenant-a");
        let mut record = Record::new();
        record.insert("owner_name".into(), json!("Grace Hopper"));
        store.save(&ctx, "accounts", "acc-1", record).await.unwrap();

        let new_encryptor = LegacyXorEncryptor::new(EncryptionAlgorithm::AuthenticatedAead, "k2", "new-key");
        let report = store.rotate_table("tenant-a", "accounts", &new_encryptor).await;
        assert_eq!(report.rotated_records, 1);
        assert_eq!(report.rotated_fields, 1);
        assert!(report.errors.is_empty());

        let loaded = store.load(&ctx, "accounts", "acc-1").await.unwrap().unwrap();
        assert_eq!(loaded.get("owner_name").unwrap(), &json!("Grace Hopper"));
    }
}
