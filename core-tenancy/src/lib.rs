#![deny(clippy::print_stdout, clippy::print_stderr)]

//! A tenant-scoped, encrypted record store.
//!
//! Every operation runs under a [`TenantContext`]; the store adds a tenant
//! tag on write and constrains reads by that tag, refusing operations when
//! no tenant is set unless the caller holds the cross-tenant capability
//! reserved for platform administration. A configurable set of PII field
//! names per table is transparently encrypted on write and decrypted on
//! read via an [`EnvelopeEncryptor`].

mod memory;
mod pii;

pub use memory::InMemoryTenantStorage;
pub use pii::{
    EncryptionAlgorithm, EncryptionEnvelope, EnvelopeEncryptor, KeyManager, LegacyXorEncryptor,
    NoopEncryptor, PiiRegistry, RotationReport,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type TenantId = String;
pub type Table = str;
pub type RecordId = String;
pub type Record = Map<String, Value>;

/// The explicit context value threaded through every call, in place of a
/// global "current tenant" singleton.
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
    /// Platform-administration capability permitting operations that cross
    /// tenant boundaries (e.g. key rotation across every tenant).
    cross_tenant: bool,
}

impl TenantContext {
    pub fn for_tenant(tenant_id: impl Into<TenantId>) -> Self {
        TenantContext {
            tenant_id: Some(tenant_id.into()),
            cross_tenant: false,
        }
    }

    pub fn cross_tenant_admin() -> Self {
        TenantContext {
            tenant_id: None,
            cross_tenant: true,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn is_cross_tenant(&self) -> bool {
        self.cross_tenant
    }

    fn require_tenant(&self) -> TenancyResult<&str> {
        self.tenant_id
            .as_deref()
            .ok_or(TenancyError::TenantIsolation("no tenant set on context"))
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TenancyError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(&'static str),
    #[error("encryption error: {0}")]
    Encryption(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type TenancyResult<T> = Result<T, TenancyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationStrategy {
    /// Shared table with a tenant tag on every row. Default; simplest.
    SharedTable,
    /// Schema/namespace per tenant; same API, stronger isolation.
    SchemaPerTenant,
    /// Database per tenant; routing happens below this API.
    DatabasePerTenant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A query predicate plus ordering/limit. `order_by` names a field (applied
/// after decryption if it happens to be a PII field, per the documented
/// "filters on PII fields do not use indexes" caveat).
pub struct Query<'a> {
    pub filter: Box<dyn Fn(&Record) -> bool + Send + Sync + 'a>,
    pub order_by: Option<&'a str>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl<'a> Query<'a> {
    pub fn all() -> Self {
        Query {
            filter: Box::new(|_| true),
            order_by: None,
            order: SortOrder::Ascending,
            limit: None,
        }
    }
}

/// The keyed record store exposed to `core-ledger`/`core-processor`.
#[async_trait]
pub trait TenantStorage: Send + Sync {
    async fn save(
        &self,
        ctx: &TenantContext,
        table: &str,
        id: &str,
        record: Record,
    ) -> TenancyResult<()>;

    async fn load(
        &self,
        ctx: &TenantContext,
        table: &str,
        id: &str,
    ) -> TenancyResult<Option<Record>>;

    async fn delete(&self, ctx: &TenantContext, table: &str, id: &str) -> TenancyResult<()>;

    async fn query(&self, ctx: &TenantContext, table: &str, query: Query<'_>)
    -> TenancyResult<Vec<Record>>;

    /// Begin a transactional scope grouping subsequent saves into one
    /// atomic unit, as `core-ledger::post` requires.
    async fn begin(&self, ctx: &TenantContext) -> TenancyResult<TransactionHandle>;

    async fn stage_save(
        &self,
        tx: &mut TransactionHandle,
        table: &str,
        id: &str,
        record: Record,
    );

    async fn commit(&self, tx: TransactionHandle) -> TenancyResult<()>;

    async fn rollback(&self, tx: TransactionHandle);
}

/// An in-progress transactional scope: buffered writes not yet visible to
/// other readers until [`TenantStorage::commit`].
pub struct TransactionHandle {
    pub(crate) tenant_id: TenantId,
    pub(crate) staged: Vec<(String, String, Record)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_without_tenant_requires_capability() {
        let ctx = TenantContext::default();
        assert!(ctx.require_tenant().is_err());
        let admin = TenantContext::cross_tenant_admin();
        assert!(admin.is_cross_tenant());
    }
}
