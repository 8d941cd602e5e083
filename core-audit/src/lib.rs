#![deny(clippy::print_stdout, clippy::print_stderr)]

//! A per-tenant, hash-chained, append-only audit log.
//!
//! Each record's hash is computed over a canonical serialization of
//! `(sequence, timestamp, event_kind, subject, actor, details,
//! previous_hash)`. Appends are serialized per tenant so sequence numbers
//! never fork; [`AuditChain::verify`] walks a tenant's records recomputing
//! every hash to detect tampering or a poisoned chain tail.

mod memory;

pub use memory::InMemoryAuditChain;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const GENESIS_HASH: &str = "genesis";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AuditLogError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("audit chain for tenant {0} is poisoned; appends refused until an operator clears it")]
    Poisoned(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AuditResult<T> = Result<T, AuditLogError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub tenant_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event_kind: String,
    pub subject_kind: String,
    pub subject_id: String,
    pub actor: String,
    pub details: serde_json::Value,
    pub previous_hash: String,
    pub hash: String,
}

pub struct AppendRequest {
    pub event_kind: String,
    pub subject_kind: String,
    pub subject_id: String,
    pub actor: String,
    pub details: serde_json::Value,
}

/// Recomputes the hash a record at `sequence` must carry, given its
/// predecessor's hash. Pure function so `verify` and `append` share one
/// implementation.
pub fn compute_hash(
    sequence: u64,
    timestamp: &DateTime<Utc>,
    event_kind: &str,
    subject_kind: &str,
    subject_id: &str,
    actor: &str,
    details: &serde_json::Value,
    previous_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(
        timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| timestamp.timestamp_micros() * 1000)
            .to_be_bytes(),
    );
    hasher.update(event_kind.as_bytes());
    hasher.update(subject_kind.as_bytes());
    hasher.update(subject_id.as_bytes());
    hasher.update(actor.as_bytes());
    hasher.update(details.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Result of [`AuditChain::verify`]: whether the chain from `from` to `to`
/// is intact, and if not, the first sequence number whose hash does not
/// match its recomputation or whose `previous_hash` does not match its
/// predecessor's stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub first_broken_sequence: Option<u64>,
}

#[async_trait]
pub trait AuditChain: Send + Sync {
    async fn append(&self, tenant_id: &str, request: AppendRequest) -> AuditResult<AuditRecord>;

    async fn get(&self, tenant_id: &str, sequence: u64) -> AuditResult<Option<AuditRecord>>;

    async fn range(&self, tenant_id: &str, from: u64, to: u64) -> AuditResult<Vec<AuditRecord>>;

    async fn verify(
        &self,
        tenant_id: &str,
        from: Option<u64>,
        to: Option<u64>,
    ) -> AuditResult<VerifyOutcome>;
}
