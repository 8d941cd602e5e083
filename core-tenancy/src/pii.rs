//! PII field envelope encryption.
//!
//! Each table has a static, compile-time-registered set of PII field
//! names (loaded at startup from configuration, in place of the runtime
//! reflection the source used). On write, those field values are replaced
//! by `ENC:<base64>` ciphertext; on read, ciphertext is decrypted
//! transparently.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

use crate::{TenancyError, TenancyResult};

pub const ENC_PREFIX: &str = "ENC:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    /// No encryption; values pass through unchanged. Used when
    /// `encryption_provider = none` in configuration.
    None,
    /// A reversible, keyed transform standing in for an authenticated-AEAD
    /// provider in this reference implementation.
    AuthenticatedAead,
    /// A weaker legacy provider kept only so rotation tests exercise the
    /// "re-encrypt under a new provider" path.
    Legacy,
}

#[derive(Debug, Clone)]
pub struct EncryptionEnvelope {
    pub algorithm: EncryptionAlgorithm,
    pub key_id: String,
}

/// Wraps/unwraps field values. Implementations derive a per-field key from
/// `(tenant_id, table, field)` so rotation can re-encrypt one field at a
/// time without touching the rest of a record.
#[async_trait]
pub trait EnvelopeEncryptor: Send + Sync {
    fn algorithm(&self) -> EncryptionAlgorithm;

    fn key_id(&self) -> &str;

    /// Derive a per-field key. Exposed so callers can implement
    /// "derive-per-field-key" as its own administrative operation.
    fn derive_per_field_key(&self, tenant_id: &str, table: &str, field: &str) -> Vec<u8>;

    fn encrypt_field(
        &self,
        tenant_id: &str,
        table: &str,
        field: &str,
        plaintext: &Value,
    ) -> TenancyResult<String>;

    fn decrypt_field(
        &self,
        tenant_id: &str,
        table: &str,
        field: &str,
        ciphertext: &str,
    ) -> TenancyResult<Value>;
}

/// `encryption_provider = none`: passthrough, still JSON-round-tripped so
/// the storage layer's `ENC:` detection code path stays uniform.
pub struct NoopEncryptor;

#[async_trait]
impl EnvelopeEncryptor for NoopEncryptor {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::None
    }

    fn key_id(&self) -> &str {
        "none"
    }

    fn derive_per_field_key(&self, _tenant_id: &str, _table: &str, _field: &str) -> Vec<u8> {
        Vec::new()
    }

    fn encrypt_field(
        &self,
        _tenant_id: &str,
        _table: &str,
        _field: &str,
        plaintext: &Value,
    ) -> TenancyResult<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt_field(
        &self,
        _tenant_id: &str,
        _table: &str,
        _field: &str,
        ciphertext: &str,
    ) -> TenancyResult<Value> {
        serde_json::from_str(ciphertext)
            .map_err(|e| TenancyError::Encryption(format!("noop decode: {e}")))
    }
}

/// A reversible keystream cipher keyed by `key_material` plus the derived
/// per-field key, base64-encoded. Stands in for `authenticated-aead`/
/// `legacy` providers in this reference implementation; a production
/// deployment supplies a real AEAD implementation behind the same trait.
pub struct LegacyXorEncryptor {
    algorithm: EncryptionAlgorithm,
    key_id: String,
    key_material: Vec<u8>,
}

impl LegacyXorEncryptor {
    pub fn new(algorithm: EncryptionAlgorithm, key_id: impl Into<String>, key_material: &str) -> Self {
        LegacyXorEncryptor {
            algorithm,
            key_id: key_id.into(),
            key_material: key_material.as_bytes().to_vec(),
        }
    }

    fn apply_keystream(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        if key.is_empty() {
            return data.to_vec();
        }
        data.iter()
            .enumerate()
            .map(|(i, byte)| byte ^ key[i % key.len()])
            .collect()
    }
}

#[async_trait]
impl EnvelopeEncryptor for LegacyXorEncryptor {
    fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn derive_per_field_key(&self, tenant_id: &str, table: &str, field: &str) -> Vec<u8> {
        let mut key = self.key_material.clone();
        key.extend_from_slice(tenant_id.as_bytes());
        key.extend_from_slice(table.as_bytes());
        key.extend_from_slice(field.as_bytes());
        key
    }

    fn encrypt_field(
        &self,
        tenant_id: &str,
        table: &str,
        field: &str,
        plaintext: &Value,
    ) -> TenancyResult<String> {
        let key = self.derive_per_field_key(tenant_id, table, field);
        let bytes = plaintext.to_string().into_bytes();
        let scrambled = self.apply_keystream(&key, &bytes);
        Ok(base64::engine::general_purpose::STANDARD.encode(scrambled))
    }

    fn decrypt_field(
        &self,
        tenant_id: &str,
        table: &str,
        field: &str,
        ciphertext: &str,
    ) -> TenancyResult<Value> {
        let key = self.derive_per_field_key(tenant_id, table, field);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ciphertext)
            .map_err(|e| TenancyError::Encryption(format!("base64 decode: {e}")))?;
        let plain = self.apply_keystream(&key, &bytes);
        let text = String::from_utf8(plain)
            .map_err(|e| TenancyError::Encryption(format!("utf8 decode: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| TenancyError::Encryption(format!("json decode: {e}")))
    }
}

/// The per-table set of PII field names, registered at startup rather than
/// discovered via runtime reflection.
#[derive(Debug, Clone, Default)]
pub struct PiiRegistry {
    fields: HashMap<String, HashSet<String>>,
}

impl PiiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, table: impl Into<String>, fields: &[&str]) -> Self {
        self.fields
            .entry(table.into())
            .or_default()
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn is_pii(&self, table: &str, field: &str) -> bool {
        self.fields
            .get(table)
            .map(|fields| fields.contains(field))
            .unwrap_or(false)
    }

    pub fn pii_fields(&self, table: &str) -> Vec<String> {
        self.fields
            .get(table)
            .map(|fields| fields.iter().cloned().collect())
            .unwrap_or_default()
    }
}

pub fn is_encrypted(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.starts_with(ENC_PREFIX))
}

pub fn strip_prefix(value: &str) -> &str {
    value.strip_prefix(ENC_PREFIX).unwrap_or(value)
}

/// Report returned by a bulk, restartable key-rotation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated_records: usize,
    pub rotated_fields: usize,
    pub errors: Vec<String>,
}

/// Derives per-field keys and drives bulk re-encryption under a new
/// provider. The actual record rewrite happens in `core-tenancy::memory`,
/// which owns storage; `KeyManager` exposes the policy surface described
/// in `spec.md` §4.2 ("derive-per-field-key, rotate").
pub struct KeyManager<E: EnvelopeEncryptor> {
    pub encryptor: E,
    pub registry: PiiRegistry,
}

impl<E: EnvelopeEncryptor> KeyManager<E> {
    pub fn new(encryptor: E, registry: PiiRegistry) -> Self {
        KeyManager { encryptor, registry }
    }

    pub fn derive_per_field_key(&self, tenant_id: &str, table: &str, field: &str) -> Vec<u8> {
        self.encryptor.derive_per_field_key(tenant_id, table, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn xor_encryptor_round_trips() {
        let enc = LegacyXorEncryptor::new(
            EncryptionAlgorithm::AuthenticatedAead,
            "k1",
            "super-secret-key-material",
        );
        let plain = json!("Jane Doe");
        let cipher = enc.encrypt_field("tenant-a", "accounts", "owner_name", &plain).unwrap();
        assert_ne!(cipher, plain.to_string());
        let round_tripped = enc
            .decrypt_field("tenant-a", "accounts", "owner_name", &cipher)
            .unwrap();
        assert_eq!(round_tripped, plain);
    }

    #[test]
    fn different_tenants_get_different_ciphertext() {
        let enc = LegacyXorEncryptor::new(EncryptionAlgorithm::AuthenticatedAead, "k1", "key-material");
        let plain = json!("42 Main St");
        let c1 = enc.encrypt_field("tenant-a", "accounts", "address", &plain).unwrap();
        let c2 = enc.encrypt_field("tenant-b", "accounts", "address", &plain).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn registry_tracks_pii_fields_per_table() {
        let registry = PiiRegistry::new().register("accounts", &["owner_name", "address"]);
        assert!(registry.is_pii("accounts", "owner_name"));
        assert!(!registry.is_pii("accounts", "currency"));
        assert!(!registry.is_pii("loans", "owner_name"));
    }
}
