//! Key-Value Store trait and key validation
//!
//! Flow records are persisted as opaque blobs under a `(primary_namespace, secondary_namespace,
//! key)` triple. Backends only need to store bytes; serialization is handled by the caller.

use std::sync::Arc;

use async_trait::async_trait;

use super::Error;

/// Valid ASCII characters for namespace and key strings in KV store
pub const KVSTORE_NAMESPACE_KEY_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

/// Maximum length for namespace and key strings in KV store
pub const KVSTORE_NAMESPACE_KEY_MAX_LEN: usize = 120;

/// Validates that a string contains only valid KV store characters and is within length limits
pub fn validate_kvstore_string(s: &str) -> Result<(), Error> {
    if s.len() > KVSTORE_NAMESPACE_KEY_MAX_LEN {
        return Err(Error::KVStoreInvalidKey(format!(
            "`{s}` exceeds maximum length of {KVSTORE_NAMESPACE_KEY_MAX_LEN} characters"
        )));
    }

    if !s.chars().all(|c| KVSTORE_NAMESPACE_KEY_ALPHABET.contains(c)) {
        return Err(Error::KVStoreInvalidKey(format!(
            "`{s}` contains invalid characters, only ASCII letters, numbers, underscore and hyphen are allowed"
        )));
    }

    Ok(())
}

/// Validates namespace and key parameters for KV store operations
pub fn validate_kvstore_params(
    primary_namespace: &str,
    secondary_namespace: &str,
    key: &str,
) -> Result<(), Error> {
    validate_kvstore_string(primary_namespace)?;
    validate_kvstore_string(secondary_namespace)?;
    validate_kvstore_string(key)?;

    if key.is_empty() {
        return Err(Error::KVStoreInvalidKey("key must not be empty".to_string()));
    }

    if primary_namespace.is_empty() && !secondary_namespace.is_empty() {
        return Err(Error::KVStoreInvalidKey(
            "If primary_namespace is empty, secondary_namespace must also be empty".to_string(),
        ));
    }

    if key == primary_namespace || key == secondary_namespace {
        return Err(Error::KVStoreInvalidKey(format!(
            "Key '{key}' conflicts with namespace names"
        )));
    }

    Ok(())
}

/// Key-Value Store
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait KVStore: std::fmt::Debug {
    /// Read value from key-value store
    async fn kv_read(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, Error>;

    /// Write value to key-value store, replacing any previous value
    async fn kv_write(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
        value: &[u8],
    ) -> Result<(), Error>;

    /// Remove value from key-value store
    async fn kv_remove(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
    ) -> Result<(), Error>;

    /// List keys in a namespace
    async fn kv_list(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
    ) -> Result<Vec<String>, Error>;
}

/// Shared [`KVStore`] handle
pub type DynKVStore = Arc<dyn KVStore + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_params() {
        assert!(validate_kvstore_params("txflow", "registry", "transaction_flows").is_ok());
        assert!(validate_kvstore_params("", "", "flows").is_ok());
    }

    #[test]
    fn rejects_invalid_characters_and_length() {
        assert!(validate_kvstore_string("tx/flow").is_err());
        assert!(validate_kvstore_string("flöw").is_err());
        assert!(validate_kvstore_string(&"a".repeat(KVSTORE_NAMESPACE_KEY_MAX_LEN)).is_ok());
        assert!(validate_kvstore_string(&"a".repeat(KVSTORE_NAMESPACE_KEY_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn rejects_namespace_rules() {
        assert!(validate_kvstore_params("", "registry", "flows").is_err());
        assert!(validate_kvstore_params("txflow", "registry", "txflow").is_err());
        assert!(validate_kvstore_params("txflow", "registry", "").is_err());
    }
}
