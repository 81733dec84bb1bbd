//! In memory key-value store

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use txflow_common::database::{validate_kvstore_params, Error, KVStore};

type KvKey = (String, String, String);

/// Key-value store kept in memory, contents are lost on drop
#[derive(Debug, Clone, Default)]
pub struct MemoryKVStore {
    entries: Arc<RwLock<BTreeMap<KvKey, Vec<u8>>>>,
}

impl MemoryKVStore {
    /// Create new [`MemoryKVStore`]
    pub fn new() -> Self {
        Self::default()
    }
}

fn kv_key(primary_namespace: &str, secondary_namespace: &str, key: &str) -> KvKey {
    (
        primary_namespace.to_string(),
        secondary_namespace.to_string(),
        key.to_string(),
    )
}

#[async_trait]
impl KVStore for MemoryKVStore {
    async fn kv_read(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, Error> {
        validate_kvstore_params(primary_namespace, secondary_namespace, key)?;

        Ok(self
            .entries
            .read()
            .await
            .get(&kv_key(primary_namespace, secondary_namespace, key))
            .cloned())
    }

    async fn kv_write(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
        value: &[u8],
    ) -> Result<(), Error> {
        validate_kvstore_params(primary_namespace, secondary_namespace, key)?;

        self.entries.write().await.insert(
            kv_key(primary_namespace, secondary_namespace, key),
            value.to_vec(),
        );

        Ok(())
    }

    async fn kv_remove(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
    ) -> Result<(), Error> {
        validate_kvstore_params(primary_namespace, secondary_namespace, key)?;

        self.entries
            .write()
            .await
            .remove(&kv_key(primary_namespace, secondary_namespace, key));

        Ok(())
    }

    async fn kv_list(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
    ) -> Result<Vec<String>, Error> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|(primary, secondary, _)| {
                primary == primary_namespace && secondary == secondary_namespace
            })
            .map(|(_, _, key)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_list_remove() {
        let store = MemoryKVStore::new();

        store
            .kv_write("txflow", "registry", "flows", b"[]")
            .await
            .expect("write");
        store
            .kv_write("txflow", "other", "flows", b"{}")
            .await
            .expect("write");

        assert_eq!(
            store.kv_read("txflow", "registry", "flows").await.expect("read"),
            Some(b"[]".to_vec())
        );
        assert_eq!(
            store.kv_list("txflow", "registry").await.expect("list"),
            vec!["flows".to_string()]
        );

        store
            .kv_remove("txflow", "registry", "flows")
            .await
            .expect("remove");
        assert_eq!(
            store.kv_read("txflow", "registry", "flows").await.expect("read"),
            None
        );
    }

    #[tokio::test]
    async fn rejects_invalid_keys() {
        let store = MemoryKVStore::new();
        assert!(store.kv_write("tx flow", "registry", "flows", b"").await.is_err());
    }
}
