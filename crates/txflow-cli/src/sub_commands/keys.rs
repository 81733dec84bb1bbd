use anyhow::Result;
use txflow::database::KVStore;
use txflow::StorageKey;

/// Keys stored next to the configured registry
pub async fn stored_keys(localstore: &dyn KVStore, storage: &StorageKey) -> Result<Vec<String>> {
    let keys = localstore
        .kv_list(&storage.primary_namespace, &storage.secondary_namespace)
        .await?;

    Ok(keys)
}

pub async fn keys(localstore: &dyn KVStore, storage: &StorageKey) -> Result<()> {
    let keys = stored_keys(localstore, storage).await?;

    if keys.is_empty() {
        println!(
            "Nothing stored under {}/{}",
            storage.primary_namespace, storage.secondary_namespace
        );
        return Ok(());
    }

    for key in keys {
        let marker = if key == storage.key { " (active)" } else { "" };
        println!(
            "{}/{}/{key}{marker}",
            storage.primary_namespace, storage.secondary_namespace
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use txflow::{FlowRegistry, FlowType, NewTransactionFlow, StoreConfig, TransactionFlow, UserId};
    use txflow_redb::RedbKVStore;

    use super::*;

    #[tokio::test]
    async fn lists_stored_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let localstore =
            Arc::new(RedbKVStore::new(&dir.path().join("txflow.redb")).expect("redb"));
        let config = StoreConfig::default();

        assert!(stored_keys(localstore.as_ref(), &config.storage)
            .await
            .expect("keys")
            .is_empty());

        let registry = FlowRegistry::restore(localstore.clone(), &config)
            .await
            .expect("registry");
        let flow = TransactionFlow::pending(
            NewTransactionFlow::new(FlowType::Swap, "Swap", "", json!({})),
            Vec::new(),
            None,
        );
        registry
            .append_flow(&UserId::from("0xabc"), flow)
            .await
            .expect("append");

        assert_eq!(
            stored_keys(localstore.as_ref(), &config.storage)
                .await
                .expect("keys"),
            vec![config.storage.key.clone()]
        );
    }
}
