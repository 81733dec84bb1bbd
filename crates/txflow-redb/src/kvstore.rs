//! Redb key-value store

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::instrument;
use txflow_common::database::{self, validate_kvstore_params, validate_kvstore_string, KVStore};

use crate::error::Error;

// <Config Key, Config Value>
const CONFIG_TABLE: TableDefinition<&str, &str> = TableDefinition::new("config");
// <(Primary Namespace, Secondary Namespace, Key), Value>
const KV_STORE_TABLE: TableDefinition<(&str, &str, &str), &[u8]> =
    TableDefinition::new("kv_store");

const DATABASE_VERSION: u32 = 1;

/// Key-value store backed by a redb file
#[derive(Debug, Clone)]
pub struct RedbKVStore {
    db: Arc<Database>,
}

impl RedbKVStore {
    /// Open or create the store at `path`
    pub fn new(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Parent directory does not exist: {parent:?}"),
                )));
            }
        }

        let db = Arc::new(Database::create(path)?);

        let db_version: Option<String>;
        {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(CONFIG_TABLE);

            db_version = match table {
                Ok(table) => table.get("db_version")?.map(|v| v.value().to_string()),
                Err(_) => None,
            };
        }

        match db_version {
            Some(db_version) => {
                let file_version = u32::from_str(&db_version)?;
                if file_version != DATABASE_VERSION {
                    tracing::warn!(
                        "Database is at version {} expected {}",
                        file_version,
                        DATABASE_VERSION
                    );
                    return Err(Error::UnknownDatabaseVersion(file_version));
                }
                tracing::debug!("Database is at current version {}", DATABASE_VERSION);
            }
            None => {
                let write_txn = db.begin_write()?;
                {
                    let mut table = write_txn.open_table(CONFIG_TABLE)?;
                    // Open all tables to init a new db
                    let _ = write_txn.open_table(KV_STORE_TABLE)?;
                    table.insert("db_version", DATABASE_VERSION.to_string().as_str())?;
                }
                write_txn.commit()?;
                tracing::info!("Created database at version {}", DATABASE_VERSION);
            }
        }

        Ok(Self { db })
    }
}

#[async_trait]
impl KVStore for RedbKVStore {
    #[instrument(skip_all)]
    async fn kv_read(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, database::Error> {
        validate_kvstore_params(primary_namespace, secondary_namespace, key)?;

        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(KV_STORE_TABLE).map_err(Error::from)?;

        let value = table
            .get((primary_namespace, secondary_namespace, key))
            .map_err(Error::from)?
            .map(|v| v.value().to_vec());

        Ok(value)
    }

    #[instrument(skip_all)]
    async fn kv_write(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
        value: &[u8],
    ) -> Result<(), database::Error> {
        validate_kvstore_params(primary_namespace, secondary_namespace, key)?;

        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(KV_STORE_TABLE).map_err(Error::from)?;
            table
                .insert((primary_namespace, secondary_namespace, key), value)
                .map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;

        Ok(())
    }

    #[instrument(skip_all)]
    async fn kv_remove(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
        key: &str,
    ) -> Result<(), database::Error> {
        validate_kvstore_params(primary_namespace, secondary_namespace, key)?;

        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(KV_STORE_TABLE).map_err(Error::from)?;
            table
                .remove((primary_namespace, secondary_namespace, key))
                .map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;

        Ok(())
    }

    #[instrument(skip_all)]
    async fn kv_list(
        &self,
        primary_namespace: &str,
        secondary_namespace: &str,
    ) -> Result<Vec<String>, database::Error> {
        validate_kvstore_string(primary_namespace)?;
        validate_kvstore_string(secondary_namespace)?;

        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(KV_STORE_TABLE).map_err(Error::from)?;

        let mut keys = Vec::new();
        // Keys are sorted, so the namespace is a contiguous range
        let start = (primary_namespace, secondary_namespace, "");
        for result in table.range(start..).map_err(Error::from)? {
            let (key_tuple, _) = result.map_err(Error::from)?;
            let (primary_from_db, secondary_from_db, k) = key_tuple.value();
            if primary_from_db != primary_namespace || secondary_from_db != secondary_namespace {
                break;
            }
            keys.push(k.to_string());
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_list_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbKVStore::new(&dir.path().join("txflow.redb")).expect("store");

        store
            .kv_write("txflow", "registry", "flows", b"{}")
            .await
            .expect("write");
        store
            .kv_write("txflow", "registry", "archive", b"[]")
            .await
            .expect("write");
        store
            .kv_write("txflow", "settings", "flows", b"1")
            .await
            .expect("write");

        assert_eq!(
            store
                .kv_read("txflow", "registry", "flows")
                .await
                .expect("read"),
            Some(b"{}".to_vec())
        );
        assert_eq!(
            store.kv_list("txflow", "registry").await.expect("list"),
            vec!["archive".to_string(), "flows".to_string()]
        );

        store
            .kv_remove("txflow", "registry", "flows")
            .await
            .expect("remove");
        assert_eq!(
            store
                .kv_read("txflow", "registry", "flows")
                .await
                .expect("read"),
            None
        );
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("txflow.redb");

        {
            let store = RedbKVStore::new(&path).expect("store");
            store
                .kv_write("txflow", "registry", "flows", b"saved")
                .await
                .expect("write");
        }

        let reopened = RedbKVStore::new(&path).expect("reopen");
        assert_eq!(
            reopened
                .kv_read("txflow", "registry", "flows")
                .await
                .expect("read"),
            Some(b"saved".to_vec())
        );
    }

    #[test]
    fn missing_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = RedbKVStore::new(&dir.path().join("missing").join("txflow.redb"));

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn rejects_invalid_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbKVStore::new(&dir.path().join("txflow.redb")).expect("store");

        let result = store.kv_write("txflow", "registry", "bad key", b"").await;
        assert!(matches!(
            result,
            Err(database::Error::KVStoreInvalidKey(_))
        ));
    }
}
