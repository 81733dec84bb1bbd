//! txflow Database

mod kvstore;

pub use kvstore::{
    validate_kvstore_params, validate_kvstore_string, DynKVStore, KVStore,
    KVSTORE_NAMESPACE_KEY_ALPHABET, KVSTORE_NAMESPACE_KEY_MAX_LEN,
};

/// Database error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database Error
    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Invalid namespace or key
    #[error("Invalid KV store key or namespace: {0}")]
    KVStoreInvalidKey(String),
}
