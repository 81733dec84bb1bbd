//! txflow Database

pub mod memory;

/// re-export types
pub use memory::MemoryKVStore;
pub use txflow_common::database::{DynKVStore, Error, KVStore};
