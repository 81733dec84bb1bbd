//! Redb storage backend for txflow

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod error;
mod kvstore;

pub use kvstore::RedbKVStore;
