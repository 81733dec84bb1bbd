//! Transaction flow shared types and functions.
//!
//! This crate is the base foundation for the txflow engine and its storage backends. It
//! contains the persisted data model of transaction flows, the error types and the key-value
//! persistence trait that storage crates implement.

pub mod database;
pub mod error;
pub mod flow;
pub mod util;

pub use error::Error;
pub use flow::{
    BridgeInfo, BridgeStatus, ChainId, ChainKind, ExtraFlow, FlowState, FlowStatus, FlowTransaction,
    FlowType, NewTransactionFlow, Transaction, TransactionFlow, TransactionState,
    TransactionStatus, TxDescription, UserId,
};
