//! Errors

use thiserror::Error;
use uuid::Uuid;

use crate::flow::{FlowType, UserId};

/// txflow Error
///
/// Build, signing and confirmation failures are never represented here: those are recorded as
/// data on the flow itself. This type covers configuration errors, lookups that miss and storage
/// failures.
#[derive(Debug, Error)]
pub enum Error {
    /// No builder registered for the flow type
    #[error("No flow builder registered for `{0}`")]
    UnregisteredFlowType(FlowType),
    /// Flow not found for user
    #[error("Flow `{flow_id}` not found for user `{user}`")]
    FlowNotFound {
        /// User the flow was looked up for
        user: UserId,
        /// Flow id
        flow_id: Uuid,
    },
    /// Transaction index is out of range for the flow
    #[error("Transaction index {index} out of range for flow `{flow_id}`")]
    TransactionIndexOutOfRange {
        /// Flow id
        flow_id: Uuid,
        /// Requested index
        index: usize,
    },
    /// Transaction has no bridge information to update
    #[error("Transaction {index} of flow `{flow_id}` is not a bridge transaction")]
    NotBridgeTransaction {
        /// Flow id
        flow_id: Uuid,
        /// Transaction index
        index: usize,
    },
    /// Flow is missing or not in an error state
    #[error("Nothing to retry for flow `{0}`")]
    NothingToRetry(Uuid),
    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Builder rejected the retry
    #[error("Retry not valid: {0}")]
    RetryInvalid(String),
    /// Database Error
    #[error(transparent)]
    Database(#[from] crate::database::Error),
    /// Serde Error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Custom error
    #[error("`{0}`")]
    Custom(String),
}
