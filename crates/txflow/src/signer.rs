//! Signing and confirmation collaborators
//!
//! The engine never signs anything itself. A [`TransactionSigner`] is supplied per request and
//! carries whatever wallet context signing needs. A [`ConfirmationWatcher`] is shared by the
//! store and reports whether a submitted transaction landed.

use std::time::Duration;

use async_trait::async_trait;
use txflow_common::{ChainId, ChainKind, Transaction};

/// Signing failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// Signer refused or failed
    #[error("{0}")]
    Rejected(String),
    /// Signer did not answer in time
    #[error("Signing timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Confirmation lookup failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct WatcherError(pub String);

/// Outcome of waiting on a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Included and successful
    Confirmed,
    /// Included but reverted, or dropped
    Failed {
        /// Failure reason reported by the chain
        reason: Option<String>,
    },
}

/// Signs and submits a transaction
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign and broadcast `tx`, returning its hash
    async fn sign_transaction(&self, tx: &Transaction) -> Result<String, SignerError>;
}

/// Waits for a submitted transaction to be confirmed
#[async_trait]
pub trait ConfirmationWatcher: Send + Sync {
    /// Wait until `hash` on `chain_id` is confirmed or failed
    async fn wait_for_transaction(
        &self,
        kind: ChainKind,
        chain_id: &ChainId,
        hash: &str,
    ) -> Result<Confirmation, WatcherError>;
}
