//! Flow Executor
//!
//! Drives the transactions of one flow strictly in order: sign, record the hash, wait for
//! confirmation, then move on. The first failure stops the flow and leaves every later
//! transaction untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;
use txflow_common::{Error, UserId};
use uuid::Uuid;

use crate::registry::FlowRegistry;
use crate::signer::{Confirmation, ConfirmationWatcher, SignerError, TransactionSigner};
use crate::tracker::Halt;

/// Fallback error when the chain reports a failure without a reason
pub(crate) const DEFAULT_FAILURE_REASON: &str = "Transaction failed";

/// How an execution run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every transaction confirmed, flow is [`FlowStatus::Success`](txflow_common::FlowStatus)
    Completed,
    /// Transaction `index` failed, flow is [`FlowStatus::Error`](txflow_common::FlowStatus)
    Failed {
        /// Failed transaction
        index: usize,
        /// Error recorded on the transaction and the flow
        error: String,
    },
    /// Flow was removed from the registry before the run finished
    Cleared,
    /// Transaction `index` was changed by someone else, the run stopped without touching it
    Conflict {
        /// Transaction the run was driving
        index: usize,
    },
}

impl From<Halt> for ExecutionOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Cleared => ExecutionOutcome::Cleared,
            Halt::Conflict { index } => {
                tracing::warn!("Transaction {} changed under a running flow", index);
                ExecutionOutcome::Conflict { index }
            }
        }
    }
}

/// Flow Executor
#[derive(Clone)]
pub struct FlowExecutor {
    registry: FlowRegistry,
    watcher: Arc<dyn ConfirmationWatcher>,
    sign_timeout: Option<Duration>,
}

impl std::fmt::Debug for FlowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExecutor")
            .field("sign_timeout", &self.sign_timeout)
            .finish_non_exhaustive()
    }
}

impl FlowExecutor {
    /// Create new [`FlowExecutor`]
    pub fn new(
        registry: FlowRegistry,
        watcher: Arc<dyn ConfirmationWatcher>,
        sign_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            watcher,
            sign_timeout,
        }
    }

    /// Execute the flow from `start_index` to its last transaction.
    ///
    /// Signing and confirmation failures are recorded on the flow and reported as
    /// [`ExecutionOutcome::Failed`], never as an `Err`. Follow-up flows are not started here.
    #[instrument(skip(self, signer))]
    pub async fn execute_from(
        &self,
        user: &UserId,
        flow_id: Uuid,
        start_index: usize,
        signer: &dyn TransactionSigner,
    ) -> Result<ExecutionOutcome, Error> {
        let flow = self
            .registry
            .get_flow(user, flow_id)
            .ok_or_else(|| Error::FlowNotFound {
                user: user.clone(),
                flow_id,
            })?;

        if start_index > flow.transactions.len() {
            return Err(Error::TransactionIndexOutOfRange {
                flow_id,
                index: start_index,
            });
        }

        let _running = self.registry.track_run(flow_id);

        tracing::debug!(
            "Executing {} transactions of flow {}",
            flow.transactions.len() - start_index,
            flow_id
        );

        Ok(self
            .run(user, flow_id, start_index, signer)
            .await
            .unwrap_or_else(ExecutionOutcome::from))
    }

    async fn run(
        &self,
        user: &UserId,
        flow_id: Uuid,
        start_index: usize,
        signer: &dyn TransactionSigner,
    ) -> Result<ExecutionOutcome, Halt> {
        let mut index = start_index;

        while let Some(tx) = self
            .registry
            .begin_transaction(user, flow_id, index, index == start_index)
            .await?
        {
            let hash = match self.sign(signer, &tx).await {
                Ok(hash) => hash,
                Err(err) => return self.fail(user, flow_id, index, err.to_string()).await,
            };

            tracing::debug!("Transaction {} submitted with hash {}", index, hash);
            self.registry
                .record_submitted(user, flow_id, index, &hash)
                .await?;

            let failure = match self
                .watcher
                .wait_for_transaction(tx.kind, &tx.chain_id, &hash)
                .await
            {
                Ok(Confirmation::Confirmed) => None,
                Ok(Confirmation::Failed { reason }) => {
                    Some(reason.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()))
                }
                Err(err) => Some(err.to_string()),
            };

            if let Some(error) = failure {
                return self.fail(user, flow_id, index, error).await;
            }

            self.registry
                .confirm_transaction(user, flow_id, index)
                .await?;
            index += 1;
        }

        self.registry.complete_flow(user, flow_id).await?;
        tracing::info!("Flow {} completed", flow_id);

        Ok(ExecutionOutcome::Completed)
    }

    async fn sign(
        &self,
        signer: &dyn TransactionSigner,
        tx: &txflow_common::Transaction,
    ) -> Result<String, SignerError> {
        match self.sign_timeout {
            Some(limit) => tokio::time::timeout(limit, signer.sign_transaction(tx))
                .await
                .unwrap_or(Err(SignerError::Timeout(limit))),
            None => signer.sign_transaction(tx).await,
        }
    }

    async fn fail(
        &self,
        user: &UserId,
        flow_id: Uuid,
        index: usize,
        error: String,
    ) -> Result<ExecutionOutcome, Halt> {
        tracing::warn!("Transaction {} of flow {} failed: {}", index, flow_id, error);
        self.registry
            .fail_transaction(user, flow_id, index, &error)
            .await?;

        Ok(ExecutionOutcome::Failed { index, error })
    }
}
