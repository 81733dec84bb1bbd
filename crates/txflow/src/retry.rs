//! Retry Coordinator
//!
//! Resumes a failed flow at its first failed transaction. The stored transactions are reused as
//! they are: the builder is asked whether a retry is still valid but never rebuilds the flow, and
//! transactions that already succeeded are never signed again.

use tracing::instrument;
use txflow_common::{Error, FlowState, FlowStatus, UserId};
use uuid::Uuid;

use crate::builder::{FlowBuilders, RetryValidation};
use crate::executor::{ExecutionOutcome, FlowExecutor};
use crate::registry::FlowRegistry;
use crate::signer::TransactionSigner;

/// Retry Coordinator
#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    registry: FlowRegistry,
    builders: FlowBuilders,
    executor: FlowExecutor,
}

impl RetryCoordinator {
    /// Create new [`RetryCoordinator`]
    pub fn new(registry: FlowRegistry, builders: FlowBuilders, executor: FlowExecutor) -> Self {
        Self {
            registry,
            builders,
            executor,
        }
    }

    /// Retry the failed flow `flow_id` of `user`.
    ///
    /// Fails with [`Error::NothingToRetry`] when the flow is missing, not in
    /// [`FlowStatus::Error`], or has no transaction left to resume (a flow whose build failed).
    /// Fails with [`Error::RetryInvalid`] when the builder refuses, leaving the flow untouched.
    /// Of several concurrent retries of the same flow only one resumes it, the others fail with
    /// [`Error::NothingToRetry`].
    #[instrument(skip(self, signer))]
    pub async fn retry(
        &self,
        user: &UserId,
        flow_id: Uuid,
        signer: &dyn TransactionSigner,
    ) -> Result<ExecutionOutcome, Error> {
        let flow = self
            .registry
            .get_flow(user, flow_id)
            .filter(|flow| flow.status() == FlowStatus::Error)
            .ok_or(Error::NothingToRetry(flow_id))?;

        let resume_index = flow.resume_index().ok_or(Error::NothingToRetry(flow_id))?;

        let builder = self.builders.get(flow.tx_type)?;
        if let RetryValidation::Invalid { reason } = builder.validate_retry(&flow.params).await {
            tracing::info!("Retry of flow {} refused: {}", flow_id, reason);
            return Err(Error::RetryInvalid(reason));
        }

        // Claim the flow: only the caller that still finds it failed at the same index resumes it
        let _running = self.registry.track_run(flow_id);
        self.registry
            .modify_flow(user, flow_id, |flow| -> Result<(), Error> {
                if flow.status() != FlowStatus::Error || flow.resume_index() != Some(resume_index) {
                    return Err(Error::NothingToRetry(flow_id));
                }
                if let Some(tx) = flow.transactions.get_mut(resume_index) {
                    tx.reset();
                }
                flow.state = FlowState::Pending;
                Ok(())
            })
            .ok_or(Error::NothingToRetry(flow_id))??;
        self.registry.persist_logged().await;

        tracing::info!("Retrying flow {} from transaction {}", flow_id, resume_index);

        self.executor
            .execute_from(user, flow_id, resume_index, signer)
            .await
    }
}
