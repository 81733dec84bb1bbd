//! Startup recovery of interrupted flows.
//!
//! Executors do not survive a process exit. A flow persisted in [`FlowStatus::Pending`] or
//! [`FlowStatus::Signing`] that no executor of this process is driving was interrupted, and
//! nothing will ever move it forward again. Flows driven by this process are skipped, so
//! recovery is safe to run at any time; it is typically called once after creating the store:
//!
//! ```rust,ignore
//! let store = TransactionStore::new(localstore, builders, watcher, config).await?;
//!
//! let report = store.recover_interrupted_flows().await?;
//! if report.recovered > 0 || report.failed > 0 {
//!     tracing::info!("Recovered {} flows, {} need a retry", report.recovered, report.failed);
//! }
//! ```
//!
//! # Recovery Strategy
//!
//! - **Signing** transaction: the signer never returned a hash, so nothing is known to be on
//!   chain. The transaction is marked failed.
//! - **AwaitingConfirmation** transaction: it was submitted. The watcher is asked again and the
//!   transaction is confirmed or failed according to its answer, or failed when the watcher
//!   cannot be reached.
//!
//! A flow whose transactions all succeeded is completed, any other flow is failed so it can be
//! retried from its first unfinished transaction.

use tracing::instrument;
use txflow_common::{
    Error, FlowState, FlowStatus, TransactionFlow, TransactionState, TransactionStatus, UserId,
};

use crate::events::FlowEvent;
use crate::executor::DEFAULT_FAILURE_REASON;
use crate::signer::{Confirmation, WatcherError};
use crate::store::TransactionStore;

/// Error recorded on a transaction that never got a hash
pub const INTERRUPTED_SIGNING: &str = "interrupted while awaiting signature";
/// Error recorded on a submitted transaction whose outcome could not be checked
pub const INTERRUPTED_CONFIRMATION: &str = "interrupted while awaiting confirmation";
/// Error recorded on a flow that could not be completed during recovery
pub const INTERRUPTED_FLOW: &str = "flow interrupted";

/// Report of recovery operations performed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Flows whose transactions had all landed, now [`FlowStatus::Success`]
    pub recovered: usize,
    /// Flows left in [`FlowStatus::Error`], ready for a retry
    pub failed: usize,
    /// Flows driven by this process, or removed while recovery was running
    pub skipped: usize,
}

impl TransactionStore {
    /// Reconcile every flow left in flight by a previous process
    #[instrument(skip_all)]
    pub async fn recover_interrupted_flows(&self) -> Result<RecoveryReport, Error> {
        let mut report = RecoveryReport::default();

        let interrupted: Vec<(UserId, TransactionFlow)> = self
            .registry
            .users()
            .into_iter()
            .flat_map(|user| {
                self.registry
                    .get_user_flows(&user)
                    .into_iter()
                    .filter(|flow| flow.state.is_in_flight())
                    .map(move |flow| (user.clone(), flow))
                    .collect::<Vec<_>>()
            })
            .collect();

        if interrupted.is_empty() {
            return Ok(report);
        }

        tracing::info!("Recovering {} interrupted flows", interrupted.len());

        for (user, flow) in interrupted {
            match self.recover_flow(&user, &flow).await {
                Some(FlowStatus::Success) => report.recovered += 1,
                Some(_) => report.failed += 1,
                None => report.skipped += 1,
            }
        }

        self.registry.persist().await?;

        tracing::info!(
            "Recovery finished: {} recovered, {} failed, {} skipped",
            report.recovered,
            report.failed,
            report.skipped
        );

        Ok(report)
    }

    /// Reconcile one flow, `None` if it disappeared or started running meanwhile
    async fn recover_flow(&self, user: &UserId, flow: &TransactionFlow) -> Option<FlowStatus> {
        if self.registry.is_running(flow.id) {
            tracing::debug!("Flow {} is running, not recovering it", flow.id);
            return None;
        }

        let mut checks: Vec<(usize, Result<Confirmation, WatcherError>)> = Vec::new();
        for (index, entry) in flow.transactions.iter().enumerate() {
            if let TransactionState::AwaitingConfirmation { hash } = &entry.state {
                tracing::debug!("Checking transaction {} of flow {}", hash, flow.id);
                let result = self
                    .watcher
                    .wait_for_transaction(entry.tx.kind, &entry.tx.chain_id, hash)
                    .await;
                checks.push((index, result));
            }
        }

        let status = self.registry.modify_flow(user, flow.id, |flow| {
            if !flow.state.is_in_flight() || self.registry.is_running(flow.id) {
                return None;
            }

            for entry in flow.transactions.iter_mut() {
                if entry.status() == TransactionStatus::Signing {
                    entry.fail(INTERRUPTED_SIGNING);
                }
            }

            for (index, result) in checks {
                let Some(entry) = flow.transactions.get_mut(index) else {
                    continue;
                };
                match result {
                    Ok(Confirmation::Confirmed) => {
                        entry.confirm();
                    }
                    Ok(Confirmation::Failed { reason }) => {
                        entry.fail(reason.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()))
                    }
                    Err(err) => {
                        tracing::warn!("Could not check transaction {}: {}", index, err);
                        entry.fail(INTERRUPTED_CONFIRMATION);
                    }
                }
            }

            if flow.all_succeeded() {
                flow.state = FlowState::Success;
            } else {
                flow.fail(INTERRUPTED_FLOW);
            }

            Some(flow.status())
        })??;

        self.registry.notify(FlowEvent::FlowFinished {
            user: user.clone(),
            flow_id: flow.id,
            status,
        });

        Some(status)
    }
}
