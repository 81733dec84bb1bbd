//! Transaction store
//!
//! [`TransactionStore`] is the entry point used by a UI: it resolves new flows through the
//! registered builders, stores them, executes them and chains the follow-up flows builders ask
//! for. Build, signing and confirmation failures are recorded on the flow and reported in the
//! returned [`FlowReport`]; only configuration and storage problems surface as `Err`.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::instrument;
use txflow_common::database::DynKVStore;
use txflow_common::{
    BridgeStatus, Error, FlowState, FlowStatus, NewTransactionFlow, TransactionFlow, UserId,
};
use uuid::Uuid;

use crate::builder::FlowBuilders;
use crate::config::{ExtraFlowPlacement, StoreConfig};
use crate::events::FlowEvent;
use crate::executor::{ExecutionOutcome, FlowExecutor};
use crate::registry::FlowRegistry;
use crate::retry::RetryCoordinator;
use crate::signer::{ConfirmationWatcher, TransactionSigner};

/// Result of one step of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Builder failed, the flow was stored in [`FlowStatus::Error`] without transactions
    BuildFailed {
        /// Build error
        error: String,
    },
    /// Transactions were executed
    Executed(ExecutionOutcome),
}

impl FlowOutcome {
    /// All transactions of the step confirmed
    pub fn is_completed(&self) -> bool {
        matches!(self, FlowOutcome::Executed(ExecutionOutcome::Completed))
    }
}

/// A flow executed as part of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStep {
    /// Flow the step ran on
    pub flow_id: Uuid,
    /// How the step ended
    pub outcome: FlowOutcome,
}

/// Report of a flow request or retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReport {
    /// Requested flow
    pub flow_id: Uuid,
    /// How the requested flow ended
    pub outcome: FlowOutcome,
    /// Follow-up flows chained after the requested one, in order
    pub follow_ups: Vec<FlowStep>,
}

impl FlowReport {
    /// Requested flow and every chained follow-up completed
    pub fn is_completed(&self) -> bool {
        self.outcome.is_completed()
            && self
                .follow_ups
                .iter()
                .all(|step| step.outcome.is_completed())
    }
}

/// Transaction store
#[derive(Clone)]
pub struct TransactionStore {
    pub(crate) config: Arc<StoreConfig>,
    pub(crate) registry: FlowRegistry,
    pub(crate) builders: FlowBuilders,
    pub(crate) executor: FlowExecutor,
    pub(crate) retry: RetryCoordinator,
    pub(crate) watcher: Arc<dyn ConfirmationWatcher>,
}

impl std::fmt::Debug for TransactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStore")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("builders", &self.builders)
            .finish_non_exhaustive()
    }
}

impl TransactionStore {
    /// Create new [`TransactionStore`], restoring the registry from `localstore`
    pub async fn new(
        localstore: DynKVStore,
        builders: FlowBuilders,
        watcher: Arc<dyn ConfirmationWatcher>,
        config: StoreConfig,
    ) -> Result<Self, Error> {
        let registry = FlowRegistry::restore(localstore, &config).await?;
        let executor = FlowExecutor::new(registry.clone(), watcher.clone(), config.sign_timeout());
        let retry = RetryCoordinator::new(registry.clone(), builders.clone(), executor.clone());

        Ok(Self {
            config: Arc::new(config),
            registry,
            builders,
            executor,
            retry,
            watcher,
        })
    }

    /// Underlying registry
    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// Subscribe to flow events
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.registry.subscribe()
    }

    /// Flows of `user`, oldest first
    pub fn get_user_transaction_flows(&self, user: &UserId) -> Vec<TransactionFlow> {
        self.registry.get_user_flows(user)
    }

    /// Single flow of `user`
    pub fn get_transaction_flow(&self, user: &UserId, flow_id: Uuid) -> Option<TransactionFlow> {
        self.registry.get_flow(user, flow_id)
    }

    /// Remove one flow, or every flow of `user` when `flow_id` is `None`
    pub async fn clear_transactions(
        &self,
        user: &UserId,
        flow_id: Option<Uuid>,
    ) -> Result<usize, Error> {
        self.registry.clear_flows(user, flow_id).await
    }

    /// Set the bridge sub-status of transaction `tx_index`
    pub async fn set_tx_bridge_status(
        &self,
        user: &UserId,
        flow_id: Uuid,
        tx_index: usize,
        bridge_status: BridgeStatus,
    ) -> Result<(), Error> {
        self.registry
            .set_bridge_status(user, flow_id, tx_index, bridge_status)
            .await
    }

    /// Resolve, store and execute a new flow, then chain the follow-ups its builders request
    #[instrument(skip(self, new_flow, signer), fields(tx_type = %new_flow.tx_type))]
    pub async fn add_new_flow(
        &self,
        user: &UserId,
        new_flow: NewTransactionFlow,
        signer: &dyn TransactionSigner,
    ) -> Result<FlowReport, Error> {
        let step = self.start_flow(user, new_flow, signer).await?;
        self.chain_follow_ups(user, step, signer).await
    }

    /// Retry a failed flow from its first failed transaction
    #[instrument(skip(self, signer))]
    pub async fn retry_transaction_flow(
        &self,
        user: &UserId,
        flow_id: Uuid,
        signer: &dyn TransactionSigner,
    ) -> Result<FlowReport, Error> {
        let outcome = self.retry.retry(user, flow_id, signer).await?;
        let step = FlowStep {
            flow_id,
            outcome: FlowOutcome::Executed(outcome),
        };

        self.chain_follow_ups(user, step, signer).await
    }

    /// Build a flow, store it and execute it from the first transaction
    async fn start_flow(
        &self,
        user: &UserId,
        request: NewTransactionFlow,
        signer: &dyn TransactionSigner,
    ) -> Result<FlowStep, Error> {
        let builder = self.builders.get(request.tx_type)?;

        let output = match builder.build_transactions(&request.params).await {
            Ok(output) => output,
            Err(err) => return self.record_build_failure(user, request, err.to_string()).await,
        };

        let flow = TransactionFlow::pending(request, output.transactions, output.extra_flow);
        let flow_id = flow.id;
        let _running = self.registry.track_run(flow_id);

        // Nothing is signed unless the flow was stored first
        if let Err(err) = self.registry.append_flow(user, flow).await {
            self.registry.modify_flow(user, flow_id, |flow| {
                flow.fail(format!("Could not store flow: {err}"))
            });
            return Err(err);
        }

        tracing::info!("Started flow {}", flow_id);
        self.registry.notify(FlowEvent::FlowStarted {
            user: user.clone(),
            flow_id,
        });

        let outcome = self
            .executor
            .execute_from(user, flow_id, 0, signer)
            .await?;

        Ok(FlowStep {
            flow_id,
            outcome: FlowOutcome::Executed(outcome),
        })
    }

    async fn record_build_failure(
        &self,
        user: &UserId,
        request: NewTransactionFlow,
        error: String,
    ) -> Result<FlowStep, Error> {
        tracing::warn!("Could not build {} flow: {}", request.tx_type, error);

        let flow = TransactionFlow::build_failed(request, error.clone());
        let flow_id = flow.id;
        self.registry.append_flow(user, flow).await?;
        self.registry.notify(FlowEvent::FlowBuildFailed {
            user: user.clone(),
            flow_id,
            error: error.clone(),
        });

        Ok(FlowStep {
            flow_id,
            outcome: FlowOutcome::BuildFailed { error },
        })
    }

    /// Chain follow-up flows after `first` until one fails, none is requested or the depth
    /// limit is reached
    async fn chain_follow_ups(
        &self,
        user: &UserId,
        first: FlowStep,
        signer: &dyn TransactionSigner,
    ) -> Result<FlowReport, Error> {
        let mut report = FlowReport {
            flow_id: first.flow_id,
            outcome: first.outcome,
            follow_ups: Vec::new(),
        };

        let mut current = report.flow_id;
        let mut completed = report.outcome.is_completed();

        while completed {
            let depth = report.follow_ups.len();
            let Some(step) = self.next_follow_up(user, current, depth, signer).await? else {
                break;
            };

            current = step.flow_id;
            completed = step.outcome.is_completed();
            report.follow_ups.push(step);
        }

        Ok(report)
    }

    /// Run the follow-up requested by the completed flow `flow_id`, if any
    async fn next_follow_up(
        &self,
        user: &UserId,
        flow_id: Uuid,
        depth: usize,
        signer: &dyn TransactionSigner,
    ) -> Result<Option<FlowStep>, Error> {
        let Some(parent) = self.registry.get_flow(user, flow_id) else {
            return Ok(None);
        };

        let Some(extra_flow) = parent.follow_up.clone() else {
            return Ok(None);
        };

        if parent.status() != FlowStatus::Success {
            return Ok(None);
        }

        if depth >= self.config.max_chain_depth {
            tracing::warn!(
                "Not chaining {} flow after {}: chain depth limit {} reached",
                extra_flow.tx_type,
                flow_id,
                self.config.max_chain_depth
            );
            return Ok(None);
        }

        let request = extra_flow.into_new_flow(&parent);
        let builder = self.builders.get(request.tx_type)?;

        self.registry
            .modify_flow(user, flow_id, |flow| flow.follow_up = None);
        self.registry.persist_logged().await;

        tracing::info!("Chaining {} flow after {}", request.tx_type, flow_id);

        match self.config.extra_flow_placement {
            ExtraFlowPlacement::SeparateFlow => {
                self.start_flow(user, request, signer).await.map(Some)
            }
            ExtraFlowPlacement::AppendToParent => {
                let output = match builder.build_transactions(&request.params).await {
                    Ok(output) => output,
                    Err(err) => {
                        return self
                            .record_build_failure(user, request, err.to_string())
                            .await
                            .map(Some)
                    }
                };

                let _running = self.registry.track_run(flow_id);
                let Some(start_index) = self.registry.modify_flow(user, flow_id, |flow| {
                    let start_index = flow.transactions.len();
                    flow.transactions
                        .extend(output.transactions.into_iter().map(Into::into));
                    flow.follow_up = output.extra_flow;
                    flow.state = FlowState::Pending;
                    start_index
                }) else {
                    return Ok(Some(FlowStep {
                        flow_id,
                        outcome: FlowOutcome::Executed(ExecutionOutcome::Cleared),
                    }));
                };
                self.registry.persist_logged().await;

                let outcome = self
                    .executor
                    .execute_from(user, flow_id, start_index, signer)
                    .await?;

                Ok(Some(FlowStep {
                    flow_id,
                    outcome: FlowOutcome::Executed(outcome),
                }))
            }
        }
    }
}
