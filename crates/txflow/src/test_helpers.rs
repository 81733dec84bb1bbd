//! Scripted collaborators for tests

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use txflow_common::{ChainId, ChainKind, ExtraFlow, Transaction, TransactionStatus, UserId};

use crate::builder::{BuildError, BuildOutput, FlowBuilder, RetryValidation};
use crate::registry::FlowRegistry;
use crate::signer::{
    Confirmation, ConfirmationWatcher, SignerError, TransactionSigner, WatcherError,
};

/// What the next call to [`MockSigner::sign_transaction`] does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignStep {
    /// Return this hash
    Hash(String),
    /// Fail with this message
    Reject(String),
    /// Never return
    Hang,
    /// Remove the flow being signed from the registry, then return a hash
    ClearFlow,
}

#[derive(Debug, Clone, Copy)]
struct SignCall {
    index: Option<usize>,
    in_order: bool,
}

/// Signer answering from a script, by default with a fresh hash per call
#[derive(Debug, Default)]
pub struct MockSigner {
    steps: Mutex<VecDeque<SignStep>>,
    observer: Option<(FlowRegistry, UserId)>,
    calls: Mutex<Vec<SignCall>>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signer that inspects the flows of `user` at every call
    pub fn observing(registry: FlowRegistry, user: UserId) -> Self {
        Self {
            observer: Some((registry, user)),
            ..Default::default()
        }
    }

    pub fn with_steps(self, steps: Vec<SignStep>) -> Self {
        *self.steps.lock() = steps.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Index of the transaction being signed at each call
    pub fn signed_steps(&self) -> Vec<usize> {
        self.calls.lock().iter().filter_map(|call| call.index).collect()
    }

    /// At every call, all earlier transactions had succeeded and all later ones were untouched
    pub fn observed_in_order(&self) -> bool {
        self.calls.lock().iter().all(|call| call.in_order)
    }

    fn observe(&self, tx: &Transaction) -> SignCall {
        let Some((registry, user)) = &self.observer else {
            return SignCall {
                index: None,
                in_order: true,
            };
        };

        for flow in registry.get_user_flows(user) {
            let Some(index) = flow
                .transactions
                .iter()
                .position(|entry| entry.status() == TransactionStatus::Signing && &entry.tx == tx)
            else {
                continue;
            };

            let in_order = flow.transactions[..index]
                .iter()
                .all(|entry| entry.status() == TransactionStatus::Success)
                && flow.transactions[index + 1..]
                    .iter()
                    .all(|entry| entry.status() == TransactionStatus::None);

            return SignCall {
                index: Some(index),
                in_order,
            };
        }

        SignCall {
            index: None,
            in_order: false,
        }
    }

    async fn clear_signing_flow(&self) {
        let Some((registry, user)) = &self.observer else {
            return;
        };

        let signing = registry.get_user_flows(user).into_iter().find(|flow| {
            flow.transactions
                .iter()
                .any(|entry| entry.status() == TransactionStatus::Signing)
        });

        if let Some(flow) = signing {
            let _ = registry.clear_flows(user, Some(flow.id)).await;
        }
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn sign_transaction(&self, tx: &Transaction) -> Result<String, SignerError> {
        let call = self.observe(tx);
        let number = {
            let mut calls = self.calls.lock();
            calls.push(call);
            calls.len()
        };

        // let sibling flows interleave
        tokio::task::yield_now().await;

        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| SignStep::Hash(format!("0x{number:x}")));

        match step {
            SignStep::Hash(hash) => Ok(hash),
            SignStep::Reject(message) => Err(SignerError::Rejected(message)),
            SignStep::Hang => {
                std::future::pending::<()>().await;
                Err(SignerError::Rejected("unreachable".to_string()))
            }
            SignStep::ClearFlow => {
                self.clear_signing_flow().await;
                Ok(format!("0x{number:x}"))
            }
        }
    }
}

#[derive(Debug, Clone)]
enum WatchDefault {
    Confirm,
    Fail(String),
    Unreachable,
}

/// Watcher answering with a default outcome, overridable per hash
#[derive(Debug)]
pub struct MockWatcher {
    default: WatchDefault,
    overrides: Mutex<HashMap<String, Confirmation>>,
    calls: AtomicUsize,
}

impl MockWatcher {
    fn with_default(default: WatchDefault) -> Self {
        Self {
            default,
            overrides: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Confirms every transaction
    pub fn confirming() -> Self {
        Self::with_default(WatchDefault::Confirm)
    }

    /// Reports every transaction as failed with `reason`
    pub fn failing(reason: &str) -> Self {
        Self::with_default(WatchDefault::Fail(reason.to_string()))
    }

    /// Errors on every lookup
    pub fn unreachable() -> Self {
        Self::with_default(WatchDefault::Unreachable)
    }

    /// Answer `confirmation` for `hash`
    pub fn with_result(self, hash: &str, confirmation: Confirmation) -> Self {
        self.overrides.lock().insert(hash.to_string(), confirmation);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationWatcher for MockWatcher {
    async fn wait_for_transaction(
        &self,
        _kind: ChainKind,
        _chain_id: &ChainId,
        hash: &str,
    ) -> Result<Confirmation, WatcherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(confirmation) = self.overrides.lock().get(hash) {
            return Ok(confirmation.clone());
        }

        match &self.default {
            WatchDefault::Confirm => Ok(Confirmation::Confirmed),
            WatchDefault::Fail(reason) => Ok(Confirmation::Failed {
                reason: Some(reason.clone()),
            }),
            WatchDefault::Unreachable => Err(WatcherError("node unreachable".to_string())),
        }
    }
}

/// Builder producing `count` EVM transactions, with scripted failures
#[derive(Debug, Clone)]
pub struct MockBuilder {
    count: usize,
    bridge: bool,
    build_error: Option<String>,
    extra_flow: Option<ExtraFlow>,
    retry: RetryValidation,
    build_calls: Arc<AtomicUsize>,
    retry_calls: Arc<AtomicUsize>,
}

impl MockBuilder {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            bridge: false,
            build_error: None,
            extra_flow: None,
            retry: RetryValidation::Valid,
            build_calls: Arc::new(AtomicUsize::new(0)),
            retry_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mark every built transaction as a bridge transaction
    pub fn bridging(mut self) -> Self {
        self.bridge = true;
        self
    }

    pub fn failing(mut self, error: &str) -> Self {
        self.build_error = Some(error.to_string());
        self
    }

    pub fn with_extra_flow(mut self, extra_flow: ExtraFlow) -> Self {
        self.extra_flow = Some(extra_flow);
        self
    }

    pub fn refusing_retry(mut self, reason: &str) -> Self {
        self.retry = RetryValidation::invalid(reason);
        self
    }

    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub fn retry_calls(&self) -> usize {
        self.retry_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlowBuilder for MockBuilder {
    async fn build_transactions(
        &self,
        params: &serde_json::Value,
    ) -> Result<BuildOutput, BuildError> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.build_error {
            return Err(BuildError(error.clone()));
        }

        let transactions = (0..self.count)
            .map(|step| {
                let payload = json!({ "step": step, "params": params });
                let tx = Transaction::new(7700, ChainKind::Evm, payload)
                    .with_description(&format!("Step {}", step + 1), "");
                if self.bridge {
                    tx.with_bridge("ethereum", "canto")
                } else {
                    tx
                }
            })
            .collect();

        Ok(BuildOutput {
            transactions,
            extra_flow: self.extra_flow.clone(),
        })
    }

    async fn validate_retry(&self, _params: &serde_json::Value) -> RetryValidation {
        self.retry_calls.fetch_add(1, Ordering::SeqCst);
        // a real check queries balances; let concurrent callers interleave
        tokio::task::yield_now().await;
        self.retry.clone()
    }
}
