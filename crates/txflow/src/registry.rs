//! Flow Registry
//!
//! Durable mapping from user to their ordered list of [`TransactionFlow`]s.
//!
//! Mutations are applied to the in-memory map under a lock and are visible as soon as the call
//! returns. The whole map is then written to the [`KVStore`](txflow_common::database::KVStore)
//! under a single key. Writes are serialized and each one snapshots the map after acquiring the
//! write lock, so the last write always carries the latest state. An empty registry is removed
//! from the store instead of being written.
//!
//! The registry also knows which flows this process is currently driving, so startup recovery
//! never mistakes a live flow for an interrupted one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::{broadcast, Mutex};
use tracing::instrument;
use txflow_common::database::{validate_kvstore_params, DynKVStore};
use txflow_common::{Error, TransactionFlow, UserId};
use uuid::Uuid;

use crate::config::{StorageKey, StoreConfig};
use crate::events::{EventBus, FlowEvent};

type FlowMap = HashMap<UserId, Vec<TransactionFlow>>;

#[derive(Debug)]
struct RegistryInner {
    flows: RwLock<FlowMap>,
    localstore: DynKVStore,
    storage: StorageKey,
    max_flows_per_user: usize,
    persist_lock: Mutex<()>,
    events: EventBus,
    // flow id -> number of callers driving it
    running: SyncMutex<HashMap<Uuid, usize>>,
}

/// Marks a flow as driven by this process until dropped
#[derive(Debug)]
pub(crate) struct RunGuard {
    inner: Arc<RegistryInner>,
    flow_id: Uuid,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut running = self.inner.running.lock();
        if let Some(count) = running.get_mut(&self.flow_id) {
            *count -= 1;
            if *count == 0 {
                running.remove(&self.flow_id);
            }
        }
    }
}

/// Flow Registry
#[derive(Debug, Clone)]
pub struct FlowRegistry {
    inner: Arc<RegistryInner>,
}

impl FlowRegistry {
    /// Load the registry from `localstore`, starting empty if nothing was stored yet
    #[instrument(skip_all)]
    pub async fn restore(localstore: DynKVStore, config: &StoreConfig) -> Result<Self, Error> {
        if config.max_flows_per_user == 0 {
            return Err(Error::InvalidConfig(
                "max_flows_per_user must be at least 1".to_string(),
            ));
        }

        let storage = config.storage.clone();
        validate_kvstore_params(
            &storage.primary_namespace,
            &storage.secondary_namespace,
            &storage.key,
        )?;

        let mut flows: FlowMap = match localstore
            .kv_read(
                &storage.primary_namespace,
                &storage.secondary_namespace,
                &storage.key,
            )
            .await?
        {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => FlowMap::new(),
        };

        for user_flows in flows.values_mut() {
            evict_oldest(user_flows, config.max_flows_per_user);
        }
        flows.retain(|_, user_flows| !user_flows.is_empty());

        tracing::debug!(
            "Restored {} flows for {} users",
            flows.values().map(Vec::len).sum::<usize>(),
            flows.len()
        );

        Ok(Self {
            inner: Arc::new(RegistryInner {
                flows: RwLock::new(flows),
                localstore,
                storage,
                max_flows_per_user: config.max_flows_per_user,
                persist_lock: Mutex::new(()),
                events: EventBus::default(),
                running: SyncMutex::new(HashMap::new()),
            }),
        })
    }

    /// Subscribe to flow events
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.inner.events.subscribe()
    }

    /// Flows of `user`, oldest first. Empty for unknown users.
    pub fn get_user_flows(&self, user: &UserId) -> Vec<TransactionFlow> {
        self.inner
            .flows
            .read()
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Single flow of `user`
    pub fn get_flow(&self, user: &UserId, flow_id: Uuid) -> Option<TransactionFlow> {
        self.inner
            .flows
            .read()
            .get(user)
            .and_then(|flows| flows.iter().find(|flow| flow.id == flow_id).cloned())
    }

    /// Users with at least one stored flow, sorted
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.inner.flows.read().keys().cloned().collect();
        users.sort();
        users
    }

    /// Append a flow for `user`, evicting the oldest flows beyond the per-user cap
    #[instrument(skip_all, fields(user = %user, flow_id = %flow.id))]
    pub async fn append_flow(&self, user: &UserId, flow: TransactionFlow) -> Result<(), Error> {
        {
            let mut flows = self.inner.flows.write();
            let user_flows = flows.entry(user.clone()).or_default();
            user_flows.push(flow);
            let evicted = evict_oldest(user_flows, self.inner.max_flows_per_user);
            if evicted > 0 {
                tracing::debug!("Evicted {} oldest flows", evicted);
            }
        }

        self.persist().await
    }

    /// Remove the flow `flow_id` of `user`, or all flows of `user` when `flow_id` is `None`.
    ///
    /// Returns the number of flows removed.
    #[instrument(skip_all, fields(user = %user))]
    pub async fn clear_flows(&self, user: &UserId, flow_id: Option<Uuid>) -> Result<usize, Error> {
        let removed = {
            let mut flows = self.inner.flows.write();
            let removed = match (flows.get_mut(user), flow_id) {
                (None, _) => 0,
                (Some(user_flows), Some(flow_id)) => {
                    let before = user_flows.len();
                    user_flows.retain(|flow| flow.id != flow_id);
                    before - user_flows.len()
                }
                (Some(user_flows), None) => {
                    let removed = user_flows.len();
                    user_flows.clear();
                    removed
                }
            };

            if flows.get(user).is_some_and(Vec::is_empty) {
                flows.remove(user);
            }

            removed
        };

        if removed == 0 {
            return Ok(0);
        }

        tracing::info!("Cleared {} flows", removed);
        self.notify(FlowEvent::FlowsCleared {
            user: user.clone(),
            flow_id,
        });

        self.persist().await?;

        Ok(removed)
    }

    /// Apply `f` to one flow and persist the registry
    pub async fn update_flow<F, R>(&self, user: &UserId, flow_id: Uuid, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut TransactionFlow) -> R,
    {
        let result = self
            .modify_flow(user, flow_id, f)
            .ok_or_else(|| Error::FlowNotFound {
                user: user.clone(),
                flow_id,
            })?;

        self.persist().await?;

        Ok(result)
    }

    /// Apply `f` to one flow in memory only, `None` if the flow does not exist
    pub(crate) fn modify_flow<F, R>(&self, user: &UserId, flow_id: Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut TransactionFlow) -> R,
    {
        let mut flows = self.inner.flows.write();
        let flow = flows
            .get_mut(user)?
            .iter_mut()
            .find(|flow| flow.id == flow_id)?;

        Some(f(flow))
    }

    /// Write the current registry to the key-value store
    pub async fn persist(&self) -> Result<(), Error> {
        let _guard = self.inner.persist_lock.lock().await;

        let bytes = {
            let flows = self.inner.flows.read();
            if flows.is_empty() {
                None
            } else {
                Some(serde_json::to_vec(&*flows)?)
            }
        };

        let storage = &self.inner.storage;
        let localstore = &self.inner.localstore;
        let result = match bytes {
            Some(bytes) => {
                localstore
                    .kv_write(
                        &storage.primary_namespace,
                        &storage.secondary_namespace,
                        &storage.key,
                        &bytes,
                    )
                    .await
            }
            None => {
                localstore
                    .kv_remove(
                        &storage.primary_namespace,
                        &storage.secondary_namespace,
                        &storage.key,
                    )
                    .await
            }
        };

        result.map_err(|err| {
                tracing::error!("Could not persist flow registry: {}", err);
                Error::from(err)
            })
    }

    /// Persist, keeping the in-memory state authoritative when the write fails
    pub(crate) async fn persist_logged(&self) {
        // The failure is already logged by `persist`
        let _ = self.persist().await;
    }

    pub(crate) fn notify(&self, event: FlowEvent) {
        self.inner.events.notify(event);
    }

    /// Mark `flow_id` as driven by this process for the lifetime of the guard
    pub(crate) fn track_run(&self, flow_id: Uuid) -> RunGuard {
        *self.inner.running.lock().entry(flow_id).or_default() += 1;
        RunGuard {
            inner: self.inner.clone(),
            flow_id,
        }
    }

    /// Flow is being driven by this process
    pub(crate) fn is_running(&self, flow_id: Uuid) -> bool {
        self.inner.running.lock().contains_key(&flow_id)
    }
}

/// Drop flows from the front until at most `max` remain, returning how many were dropped
fn evict_oldest(flows: &mut Vec<TransactionFlow>, max: usize) -> usize {
    let excess = flows.len().saturating_sub(max);
    flows.drain(..excess);
    excess
}
