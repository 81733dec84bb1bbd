//! Transaction store configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of flows kept per user
pub const DEFAULT_MAX_FLOWS_PER_USER: usize = 100;

/// Default number of follow-up flows chained after a single request
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 4;

/// Where the transactions of a builder-requested follow-up flow go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraFlowPlacement {
    /// Follow-up is stored and executed as its own flow with a new id
    #[default]
    SeparateFlow,
    /// Follow-up transactions are appended to the parent flow and executed in place
    AppendToParent,
}

/// Location of the serialized registry in the key-value store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKey {
    /// Primary namespace
    pub primary_namespace: String,
    /// Secondary namespace
    pub secondary_namespace: String,
    /// Key
    pub key: String,
}

impl Default for StorageKey {
    fn default() -> Self {
        Self {
            primary_namespace: "txflow".to_string(),
            secondary_namespace: "registry".to_string(),
            key: "transaction_flows".to_string(),
        }
    }
}

/// Transaction store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Flows kept per user, oldest are evicted first
    pub max_flows_per_user: usize,
    /// Maximum number of follow-up flows chained after one request
    pub max_chain_depth: usize,
    /// Placement of follow-up flows
    pub extra_flow_placement: ExtraFlowPlacement,
    /// Signer timeout in seconds, unbounded when unset
    pub sign_timeout_secs: Option<u64>,
    /// Registry location
    pub storage: StorageKey,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_flows_per_user: DEFAULT_MAX_FLOWS_PER_USER,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            extra_flow_placement: ExtraFlowPlacement::default(),
            sign_timeout_secs: None,
            storage: StorageKey::default(),
        }
    }
}

impl StoreConfig {
    /// Signer timeout
    pub fn sign_timeout(&self) -> Option<Duration> {
        self.sign_timeout_secs.map(Duration::from_secs)
    }
}
