//! Signable transactions within a flow

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::{TransactionState, TransactionStatus};

/// Kind of chain transaction, selects the signing and confirmation path
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainKind {
    /// EVM transaction
    Evm,
    /// Cosmos transaction signed through an EIP-712 wallet
    Cosmos,
    /// Cosmos transaction signed through Keplr
    Keplr,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainKind::Evm => write!(f, "EVM"),
            ChainKind::Cosmos => write!(f, "COSMOS"),
            ChainKind::Keplr => write!(f, "KEPLR"),
        }
    }
}

/// Chain identifier: numeric for EVM chains, string for Cosmos chains
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainId {
    /// EVM chain id
    Evm(u64),
    /// Cosmos chain id
    Cosmos(String),
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Evm(id) => write!(f, "{id}"),
            ChainId::Cosmos(id) => write!(f, "{id}"),
        }
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self::Evm(id)
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self::Cosmos(id.to_string())
    }
}

/// Human readable description of a transaction
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxDescription {
    /// Short title
    pub title: String,
    /// Longer description
    pub description: String,
}

/// Bridge completion status observed on the destination chain
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeStatus {
    /// Not yet observed on the destination chain
    Pending,
    /// Arrived on the destination chain
    Completed,
    /// Bridge reported a failure
    Failed,
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeStatus::Pending => write!(f, "PENDING"),
            BridgeStatus::Completed => write!(f, "COMPLETED"),
            BridgeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for BridgeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(BridgeStatus::Pending),
            "COMPLETED" => Ok(BridgeStatus::Completed),
            "FAILED" => Ok(BridgeStatus::Failed),
            _ => Err(format!("Unknown bridge status: {s}")),
        }
    }
}

/// Bridge sub-status of a cross-chain transaction
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeInfo {
    /// Completion status
    pub status: BridgeStatus,
    /// Source chain name
    pub source_chain: String,
    /// Destination chain name
    pub dest_chain: String,
}

/// A signable transaction as produced by a flow builder
///
/// The payload is opaque to the engine and only interpreted by the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Chain the transaction is sent to
    pub chain_id: ChainId,
    /// Transaction kind
    pub kind: ChainKind,
    /// Display description
    #[serde(default)]
    pub description: TxDescription,
    /// Target, method and arguments, or encoded messages
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Bridge sub-status for cross-chain transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BridgeInfo>,
}

impl Transaction {
    /// Create new [`Transaction`]
    pub fn new(chain_id: impl Into<ChainId>, kind: ChainKind, payload: serde_json::Value) -> Self {
        Self {
            chain_id: chain_id.into(),
            kind,
            description: TxDescription::default(),
            payload,
            bridge: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, title: &str, description: &str) -> Self {
        self.description = TxDescription {
            title: title.to_string(),
            description: description.to_string(),
        };
        self
    }

    /// Mark as a bridge transaction, starting in [`BridgeStatus::Pending`]
    pub fn with_bridge(mut self, source_chain: &str, dest_chain: &str) -> Self {
        self.bridge = Some(BridgeInfo {
            status: BridgeStatus::Pending,
            source_chain: source_chain.to_string(),
            dest_chain: dest_chain.to_string(),
        });
        self
    }
}

/// One signable unit within a flow together with its lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTransaction {
    /// Transaction to sign
    pub tx: Transaction,
    /// Lifecycle state
    #[serde(default)]
    pub state: TransactionState,
}

impl From<Transaction> for FlowTransaction {
    fn from(tx: Transaction) -> Self {
        Self {
            tx,
            state: TransactionState::None,
        }
    }
}

impl FlowTransaction {
    /// Status without payload
    pub fn status(&self) -> TransactionStatus {
        self.state.status()
    }

    /// On-chain hash once signed
    pub fn hash(&self) -> Option<&str> {
        self.state.hash()
    }

    /// Failure detail
    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    /// Bridge sub-status
    pub fn bridge(&self) -> Option<&BridgeInfo> {
        self.tx.bridge.as_ref()
    }

    /// Mark as signing
    pub fn start_signing(&mut self) {
        self.state = TransactionState::Signing;
    }

    /// Record the signed hash and wait for the chain
    pub fn submitted(&mut self, hash: String) {
        self.state = TransactionState::AwaitingConfirmation { hash };
    }

    /// Mark as confirmed.
    ///
    /// Returns `false` and leaves the state untouched if the transaction was not awaiting
    /// confirmation, since a success always carries the hash it was confirmed with.
    pub fn confirm(&mut self) -> bool {
        match &self.state {
            TransactionState::AwaitingConfirmation { hash } => {
                self.state = TransactionState::Success { hash: hash.clone() };
                true
            }
            _ => false,
        }
    }

    /// Mark as failed, keeping the hash if one was recorded
    pub fn fail(&mut self, error: impl Into<String>) {
        let hash = self.state.hash().map(str::to_string);
        self.state = TransactionState::Error {
            hash,
            error: error.into(),
        };
    }

    /// Reset to [`TransactionState::None`] before a retry
    pub fn reset(&mut self) {
        self.state = TransactionState::None;
    }
}
