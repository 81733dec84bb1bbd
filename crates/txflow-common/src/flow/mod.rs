//! Transaction flow types
//!
//! A [`TransactionFlow`] is one user intent ("bridge 10 tokens", "vote yes on proposal 42")
//! resolved into an ordered list of [`FlowTransaction`]s. The list order is the execution order
//! and is never rearranged once resolved.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::unix_time_ms;

mod state;
mod transaction;

pub use state::{FlowState, FlowStatus, TransactionState, TransactionStatus};
pub use transaction::{
    BridgeInfo, BridgeStatus, ChainId, ChainKind, FlowTransaction, Transaction, TxDescription,
};

/// User account identifier (wallet address)
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create new [`UserId`]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl From<String> for UserId {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Flow type tag selecting the builder and retry validator
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowType {
    /// Bridge into the home chain
    #[serde(rename = "BRIDGE_IN")]
    BridgeIn,
    /// Bridge out of the home chain
    #[serde(rename = "BRIDGE_OUT")]
    BridgeOut,
    /// Add or remove ambient liquidity
    #[serde(rename = "AMBIENT_LIQUIDITY_TX")]
    AmbientLiquidity,
    /// Add or remove liquidity on the stable/volatile dex
    #[serde(rename = "CANTO_DEX_LP_TX")]
    CantoDexLp,
    /// Stake or unstake LP tokens
    #[serde(rename = "STAKE_LP_TX")]
    StakeLp,
    /// Claim LP rewards
    #[serde(rename = "CLAIM_LP_REWARDS_TX")]
    ClaimLpRewards,
    /// Claim rewards across all LP positions
    #[serde(rename = "LP_COMBO_CLAIM_REWARDS_TX")]
    LpComboClaimRewards,
    /// Supply, borrow, repay or withdraw on the lending market
    #[serde(rename = "CLM_CTOKEN_TX")]
    ClmCToken,
    /// Claim lending rewards
    #[serde(rename = "CLM_CLAIM_REWARDS_TX")]
    ClmClaimRewards,
    /// Delegate, undelegate or redelegate
    #[serde(rename = "STAKE_CANTO_TX")]
    Staking,
    /// Swap through a pool
    #[serde(rename = "SWAP_TX")]
    Swap,
    /// Vote on a governance proposal
    #[serde(rename = "GOVERNANCE_VOTE_TX")]
    GovernanceVote,
}

impl FlowType {
    /// Every flow type
    pub const ALL: [FlowType; 12] = [
        FlowType::BridgeIn,
        FlowType::BridgeOut,
        FlowType::AmbientLiquidity,
        FlowType::CantoDexLp,
        FlowType::StakeLp,
        FlowType::ClaimLpRewards,
        FlowType::LpComboClaimRewards,
        FlowType::ClmCToken,
        FlowType::ClmClaimRewards,
        FlowType::Staking,
        FlowType::Swap,
        FlowType::GovernanceVote,
    ];

    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::BridgeIn => "BRIDGE_IN",
            FlowType::BridgeOut => "BRIDGE_OUT",
            FlowType::AmbientLiquidity => "AMBIENT_LIQUIDITY_TX",
            FlowType::CantoDexLp => "CANTO_DEX_LP_TX",
            FlowType::StakeLp => "STAKE_LP_TX",
            FlowType::ClaimLpRewards => "CLAIM_LP_REWARDS_TX",
            FlowType::LpComboClaimRewards => "LP_COMBO_CLAIM_REWARDS_TX",
            FlowType::ClmCToken => "CLM_CTOKEN_TX",
            FlowType::ClmClaimRewards => "CLM_CLAIM_REWARDS_TX",
            FlowType::Staking => "STAKE_CANTO_TX",
            FlowType::Swap => "SWAP_TX",
            FlowType::GovernanceVote => "GOVERNANCE_VOTE_TX",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowType::ALL
            .into_iter()
            .find(|flow_type| flow_type.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown flow type: {s}"))
    }
}

/// Request to create a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransactionFlow {
    /// Flow type
    pub tx_type: FlowType,
    /// Display title
    pub title: String,
    /// Display icon
    pub icon: String,
    /// Opaque builder parameters
    pub params: serde_json::Value,
}

impl NewTransactionFlow {
    /// Create new [`NewTransactionFlow`]
    pub fn new(tx_type: FlowType, title: &str, icon: &str, params: serde_json::Value) -> Self {
        Self {
            tx_type,
            title: title.to_string(),
            icon: icon.to_string(),
            params,
        }
    }
}

/// Follow-up flow a builder asks to run once its own transactions all succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFlow {
    /// Flow type of the follow-up
    pub tx_type: FlowType,
    /// Opaque builder parameters of the follow-up
    pub params: serde_json::Value,
    /// Title, defaults to the parent's title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Icon, defaults to the parent's icon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ExtraFlow {
    /// Create new [`ExtraFlow`]
    pub fn new(tx_type: FlowType, params: serde_json::Value) -> Self {
        Self {
            tx_type,
            params,
            title: None,
            icon: None,
        }
    }

    /// Turn into a flow request, inheriting missing display fields from the parent
    pub fn into_new_flow(self, parent: &TransactionFlow) -> NewTransactionFlow {
        NewTransactionFlow {
            tx_type: self.tx_type,
            title: self.title.unwrap_or_else(|| parent.title.clone()),
            icon: self.icon.unwrap_or_else(|| parent.icon.clone()),
            params: self.params,
        }
    }
}

/// One user-initiated multi-step operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFlow {
    /// Unique flow id
    pub id: Uuid,
    /// Creation timestamp (unix milliseconds)
    pub created_at: u64,
    /// Flow type
    pub tx_type: FlowType,
    /// Display title
    pub title: String,
    /// Display icon
    pub icon: String,
    /// Opaque builder parameters
    pub params: serde_json::Value,
    /// Lifecycle state
    pub state: FlowState,
    /// Transactions in execution order
    pub transactions: Vec<FlowTransaction>,
    /// Follow-up flow not yet chained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<ExtraFlow>,
}

impl TransactionFlow {
    /// Create a flow whose transactions were resolved, in [`FlowState::Pending`]
    pub fn pending(
        request: NewTransactionFlow,
        transactions: Vec<Transaction>,
        follow_up: Option<ExtraFlow>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: unix_time_ms(),
            tx_type: request.tx_type,
            title: request.title,
            icon: request.icon,
            params: request.params,
            state: FlowState::Pending,
            transactions: transactions.into_iter().map(FlowTransaction::from).collect(),
            follow_up,
        }
    }

    /// Create a flow whose transactions could not be built, in [`FlowState::Error`]
    pub fn build_failed(request: NewTransactionFlow, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: unix_time_ms(),
            tx_type: request.tx_type,
            title: request.title,
            icon: request.icon,
            params: request.params,
            state: FlowState::Error {
                message: message.into(),
            },
            transactions: Vec::new(),
            follow_up: None,
        }
    }

    /// Status without payload
    pub fn status(&self) -> FlowStatus {
        self.state.status()
    }

    /// Last error message
    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    /// Mark the flow as failed
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = FlowState::Error {
            message: message.into(),
        };
    }

    /// Index execution resumes from on retry.
    ///
    /// This is the first transaction in [`TransactionStatus::Error`]. A flow reconciled after an
    /// interruption may have no failed entry, in which case the first entry that has not
    /// succeeded is used.
    pub fn resume_index(&self) -> Option<usize> {
        self.transactions
            .iter()
            .position(|tx| tx.status() == TransactionStatus::Error)
            .or_else(|| {
                self.transactions
                    .iter()
                    .position(|tx| tx.status() != TransactionStatus::Success)
            })
    }

    /// All transactions confirmed
    pub fn all_succeeded(&self) -> bool {
        self.transactions
            .iter()
            .all(|tx| tx.status() == TransactionStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request() -> NewTransactionFlow {
        NewTransactionFlow::new(
            FlowType::ClmCToken,
            "Supply WETH",
            "/weth.svg",
            json!({"amount": "1"}),
        )
    }

    fn txs(count: usize) -> Vec<Transaction> {
        (0..count)
            .map(|i| Transaction::new(7700, ChainKind::Evm, json!({ "i": i })))
            .collect()
    }

    #[test]
    fn flow_type_round_trips_wire_tag() {
        for flow_type in FlowType::ALL {
            let json = serde_json::to_string(&flow_type).expect("serialize");
            assert_eq!(json, format!("\"{}\"", flow_type.as_str()));
            assert_eq!(flow_type.as_str().parse::<FlowType>(), Ok(flow_type));
        }
        assert!("NOT_A_FLOW".parse::<FlowType>().is_err());
    }

    #[test]
    fn pending_flow_starts_with_untouched_transactions() {
        let flow = TransactionFlow::pending(request(), txs(3), None);

        assert_eq!(flow.status(), FlowStatus::Pending);
        assert_eq!(flow.transactions.len(), 3);
        assert!(flow
            .transactions
            .iter()
            .all(|tx| tx.status() == TransactionStatus::None));
        assert_eq!(flow.resume_index(), Some(0));
    }

    #[test]
    fn build_failure_has_no_transactions() {
        let flow = TransactionFlow::build_failed(request(), "chainId not supported");

        assert_eq!(flow.status(), FlowStatus::Error);
        assert_eq!(flow.error(), Some("chainId not supported"));
        assert!(flow.transactions.is_empty());
        assert_eq!(flow.resume_index(), None);
    }

    #[test]
    fn resume_index_prefers_failed_entry() {
        let mut flow = TransactionFlow::pending(request(), txs(3), None);
        flow.transactions[0].submitted("0x1".to_string());
        flow.transactions[0].confirm();
        flow.transactions[1].fail("rejected");

        assert_eq!(flow.resume_index(), Some(1));
    }

    #[test]
    fn extra_flow_inherits_display_fields() {
        let parent = TransactionFlow::pending(request(), txs(1), None);
        let child = ExtraFlow::new(FlowType::StakeLp, json!({})).into_new_flow(&parent);

        assert_eq!(child.tx_type, FlowType::StakeLp);
        assert_eq!(child.title, "Supply WETH");
        assert_eq!(child.icon, "/weth.svg");
    }
}
