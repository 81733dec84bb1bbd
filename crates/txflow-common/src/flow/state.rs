//! Flow and transaction lifecycle states
//!
//! The persisted states carry their own payload (hash, error message) so that a state such as
//! "success with an error attached" cannot be represented.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flow status without payload
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    /// Not started
    None,
    /// Stored, waiting for the first signature
    Pending,
    /// At least one transaction has started signing
    Signing,
    /// All transactions confirmed
    Success,
    /// A transaction or the build failed
    Error,
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStatus::None => "NONE",
            FlowStatus::Pending => "PENDING",
            FlowStatus::Signing => "SIGNING",
            FlowStatus::Success => "SUCCESS",
            FlowStatus::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// Persisted flow state
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    /// Not started
    #[default]
    None,
    /// Stored, waiting for the first signature
    Pending,
    /// At least one transaction has started signing
    Signing,
    /// All transactions confirmed
    Success,
    /// Failed with the last error message
    Error {
        /// Error message
        message: String,
    },
}

impl FlowState {
    /// Status without payload
    pub fn status(&self) -> FlowStatus {
        match self {
            FlowState::None => FlowStatus::None,
            FlowState::Pending => FlowStatus::Pending,
            FlowState::Signing => FlowStatus::Signing,
            FlowState::Success => FlowStatus::Success,
            FlowState::Error { .. } => FlowStatus::Error,
        }
    }

    /// Error message if the flow failed
    pub fn error(&self) -> Option<&str> {
        match self {
            FlowState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Flow is in progress and would have been driven by an executor
    pub fn is_in_flight(&self) -> bool {
        matches!(self, FlowState::Pending | FlowState::Signing)
    }
}

/// Transaction status without payload
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Not started
    None,
    /// Waiting for the signer
    Signing,
    /// Submitted, waiting for the chain
    AwaitingConfirmation,
    /// Confirmed on chain
    Success,
    /// Signing or confirmation failed
    Error,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::None => "NONE",
            TransactionStatus::Signing => "SIGNING",
            TransactionStatus::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// Persisted transaction state
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    /// Not started
    #[default]
    None,
    /// Waiting for the signer
    Signing,
    /// Submitted, waiting for the chain
    AwaitingConfirmation {
        /// On-chain transaction hash
        hash: String,
    },
    /// Confirmed on chain
    Success {
        /// On-chain transaction hash
        hash: String,
    },
    /// Signing or confirmation failed
    Error {
        /// Hash, present when the failure happened after signing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
        /// Failure detail
        error: String,
    },
}

impl TransactionState {
    /// Status without payload
    pub fn status(&self) -> TransactionStatus {
        match self {
            TransactionState::None => TransactionStatus::None,
            TransactionState::Signing => TransactionStatus::Signing,
            TransactionState::AwaitingConfirmation { .. } => {
                TransactionStatus::AwaitingConfirmation
            }
            TransactionState::Success { .. } => TransactionStatus::Success,
            TransactionState::Error { .. } => TransactionStatus::Error,
        }
    }

    /// On-chain hash once signed
    pub fn hash(&self) -> Option<&str> {
        match self {
            TransactionState::AwaitingConfirmation { hash }
            | TransactionState::Success { hash } => Some(hash),
            TransactionState::Error { hash, .. } => hash.as_deref(),
            TransactionState::None | TransactionState::Signing => None,
        }
    }

    /// Failure detail
    pub fn error(&self) -> Option<&str> {
        match self {
            TransactionState::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_state_serializes_with_status_tag() {
        let json = serde_json::to_value(FlowState::Error {
            message: "boom".to_string(),
        })
        .expect("serialize");
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["message"], "boom");

        let pending: FlowState =
            serde_json::from_str(r#"{"status":"PENDING"}"#).expect("deserialize");
        assert_eq!(pending, FlowState::Pending);
    }

    #[test]
    fn error_state_keeps_hash() {
        let state = TransactionState::Error {
            hash: Some("0x123".to_string()),
            error: "reverted".to_string(),
        };
        assert_eq!(state.status(), TransactionStatus::Error);
        assert_eq!(state.hash(), Some("0x123"));
        assert_eq!(state.error(), Some("reverted"));

        let json = serde_json::to_string(&TransactionState::Error {
            hash: None,
            error: "rejected".to_string(),
        })
        .expect("serialize");
        assert!(!json.contains("hash"));
    }

    #[test]
    fn awaiting_confirmation_status_name() {
        let state = TransactionState::AwaitingConfirmation {
            hash: "0xabc".to_string(),
        };
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["status"], "AWAITING_CONFIRMATION");
        assert_eq!(state.status().to_string(), "AWAITING_CONFIRMATION");
    }
}
