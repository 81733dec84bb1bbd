//! Flow Builder dispatch
//!
//! Transaction construction is delegated to one [`FlowBuilder`] per [`FlowType`], registered
//! once at startup. The engine never interprets builder parameters.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use txflow_common::{Error, ExtraFlow, FlowType, Transaction};

/// Transactions resolved for one flow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Transactions in execution order
    pub transactions: Vec<Transaction>,
    /// Follow-up flow to chain once all transactions succeed
    pub extra_flow: Option<ExtraFlow>,
}

impl BuildOutput {
    /// Create new [`BuildOutput`] without a follow-up flow
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            extra_flow: None,
        }
    }

    /// Request a follow-up flow
    pub fn with_extra_flow(mut self, extra_flow: ExtraFlow) -> Self {
        self.extra_flow = Some(extra_flow);
        self
    }
}

/// Builder failure, stored as the flow's error message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BuildError(pub String);

impl From<&str> for BuildError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for BuildError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Result of checking whether a failed flow may be retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryValidation {
    /// Retry may proceed
    Valid,
    /// Retry is refused
    Invalid {
        /// Reason shown to the user
        reason: String,
    },
}

impl RetryValidation {
    /// Refuse the retry with `reason`
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Transaction construction for one flow type
#[async_trait]
pub trait FlowBuilder: Send + Sync {
    /// Resolve `params` into an ordered list of transactions.
    ///
    /// Must not touch the flow registry.
    async fn build_transactions(&self, params: &serde_json::Value)
        -> Result<BuildOutput, BuildError>;

    /// Check that a failed flow with `params` can still be resumed, for example that the
    /// balances it needs are still there
    async fn validate_retry(&self, params: &serde_json::Value) -> RetryValidation;
}

/// Dispatch table from [`FlowType`] to [`FlowBuilder`]
#[derive(Clone, Default)]
pub struct FlowBuilders {
    builders: HashMap<FlowType, Arc<dyn FlowBuilder>>,
}

impl fmt::Debug for FlowBuilders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowBuilders")
            .field("registered", &self.registered())
            .finish()
    }
}

impl FlowBuilders {
    /// Create an empty dispatch table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the builder for `flow_type`, replacing any previous one
    pub fn register<B>(mut self, flow_type: FlowType, builder: B) -> Self
    where
        B: FlowBuilder + 'static,
    {
        self.builders.insert(flow_type, Arc::new(builder));
        self
    }

    /// Register a shared builder for `flow_type`
    pub fn register_arc(mut self, flow_type: FlowType, builder: Arc<dyn FlowBuilder>) -> Self {
        self.builders.insert(flow_type, builder);
        self
    }

    /// Builder for `flow_type`.
    ///
    /// A missing builder is a configuration error and is reported as
    /// [`Error::UnregisteredFlowType`].
    pub fn get(&self, flow_type: FlowType) -> Result<Arc<dyn FlowBuilder>, Error> {
        self.builders
            .get(&flow_type)
            .cloned()
            .ok_or(Error::UnregisteredFlowType(flow_type))
    }

    /// Registered flow types, sorted
    pub fn registered(&self) -> Vec<FlowType> {
        let mut types: Vec<FlowType> = self.builders.keys().copied().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use txflow_common::ChainKind;

    use super::*;

    struct VoteBuilder;

    #[async_trait]
    impl FlowBuilder for VoteBuilder {
        async fn build_transactions(
            &self,
            params: &serde_json::Value,
        ) -> Result<BuildOutput, BuildError> {
            let proposal = params["proposal"]
                .as_u64()
                .ok_or_else(|| BuildError::from("missing proposal"))?;
            Ok(BuildOutput::new(vec![Transaction::new(
                "canto_7700-1",
                ChainKind::Cosmos,
                json!({ "proposal": proposal }),
            )]))
        }

        async fn validate_retry(&self, _params: &serde_json::Value) -> RetryValidation {
            RetryValidation::invalid("voting period ended")
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_builder() {
        let builders = FlowBuilders::new().register(FlowType::GovernanceVote, VoteBuilder);

        let builder = builders.get(FlowType::GovernanceVote).expect("registered");
        let output = builder
            .build_transactions(&json!({"proposal": 42}))
            .await
            .expect("built");
        assert_eq!(output.transactions.len(), 1);
        assert_eq!(output.extra_flow, None);

        assert_eq!(
            builder.build_transactions(&json!({})).await,
            Err(BuildError::from("missing proposal"))
        );
        assert_eq!(builders.registered(), vec![FlowType::GovernanceVote]);
    }

    #[test]
    fn unregistered_type_is_an_error() {
        let builders = FlowBuilders::new().register(FlowType::GovernanceVote, VoteBuilder);

        assert!(matches!(
            builders.get(FlowType::Swap),
            Err(Error::UnregisteredFlowType(FlowType::Swap))
        ));
    }
}
