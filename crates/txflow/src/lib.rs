//! Transaction flow orchestration and persistence engine
//!
//! A user intent such as "bridge 10 tokens" or "vote yes on proposal 42" becomes a
//! [`TransactionFlow`]: an ordered list of chain transactions built by a registered
//! [`FlowBuilder`], persisted before anything is signed, then signed and confirmed one at a
//! time by the [`FlowExecutor`]. Failed flows can be resumed at the failed transaction with
//! [`TransactionStore::retry_transaction_flow`], and flows left in flight by a crash are
//! reconciled by [`TransactionStore::recover_interrupted_flows`].
//!
//! ```rust,ignore
//! let builders = FlowBuilders::new()
//!     .register(FlowType::BridgeIn, BridgeInBuilder::new(client.clone()))
//!     .register(FlowType::GovernanceVote, VoteBuilder::new(client));
//!
//! let store = TransactionStore::new(localstore, builders, watcher, StoreConfig::default()).await?;
//! store.recover_interrupted_flows().await?;
//!
//! let report = store
//!     .add_new_flow(
//!         &user,
//!         NewTransactionFlow::new(FlowType::GovernanceVote, "Vote", "", params),
//!         &wallet,
//!     )
//!     .await?;
//! ```

pub mod builder;
pub mod config;
pub mod events;
pub mod executor;
pub mod recovery;
pub mod registry;
pub mod retry;
pub mod signer;
pub mod store;
mod tracker;
pub mod txflow_database;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use builder::{BuildError, BuildOutput, FlowBuilder, FlowBuilders, RetryValidation};
pub use config::{ExtraFlowPlacement, StorageKey, StoreConfig};
pub use events::FlowEvent;
pub use executor::{ExecutionOutcome, FlowExecutor};
pub use recovery::RecoveryReport;
pub use registry::FlowRegistry;
pub use retry::RetryCoordinator;
pub use signer::{Confirmation, ConfirmationWatcher, SignerError, TransactionSigner, WatcherError};
pub use store::{FlowOutcome, FlowReport, FlowStep, TransactionStore};
/// Re-export common types
#[doc(hidden)]
pub use txflow_common::{
    database, error, flow, util, BridgeInfo, BridgeStatus, ChainId, ChainKind, Error, ExtraFlow,
    FlowState, FlowStatus, FlowTransaction, FlowType, NewTransactionFlow, Transaction,
    TransactionFlow, TransactionState, TransactionStatus, TxDescription, UserId,
};
