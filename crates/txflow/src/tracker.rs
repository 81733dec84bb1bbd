//! Status Tracker
//!
//! Targeted state transitions of a single flow or transaction. Each transition updates the
//! registry in memory, persists it and broadcasts the matching [`FlowEvent`].

use tracing::instrument;
use txflow_common::{
    BridgeStatus, Error, FlowState, FlowStatus, Transaction, TransactionFlow, TransactionStatus,
    UserId,
};
use uuid::Uuid;

use crate::events::FlowEvent;
use crate::registry::FlowRegistry;

/// Why a run stopped without touching the flow any further
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    /// The flow was removed from the registry
    Cleared,
    /// Transaction `index`, or the flow itself, is not in the state this run left it in
    Conflict {
        /// Transaction the run was driving
        index: usize,
    },
}

impl FlowRegistry {
    /// Set the bridge sub-status of transaction `index`.
    ///
    /// The primary transaction state is never changed. Fails with
    /// [`Error::NotBridgeTransaction`] when the transaction carries no bridge information.
    #[instrument(skip(self))]
    pub async fn set_bridge_status(
        &self,
        user: &UserId,
        flow_id: Uuid,
        index: usize,
        status: BridgeStatus,
    ) -> Result<(), Error> {
        self.modify_flow(user, flow_id, |flow| {
            let tx = flow
                .transactions
                .get_mut(index)
                .ok_or(Error::TransactionIndexOutOfRange { flow_id, index })?;
            let bridge = tx
                .tx
                .bridge
                .as_mut()
                .ok_or(Error::NotBridgeTransaction { flow_id, index })?;
            bridge.status = status;
            Ok::<(), Error>(())
        })
        .ok_or_else(|| Error::FlowNotFound {
            user: user.clone(),
            flow_id,
        })??;

        self.notify(FlowEvent::BridgeUpdated {
            user: user.clone(),
            flow_id,
            index,
            status,
        });

        self.persist().await
    }

    /// Apply `f` to one flow, mapping a missing flow to [`Halt::Cleared`]
    fn transition<F, R>(&self, user: &UserId, flow_id: Uuid, f: F) -> Result<R, Halt>
    where
        F: FnOnce(&mut TransactionFlow) -> Result<R, Halt>,
    {
        self.modify_flow(user, flow_id, f).ok_or(Halt::Cleared)?
    }

    /// Mark transaction `index` as signing and return it, `None` past the last transaction.
    ///
    /// The flow must still be in flight and the transaction untouched. When `first` is set the
    /// flow moves to [`FlowState::Signing`].
    pub(crate) async fn begin_transaction(
        &self,
        user: &UserId,
        flow_id: Uuid,
        index: usize,
        first: bool,
    ) -> Result<Option<Transaction>, Halt> {
        let tx = self.transition(user, flow_id, |flow| {
            if !flow.state.is_in_flight() {
                return Err(Halt::Conflict { index });
            }
            let Some(entry) = flow.transactions.get_mut(index) else {
                return Ok(None);
            };
            if entry.status() != TransactionStatus::None {
                return Err(Halt::Conflict { index });
            }
            entry.start_signing();
            let tx = entry.tx.clone();
            if first {
                flow.state = FlowState::Signing;
            }
            Ok(Some(tx))
        })?;

        if tx.is_some() {
            self.persist_logged().await;
            self.notify(FlowEvent::TransactionSigning {
                user: user.clone(),
                flow_id,
                index,
            });
        }

        Ok(tx)
    }

    /// Record the hash returned by the signer
    pub(crate) async fn record_submitted(
        &self,
        user: &UserId,
        flow_id: Uuid,
        index: usize,
        hash: &str,
    ) -> Result<(), Halt> {
        self.transition(user, flow_id, |flow| {
            let entry = flow
                .transactions
                .get_mut(index)
                .filter(|entry| entry.status() == TransactionStatus::Signing)
                .ok_or(Halt::Conflict { index })?;
            entry.submitted(hash.to_string());
            Ok(())
        })?;

        self.persist_logged().await;
        Ok(())
    }

    /// Mark transaction `index` as confirmed
    pub(crate) async fn confirm_transaction(
        &self,
        user: &UserId,
        flow_id: Uuid,
        index: usize,
    ) -> Result<(), Halt> {
        self.transition(user, flow_id, |flow| {
            // only an awaiting transaction can be confirmed
            let confirmed = flow
                .transactions
                .get_mut(index)
                .is_some_and(|entry| entry.confirm());
            if confirmed {
                Ok(())
            } else {
                Err(Halt::Conflict { index })
            }
        })?;

        self.persist_logged().await;
        self.notify(FlowEvent::TransactionFinished {
            user: user.clone(),
            flow_id,
            index,
            status: TransactionStatus::Success,
        });

        Ok(())
    }

    /// Mark transaction `index` and its flow as failed with `error`
    pub(crate) async fn fail_transaction(
        &self,
        user: &UserId,
        flow_id: Uuid,
        index: usize,
        error: &str,
    ) -> Result<(), Halt> {
        self.transition(user, flow_id, |flow| {
            let entry = flow
                .transactions
                .get_mut(index)
                .filter(|entry| {
                    matches!(
                        entry.status(),
                        TransactionStatus::Signing | TransactionStatus::AwaitingConfirmation
                    )
                })
                .ok_or(Halt::Conflict { index })?;
            entry.fail(error);
            flow.fail(error);
            Ok(())
        })?;

        self.persist_logged().await;
        self.notify(FlowEvent::TransactionFinished {
            user: user.clone(),
            flow_id,
            index,
            status: TransactionStatus::Error,
        });
        self.notify(FlowEvent::FlowFinished {
            user: user.clone(),
            flow_id,
            status: FlowStatus::Error,
        });

        Ok(())
    }

    /// Mark the flow as successful once every transaction confirmed
    pub(crate) async fn complete_flow(&self, user: &UserId, flow_id: Uuid) -> Result<(), Halt> {
        self.transition(user, flow_id, |flow| {
            if !flow.state.is_in_flight() || !flow.all_succeeded() {
                let index = flow.resume_index().unwrap_or(flow.transactions.len());
                return Err(Halt::Conflict { index });
            }
            flow.state = FlowState::Success;
            Ok(())
        })?;

        self.persist_logged().await;
        self.notify(FlowEvent::FlowFinished {
            user: user.clone(),
            flow_id,
            status: FlowStatus::Success,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use txflow_common::{ChainKind, FlowType, NewTransactionFlow};

    use super::*;
    use crate::config::StoreConfig;
    use crate::txflow_database::MemoryKVStore;

    async fn registry_with(transactions: Vec<Transaction>) -> (FlowRegistry, UserId, Uuid) {
        let registry =
            FlowRegistry::restore(Arc::new(MemoryKVStore::default()), &StoreConfig::default())
                .await
                .expect("registry");
        let user = UserId::from("0xabc");
        let flow = TransactionFlow::pending(
            NewTransactionFlow::new(FlowType::BridgeIn, "Bridge in", "/bridge.svg", json!({})),
            transactions,
            None,
        );
        let flow_id = flow.id;
        registry.append_flow(&user, flow).await.expect("append");
        (registry, user, flow_id)
    }

    #[tokio::test]
    async fn bridge_status_does_not_touch_primary_state() {
        let tx = Transaction::new(1, ChainKind::Evm, json!({})).with_bridge("ethereum", "canto");
        let (registry, user, flow_id) = registry_with(vec![tx]).await;
        registry
            .begin_transaction(&user, flow_id, 0, true)
            .await
            .expect("flow exists");
        registry
            .record_submitted(&user, flow_id, 0, "0x123")
            .await
            .expect("flow exists");
        let before = registry.get_flow(&user, flow_id).expect("flow").transactions[0]
            .state
            .clone();

        registry
            .set_bridge_status(&user, flow_id, 0, BridgeStatus::Completed)
            .await
            .expect("bridge update");

        let flow = registry.get_flow(&user, flow_id).expect("flow");
        assert_eq!(flow.transactions[0].state, before);
        assert_eq!(
            flow.transactions[0].bridge().map(|bridge| bridge.status),
            Some(BridgeStatus::Completed)
        );
    }

    #[tokio::test]
    async fn bridge_status_requires_bridge_transaction() {
        let tx = Transaction::new(7700, ChainKind::Evm, json!({}));
        let (registry, user, flow_id) = registry_with(vec![tx]).await;

        let result = registry
            .set_bridge_status(&user, flow_id, 0, BridgeStatus::Completed)
            .await;
        assert!(matches!(result, Err(Error::NotBridgeTransaction { index: 0, .. })));

        let result = registry
            .set_bridge_status(&user, flow_id, 3, BridgeStatus::Completed)
            .await;
        assert!(matches!(
            result,
            Err(Error::TransactionIndexOutOfRange { index: 3, .. })
        ));

        let result = registry
            .set_bridge_status(&user, Uuid::new_v4(), 0, BridgeStatus::Completed)
            .await;
        assert!(matches!(result, Err(Error::FlowNotFound { .. })));
    }

    #[tokio::test]
    async fn transitions_on_cleared_flow_report_cleared() {
        let tx = Transaction::new(7700, ChainKind::Evm, json!({}));
        let (registry, user, flow_id) = registry_with(vec![tx]).await;
        registry.clear_flows(&user, None).await.expect("clear");

        assert_eq!(
            registry.begin_transaction(&user, flow_id, 0, true).await,
            Err(Halt::Cleared)
        );
        assert_eq!(registry.complete_flow(&user, flow_id).await, Err(Halt::Cleared));
    }

    #[tokio::test]
    async fn transitions_refuse_unexpected_state() {
        let tx = Transaction::new(7700, ChainKind::Evm, json!({}));
        let (registry, user, flow_id) = registry_with(vec![tx]).await;
        let mut events = registry.subscribe();

        // not signing yet
        assert_eq!(
            registry.record_submitted(&user, flow_id, 0, "0x1").await,
            Err(Halt::Conflict { index: 0 })
        );
        assert_eq!(
            registry.confirm_transaction(&user, flow_id, 0).await,
            Err(Halt::Conflict { index: 0 })
        );
        assert_eq!(
            registry.fail_transaction(&user, flow_id, 0, "boom").await,
            Err(Halt::Conflict { index: 0 })
        );
        assert_eq!(
            registry.complete_flow(&user, flow_id).await,
            Err(Halt::Conflict { index: 0 })
        );

        registry
            .begin_transaction(&user, flow_id, 0, true)
            .await
            .expect("begin");
        // a second run cannot start the same transaction
        assert_eq!(
            registry.begin_transaction(&user, flow_id, 0, true).await,
            Err(Halt::Conflict { index: 0 })
        );
        // signed but never submitted
        assert_eq!(
            registry.confirm_transaction(&user, flow_id, 0).await,
            Err(Halt::Conflict { index: 0 })
        );

        let flow = registry.get_flow(&user, flow_id).expect("flow");
        assert_eq!(flow.status(), FlowStatus::Signing);
        assert_eq!(flow.transactions[0].status(), TransactionStatus::Signing);
        assert!(matches!(
            events.try_recv(),
            Ok(FlowEvent::TransactionSigning { index: 0, .. })
        ));
        assert!(events.try_recv().is_err());
    }
}
