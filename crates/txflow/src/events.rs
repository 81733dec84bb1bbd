//! Flow events
//!
//! Every status transition and registry change is broadcast so a UI can re-render without
//! polling. Events are informational: the registry remains the source of truth, and a lagging
//! subscriber should re-read it.

use tokio::sync::broadcast;
use txflow_common::{BridgeStatus, FlowStatus, TransactionStatus, UserId};
use uuid::Uuid;

/// Capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Flow stored in [`FlowStatus::Pending`], about to be executed
    FlowStarted {
        /// User
        user: UserId,
        /// Flow id
        flow_id: Uuid,
    },
    /// Builder failed, flow stored in [`FlowStatus::Error`]
    FlowBuildFailed {
        /// User
        user: UserId,
        /// Flow id
        flow_id: Uuid,
        /// Build error
        error: String,
    },
    /// Transaction handed to the signer
    TransactionSigning {
        /// User
        user: UserId,
        /// Flow id
        flow_id: Uuid,
        /// Transaction index
        index: usize,
    },
    /// Transaction reached a terminal state
    TransactionFinished {
        /// User
        user: UserId,
        /// Flow id
        flow_id: Uuid,
        /// Transaction index
        index: usize,
        /// Terminal status
        status: TransactionStatus,
    },
    /// Flow reached a terminal state
    FlowFinished {
        /// User
        user: UserId,
        /// Flow id
        flow_id: Uuid,
        /// Terminal status
        status: FlowStatus,
    },
    /// Bridge sub-status updated
    BridgeUpdated {
        /// User
        user: UserId,
        /// Flow id
        flow_id: Uuid,
        /// Transaction index
        index: usize,
        /// New bridge status
        status: BridgeStatus,
    },
    /// One or all of a user's flows were removed
    FlowsCleared {
        /// User
        user: UserId,
        /// Flow id, `None` when all flows were cleared
        flow_id: Option<Uuid>,
    },
}

impl FlowEvent {
    /// Flow the event refers to
    pub fn flow_id(&self) -> Option<Uuid> {
        match self {
            FlowEvent::FlowStarted { flow_id, .. }
            | FlowEvent::FlowBuildFailed { flow_id, .. }
            | FlowEvent::TransactionSigning { flow_id, .. }
            | FlowEvent::TransactionFinished { flow_id, .. }
            | FlowEvent::FlowFinished { flow_id, .. }
            | FlowEvent::BridgeUpdated { flow_id, .. } => Some(*flow_id),
            FlowEvent::FlowsCleared { flow_id, .. } => *flow_id,
        }
    }
}

/// Broadcast sender for [`FlowEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FlowEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl EventBus {
    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn active_subscriptions(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcast an event
    pub(crate) fn notify(&self, event: FlowEvent) {
        if self.sender.receiver_count() == 0 {
            return;
        }

        if let Err(err) = self.sender.send(event) {
            tracing::debug!("Dropped flow event: {}", err);
        }
    }
}
