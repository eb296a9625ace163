//! Outbound events
//!
//! The collector publishes accepted signatures on an event bus and tells a
//! change notifier when a pending transaction gains a signature. Both are
//! collaborator interfaces; [`EventBroadcaster`] implements them on a tokio
//! broadcast channel.

use crate::core::Transaction;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

/// Maximum number of events to buffer per subscriber
const BROADCAST_CAPACITY: usize = 100;

/// Payload carried on the bus
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BusMessage {
    /// A co-signer signature was accepted
    #[serde(rename_all = "camelCase")]
    Signature {
        transaction_id: String,
        signature: String,
    },
}

impl BusMessage {
    /// Event name peers subscribe to
    pub fn kind(&self) -> &'static str {
        match self {
            BusMessage::Signature { .. } => "signature",
        }
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// `notify_all` asks for relay to every peer, not only local listeners
    async fn publish(&self, message: BusMessage, notify_all: bool);
}

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify_transaction_signature_change(&self, tx: &Transaction);
}

/// Everything the broadcaster emits
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum CoreEvent {
    #[serde(rename_all = "camelCase")]
    Bus {
        message: BusMessage,
        notify_all: bool,
    },
    /// A pending transaction's signature set changed
    SignatureChange { transaction: Transaction },
}

/// Fan-out of core events to any number of subscribers
#[derive(Debug)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    pub fn broadcast(&self, event: CoreEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for EventBroadcaster {
    async fn publish(&self, message: BusMessage, notify_all: bool) {
        log::debug!("Publishing {} event", message.kind());
        self.broadcast(CoreEvent::Bus {
            message,
            notify_all,
        });
    }
}

#[async_trait]
impl ChangeNotifier for EventBroadcaster {
    async fn notify_transaction_signature_change(&self, tx: &Transaction) {
        self.broadcast(CoreEvent::SignatureChange {
            transaction: tx.clone(),
        });
    }
}
