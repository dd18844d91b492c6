use crate::models::Taxi;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    watch,
};
use tracing::{debug, trace};
use uuid::Uuid;

/// Events pushed to WebSocket subscribers.
///
/// Serialized as `{"event": "update_location", "data": {..}}`.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum WsServerMessage {
    UpdateLocation(Taxi),
}

pub type WsClientTx = UnboundedSender<WsServerMessage>;
pub type WsClientMap = Arc<DashMap<Uuid, WsClientTx>>;

/// A registered subscriber. Dropping it closes the channel; the hub prunes
/// the entry on its next publish.
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub rx: UnboundedReceiver<WsServerMessage>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<WsServerMessage> {
        self.rx.recv().await
    }
}

/// Fan-out of taxi snapshots to every connected client.
#[derive(Clone, Debug)]
pub struct BroadcastHub {
    clients: WsClientMap,
    taxi: watch::Receiver<Taxi>,
}

impl BroadcastHub {
    pub fn new(taxi: watch::Receiver<Taxi>) -> Self {
        Self {
            clients: WsClientMap::default(),
            taxi,
        }
    }

    /// Sends `state` to every connected subscriber and returns how many
    /// accepted it. Closed subscribers are dropped from the registry.
    pub fn publish(&self, state: &Taxi) -> usize {
        let message = WsServerMessage::UpdateLocation(state.clone());
        let mut delivered = 0;
        self.clients.retain(|id, tx| {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!(client_id = %id, "pruning disconnected subscriber");
                false
            }
        });
        trace!(delivered, "published taxi location");
        delivered
    }

    /// Registers a subscriber that has already been handed the current
    /// snapshot, so one event is waiting for it on connect.
    pub fn subscribe(&self) -> Subscription {
        let snapshot = self.taxi.borrow().clone();
        self.subscribe_from(snapshot)
    }

    /// Registers a subscriber primed with `snapshot`. If the taxi moved after
    /// `snapshot` was read but before registration, that publish missed the
    /// subscriber, so the newer position is queued behind it.
    fn subscribe_from(&self, snapshot: Taxi) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        // The receiver is still in scope so these sends cannot fail.
        let _ = tx.send(WsServerMessage::UpdateLocation(snapshot.clone()));
        self.clients.insert(id, tx.clone());

        let latest = self.taxi.borrow().clone();
        if latest != snapshot {
            debug!(client_id = %id, "taxi moved during subscribe, resending");
            let _ = tx.send(WsServerMessage::UpdateLocation(latest));
        }

        debug!(client_id = %id, "subscriber connected");
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: &Uuid) {
        if self.clients.remove(id).is_some() {
            debug!(client_id = %id, "subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.clients.len()
    }
}
