//! Fanout Broadcaster
//!
//! Room-style subscriptions keyed by auction. Delivery is best-effort per
//! connection: a dead receiver is pruned, never blocking the rest of the
//! room. Late joiners get nothing from here; they seed from the snapshot.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::auction::{Amount, AuctionKey, Bid, BidId, ProductId, ProductType, UserId};

/// Wire shape pushed to every subscriber of a key when a bid is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidEvent {
    pub bid_id: BidId,
    pub product_type: ProductType,
    pub product_id: ProductId,
    pub user_id: UserId,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl BidEvent {
    pub fn from_bid(bid: &Bid, user_name: String) -> Self {
        Self {
            bid_id: bid.bid_id,
            product_type: bid.key.product_type,
            product_id: bid.key.product_id,
            user_id: bid.user_id,
            user_name,
            amount: bid.amount,
            created_at: bid.created_at,
        }
    }

    pub fn key(&self) -> AuctionKey {
        AuctionKey::new(self.product_type, self.product_id)
    }
}

pub type ConnectionId = u64;
pub type EventSender = mpsc::UnboundedSender<BidEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<BidEvent>;

#[derive(Default)]
struct Rooms {
    subscribers: HashMap<AuctionKey, HashMap<ConnectionId, EventSender>>,
    memberships: HashMap<ConnectionId, HashSet<AuctionKey>>,
    senders: HashMap<ConnectionId, EventSender>,
    next_connection_id: ConnectionId,
}

#[derive(Default)]
pub struct Broadcaster {
    rooms: Mutex<Rooms>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connected client and hand back its identity.
    pub fn connect(&self, sender: EventSender) -> ConnectionId {
        let mut rooms = self.rooms.lock();
        rooms.next_connection_id += 1;
        let id = rooms.next_connection_id;
        rooms.senders.insert(id, sender);
        rooms.memberships.insert(id, HashSet::new());
        id
    }

    /// Idempotent; subscribing to a new key does not drop existing
    /// subscriptions of the same connection.
    pub fn subscribe(&self, key: AuctionKey, connection: ConnectionId) {
        let mut rooms = self.rooms.lock();
        let Some(sender) = rooms.senders.get(&connection).cloned() else {
            debug!(%key, connection, "subscribe from unknown connection");
            return;
        };
        rooms
            .subscribers
            .entry(key)
            .or_default()
            .insert(connection, sender);
        rooms
            .memberships
            .entry(connection)
            .or_default()
            .insert(key);
    }

    pub fn unsubscribe(&self, key: AuctionKey, connection: ConnectionId) {
        let mut rooms = self.rooms.lock();
        remove_member(&mut rooms, &key, connection);
        if let Some(keys) = rooms.memberships.get_mut(&connection) {
            keys.remove(&key);
        }
    }

    /// Drop all state for a connection. Must run on every disconnect path,
    /// abnormal ones included, or membership grows without bound.
    pub fn disconnect(&self, connection: ConnectionId) {
        let mut rooms = self.rooms.lock();
        if let Some(keys) = rooms.memberships.remove(&connection) {
            for key in keys {
                remove_member(&mut rooms, &key, connection);
            }
        }
        rooms.senders.remove(&connection);
    }

    /// Deliver `event` to every current subscriber of `key`. Returns the
    /// number of connections reached; failed sends are pruned and logged,
    /// never propagated.
    pub fn publish(&self, key: AuctionKey, event: &BidEvent) -> usize {
        let mut rooms = self.rooms.lock();
        let Some(members) = rooms.subscribers.get(&key) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (connection, sender) in members {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*connection);
            }
        }

        for connection in dead {
            debug!(%key, connection, "pruning dead subscriber");
            remove_member(&mut rooms, &key, connection);
            if let Some(keys) = rooms.memberships.get_mut(&connection) {
                keys.remove(&key);
            }
        }
        delivered
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, key: &AuctionKey) -> usize {
        self.rooms
            .lock()
            .subscribers
            .get(key)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

fn remove_member(rooms: &mut Rooms, key: &AuctionKey, connection: ConnectionId) {
    if let Some(members) = rooms.subscribers.get_mut(key) {
        members.remove(&connection);
        if members.is_empty() {
            rooms.subscribers.remove(key);
        }
    }
}
