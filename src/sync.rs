//! Client Bid Synchronizer
//!
//! One viewer's reconciliation of the snapshot with the live event stream.
//! Seed from the authoritative snapshot, then apply pushed events; an event
//! is accepted only when its amount is strictly greater than the held
//! highest, which drops duplicates and events for superseded bids that
//! arrive after the snapshot. On reconnect, reset and repeat the full
//! subscribe/snapshot sequence; correctness never relies on gap-free
//! delivery.
use crate::auction::{min_next, Amount, Bid, BidId};
use crate::fanout::BidEvent;

#[derive(Debug, Clone)]
pub struct BidTracker {
    min_increment: Amount,
    highest_amount: Option<Amount>,
    highest_bid_id: Option<BidId>,
}

impl BidTracker {
    pub fn new(min_increment: Amount) -> Self {
        Self {
            min_increment,
            highest_amount: None,
            highest_bid_id: None,
        }
    }

    /// Seed local state from the snapshot fetched via request/response.
    pub fn seed(&mut self, snapshot: Option<&Bid>) {
        self.highest_amount = snapshot.map(|b| b.amount);
        self.highest_bid_id = snapshot.map(|b| b.bid_id);
    }

    /// Apply one pushed event. Returns whether it advanced the local state.
    pub fn observe(&mut self, event: &BidEvent) -> bool {
        match self.highest_amount {
            Some(held) if event.amount <= held => false,
            _ => {
                self.highest_amount = Some(event.amount);
                self.highest_bid_id = Some(event.bid_id);
                true
            }
        }
    }

    /// Drop all state, as on disconnect. The caller re-subscribes and
    /// re-seeds from a fresh snapshot.
    pub fn reset(&mut self) {
        self.highest_amount = None;
        self.highest_bid_id = None;
    }

    pub fn highest_amount(&self) -> Option<Amount> {
        self.highest_amount
    }

    pub fn highest_bid_id(&self) -> Option<BidId> {
        self.highest_bid_id
    }

    /// The smallest amount the viewer may submit next; anything below it is
    /// disabled in the UI.
    pub fn min_next_amount(&self) -> Amount {
        min_next(self.highest_amount, self.min_increment)
    }
}
