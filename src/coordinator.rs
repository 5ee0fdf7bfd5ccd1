//! Auction Coordinator
//!
//! Makes the read-validate-append sequence atomic per auction key. One lock
//! per key, created lazily and evicted when idle; submissions for different
//! keys never contend. The wait for a key's lock is bounded, so a submission
//! fails with a timeout instead of blocking indefinitely.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::auction::{Amount, AuctionKey, AuctionState, Bid, BidError, UserId};
use crate::catalog::{SharedListingStore, SharedUserDirectory};
use crate::fanout::{BidEvent, Broadcaster};
use crate::ledger::SharedLedger;

pub struct Coordinator {
    ledger: SharedLedger,
    listings: SharedListingStore,
    users: SharedUserDirectory,
    broadcaster: Arc<Broadcaster>,
    locks: Mutex<HashMap<AuctionKey, Arc<Mutex<()>>>>,
    min_increment: Amount,
    lock_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        ledger: SharedLedger,
        listings: SharedListingStore,
        users: SharedUserDirectory,
        broadcaster: Arc<Broadcaster>,
        min_increment: Amount,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            listings,
            users,
            broadcaster,
            locks: Mutex::new(HashMap::new()),
            min_increment,
            lock_timeout,
        }
    }

    /// Accept or reject one bid.
    ///
    /// The existence check runs outside the critical section: existence does
    /// not change mid-auction. Everything between reading the highest bid and
    /// appending the new one runs under the per-key lock, so two submissions
    /// for the same key can never both validate against the same stale
    /// highest-bid snapshot.
    pub fn submit_bid(
        &self,
        key: AuctionKey,
        user_id: UserId,
        amount: Amount,
    ) -> Result<Bid, BidError> {
        if !self.listings.exists(&key)? {
            return Err(BidError::UnknownProduct(key));
        }

        let lock = self.lock_for(key);
        let guard = lock
            .try_lock_for(self.lock_timeout)
            .ok_or(BidError::Timeout)?;

        let state = AuctionState::derive(key, self.ledger.get_highest(&key)?, self.min_increment);
        if amount < state.min_next_amount {
            return Err(BidError::TooLow {
                min_next: state.min_next_amount,
                current_highest: state.highest_bid.map(|b| b.amount).unwrap_or(0),
            });
        }

        let bid = self.ledger.append(&key, user_id, amount)?;
        drop(guard);

        // The bid is committed at this point. Fanout is fire-and-forget:
        // a publish problem must not roll it back.
        self.publish(&bid);

        Ok(bid)
    }

    fn publish(&self, bid: &Bid) {
        let user_name = crate::catalog::display_name_or_fallback(&*self.users, bid.user_id);
        let event = BidEvent::from_bid(bid, user_name);
        let delivered = self.broadcaster.publish(bid.key, &event);
        debug!(key = %bid.key, amount = bid.amount, delivered, "published accepted bid");
    }

    fn lock_for(&self, key: AuctionKey) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop per-key locks nobody is currently waiting on. An idle auction
    /// must not keep its lock entry forever.
    pub fn evict_idle_locks(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    #[cfg(test)]
    pub fn lock_count(&self) -> usize {
        self.locks.lock().len()
    }
}
