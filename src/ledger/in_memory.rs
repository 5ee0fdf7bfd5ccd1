use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use super::{Ledger, SharedLedger};
use crate::auction::{min_next, Amount, AuctionKey, Bid, BidError, UserId, MAX_AMOUNT};

/// Fake in-memory ledger.
///
/// Useful for unit-tests and local runs without a database.
pub struct InMemoryLedger {
    bids: RwLock<BTreeMap<AuctionKey, Vec<Bid>>>,
    next_id: AtomicU64,
    min_increment: Amount,
}

impl InMemoryLedger {
    pub fn new(min_increment: Amount) -> Self {
        Self {
            bids: RwLock::new(BTreeMap::default()),
            next_id: AtomicU64::new(1),
            min_increment,
        }
    }

    pub fn new_shared(min_increment: Amount) -> SharedLedger {
        Arc::new(Self::new(min_increment))
    }
}

impl Ledger for InMemoryLedger {
    fn get_highest(&self, key: &AuctionKey) -> Result<Option<Bid>, BidError> {
        Ok(self
            .bids
            .read()
            .get(key)
            .and_then(|bids| bids.iter().max_by_key(|b| b.amount))
            .cloned())
    }

    fn append(&self, key: &AuctionKey, user_id: UserId, amount: Amount) -> Result<Bid, BidError> {
        // same bound the postgres ledger's BIGINT column imposes
        if amount > MAX_AMOUNT {
            return Err(BidError::Storage(anyhow::format_err!(
                "amount {amount} exceeds storage bound {MAX_AMOUNT}"
            )));
        }

        let mut bids = self.bids.write();
        let entry = bids.entry(*key).or_default();

        let current_highest = entry.iter().map(|b| b.amount).max();
        let min = min_next(current_highest, self.min_increment);
        if amount < min {
            return Err(BidError::TooLow {
                min_next: min,
                current_highest: current_highest.unwrap_or(0),
            });
        }

        let bid = Bid {
            bid_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            key: *key,
            user_id,
            amount,
            created_at: Utc::now(),
        };
        entry.push(bid.clone());
        Ok(bid)
    }

    fn list_by_key(&self, key: &AuctionKey) -> Result<Vec<Bid>, BidError> {
        let mut bids: Vec<Bid> = self.bids.read().get(key).cloned().unwrap_or_default();
        bids.sort_by(|a, b| b.amount.cmp(&a.amount));
        Ok(bids)
    }
}
