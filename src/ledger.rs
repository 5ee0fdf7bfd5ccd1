//! Bid Ledger
//!
//! Durable, append-only storage of bids, and the single source of truth for
//! "what is the current highest bid for key K". The ledger re-validates the
//! minimum-increment rule on every append even though the coordinator already
//! did; a bad caller must not be able to break the ordering invariant.
mod in_memory;
mod postgres;

pub use self::in_memory::InMemoryLedger;
pub use self::postgres::PostgresLedger;

use std::sync::Arc;

use crate::auction::{Amount, AuctionKey, Bid, BidError, UserId};

pub trait Ledger: Send + Sync {
    /// The bid with maximum `amount` for `key`, reflecting all committed
    /// appends.
    fn get_highest(&self, key: &AuctionKey) -> Result<Option<Bid>, BidError>;

    /// Persist a new bid. Fails with [`BidError::TooLow`] when `amount` is
    /// below the minimum computed from the ledger's own current contents.
    /// A bid is written in full or not at all.
    fn append(&self, key: &AuctionKey, user_id: UserId, amount: Amount) -> Result<Bid, BidError>;

    /// All bids for `key`, descending by amount. A fresh query each call.
    fn list_by_key(&self, key: &AuctionKey) -> Result<Vec<Bid>, BidError>;
}

pub type SharedLedger = Arc<dyn Ledger + 'static>;
