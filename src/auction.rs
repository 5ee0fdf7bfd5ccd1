use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ProductId = u64;
pub type UserId = u64;
pub type BidId = u64;
pub type Amount = u64;

pub const DEFAULT_MIN_INCREMENT: Amount = 100;

/// Largest storable amount; the ledger's BIGINT column bound. Enforced at
/// the API boundary so increment arithmetic cannot overflow.
pub const MAX_AMOUNT: Amount = i64::MAX as Amount;

/// Kinds of sellable inventory that can be auctioned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Hoarding,
    Society,
    Screen,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Hoarding => "hoarding",
            ProductType::Society => "society",
            ProductType::Screen => "screen",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = UnknownProductType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hoarding" => Ok(ProductType::Hoarding),
            "society" => Ok(ProductType::Society),
            "screen" => Ok(ProductType::Screen),
            other => Err(UnknownProductType(other.to_owned())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized product type: {0}")]
pub struct UnknownProductType(pub String);

/// Identity of one biddable item; the sole sharding and locking key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuctionKey {
    pub product_type: ProductType,
    pub product_id: ProductId,
}

impl AuctionKey {
    pub fn new(product_type: ProductType, product_id: ProductId) -> Self {
        Self {
            product_type,
            product_id,
        }
    }
}

impl fmt::Display for AuctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_type, self.product_id)
    }
}

/// An accepted offer. Immutable once persisted: bids are only ever appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub bid_id: BidId,
    pub key: AuctionKey,
    pub user_id: UserId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Read-side projection over the ledger for one key. Recomputed on demand,
/// never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionState {
    pub key: AuctionKey,
    pub highest_bid: Option<Bid>,
    pub min_next_amount: Amount,
}

impl AuctionState {
    pub fn derive(key: AuctionKey, highest_bid: Option<Bid>, min_increment: Amount) -> Self {
        let min_next_amount = min_next(highest_bid.as_ref().map(|b| b.amount), min_increment);
        Self {
            key,
            highest_bid,
            min_next_amount,
        }
    }
}

pub fn min_next(highest: Option<Amount>, min_increment: Amount) -> Amount {
    // saturate: an auction whose highest bid is near the integer bound is
    // unbeatable, not a panic
    highest.unwrap_or(0).saturating_add(min_increment)
}

#[derive(Error, Debug)]
pub enum BidError {
    #[error("unknown product: {0}")]
    UnknownProduct(AuctionKey),
    #[error("bid must be at least {min_next}; current highest is {current_highest}")]
    TooLow {
        min_next: Amount,
        current_highest: Amount,
    },
    #[error("auction busy, bid not accepted")]
    Timeout,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
