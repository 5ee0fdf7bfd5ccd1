use chrono::Utc;

use crate::auction::{Amount, AuctionKey, Bid, BidId, ProductType, DEFAULT_MIN_INCREMENT};
use crate::fanout::BidEvent;
use crate::sync::BidTracker;

fn snapshot_bid(bid_id: BidId, amount: Amount) -> Bid {
    Bid {
        bid_id,
        key: AuctionKey::new(ProductType::Hoarding, 42),
        user_id: 1,
        amount,
        created_at: Utc::now(),
    }
}

fn event(bid_id: BidId, amount: Amount) -> BidEvent {
    BidEvent {
        bid_id,
        product_type: ProductType::Hoarding,
        product_id: 42,
        user_id: 1,
        user_name: "Asha".to_owned(),
        amount,
        created_at: Utc::now(),
    }
}

#[test]
fn unseeded_tracker_starts_at_the_increment() {
    let tracker = BidTracker::new(DEFAULT_MIN_INCREMENT);
    assert_eq!(tracker.highest_amount(), None);
    assert_eq!(tracker.min_next_amount(), 100);
}

#[test]
fn snapshot_then_stream_advances_the_minimum() {
    let mut tracker = BidTracker::new(DEFAULT_MIN_INCREMENT);
    tracker.seed(Some(&snapshot_bid(1, 200)));
    assert_eq!(tracker.highest_amount(), Some(200));
    assert_eq!(tracker.min_next_amount(), 300);

    assert!(tracker.observe(&event(2, 300)));
    assert_eq!(tracker.highest_amount(), Some(300));
    assert_eq!(tracker.min_next_amount(), 400);
}

#[test]
fn stale_and_duplicate_events_are_ignored() {
    let mut tracker = BidTracker::new(DEFAULT_MIN_INCREMENT);
    tracker.seed(Some(&snapshot_bid(1, 200)));
    assert!(tracker.observe(&event(2, 300)));

    // a superseded bid arriving after the snapshot
    assert!(!tracker.observe(&event(1, 200)));
    // duplicate delivery of the current highest
    assert!(!tracker.observe(&event(2, 300)));

    assert_eq!(tracker.highest_amount(), Some(300));
    assert_eq!(tracker.highest_bid_id(), Some(2));
    assert_eq!(tracker.min_next_amount(), 400);
}

#[test]
fn events_apply_to_an_empty_snapshot() {
    let mut tracker = BidTracker::new(DEFAULT_MIN_INCREMENT);
    tracker.seed(None);
    assert!(tracker.observe(&event(1, 100)));
    assert_eq!(tracker.min_next_amount(), 200);
}

#[test]
fn reset_requires_a_fresh_snapshot() {
    let mut tracker = BidTracker::new(DEFAULT_MIN_INCREMENT);
    tracker.seed(Some(&snapshot_bid(1, 200)));
    tracker.observe(&event(2, 300));

    tracker.reset();
    assert_eq!(tracker.highest_amount(), None);

    // reconnect: re-seed from the authoritative snapshot, not from memory
    tracker.seed(Some(&snapshot_bid(2, 300)));
    assert_eq!(tracker.min_next_amount(), 400);
}
