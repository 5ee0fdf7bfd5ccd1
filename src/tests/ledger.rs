use crate::auction::{AuctionKey, BidError, ProductType, DEFAULT_MIN_INCREMENT, MAX_AMOUNT};
use crate::ledger::{InMemoryLedger, Ledger};

fn key() -> AuctionKey {
    AuctionKey::new(ProductType::Hoarding, 42)
}

#[test]
fn empty_ledger_has_no_highest() {
    let ledger = InMemoryLedger::new(DEFAULT_MIN_INCREMENT);
    assert_eq!(ledger.get_highest(&key()).unwrap(), None);
    assert!(ledger.list_by_key(&key()).unwrap().is_empty());
}

#[test]
fn append_rejects_amount_below_minimum() {
    let ledger = InMemoryLedger::new(DEFAULT_MIN_INCREMENT);

    match ledger.append(&key(), 1, 50) {
        Err(BidError::TooLow {
            min_next,
            current_highest,
        }) => {
            assert_eq!(min_next, 100);
            assert_eq!(current_highest, 0);
        }
        other => panic!("expected TooLow, got {other:?}"),
    }

    ledger.append(&key(), 1, 100).unwrap();

    match ledger.append(&key(), 2, 150) {
        Err(BidError::TooLow {
            min_next,
            current_highest,
        }) => {
            assert_eq!(min_next, 200);
            assert_eq!(current_highest, 100);
        }
        other => panic!("expected TooLow, got {other:?}"),
    }
}

#[test]
fn get_highest_is_idempotent_and_reflects_appends() {
    let ledger = InMemoryLedger::new(DEFAULT_MIN_INCREMENT);
    ledger.append(&key(), 1, 100).unwrap();
    ledger.append(&key(), 2, 200).unwrap();

    let first = ledger.get_highest(&key()).unwrap().unwrap();
    let second = ledger.get_highest(&key()).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.amount, 200);
    assert_eq!(first.user_id, 2);
}

#[test]
fn list_by_key_is_descending_and_scoped_to_key() {
    let ledger = InMemoryLedger::new(DEFAULT_MIN_INCREMENT);
    let other = AuctionKey::new(ProductType::Screen, 7);

    ledger.append(&key(), 1, 100).unwrap();
    ledger.append(&key(), 2, 250).unwrap();
    ledger.append(&other, 3, 400).unwrap();

    let bids = ledger.list_by_key(&key()).unwrap();
    let amounts: Vec<_> = bids.iter().map(|b| b.amount).collect();
    assert_eq!(amounts, vec![250, 100]);

    let other_bids = ledger.list_by_key(&other).unwrap();
    assert_eq!(other_bids.len(), 1);
    assert_eq!(other_bids[0].amount, 400);
}

#[test]
fn bids_at_the_storage_bound_do_not_wedge_the_auction() {
    let ledger = InMemoryLedger::new(DEFAULT_MIN_INCREMENT);
    ledger.append(&key(), 1, MAX_AMOUNT).unwrap();

    // a later submission must be rejected cleanly, not overflow
    match ledger.append(&key(), 2, 100) {
        Err(BidError::TooLow {
            min_next,
            current_highest,
        }) => {
            assert_eq!(current_highest, MAX_AMOUNT);
            assert_eq!(min_next, MAX_AMOUNT + DEFAULT_MIN_INCREMENT);
        }
        other => panic!("expected TooLow, got {other:?}"),
    }

    // matching the highest exactly is still below the minimum
    assert!(matches!(
        ledger.append(&key(), 2, MAX_AMOUNT),
        Err(BidError::TooLow { .. })
    ));

    // amounts beyond the BIGINT bound never enter the ledger
    assert!(matches!(
        ledger.append(&key(), 2, u64::MAX),
        Err(BidError::Storage(_))
    ));

    assert_eq!(
        ledger.get_highest(&key()).unwrap().unwrap().amount,
        MAX_AMOUNT
    );
}

#[test]
fn bid_ids_are_unique_across_keys() {
    let ledger = InMemoryLedger::new(DEFAULT_MIN_INCREMENT);
    let other = AuctionKey::new(ProductType::Society, 9);

    let a = ledger.append(&key(), 1, 100).unwrap();
    let b = ledger.append(&other, 1, 100).unwrap();
    assert_ne!(a.bid_id, b.bid_id);
}
