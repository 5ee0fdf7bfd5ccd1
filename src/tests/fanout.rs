use chrono::Utc;
use tokio::sync::mpsc;

use crate::auction::{AuctionKey, ProductType};
use crate::fanout::{BidEvent, Broadcaster};

fn key() -> AuctionKey {
    AuctionKey::new(ProductType::Hoarding, 42)
}

fn event(amount: u64) -> BidEvent {
    BidEvent {
        bid_id: amount,
        product_type: ProductType::Hoarding,
        product_id: 42,
        user_id: 1,
        user_name: "Asha".to_owned(),
        amount,
        created_at: Utc::now(),
    }
}

#[test]
fn publish_reaches_every_subscriber_of_the_key() {
    let broadcaster = Broadcaster::new();

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let a = broadcaster.connect(tx_a);
    let b = broadcaster.connect(tx_b);
    broadcaster.subscribe(key(), a);
    broadcaster.subscribe(key(), b);

    assert_eq!(broadcaster.publish(key(), &event(100)), 2);
    assert_eq!(rx_a.try_recv().unwrap().amount, 100);
    assert_eq!(rx_b.try_recv().unwrap().amount, 100);
}

#[test]
fn subscribe_is_idempotent() {
    let broadcaster = Broadcaster::new();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = broadcaster.connect(tx);
    broadcaster.subscribe(key(), conn);
    broadcaster.subscribe(key(), conn);

    assert_eq!(broadcaster.publish(key(), &event(100)), 1);
    rx.try_recv().unwrap();
    assert!(rx.try_recv().is_err(), "no duplicate delivery");
}

#[test]
fn publish_is_scoped_to_the_key() {
    let broadcaster = Broadcaster::new();
    let other = AuctionKey::new(ProductType::Screen, 7);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = broadcaster.connect(tx);
    broadcaster.subscribe(other, conn);

    assert_eq!(broadcaster.publish(key(), &event(100)), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn a_connection_may_subscribe_to_multiple_keys() {
    let broadcaster = Broadcaster::new();
    let other = AuctionKey::new(ProductType::Screen, 7);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = broadcaster.connect(tx);
    broadcaster.subscribe(key(), conn);
    broadcaster.subscribe(other, conn);

    broadcaster.publish(key(), &event(100));
    broadcaster.publish(other, &event(200));
    assert_eq!(rx.try_recv().unwrap().amount, 100);
    assert_eq!(rx.try_recv().unwrap().amount, 200);
}

#[test]
fn unsubscribe_stops_delivery_for_that_key_only() {
    let broadcaster = Broadcaster::new();
    let other = AuctionKey::new(ProductType::Screen, 7);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = broadcaster.connect(tx);
    broadcaster.subscribe(key(), conn);
    broadcaster.subscribe(other, conn);

    broadcaster.unsubscribe(key(), conn);
    assert_eq!(broadcaster.publish(key(), &event(100)), 0);
    assert_eq!(broadcaster.publish(other, &event(200)), 1);
    assert_eq!(rx.try_recv().unwrap().amount, 200);
}

#[test]
fn disconnect_drops_all_memberships() {
    let broadcaster = Broadcaster::new();
    let other = AuctionKey::new(ProductType::Screen, 7);

    let (tx, _rx) = mpsc::unbounded_channel();
    let conn = broadcaster.connect(tx);
    broadcaster.subscribe(key(), conn);
    broadcaster.subscribe(other, conn);

    broadcaster.disconnect(conn);
    assert_eq!(broadcaster.subscriber_count(&key()), 0);
    assert_eq!(broadcaster.subscriber_count(&other), 0);
    assert_eq!(broadcaster.publish(key(), &event(100)), 0);
}

#[test]
fn dead_subscriber_does_not_block_the_rest() {
    let broadcaster = Broadcaster::new();

    let (tx_dead, rx_dead) = mpsc::unbounded_channel();
    let (tx_live, mut rx_live) = mpsc::unbounded_channel();
    let dead = broadcaster.connect(tx_dead);
    let live = broadcaster.connect(tx_live);
    broadcaster.subscribe(key(), dead);
    broadcaster.subscribe(key(), live);
    drop(rx_dead);

    assert_eq!(broadcaster.publish(key(), &event(100)), 1);
    assert_eq!(rx_live.try_recv().unwrap().amount, 100);
    // the dead connection was pruned from the room
    assert_eq!(broadcaster.subscriber_count(&key()), 1);
}

#[test]
fn late_joiner_receives_no_past_events() {
    let broadcaster = Broadcaster::new();
    broadcaster.publish(key(), &event(100));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = broadcaster.connect(tx);
    broadcaster.subscribe(key(), conn);

    assert!(rx.try_recv().is_err());
    broadcaster.publish(key(), &event(200));
    assert_eq!(rx.try_recv().unwrap().amount, 200);
}
