mod common;

use crate::common::*;
use perp_core::prelude::*;
use rand::Rng;

#[test]
fn test_massive_order_insertion() {
    let (book, engine, ledger) = new_market_engine(1);

    for i in 0..100_000u64 {
        let mut order = make_limit_order(i, Side::Buy, 1000 - (i % 1000), 10, 1000 + i);
        engine.create_order(&mut order, &ledger).unwrap();
    }

    let buy_book_state = get_book_state(book.as_ref(), Side::Buy);
    assert_eq!(buy_book_state.len(), 100_000);
}

#[test]
fn test_massive_order_cancellation() {
    let (_book, engine, ledger) = new_market_engine(1);

    for i in 0..50_000u64 {
        let mut order = make_limit_order(i, Side::Sell, 1000 + (i % 500), 10, 2000 + i);
        engine.create_order(&mut order, &ledger).unwrap();
    }

    // Randomly cancel half of them
    let mut rng = rand::rng();
    for _i in 0..25_000 {
        let id_to_cancel = rng.random_range(0..50_000u64);
        let _ = engine.cancel_order(OrderId::new(id_to_cancel));
    }

    // No assertion: just ensure no panic
}

#[test]
fn test_massive_order_matching() {
    let (_book, engine, ledger) = new_market_engine(1);

    // Insert many sell orders
    for i in 0..30_000u64 {
        let mut sell = make_limit_order(i, Side::Sell, 1000 + (i % 500), 10, 3000 + i);
        engine.create_order(&mut sell, &ledger).unwrap();
    }

    // Insert many buy orders that will aggressively cross sell orders
    for i in 30_000..60_000u64 {
        let mut buy = make_limit_order(i, Side::Buy, 2000, 10, 4000 + i);
        engine.create_order(&mut buy, &ledger).unwrap();
    }

    // Trigger matching
    engine.match_orders(&TracingEngineEventSink);

    // Verify no panic during matching
}
