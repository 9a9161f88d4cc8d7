use perp_core::prelude::*;
use rust_decimal::Decimal;
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Builds a fresh single-market book, matching engine and empty ledger for a
/// test. Tick/lot size come from [`MarketParams::btc_perp`], so whole-number
/// test prices/quantities always pass admission.
pub fn new_market_engine(market_id: u32) -> (Arc<DefaultOrderBook>, DefaultMatchingEngine, Ledger) {
    let sync_seq = Arc::new(AtomicU64::new(1));
    let sink = Arc::new(EmptyBookEventSink);
    let book = Arc::new(DefaultOrderBook::new(sync_seq, sink));
    let market = MarketParams::btc_perp(MarketId::new(market_id));
    let engine = DefaultMatchingEngine::new(book.clone(), market);
    (book, engine, Ledger::new())
}

/// Quickly generate a good-till-cancelled limit order for testing.
pub fn make_limit_order<P, Q>(id: u64, side: Side, price: P, qty: Q, ts: u64) -> Order
where
    P: Into<Decimal>,
    Q: Into<Decimal>,
{
    Order {
        id: OrderId::new(id),
        trader: TraderId::new(1),
        market_id: MarketId::new(1),
        side,
        time_in_force: TimeInForce::GoodTillCancelled,
        price: Price::new_unchecked(price.into()),
        quantity: UnsafeCell::new(Quantity::new_unchecked(qty.into())),
        sequence: ts,
        created_at: ts,
        updated_at: ts,
        ..Order::default()
    }
}

/// Quickly generate an immediate-or-cancel market order for testing.
pub fn make_market_order<Q>(id: u64, side: Side, qty: Q, ts: u64) -> Order
where
    Q: Into<Decimal>,
{
    let mut order = make_limit_order(id, side, 0, qty, ts);
    order.order_type = OrderType::Market;
    order.match_strategy = MatchStrategy::ImmediateOrCancel;
    order.time_in_force = TimeInForce::None;
    order
}

/// Get the current state of a side of the book as (order id, remaining qty).
pub fn get_book_state(book: &dyn OrderBookWalker, side: Side) -> Vec<(u64, Decimal)> {
    let guard = &crossbeam::epoch::pin();
    book.get_book(side)
        .iter(guard)
        .map(|entry| (entry.value().id.get(), entry.value().quantity().raw()))
        .collect()
}

#[test]
fn test_skiplist_next_when_delete() {
    use crossbeam::epoch;
    use crossbeam::epoch::default_collector;
    use crossbeam_skiplist::SkipList;

    let list = SkipList::new(default_collector().clone());
    let guard = &epoch::pin();
    let _entry1 = list.get_or_insert(1, 1, guard);
    let entry2 = list.get_or_insert(2, 2, guard);
    let _entry3 = list.get_or_insert(3, 3, guard);

    let front = list.front(guard).unwrap();
    entry2.remove(guard);
    let next = front.next().unwrap();
    let tail = next.next();

    assert_eq!(front.key(), &1);
    assert_eq!(next.key(), &3);
    assert!(tail.is_none());
}
