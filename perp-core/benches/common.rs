use perp_core::prelude::*;
use rust_decimal::Decimal;
use std::cell::UnsafeCell;

/// Builds a fresh single-market book, matching engine and empty ledger for a
/// benchmark. Tick/lot size come from [`MarketParams::btc_perp`].
pub fn new_market_engine(market_id: u32) -> (std::sync::Arc<DefaultOrderBook>, DefaultMatchingEngine, Ledger) {
    let sync_seq = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(1));
    let sink = std::sync::Arc::new(EmptyBookEventSink);
    let book = std::sync::Arc::new(DefaultOrderBook::new(sync_seq, sink));
    let market = MarketParams::btc_perp(MarketId::new(market_id));
    let engine = DefaultMatchingEngine::new(book.clone(), market);
    (book, engine, Ledger::new())
}

/// Quickly generate a good-till-cancelled limit order for benchmarking.
pub fn make_limit_order(id: u64, side: Side, price: u64, qty: u64, ts: u64) -> Order {
    Order {
        id: OrderId::new(id),
        trader: TraderId::new(1),
        market_id: MarketId::new(1),
        side,
        time_in_force: TimeInForce::GoodTillCancelled,
        price: Price::new_unchecked(Decimal::from(price)),
        quantity: UnsafeCell::new(Quantity::new_unchecked(Decimal::from(qty))),
        sequence: ts,
        created_at: ts,
        updated_at: ts,
        ..Order::default()
    }
}

/// Quickly generate an immediate-or-cancel market order for benchmarking.
pub fn make_market_order(id: u64, side: Side, qty: u64, ts: u64) -> Order {
    let mut value = make_limit_order(id, side, 0, qty, ts);
    value.order_type = OrderType::Market;
    value.match_strategy = MatchStrategy::ImmediateOrCancel;
    value.time_in_force = TimeInForce::None;
    value
}
