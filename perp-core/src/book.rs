//! Single-market order book: a price-time-priority skip list per side plus
//! an id index for O(log n) cancel/modify, and the crossing-walk used by the
//! matching engine.
//!
//! Adapted from the teacher's `engine/book.rs` almost verbatim — the
//! `crossbeam_skiplist`/`crossbeam::epoch`/`flurry` concurrency stack is
//! unchanged. The teacher's `AtomicU128` sync-sequence counter (which
//! required the nightly `#![feature(integer_atomics)]`) is replaced with a
//! stable `AtomicU64`; a 64-bit sequence counter does not overflow within
//! any realistic epoch-driver lifetime. `OrderID`/`RejectReason` etc. are
//! now shared types from [`crate::order`] and [`crate::ids`] rather than
//! book-local ones, since this module is now one of several per-market
//! instances rather than the whole engine.

use crate::error::OrderLookupError;
use crate::ids::{OrderId, TradeId};
use crate::order::{BookKey, LiquidityDirective, Order, OrderStatus, OrderType, RejectReason, Side};
use crate::sync::BookEventSink;
use crate::decimal::Price;
use crate::trade::Trade;
use crossbeam::epoch;
use crossbeam::epoch::default_collector;
use crossbeam_skiplist::SkipList;
use flurry::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// OrderBook is the contract a matching engine drives.
pub trait OrderBook {
    fn insert(&self, order: &mut Order) -> Result<(), RejectReason>;
    fn update_order(
        &self,
        order_id: OrderId,
        new_price: Price,
        now_microseconds: u64,
    ) -> Result<(), OrderLookupError>;
    fn remove(&self, order_id: OrderId) -> Result<(), OrderLookupError>;
    fn get_best_price(&self, side: Side) -> Option<Price>;
    fn get_book(&self, side: Side) -> &SkipList<BookKey, Order>;
    fn sync_matched(&self, updated: &[Order], trades: &[Trade]);
    /// Allocates the next `TradeId` for this market, shared by both legs of
    /// a matched pair so a maker/taker trade can be looked up by one id.
    fn next_trade_id(&self) -> TradeId;
}

/// WalkingResult is the callback's verdict for each visited order.
pub struct WalkingResult {
    pub remove: bool,
    pub exit: bool,
}

impl WalkingResult {
    pub fn new(remove: bool, exit: bool) -> Self {
        Self { remove, exit }
    }

    pub fn next() -> Self {
        Self { remove: false, exit: false }
    }

    pub fn remove_and_next() -> Self {
        Self { remove: true, exit: false }
    }

    pub fn exit() -> Self {
        Self { remove: false, exit: true }
    }

    pub fn remove_and_exit() -> Self {
        Self { remove: true, exit: true }
    }
}

/// MatchingEngineWalker is the set of traversal patterns the matching
/// engine needs over a single market's book.
pub trait MatchingEngineWalker {
    fn walking_market_book(&self, walk: &mut dyn FnMut(&Order) -> WalkingResult);

    fn walking_book_maker(
        &self,
        side: Side,
        slip_price_option: Option<Price>,
        walk: &mut dyn FnMut(&Order) -> WalkingResult,
    );

    fn walking_cross_taker(&self, walk: &mut dyn FnMut(&Order) -> WalkingResult);

    fn walking_by_order_id_list(
        &self,
        order_id_list: &[OrderId],
        walk: &mut dyn FnMut(&Order) -> WalkingResult,
    );
}

pub trait OrderBookWalker: Send + Sync + OrderBook + MatchingEngineWalker {}

/// DefaultOrderBook is the default implementation of a single market's book.
pub struct DefaultOrderBook {
    sync_seq: Arc<AtomicU64>,
    trade_seq: AtomicU64,
    sink: Arc<dyn BookEventSink>,
    market_orders: SkipList<u64, Order>,
    buy_orders: SkipList<BookKey, Order>,
    sell_orders: SkipList<BookKey, Order>,
    order_index: HashMap<OrderId, BookKey>,
}

impl DefaultOrderBook {
    pub fn new(sync_seq: Arc<AtomicU64>, sink: Arc<dyn BookEventSink>) -> Self {
        let collector = default_collector().clone();
        Self {
            sync_seq,
            trade_seq: AtomicU64::new(0),
            sink,
            market_orders: SkipList::new(collector.clone()),
            buy_orders: SkipList::new(collector.clone()),
            sell_orders: SkipList::new(collector),
            order_index: HashMap::new(),
        }
    }
}

impl OrderBook for DefaultOrderBook {
    fn insert(&self, order: &mut Order) -> Result<(), RejectReason> {
        let guard = &epoch::pin();
        let order_index = self.order_index.pin();

        let book_key = order.book_key();
        match order.order_type {
            OrderType::Limit => {
                let book = match order.side {
                    Side::Buy => &self.buy_orders,
                    Side::Sell => &self.sell_orders,
                };
                order.update_status(OrderStatus::Placed);
                book.get_or_insert(book_key, order.clone(), guard);
            }
            OrderType::Market => {
                order.update_status(OrderStatus::Placed);
                self.market_orders
                    .get_or_insert(order.priority(), order.clone(), guard);
            }
        };
        order_index.insert(order.id, book_key);
        let id = self.sync_seq.fetch_add(1, Ordering::AcqRel);
        self.sink.add_order(id, order);

        Ok(())
    }

    fn update_order(
        &self,
        order_id: OrderId,
        new_price: Price,
        now_microseconds: u64,
    ) -> Result<(), OrderLookupError> {
        let guard = &epoch::pin();
        let order_index = self.order_index.pin();
        let mut book_key = match order_index.get(&order_id) {
            Some(key) => *key,
            None => return Err(OrderLookupError::NotFound(order_id)),
        };

        let order_entry_opt = match book_key.side {
            Side::Buy => self.buy_orders.get(&book_key, guard),
            Side::Sell => self.sell_orders.get(&book_key, guard),
        };
        let order_entry = match order_entry_opt {
            Some(entry) => entry,
            None => return Err(OrderLookupError::NotFound(order_id)),
        };

        let book_order = order_entry.value();
        if !book_order.enter_finished_from_active() {
            return Err(OrderLookupError::NotModifiable(order_id));
        }

        let mut book_order = book_order.clone();
        order_index.remove(&order_id);
        order_entry.remove();

        book_order.price = new_price;
        book_order.updated_at = now_microseconds;
        book_order.reset_lifecycle();
        book_key = book_order.book_key();

        match book_order.side {
            Side::Buy => self.buy_orders.insert(book_key, book_order.clone(), guard),
            Side::Sell => self.sell_orders.insert(book_key, book_order.clone(), guard),
        };
        order_index.insert(book_order.id, book_key);
        let id = self.sync_seq.fetch_add(1, Ordering::AcqRel);
        self.sink.update_order(id, &book_order);

        Ok(())
    }

    fn remove(&self, order_id: OrderId) -> Result<(), OrderLookupError> {
        let guard = &epoch::pin();
        let order_index = self.order_index.pin();
        let book_key = match order_index.get(&order_id) {
            Some(key) => *key,
            None => return Err(OrderLookupError::NotFound(order_id)),
        };

        let order_entry_opt = match book_key.side {
            Side::Buy => self.buy_orders.get(&book_key, guard),
            Side::Sell => self.sell_orders.get(&book_key, guard),
        };
        let order_entry = match order_entry_opt {
            Some(entry) => entry,
            None => return Err(OrderLookupError::NotFound(order_id)),
        };

        let book_order = order_entry.value();
        if !book_order.enter_finished_from_active() {
            return Err(OrderLookupError::NotCancellable(order_id));
        }

        order_entry.remove();
        order_index.remove(&order_id);
        let id = self.sync_seq.fetch_add(1, Ordering::AcqRel);
        self.sink.cancel_order(id, book_order);

        Ok(())
    }

    fn get_best_price(&self, side: Side) -> Option<Price> {
        let guard = &epoch::pin();
        let entry = match side {
            Side::Buy => self.buy_orders.front(guard),
            Side::Sell => self.sell_orders.front(guard),
        };
        entry.map(|e| e.key().price)
    }

    fn get_book(&self, side: Side) -> &SkipList<BookKey, Order> {
        match side {
            Side::Buy => &self.buy_orders,
            Side::Sell => &self.sell_orders,
        }
    }

    fn sync_matched(&self, updated: &[Order], trades: &[Trade]) {
        let id = self.sync_seq.fetch_add(1, Ordering::AcqRel);
        self.sink.matched(id, updated, trades);
    }

    fn next_trade_id(&self) -> TradeId {
        TradeId::new(self.trade_seq.fetch_add(1, Ordering::AcqRel))
    }
}

impl MatchingEngineWalker for DefaultOrderBook {
    fn walking_market_book(&self, walk: &mut dyn FnMut(&Order) -> WalkingResult) {
        let guard = &epoch::pin();
        let mut entry = self.market_orders.front(guard);
        while let Some(e) = entry {
            let order = e.value();
            let result = walk(order);
            if result.remove {
                e.remove();
            } else if result.exit {
                break;
            }
            entry = e.next();
        }
    }

    fn walking_book_maker(
        &self,
        side: Side,
        slip_price_option: Option<Price>,
        walk: &mut dyn FnMut(&Order) -> WalkingResult,
    ) {
        let guard = &epoch::pin();
        let book = match side {
            Side::Buy => &self.buy_orders,
            Side::Sell => &self.sell_orders,
        };

        let mut entry = book.front(guard);
        while let Some(e) = entry {
            let key = e.key();
            let order = e.value();

            if order.liquidity_directive == LiquidityDirective::TakerOnly {
                entry = e.next();
                continue;
            }

            if let Some(slip_price) = slip_price_option {
                match side {
                    Side::Buy => {
                        if key.price < slip_price {
                            break;
                        }
                    }
                    Side::Sell => {
                        if key.price > slip_price {
                            break;
                        }
                    }
                }
            }

            let result = walk(order);
            if result.remove {
                e.remove();
            } else if result.exit {
                break;
            }
            entry = e.next();
        }
    }

    fn walking_cross_taker(&self, walk: &mut dyn FnMut(&Order) -> WalkingResult) {
        let guard = &epoch::pin();

        let (mut buy_entry_opt, mut sell_entry_opt) =
            (self.buy_orders.front(guard), self.sell_orders.front(guard));
        while buy_entry_opt.is_some() || sell_entry_opt.is_some() {
            match (buy_entry_opt.as_ref(), sell_entry_opt.as_ref()) {
                (Some(buy_entry), Some(sell_entry)) => {
                    let buy_key = buy_entry.key();
                    let sell_key = sell_entry.key();

                    if buy_key.price < sell_key.price {
                        break;
                    }

                    let buy_order = buy_entry.value();
                    let sell_order = sell_entry.value();
                    let (buy_maker_only, sell_maker_only) = (
                        buy_order.liquidity_directive == LiquidityDirective::MakerOnly,
                        sell_order.liquidity_directive == LiquidityDirective::MakerOnly,
                    );

                    if buy_maker_only && sell_maker_only {
                        buy_entry_opt = buy_entry.next();
                        sell_entry_opt = sell_entry.next();
                        continue;
                    }

                    // The later-arriving (higher-priority-number) side is the
                    // aggressor: walking its opposite book then yields the
                    // earlier-resting order as `maker`, so `Trade::matched`
                    // prices the fill at the resting order, not the aggressor's.
                    let taker = if buy_maker_only && !sell_maker_only {
                        sell_order
                    } else if sell_maker_only && !buy_maker_only {
                        buy_order
                    } else if buy_key.priority > sell_key.priority {
                        buy_order
                    } else {
                        sell_order
                    };
                    let taker_is_buy = taker.side == Side::Buy;

                    let result = walk(taker);
                    if result.exit {
                        break;
                    }

                    if taker_is_buy {
                        if result.remove {
                            buy_entry.remove();
                        }
                        buy_entry_opt = buy_entry.next();
                    } else {
                        if result.remove {
                            sell_entry.remove();
                        }
                        sell_entry_opt = sell_entry.next();
                    }
                }

                (Some(buy_entry), None) => {
                    let buy_key = buy_entry.key();
                    let sell_key = match self.sell_orders.front(guard) {
                        Some(sell_entry) => sell_entry.key(),
                        None => break,
                    };
                    if buy_key.price < sell_key.price {
                        break;
                    }

                    let buy_order = buy_entry.value();
                    if buy_order.liquidity_directive == LiquidityDirective::MakerOnly {
                        buy_entry_opt = buy_entry.next();
                        continue;
                    }
                    let result = walk(buy_order);
                    if result.exit {
                        break;
                    }
                    if result.remove {
                        buy_entry.remove();
                    }
                    buy_entry_opt = buy_entry.next();
                }

                (None, Some(sell_entry)) => {
                    let buy_key = match self.buy_orders.front(guard) {
                        Some(buy_entry) => buy_entry.key(),
                        None => break,
                    };
                    let sell_key = sell_entry.key();
                    if buy_key.price < sell_key.price {
                        break;
                    }

                    let sell_order = sell_entry.value();
                    if sell_order.liquidity_directive == LiquidityDirective::MakerOnly {
                        sell_entry_opt = sell_entry.next();
                        continue;
                    }
                    let result = walk(sell_order);
                    if result.exit {
                        break;
                    }
                    if result.remove {
                        sell_entry.remove();
                    }
                    sell_entry_opt = sell_entry.next();
                }

                (None, None) => break,
            }
        }
    }

    fn walking_by_order_id_list(
        &self,
        order_id_list: &[OrderId],
        walk: &mut dyn FnMut(&Order) -> WalkingResult,
    ) {
        let guard = &epoch::pin();
        let order_index = self.order_index.pin();

        for order_id in order_id_list {
            let book_key = match order_index.get(order_id) {
                Some(key) => *key,
                None => continue,
            };

            let order_entry_opt = match book_key.side {
                Side::Buy => self.buy_orders.get(&book_key, guard),
                Side::Sell => self.sell_orders.get(&book_key, guard),
            };
            let order_entry = match order_entry_opt {
                Some(entry) => entry,
                None => continue,
            };

            let order = order_entry.value();
            let result = walk(order);
            if result.remove {
                order_entry.remove();
            } else if result.exit {
                break;
            }
        }
    }
}

impl OrderBookWalker for DefaultOrderBook {}
