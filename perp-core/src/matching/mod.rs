//! Matching engine: admission policy, the price-time-priority crossing
//! algorithm, and the order lifecycle state machine glue.
//!
//! Adapted from the teacher's `engine/matching.rs` `DefaultMatchingEngine`.
//! The crossing/IOC/FOK/limit-order walk logic is unchanged; this module
//! adds the admission policy spec §4.B requires before an order ever
//! reaches the book (tick/lot size, post-only-would-cross, reduce-only),
//! and enforces the configured self-trade policy inside the maker walk.

pub mod advanced;

use crate::book::{OrderBookWalker, WalkingResult};
use crate::decimal::{Price, Quantity};
use crate::error::{AdmissionError, OrderLookupError};
use crate::ids::OrderId;
use crate::ledger::Ledger;
use crate::market::{MarketParams, SelfTradePolicy};
use crate::order::{LiquidityDirective, MatchStrategy, Order, OrderStatus, RejectReason, Side};
use crate::sync::EngineEventSink;
use crate::trade::Trade;
use std::sync::Arc;
use std::time::Instant;

fn is_multiple_of(value: rust_decimal::Decimal, step: rust_decimal::Decimal) -> bool {
    if step.is_zero() {
        return true;
    }
    (value % step).is_zero()
}

/// MatchingEngine is the public contract a host drives per market.
pub trait MatchingEngine {
    fn create_order(&self, order: &mut Order, ledger: &Ledger) -> Result<(), AdmissionError>;
    fn update_order(
        &self,
        order_id: OrderId,
        new_price: Price,
        now_microseconds: u64,
    ) -> Result<(), OrderLookupError>;
    fn cancel_order(&self, order_id: OrderId) -> Result<(), OrderLookupError>;
    fn match_orders(&self, sink: &dyn EngineEventSink);
}

pub struct DefaultMatchingEngine {
    order_book: Arc<dyn OrderBookWalker>,
    market: MarketParams,
}

impl DefaultMatchingEngine {
    pub fn new(order_book: Arc<dyn OrderBookWalker>, market: MarketParams) -> Self {
        Self { order_book, market }
    }

    /// Admission policy (spec §4.B, steps 1-5): order self-validation, tick
    /// and lot size, post-only-would-cross, reduce-only.
    pub fn admit(&self, order: &Order, ledger: &Ledger) -> Result<(), AdmissionError> {
        order.validate()?;

        if !is_multiple_of(order.price.raw(), self.market.tick_size) {
            return Err(AdmissionError::InvalidTickSize);
        }
        if !is_multiple_of(order.quantity().raw(), self.market.lot_size) {
            return Err(AdmissionError::InvalidLotSize);
        }

        if order.liquidity_directive == LiquidityDirective::MakerOnly {
            if let Some(best) = self.order_book.get_best_price(order.side.opposite()) {
                let would_cross = match order.side {
                    Side::Buy => order.price >= best,
                    Side::Sell => order.price <= best,
                };
                if would_cross {
                    return Err(AdmissionError::PostOnlyWouldCross);
                }
            }
        }

        let increases_position = match ledger.position(order.trader, order.market_id) {
            None => true,
            Some(position) if position.is_flat() => true,
            Some(position) => {
                (position.size.is_sign_positive() && order.side == Side::Buy)
                    || (position.size.is_sign_negative() && order.side == Side::Sell)
            }
        };

        if order.reduce_only && increases_position {
            return Err(AdmissionError::ReduceOnlyViolation);
        }

        if increases_position {
            let account = ledger
                .account(order.trader)
                .ok_or(AdmissionError::UnknownTrader(order.trader))?;
            let reference_price = match order.order_type {
                crate::order::OrderType::Limit => Some(order.price),
                crate::order::OrderType::Market => self.order_book.get_best_price(order.side.opposite()),
            };
            if let Some(reference_price) = reference_price {
                let margin_needed = crate::decimal::notional(reference_price, order.quantity()) * self.market.initial_margin_rate;
                if margin_needed > account.available_margin() {
                    return Err(AdmissionError::InsufficientMargin);
                }
            }
        }

        Ok(())
    }

    /// Returns `true` if the pairing violates the market's self-trade
    /// policy and should not produce a trade (spec §4.B edge cases).
    fn blocks_self_trade(&self, taker: &Order, maker: &Order) -> bool {
        taker.trader == maker.trader && self.market.self_trade_policy != SelfTradePolicy::Allow
    }

    fn process_order_pair(
        &self,
        taker: &Order,
        maker: &Order,
        updated: &mut Vec<Order>,
        matched: &mut Vec<Trade>,
    ) -> (bool, bool) {
        // Returns (maker_removed, self_trade_blocked).
        if self.blocks_self_trade(taker, maker) {
            match self.market.self_trade_policy {
                SelfTradePolicy::CancelMaker => {
                    maker.update_cancel_reason(crate::order::CancelReason::SelfTrade);
                    maker.enter_finished_from_matched();
                    updated.push(maker.clone());
                    return (true, true);
                }
                SelfTradePolicy::CancelTaker | SelfTradePolicy::Allow => {
                    maker.exit_matched();
                    return (false, true);
                }
            }
        }

        let now_microseconds = Instant::now().elapsed().as_micros() as u64;
        let trades = Trade::matched(now_microseconds, taker, maker);
        let Some((mut maker_trade, mut taker_trade)) = trades else {
            maker.exit_matched();
            return (false, false);
        };
        let trade_id = self.order_book.next_trade_id();
        maker_trade.trade_id = trade_id;
        taker_trade.trade_id = trade_id;

        let cloned_order;
        let removed = maker.is_filled();
        if !removed {
            cloned_order = maker.clone_reset_lifecycle();
            maker.exit_matched();
        } else {
            maker.enter_finished_from_matched();
            cloned_order = maker.clone();
        }
        updated.push(cloned_order);
        matched.push(maker_trade);
        matched.push(taker_trade);
        (removed, false)
    }

    fn lock_book_liquidity(&self, quantity: Quantity, slippage_price: Option<Price>) -> Option<Vec<OrderId>> {
        let mut order_id_list = Vec::new();
        let mut remaining_qty = quantity;
        let mut walking = |maker: &Order| {
            if !maker.enter_matched() {
                return WalkingResult::next();
            }
            remaining_qty = remaining_qty.saturating_sub(maker.quantity());
            order_id_list.push(maker.id);
            if remaining_qty.is_zero() {
                WalkingResult::exit()
            } else {
                WalkingResult::next()
            }
        };

        self.order_book.walking_book_maker(Side::Sell, slippage_price, &mut walking);

        if remaining_qty.is_zero() {
            return Some(order_id_list);
        }

        self.order_book
            .walking_by_order_id_list(order_id_list.as_slice(), &mut |o| {
                o.exit_matched();
                WalkingResult::next()
            });
        None
    }

    fn match_market_order_fok(&self, slippage_price: Option<Price>, taker: &Order, sink: &dyn EngineEventSink) -> WalkingResult {
        let (mut updated, mut matched) = (Vec::new(), Vec::new());

        let order_id_list_opt = self.lock_book_liquidity(taker.quantity(), slippage_price);
        let Some(order_id_list) = order_id_list_opt else {
            taker.update_status(OrderStatus::Rejected);
            taker.update_reject_reason(RejectReason::InsufficientLiquidity);
            taker.enter_finished_from_matched();
            updated.push(taker.clone());
            self.order_book.sync_matched(&updated, &matched);
            return WalkingResult::remove_and_next();
        };

        let mut process = |maker: &Order| {
            let (removed, _blocked) = self.process_order_pair(taker, maker, &mut updated, &mut matched);
            WalkingResult::new(removed, taker.quantity().is_zero())
        };
        self.order_book.walking_by_order_id_list(order_id_list.as_slice(), &mut process);

        taker.enter_finished_from_matched();
        updated.push(taker.clone());
        for trade in &matched {
            sink.trade_settled(trade);
        }
        self.order_book.sync_matched(&updated, &matched);
        WalkingResult::remove_and_next()
    }

    fn match_market_order(&self, taker: &Order, sink: &dyn EngineEventSink) -> WalkingResult {
        if !taker.enter_matched() {
            return WalkingResult::next();
        }

        let opposite_side = taker.side.opposite();
        let best_price = self.order_book.get_best_price(opposite_side);
        let slippage_price = best_price.and_then(|price| taker.slippage_bound_price(price));

        if taker.match_strategy == MatchStrategy::FillOrKill {
            return self.match_market_order_fok(slippage_price, taker, sink);
        }

        let (mut updated, mut matched) = (Vec::new(), Vec::new());
        let mut self_trade_cancelled = false;
        let mut process = |maker: &Order| {
            if !maker.enter_matched() {
                return WalkingResult::next();
            }
            let (removed, blocked) = self.process_order_pair(taker, maker, &mut updated, &mut matched);
            let cancel_taker = blocked && self.market.self_trade_policy == SelfTradePolicy::CancelTaker;
            self_trade_cancelled |= cancel_taker;
            WalkingResult::new(removed, taker.quantity().is_zero() || cancel_taker)
        };
        self.order_book.walking_book_maker(opposite_side, slippage_price, &mut process);

        if matched.is_empty() {
            taker.update_status(OrderStatus::Rejected);
            taker.update_reject_reason(RejectReason::InsufficientLiquidity);
        }
        if self_trade_cancelled {
            taker.update_cancel_reason(crate::order::CancelReason::SelfTrade);
        }
        taker.enter_finished_from_matched();
        updated.push(taker.clone());
        self.order_book.sync_matched(&updated, &matched);
        WalkingResult::remove_and_next()
    }

    fn match_limit_order(&self, taker: &Order, sink: &dyn EngineEventSink) -> WalkingResult {
        if !taker.enter_matched() {
            return WalkingResult::next();
        }

        let (mut updated, mut matched) = (Vec::new(), Vec::new());
        let mut self_trade_cancelled = false;
        let mut process = |maker: &Order| {
            if !maker.enter_matched() {
                return WalkingResult::next();
            }
            let (removed, blocked) = self.process_order_pair(taker, maker, &mut updated, &mut matched);
            let cancel_taker = blocked && self.market.self_trade_policy == SelfTradePolicy::CancelTaker;
            self_trade_cancelled |= cancel_taker;
            WalkingResult::new(removed, taker.quantity().is_zero() || cancel_taker)
        };
        self.order_book
            .walking_book_maker(taker.side.opposite(), Some(taker.price), &mut process);

        if updated.is_empty() && matched.is_empty() && !self_trade_cancelled {
            taker.exit_matched();
            return WalkingResult::next();
        }

        let cloned_order;
        let removed = taker.is_filled();
        let is_ioc_remainder = matches!(taker.match_strategy, MatchStrategy::ImmediateOrCancel);
        if !removed && !is_ioc_remainder && !self_trade_cancelled {
            cloned_order = taker.clone_reset_lifecycle();
            taker.exit_matched();
        } else if !removed {
            // IOC remainder, or a self-trade cancel: cancel the rest rather
            // than resting it.
            taker.update_status(OrderStatus::PartiallyFilled);
            taker.update_cancel_reason(if self_trade_cancelled {
                crate::order::CancelReason::SelfTrade
            } else {
                crate::order::CancelReason::TimeInForceExpired
            });
            taker.enter_finished_from_matched();
            cloned_order = taker.clone();
        } else {
            taker.enter_finished_from_matched();
            cloned_order = taker.clone();
        }
        updated.push(cloned_order);

        for trade in &matched {
            sink.trade_settled(trade);
        }
        self.order_book.sync_matched(&updated, &matched);
        WalkingResult::new(removed || is_ioc_remainder, false)
    }
}

impl MatchingEngine for DefaultMatchingEngine {
    fn create_order(&self, order: &mut Order, ledger: &Ledger) -> Result<(), AdmissionError> {
        self.admit(order, ledger)?;
        self.order_book.insert(order).map_err(AdmissionError::BookRejected)
    }

    fn update_order(&self, order_id: OrderId, new_price: Price, now_microseconds: u64) -> Result<(), OrderLookupError> {
        self.order_book.update_order(order_id, new_price, now_microseconds)
    }

    fn cancel_order(&self, order_id: OrderId) -> Result<(), OrderLookupError> {
        self.order_book.remove(order_id)
    }

    fn match_orders(&self, sink: &dyn EngineEventSink) {
        let mut walking = |order: &Order| self.match_market_order(order, sink);
        self.order_book.walking_market_book(&mut walking);

        let mut walking = |taker: &Order| self.match_limit_order(taker, sink);
        self.order_book.walking_cross_taker(&mut walking);
    }
}
