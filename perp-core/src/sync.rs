//! Observability event sinks. Adapted from the teacher's `engine/syncer.rs`
//! `OrderBookSyncer` trait (renamed `BookEventSink` here, same shape), with
//! a second trait added for the engine-wide events spec §6 lists that have
//! no book-level counterpart (trades settlement produces, liquidations,
//! funding settlements, ADL actions, insurance fund balance changes). The
//! default implementation logs through `tracing`, matching the ambient
//! stack described in SPEC_FULL.md rather than staying a silent no-op.

use crate::decimal::Amount;
use crate::ids::{MarketId, OrderId, TraderId};
use crate::order::Order;
use crate::trade::Trade;

/// Called by a single market's order book on every mutation.
pub trait BookEventSink: Send + Sync {
    fn add_order(&self, seq: u64, order: &Order);
    fn update_order(&self, seq: u64, order: &Order);
    fn cancel_order(&self, seq: u64, order: &Order);
    fn matched(&self, seq: u64, updated: &[Order], trades: &[Trade]);
}

/// No-op book sink, for tests that don't care about observability.
pub struct EmptyBookEventSink;

impl BookEventSink for EmptyBookEventSink {
    fn add_order(&self, _seq: u64, _order: &Order) {}
    fn update_order(&self, _seq: u64, _order: &Order) {}
    fn cancel_order(&self, _seq: u64, _order: &Order) {}
    fn matched(&self, _seq: u64, _updated: &[Order], _trades: &[Trade]) {}
}

/// `tracing`-backed book sink: logs at `debug` for routine book mutations
/// and `info` for matches, matching the event granularity spec §6 describes.
#[derive(Default)]
pub struct TracingBookEventSink;

impl BookEventSink for TracingBookEventSink {
    fn add_order(&self, seq: u64, order: &Order) {
        tracing::debug!(seq, order_id = order.id.get(), market = order.market_id.get(), "order placed");
    }

    fn update_order(&self, seq: u64, order: &Order) {
        tracing::debug!(seq, order_id = order.id.get(), "order modified");
    }

    fn cancel_order(&self, seq: u64, order: &Order) {
        tracing::debug!(seq, order_id = order.id.get(), "order canceled");
    }

    fn matched(&self, seq: u64, updated: &[Order], trades: &[Trade]) {
        tracing::info!(seq, trades = trades.len(), updated = updated.len(), "orders matched");
    }
}

/// Engine-wide observability events beyond the per-book ones, covering
/// settlement, liquidation, funding and ADL (spec §6's event surface).
pub trait EngineEventSink: Send + Sync {
    fn trade_settled(&self, trade: &Trade) {
        let _ = trade;
    }
    fn funding_settled(&self, market_id: MarketId, trader: TraderId, payment: Amount) {
        let _ = (market_id, trader, payment);
    }
    fn liquidation(&self, trader: TraderId, market_id: MarketId, tier: u8, penalty: Amount) {
        let _ = (trader, market_id, tier, penalty);
    }
    fn adl_executed(&self, trader: TraderId, market_id: MarketId, reduced_quantity: Amount) {
        let _ = (trader, market_id, reduced_quantity);
    }
    fn insurance_fund_changed(&self, market_id: MarketId, new_balance: Amount, delta: Amount) {
        let _ = (market_id, new_balance, delta);
    }
    fn order_rejected(&self, order_id: OrderId, reason: &str) {
        let _ = (order_id, reason);
    }
}

/// `tracing`-backed default implementation of [`EngineEventSink`].
#[derive(Default)]
pub struct TracingEngineEventSink;

impl EngineEventSink for TracingEngineEventSink {
    fn trade_settled(&self, trade: &Trade) {
        tracing::info!(
            trade_id = trade.trade_id.get(),
            market = trade.market_id.get(),
            trader = trade.trader.get(),
            price = %trade.price,
            quantity = %trade.quantity,
            realized_pnl = %trade.realized_pnl,
            "trade settled"
        );
    }

    fn funding_settled(&self, market_id: MarketId, trader: TraderId, payment: Amount) {
        tracing::info!(market = market_id.get(), trader = trader.get(), %payment, "funding settled");
    }

    fn liquidation(&self, trader: TraderId, market_id: MarketId, tier: u8, penalty: Amount) {
        tracing::warn!(trader = trader.get(), market = market_id.get(), tier, %penalty, "liquidation executed");
    }

    fn adl_executed(&self, trader: TraderId, market_id: MarketId, reduced_quantity: Amount) {
        tracing::warn!(trader = trader.get(), market = market_id.get(), %reduced_quantity, "auto-deleveraged");
    }

    fn insurance_fund_changed(&self, market_id: MarketId, new_balance: Amount, delta: Amount) {
        tracing::debug!(market = market_id.get(), %new_balance, %delta, "insurance fund balance changed");
    }

    fn order_rejected(&self, order_id: OrderId, reason: &str) {
        tracing::debug!(order_id = order_id.get(), reason, "order rejected");
    }
}
