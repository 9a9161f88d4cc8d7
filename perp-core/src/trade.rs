//! Trade record produced by the matching engine and consumed by settlement.
//!
//! `Trade::matched` is the teacher's `engine/types.rs` `Trade::matched`
//! constructor, adapted to the decimal `Price`/`Quantity` newtypes. The
//! struct itself grows the pre-settlement fields settlement needs to apply
//! a trade atomically to both counterparties (spec §4.C): realized PnL and
//! margin-change per side, populated by the settlement engine, not by the
//! matching engine.

use crate::decimal::{Amount, Price, Quantity};
use crate::ids::{MarketId, OrderId, TradeId, TraderId};
use crate::order::{Order, OrderStatus, Side};
use serde::{Deserialize, Serialize};

/// TradeRole represents the role of the order in a matched trade. Maker is
/// the resting order; Taker is the order that crossed the book.
#[derive(PartialEq, Eq, Default, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum TradeRole {
    #[default]
    Maker = 0,
    Taker = 1,
}

/// One side of a matched pair, as produced by the matching engine. Fields
/// below `created_at` are filled in by the settlement engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub market_id: MarketId,
    pub role: TradeRole,
    pub order_id: OrderId,
    pub trader: TraderId,
    /// Side of the order this trade leg belongs to — needed by settlement
    /// to know whether the fill adds to or reduces the trader's position.
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub created_at: u64,
    /// Realized PnL recognized by closing/flipping an existing position.
    /// Zero for a trade that only opens or adds to a position.
    pub realized_pnl: Amount,
    /// Fee charged to this side, already netted against `realized_pnl`.
    pub fee: Amount,
}

impl Default for Trade {
    fn default() -> Self {
        Trade {
            trade_id: TradeId::default(),
            market_id: MarketId::default(),
            role: TradeRole::default(),
            order_id: OrderId::default(),
            trader: TraderId::default(),
            side: Side::default(),
            price: Price::zero(),
            quantity: Quantity::zero(),
            created_at: 0,
            realized_pnl: Amount::ZERO,
            fee: Amount::ZERO,
        }
    }
}

impl Trade {
    /// Fills both orders against each other and returns the (maker, taker)
    /// trade pair, or `None` if nothing could be traded. Settlement fields
    /// (`realized_pnl`, `fee`) are left zeroed; the settlement engine fills
    /// them in once it knows each trader's existing position.
    #[inline(always)]
    pub(crate) fn matched(now_microseconds: u64, taker: &Order, maker: &Order) -> Option<(Trade, Trade)> {
        let maker_qty_before = maker.quantity();
        let taker_qty_before = taker.quantity();
        let traded_quantity = taker_qty_before.min(maker_qty_before);
        if traded_quantity.is_zero() {
            return None;
        }

        let maker_remaining = maker.quantity_fill(traded_quantity);
        let taker_remaining = taker.quantity_fill(traded_quantity);

        maker.update_status(if maker_remaining.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        });
        taker.update_status(if taker_remaining.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        });

        Some((
            Trade {
                trade_id: TradeId::default(),
                market_id: maker.market_id,
                role: TradeRole::Maker,
                order_id: maker.id,
                trader: maker.trader,
                side: maker.side,
                price: maker.price,
                quantity: traded_quantity,
                created_at: now_microseconds,
                realized_pnl: Amount::ZERO,
                fee: Amount::ZERO,
            },
            Trade {
                trade_id: TradeId::default(),
                market_id: taker.market_id,
                role: TradeRole::Taker,
                order_id: taker.id,
                trader: taker.trader,
                side: taker.side,
                price: maker.price,
                quantity: traded_quantity,
                created_at: now_microseconds,
                realized_pnl: Amount::ZERO,
                fee: Amount::ZERO,
            },
        ))
    }
}
