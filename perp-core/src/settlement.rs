//! Settlement engine: applies a matched trade pair atomically to both
//! counterparties' positions and accounts (spec §4.C).
//!
//! No direct teacher counterpart — the teacher's matching engine stops at
//! producing `Trade` records. The "both succeed or both fail" transactional
//! shape is grounded on `other_examples/3e75eab7_..._liquidation.rs.rs`'s
//! `liquidate_with_incentive`, which computes every balance delta for a
//! liquidation before committing any of them; settlement applies the same
//! discipline to ordinary trades. Runs single-threaded off the per-epoch
//! drain queue (spec §5), with trades ordered by `trade_id` for determinism.

use crate::decimal::{notional, Amount};
use crate::error::SettlementError;
use crate::ledger::Ledger;
use crate::market::{FeeUnderflowPolicy, MarketParams};
use crate::order::Side;
use crate::sync::EngineEventSink;
use crate::trade::{Trade, TradeRole};

/// Per-leg classification, recorded for observability/tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillClass {
    Opening,
    Closing,
    Flipping,
}

pub struct SettlementEngine;

impl SettlementEngine {
    /// Settles a maker/taker trade pair, applying both legs or neither.
    pub fn settle_trade_pair(
        ledger: &mut Ledger,
        market: &MarketParams,
        maker: &mut Trade,
        taker: &mut Trade,
        sink: &dyn EngineEventSink,
    ) -> Result<(), SettlementError> {
        // Precompute both legs' effects before committing either, so a
        // fee-underflow rejection on one leg never leaves the other half
        // applied (spec's "both succeed or both fail" requirement).
        let maker_fee_rate = market.maker_fee_rate;
        let taker_fee_rate = market.taker_fee_rate;

        let maker_plan = Self::plan_leg(ledger, market, maker, maker_fee_rate)?;
        let taker_plan = Self::plan_leg(ledger, market, taker, taker_fee_rate)?;

        Self::commit_leg(ledger, maker, maker_plan);
        Self::commit_leg(ledger, taker, taker_plan);

        sink.trade_settled(maker);
        sink.trade_settled(taker);
        Ok(())
    }

    fn plan_leg(
        ledger: &Ledger,
        market: &MarketParams,
        trade: &Trade,
        fee_rate: Amount,
    ) -> Result<LegPlan, SettlementError> {
        let position = ledger
            .position(trade.trader, trade.market_id)
            .cloned()
            .unwrap_or_else(|| crate::position::Position::flat(trade.trader, trade.market_id));

        let fill_signed = trade.side.sign();
        let fill_qty = trade.quantity.raw();
        let fee = notional(trade.price, trade.quantity) * fee_rate;

        let same_direction = position.is_flat()
            || (position.size.is_sign_positive() && fill_signed > 0)
            || (position.size.is_sign_negative() && fill_signed < 0);

        let (new_size, new_entry, new_margin, realized_pnl, class) = if same_direction {
            let added_notional = notional(trade.price, trade.quantity);
            let old_notional = position.size.abs() * position.entry_price.raw();
            let new_size = position.size + Amount::from(fill_signed) * fill_qty;
            let new_entry = if new_size.is_zero() {
                Amount::ZERO
            } else {
                (old_notional + added_notional) / new_size.abs()
            };
            let margin_needed = added_notional * market.initial_margin_rate;
            (
                new_size,
                new_entry,
                position.margin + margin_needed,
                Amount::ZERO,
                FillClass::Opening,
            )
        } else {
            let closing_signum = position.size.signum();
            let position_mag = position.size.abs();
            let reduce_amount = position_mag.min(fill_qty);
            let realized = reduce_amount * closing_signum * (trade.price.raw() - position.entry_price.raw());
            let margin_released = if position_mag.is_zero() {
                Amount::ZERO
            } else {
                position.margin * (reduce_amount / position_mag)
            };

            if fill_qty > position_mag {
                // Flip: close the remainder of the old side, then open the
                // remaining quantity on the new side at the trade price.
                let flip_qty = fill_qty - position_mag;
                let flip_notional = trade.price.raw() * flip_qty;
                let new_size = Amount::from(fill_signed) * flip_qty;
                let new_margin = flip_notional * market.initial_margin_rate;
                (
                    new_size,
                    trade.price.raw(),
                    new_margin,
                    realized,
                    FillClass::Flipping,
                )
            } else {
                let new_size = position.size + Amount::from(fill_signed) * fill_qty;
                let new_entry = if new_size.is_zero() {
                    Amount::ZERO
                } else {
                    position.entry_price.raw()
                };
                (
                    new_size,
                    new_entry,
                    position.margin - margin_released,
                    realized,
                    FillClass::Closing,
                )
            }
        };

        let new_margin = new_margin.max(Amount::ZERO);
        let margin_delta = new_margin - position.margin;

        let balance_delta = realized_pnl - fee;
        let account = ledger
            .account(trade.trader)
            .ok_or(SettlementError::AccountNotFound(trade.trader))?;
        if account.balance + balance_delta < Amount::ZERO
            && market.fee_underflow_policy == FeeUnderflowPolicy::RejectTrade
        {
            return Err(SettlementError::FeeUnderflow);
        }
        // Mirrors what `Account::lock_margin` would decide were it called
        // right now, so `commit_leg`'s later call is never surprised by a
        // rejection (spec A1: `locked_margin = Σ margin(positions)`).
        if margin_delta.is_sign_positive() && !margin_delta.is_zero() && account.available_margin() < margin_delta {
            return Err(SettlementError::InsufficientMargin);
        }

        Ok(LegPlan {
            new_size,
            new_entry,
            new_margin,
            margin_delta,
            realized_pnl,
            fee,
            class,
        })
    }

    fn commit_leg(ledger: &mut Ledger, trade: &mut Trade, plan: LegPlan) {
        trade.realized_pnl = plan.realized_pnl;
        trade.fee = plan.fee;

        {
            let position = ledger.position_or_flat_mut(trade.trader, trade.market_id);
            position.size = plan.new_size;
            position.entry_price = crate::decimal::Price::new_unchecked(plan.new_entry);
            position.margin = plan.new_margin;
        }
        ledger.prune_if_flat(trade.trader, trade.market_id);

        if let Some(account) = ledger.account_mut(trade.trader) {
            if plan.margin_delta.is_sign_positive() && !plan.margin_delta.is_zero() {
                // `plan_leg` already verified this would succeed.
                let _ = account.lock_margin(plan.margin_delta);
            } else if plan.margin_delta.is_sign_negative() {
                account.release_margin(-plan.margin_delta);
            }
            account.apply_delta(plan.realized_pnl - plan.fee);
        }

        let _ = plan.class;
    }
}

struct LegPlan {
    new_size: Amount,
    new_entry: Amount,
    new_margin: Amount,
    /// `new_margin - position.margin`, positive when opening/increasing,
    /// negative when closing/reducing. Drives the `lock_margin`/
    /// `release_margin` call `commit_leg` makes to keep `Account::locked_margin`
    /// equal to the trader's summed position margin (spec A1).
    margin_delta: Amount,
    realized_pnl: Amount,
    fee: Amount,
    class: FillClass,
}
