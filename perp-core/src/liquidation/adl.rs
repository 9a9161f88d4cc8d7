//! Auto-deleveraging: when the insurance fund can't cover a liquidation's
//! bad debt, reduce the most profitable opposite-side positions until the
//! deficit is covered or the candidate queue is exhausted (socialized
//! loss as the final fallback).
//!
//! Grounded on `other_examples/3e75eab7_..._liquidation.rs.rs`'s
//! `find_adl_candidates`/`auto_deleverage`/`execute_adl`, with the
//! profit-only eligibility correction recorded in DESIGN.md (the source
//! there allowed any opposite-side candidate, including losing ones).

use crate::decimal::Amount;
use crate::ids::{MarketId, TraderId};
use crate::ledger::Ledger;
use crate::order::Side;
use crate::sync::EngineEventSink;

/// One profitable opposite-side position eligible for auto-deleveraging.
#[derive(Debug, Clone, Copy)]
pub struct AdlCandidate {
    pub trader: TraderId,
    pub market_id: MarketId,
    pub size: Amount,
    pub unrealized_pnl: Amount,
    pub profit_score: Amount,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdlOutcome {
    pub deficit_covered: Amount,
    pub deficit_remaining: Amount,
    pub positions_reduced: usize,
}

pub struct AdlEngine;

impl AdlEngine {
    /// Builds the ranked candidate queue for `market_id`: only positions on
    /// the side opposite `liquidated_side` and currently in profit,
    /// ordered by `profit_score = pnl * leverage` descending.
    pub fn find_candidates(
        ledger: &Ledger,
        market_id: MarketId,
        mark_price: Amount,
        liquidated_side: Side,
    ) -> Vec<AdlCandidate> {
        let opposite = liquidated_side.opposite();
        let mut candidates: Vec<AdlCandidate> = ledger
            .positions_in_market(market_id)
            .filter(|p| p.side() == Some(opposite))
            .filter_map(|p| {
                let price = crate::decimal::Price::new_unchecked(mark_price);
                let pnl = p.unrealized_pnl(price);
                if !pnl.is_sign_positive() || pnl.is_zero() {
                    return None;
                }
                let leverage = if p.margin.is_zero() {
                    Amount::ZERO
                } else {
                    p.notional(price) / p.margin
                };
                Some(AdlCandidate {
                    trader: p.trader,
                    market_id,
                    size: p.size,
                    unrealized_pnl: pnl,
                    profit_score: pnl * leverage,
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.profit_score.cmp(&a.profit_score));
        candidates
    }

    /// Walks the ranked queue, reducing each candidate by at most 50% of
    /// its size per pass, until `deficit` is covered or the queue runs dry.
    pub fn execute(
        ledger: &mut Ledger,
        candidates: &[AdlCandidate],
        mark_price: Amount,
        deficit: Amount,
        sink: &dyn EngineEventSink,
    ) -> AdlOutcome {
        let half = Amount::new(5, 1); // 0.5
        let mut remaining_deficit = deficit;
        let mut positions_reduced = 0usize;

        for candidate in candidates {
            if remaining_deficit.is_zero() || remaining_deficit.is_sign_negative() {
                break;
            }

            let position = match ledger.position(candidate.trader, candidate.market_id) {
                Some(p) => p.clone(),
                None => continue,
            };
            if position.is_flat() {
                continue;
            }

            let max_reduction = position.size.abs() * half;
            let notional_per_unit = mark_price;
            let deficit_coverable_qty = if notional_per_unit.is_zero() {
                Amount::ZERO
            } else {
                remaining_deficit / notional_per_unit
            };
            let reduce_qty = max_reduction.min(deficit_coverable_qty).min(position.size.abs());
            if reduce_qty.is_zero() {
                continue;
            }

            let closing_signum = position.size.signum();
            let realized = reduce_qty * closing_signum * (mark_price - position.entry_price.raw());
            let margin_released = position.margin * (reduce_qty / position.size.abs());

            {
                let pos_mut = ledger.position_or_flat_mut(candidate.trader, candidate.market_id);
                pos_mut.size -= closing_signum * reduce_qty;
                pos_mut.margin -= margin_released;
            }
            ledger.prune_if_flat(candidate.trader, candidate.market_id);

            if let Some(account) = ledger.account_mut(candidate.trader) {
                account.release_margin(margin_released);
                account.apply_delta(realized + margin_released);
            }

            sink.adl_executed(candidate.trader, candidate.market_id, reduce_qty);

            remaining_deficit = (remaining_deficit - reduce_qty * notional_per_unit).max(Amount::ZERO);
            positions_reduced += 1;
        }

        AdlOutcome {
            deficit_covered: deficit - remaining_deficit,
            deficit_remaining: remaining_deficit,
            positions_reduced,
        }
    }
}
