//! Funding rate computation and per-position funding settlement.
//!
//! Modeled as synthesized messages applied through the ledger rather than
//! an inline mutation loop (SPEC_FULL.md §9 "funding as message, not
//! loop"), mirroring the `engine.settle_funding(market_id)` call in
//! `other_examples/5936dbd4_..._stress_tests.rs.rs`, which returns the
//! number of accounts affected and the funding rate applied.

use crate::decimal::Amount;
use crate::ids::{MarketId, TraderId};
use crate::ledger::Ledger;
use crate::market::MarketParams;
use crate::sync::EngineEventSink;

/// One position's funding payment for a single settlement, synthesized by
/// `FundingEngine::build_settlements` and applied by `apply`.
#[derive(Debug, Clone, Copy)]
pub struct FundingSettlement {
    pub trader: TraderId,
    pub market_id: MarketId,
    pub payment: Amount,
}

/// Summary returned to the epoch driver after a funding settlement pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct FundingReport {
    pub accounts_affected: usize,
    pub funding_rate: Amount,
}

pub struct FundingEngine;

impl FundingEngine {
    /// Clamps `(mark - index) / index` to `[-max_funding_rate, max_funding_rate]`.
    pub fn funding_rate(mark_price: Amount, index_price: Amount, max_funding_rate: Amount) -> Amount {
        if index_price.is_zero() {
            return Amount::ZERO;
        }
        let premium = (mark_price - index_price) / index_price;
        premium.clamp(-max_funding_rate, max_funding_rate)
    }

    /// Builds the funding message list for every open position in a market.
    /// Longs pay when the rate is positive (mark above index); shorts
    /// receive, via `payment = -size * mark_price * funding_rate`.
    pub fn build_settlements(
        ledger: &Ledger,
        market_id: MarketId,
        mark_price: Amount,
        funding_rate: Amount,
    ) -> Vec<FundingSettlement> {
        ledger
            .positions_in_market(market_id)
            .map(|position| FundingSettlement {
                trader: position.trader,
                market_id,
                payment: -position.size * mark_price * funding_rate,
            })
            .collect()
    }

    /// Applies a full settlement pass and returns a summary.
    pub fn settle(
        ledger: &mut Ledger,
        market: &MarketParams,
        mark_price: Amount,
        index_price: Amount,
        sink: &dyn EngineEventSink,
    ) -> FundingReport {
        let rate = Self::funding_rate(mark_price, index_price, market.max_funding_rate);
        let settlements = Self::build_settlements(ledger, market.market_id, mark_price, rate);
        let accounts_affected = settlements.len();
        for settlement in &settlements {
            if let Some(account) = ledger.account_mut(settlement.trader) {
                account.apply_delta(settlement.payment);
            }
            sink.funding_settled(settlement.market_id, settlement.trader, settlement.payment);
        }
        FundingReport {
            accounts_affected,
            funding_rate: rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn funding_rate_clamped() {
        let rate = FundingEngine::funding_rate(dec!(200), dec!(100), dec!(0.0075));
        assert_eq!(rate, dec!(0.0075));
    }

    #[test]
    fn funding_rate_zero_when_index_zero() {
        assert_eq!(FundingEngine::funding_rate(dec!(100), Amount::ZERO, dec!(0.0075)), Amount::ZERO);
    }
}
