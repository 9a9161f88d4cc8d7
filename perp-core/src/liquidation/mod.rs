//! Three-tier liquidation & risk engine (spec §4.D).
//!
//! Grounded on `other_examples/3e75eab7_..._liquidation.rs.rs`'s
//! `liquidate_with_incentive`/`calculate_partial_liquidation_size`/
//! `should_liquidate`: compute every delta (penalty, liquidator reward,
//! insurance contribution, remaining equity) before committing any of it,
//! the same transactional discipline [`crate::settlement`] uses for
//! ordinary trades.

pub mod adl;
pub mod insurance;

use crate::decimal::{Amount, Price};
use crate::error::LiquidationError;
use crate::ids::{MarketId, TraderId};
use crate::ledger::Ledger;
use crate::market::MarketParams;
use crate::position::PositionStatus;
use crate::sync::EngineEventSink;
use adl::{AdlEngine, AdlOutcome};
use insurance::InsuranceFund;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidationTier {
    /// Full close, 1% penalty, 30/70 liquidator/insurance split.
    Tier1,
    /// Partial close (market's `partial_liquidation_rate`) plus cooldown.
    Tier2,
    /// Backstop/vault takeover: full close, 100% penalty to insurance, no
    /// liquidator reward.
    Tier3,
}

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub trader: TraderId,
    pub market_id: MarketId,
    pub tier: LiquidationTier,
    pub closed_quantity: Amount,
    pub realized_pnl: Amount,
    pub penalty: Amount,
    pub liquidator_reward: Amount,
    pub insurance_contribution: Amount,
    pub bad_debt: Amount,
    pub adl: Option<AdlOutcome>,
}

/// A synthetic trader id used as the counterparty on Tier 3 (backstop)
/// liquidations, which have no external liquidator to reward.
pub const BACKSTOP_TRADER: TraderId = TraderId::new(0);

pub struct LiquidationEngine {
    insurance_funds: HashMap<MarketId, InsuranceFund>,
    cooldown_until_epoch: HashMap<(TraderId, MarketId), u64>,
}

impl Default for LiquidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LiquidationEngine {
    pub fn new() -> Self {
        LiquidationEngine {
            insurance_funds: HashMap::new(),
            cooldown_until_epoch: HashMap::new(),
        }
    }

    pub fn insurance_fund(&mut self, market_id: MarketId) -> &mut InsuranceFund {
        self.insurance_funds.entry(market_id).or_default()
    }

    pub fn insurance_fund_balance(&self, market_id: MarketId) -> Amount {
        self.insurance_funds.get(&market_id).map(|f| f.balance).unwrap_or(Amount::ZERO)
    }

    fn in_cooldown(&self, trader: TraderId, market_id: MarketId, current_epoch: u64) -> bool {
        self.cooldown_until_epoch
            .get(&(trader, market_id))
            .is_some_and(|until| current_epoch < *until)
    }

    /// Scans every open position in `market`, liquidating any that are
    /// `Liquidatable`/`Backstop`, capped at `max_liquidations` and skipping
    /// positions still in cooldown (spec §4.D's per-epoch loop).
    pub fn run_epoch(
        &mut self,
        ledger: &mut Ledger,
        market: &MarketParams,
        mark_price: Amount,
        current_epoch: u64,
        max_liquidations: usize,
        sink: &dyn EngineEventSink,
    ) -> Vec<LiquidationResult> {
        let price = Price::new_unchecked(mark_price);
        let mut candidates: Vec<(TraderId, PositionStatus)> = ledger
            .positions_in_market(market.market_id)
            .filter_map(|p| {
                let status = p.status(price, market.maintenance_margin_rate, market.backstop_threshold);
                matches!(status, PositionStatus::Liquidatable | PositionStatus::Backstop)
                    .then_some((p.trader, status))
            })
            .collect();

        let mut results = Vec::new();
        for (trader, status) in candidates {
            if results.len() >= max_liquidations {
                break;
            }
            if self.in_cooldown(trader, market.market_id, current_epoch) {
                continue;
            }
            match self.liquidate(ledger, market, mark_price, trader, status, current_epoch, sink) {
                Ok(result) => results.push(result),
                Err(_) => continue,
            }
        }
        results
    }

    /// Attempts to liquidate a single trader's position directly, surfacing
    /// the cooldown as a typed error rather than silently skipping it (the
    /// behavior `run_epoch`'s scan uses internally). Intended for a host
    /// retrying a specific position outside the normal per-epoch sweep.
    pub fn liquidate_trader(
        &mut self,
        ledger: &mut Ledger,
        market: &MarketParams,
        mark_price: Amount,
        trader: TraderId,
        current_epoch: u64,
        sink: &dyn EngineEventSink,
    ) -> Result<LiquidationResult, LiquidationError> {
        if self.in_cooldown(trader, market.market_id, current_epoch) {
            return Err(LiquidationError::InCooldown(trader, market.market_id));
        }
        let price = Price::new_unchecked(mark_price);
        let position = ledger
            .position(trader, market.market_id)
            .ok_or(LiquidationError::PositionHealthy)?;
        let status = position.status(price, market.maintenance_margin_rate, market.backstop_threshold);
        if !matches!(status, PositionStatus::Liquidatable | PositionStatus::Backstop) {
            return Err(LiquidationError::PositionHealthy);
        }
        self.liquidate(ledger, market, mark_price, trader, status, current_epoch, sink)
    }

    fn liquidate(
        &mut self,
        ledger: &mut Ledger,
        market: &MarketParams,
        mark_price: Amount,
        trader: TraderId,
        status: PositionStatus,
        current_epoch: u64,
        sink: &dyn EngineEventSink,
    ) -> Result<LiquidationResult, LiquidationError> {
        let position = ledger
            .position(trader, market.market_id)
            .cloned()
            .ok_or(LiquidationError::PositionHealthy)?;
        if position.is_flat() {
            return Err(LiquidationError::PositionHealthy);
        }

        let notional = position.notional(Price::new_unchecked(mark_price));
        let is_backstop = status == PositionStatus::Backstop;
        let is_large = notional >= market.large_position_threshold;

        let tier = if is_backstop {
            LiquidationTier::Tier3
        } else if is_large {
            LiquidationTier::Tier2
        } else {
            LiquidationTier::Tier1
        };

        let close_fraction = match tier {
            LiquidationTier::Tier1 | LiquidationTier::Tier3 => Amount::ONE,
            LiquidationTier::Tier2 => market.partial_liquidation_rate,
        };

        let closing_signum = position.size.signum();
        let close_qty = position.size.abs() * close_fraction;
        let closed_notional = close_qty * mark_price;
        let realized_pnl = close_qty * closing_signum * (mark_price - position.entry_price.raw());
        let margin_released = position.margin * close_fraction;

        let penalty_rate = market.liquidation_penalty_rate;
        let penalty = closed_notional * penalty_rate;

        let (liquidator_reward, insurance_contribution) = if tier == LiquidationTier::Tier3 {
            (Amount::ZERO, penalty)
        } else {
            let reward = penalty * market.liquidator_reward_rate;
            (reward, penalty - reward)
        };

        let remaining_equity = margin_released + realized_pnl - penalty;
        let (payout_to_trader, bad_debt) = if remaining_equity.is_sign_negative() {
            (Amount::ZERO, -remaining_equity)
        } else {
            (remaining_equity, Amount::ZERO)
        };

        // Commit position/account mutations only after every delta above is
        // known, matching settlement's all-or-nothing discipline.
        {
            let pos_mut = ledger.position_or_flat_mut(trader, market.market_id);
            pos_mut.size -= closing_signum * close_qty;
            pos_mut.margin -= margin_released;
        }
        ledger.prune_if_flat(trader, market.market_id);

        if let Some(account) = ledger.account_mut(trader) {
            account.release_margin(margin_released);
            account.apply_delta(payout_to_trader);
        }

        let fund = self.insurance_fund(market.market_id);
        fund.credit(insurance_contribution);
        let mut adl_outcome = None;
        if !bad_debt.is_zero() {
            let shortfall = fund.debit(bad_debt);
            sink.insurance_fund_changed(market.market_id, fund.balance, insurance_contribution - bad_debt + shortfall);
            if !shortfall.is_zero() {
                let liquidated_side = match position.side() {
                    Some(side) => side,
                    None => crate::order::Side::Buy,
                };
                let candidates = AdlEngine::find_candidates(ledger, market.market_id, mark_price, liquidated_side);
                adl_outcome = Some(AdlEngine::execute(ledger, &candidates, mark_price, shortfall, sink));
            }
        } else {
            sink.insurance_fund_changed(market.market_id, fund.balance, insurance_contribution);
        }

        if tier == LiquidationTier::Tier2 {
            self.cooldown_until_epoch
                .insert((trader, market.market_id), current_epoch + market.cooldown_epochs);
        }

        let penalty_tier_code = match tier {
            LiquidationTier::Tier1 => 1,
            LiquidationTier::Tier2 => 2,
            LiquidationTier::Tier3 => 3,
        };
        sink.liquidation(trader, market.market_id, penalty_tier_code, penalty);

        Ok(LiquidationResult {
            trader,
            market_id: market.market_id,
            tier,
            closed_quantity: close_qty,
            realized_pnl,
            penalty,
            liquidator_reward,
            insurance_contribution,
            bad_debt,
            adl: adl_outcome,
        })
    }
}
