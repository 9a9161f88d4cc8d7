//! Per-market configuration: tick/lot size, margin rates, fee rates and the
//! liquidation/self-trade policies a market opts into.
//!
//! Grounded on the `rtavarezz-perps-market` test files' `MarketConfig` (e.g.
//! `MarketConfig::btc_perp()`), generalized into a plain struct with a
//! `Default` plus named constructors for the reference markets used in this
//! crate's own tests.

use crate::decimal::Amount;
use crate::ids::MarketId;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Self-trade handling when a taker and a resting maker belong to the same
/// trader (spec §4.B edge cases).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfTradePolicy {
    /// Cancel the taker's crossing remainder, leave the maker resting.
    CancelTaker,
    /// Cancel the resting maker, let the taker continue walking the book.
    CancelMaker,
    /// Allow the trade to execute (wash trade).
    Allow,
}

impl Default for SelfTradePolicy {
    fn default() -> Self {
        SelfTradePolicy::CancelTaker
    }
}

/// What happens when a trade's fee exceeds the proceeds available to
/// deduct it from (spec §4.C/§9 Open Question, resolved in DESIGN.md).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeUnderflowPolicy {
    /// Clamp the fee deduction at zero rather than driving the balance
    /// negative; the shortfall is absorbed by the fee recipient.
    ZeroBalance,
    /// Reject the trade outright.
    RejectTrade,
}

impl Default for FeeUnderflowPolicy {
    fn default() -> Self {
        FeeUnderflowPolicy::ZeroBalance
    }
}

/// Per-market parameters (spec §3/§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketParams {
    pub market_id: MarketId,
    pub tick_size: Amount,
    pub lot_size: Amount,
    pub maintenance_margin_rate: Amount,
    pub initial_margin_rate: Amount,
    pub maker_fee_rate: Amount,
    pub taker_fee_rate: Amount,
    pub liquidation_penalty_rate: Amount,
    pub liquidator_reward_rate: Amount,
    pub large_position_threshold: Amount,
    pub partial_liquidation_rate: Amount,
    pub cooldown_epochs: u64,
    pub backstop_threshold: Amount,
    pub self_trade_policy: SelfTradePolicy,
    pub fee_underflow_policy: FeeUnderflowPolicy,
    pub max_funding_rate: Amount,
    pub funding_interval_epochs: u64,
}

impl MarketParams {
    /// A liquid reference market used by this crate's own test suite,
    /// mirroring `MarketConfig::btc_perp()` in the retrieval pack.
    pub fn btc_perp(market_id: MarketId) -> Self {
        MarketParams {
            market_id,
            tick_size: dec!(0.5),
            lot_size: dec!(0.001),
            maintenance_margin_rate: dec!(0.03),
            initial_margin_rate: dec!(0.06),
            maker_fee_rate: dec!(0.0002),
            taker_fee_rate: dec!(0.0005),
            liquidation_penalty_rate: dec!(0.01),
            liquidator_reward_rate: dec!(0.3),
            large_position_threshold: dec!(100_000),
            partial_liquidation_rate: dec!(0.20),
            cooldown_epochs: 30,
            backstop_threshold: dec!(0.6667),
            self_trade_policy: SelfTradePolicy::default(),
            fee_underflow_policy: FeeUnderflowPolicy::default(),
            max_funding_rate: dec!(0.0075),
            funding_interval_epochs: 480,
        }
    }
}
