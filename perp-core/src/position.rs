//! Position record and health assessment (spec §4.D).
//!
//! `size` is signed: positive is long, negative is short, so a single set
//! of formulas covers both sides rather than branching on `Side`. Health
//! formulas and the `PositionStatus` threshold mapping are grounded on
//! `other_examples/3e75eab7_..._liquidation.rs.rs`'s `calculate_position_equity`
//! and margin-ratio math, and on the `Position{size, entry_price, collateral}`
//! shape exercised by `other_examples/5936dbd4_..._stress_tests.rs.rs`.

use crate::decimal::{Amount, Price};
use crate::ids::{MarketId, TraderId};
use crate::order::Side;
use serde::{Deserialize, Serialize};

/// Risk status derived from `health_ratio = equity / maintenance_margin`:
/// `Healthy` at >= 2x, `AtRisk` at >= 1x, `Liquidatable` at >= 2/3x,
/// `Backstop` below that.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Healthy,
    AtRisk,
    Liquidatable,
    Backstop,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Position {
    pub trader: TraderId,
    pub market_id: MarketId,
    /// Signed size: positive long, negative short, zero flat.
    pub size: Amount,
    pub entry_price: Price,
    /// Margin allocated to this position (isolated-margin style; spec does
    /// not model cross-margin sharing across markets).
    pub margin: Amount,
}

impl Position {
    pub fn flat(trader: TraderId, market_id: MarketId) -> Self {
        Position {
            trader,
            market_id,
            size: Amount::ZERO,
            entry_price: Price::zero(),
            margin: Amount::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        if self.size.is_sign_positive() && !self.size.is_zero() {
            Some(Side::Buy)
        } else if self.size.is_sign_negative() {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn notional(&self, mark_price: Price) -> Amount {
        self.size.abs() * mark_price.raw()
    }

    /// `size * (mark - entry)`: positive for a profitable long or a
    /// profitable short alike, since `size` carries the sign.
    pub fn unrealized_pnl(&self, mark_price: Price) -> Amount {
        self.size * (mark_price.raw() - self.entry_price.raw())
    }

    pub fn equity(&self, mark_price: Price) -> Amount {
        self.margin + self.unrealized_pnl(mark_price)
    }

    pub fn maintenance_margin(&self, mark_price: Price, maintenance_margin_rate: Amount) -> Amount {
        self.notional(mark_price) * maintenance_margin_rate
    }

    /// `equity / maintenance_margin`. `None` when the position is flat
    /// (maintenance margin is zero, the ratio is undefined).
    pub fn health_ratio(&self, mark_price: Price, maintenance_margin_rate: Amount) -> Option<Amount> {
        let maintenance = self.maintenance_margin(mark_price, maintenance_margin_rate);
        if maintenance.is_zero() {
            return None;
        }
        Some(self.equity(mark_price) / maintenance)
    }

    pub fn status(&self, mark_price: Price, maintenance_margin_rate: Amount, backstop_threshold: Amount) -> PositionStatus {
        match self.health_ratio(mark_price, maintenance_margin_rate) {
            None => PositionStatus::Healthy,
            Some(ratio) => {
                if ratio >= Amount::from(2) {
                    PositionStatus::Healthy
                } else if ratio >= Amount::from(1) {
                    PositionStatus::AtRisk
                } else if ratio >= backstop_threshold {
                    PositionStatus::Liquidatable
                } else {
                    PositionStatus::Backstop
                }
            }
        }
    }

    /// Mark price at which `equity == maintenance_margin`, derived from:
    /// `margin + size*(mark-entry) = |size|*mark*mmr`, solved for `mark`.
    /// Returns `None` for a flat position.
    pub fn liquidation_price(&self, maintenance_margin_rate: Amount) -> Option<Price> {
        if self.size.is_zero() {
            return None;
        }
        let denom = self.size.abs() * maintenance_margin_rate - self.size;
        if denom.is_zero() {
            return None;
        }
        let numerator = self.margin - self.size * self.entry_price.raw();
        let mark = numerator / denom;
        Price::new(mark.max(Amount::ZERO)).ok()
    }
}
