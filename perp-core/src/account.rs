//! Trader account: free collateral and margin locked against open
//! positions across markets.
//!
//! Grounded on the `rtavarezz-perps-market` test files' `engine.deposit`/
//! `engine.get_account` shape (a single collateral balance per trader,
//! independent of per-market position state, which lives in
//! [`crate::position`]).

use crate::decimal::Amount;
use crate::ids::TraderId;
use serde::{Deserialize, Serialize};

/// A1: `locked_margin = Σ margin(positions of trader)`. A2: `balance >= 0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub trader: TraderId,
    pub balance: Amount,
    pub locked_margin: Amount,
}

impl Account {
    pub fn new(trader: TraderId) -> Self {
        Account {
            trader,
            balance: Amount::ZERO,
            locked_margin: Amount::ZERO,
        }
    }

    pub fn available_margin(&self) -> Amount {
        (self.balance - self.locked_margin).max(Amount::ZERO)
    }

    pub fn deposit(&mut self, amount: Amount) {
        debug_assert!(amount.is_sign_positive() || amount.is_zero());
        self.balance += amount;
    }

    /// Reserves `amount` of margin against the free balance. Returns `false`
    /// (without mutating state) if the account doesn't have enough free
    /// collateral, preserving A2.
    #[must_use]
    pub fn lock_margin(&mut self, amount: Amount) -> bool {
        if self.available_margin() < amount {
            return false;
        }
        self.locked_margin += amount;
        true
    }

    pub fn release_margin(&mut self, amount: Amount) {
        self.locked_margin = (self.locked_margin - amount).max(Amount::ZERO);
    }

    /// Applies a signed balance delta (realized PnL, funding payment, fee).
    /// Clamps at zero to preserve A1; callers that must never clamp (e.g.
    /// settlement under `FeeUnderflowPolicy::RejectTrade`) should check
    /// `self.balance + delta` before calling.
    pub fn apply_delta(&mut self, delta: Amount) {
        self.balance = (self.balance + delta).max(Amount::ZERO);
    }
}
