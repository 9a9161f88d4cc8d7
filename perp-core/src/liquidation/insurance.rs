//! Per-market insurance fund: the liquidation backstop that absorbs
//! penalties and fee skim, and that is drawn down to cover settlement
//! deficits.
//!
//! Adapted from `other_examples/3e75eab7_..._liquidation.rs.rs`'s
//! `InsuranceFund` struct; that file serializes it with `borsh`, this crate
//! uses `serde` consistently with every other persisted record (see
//! SPEC_FULL.md §6).

use crate::decimal::Amount;
use serde::{Deserialize, Serialize};

/// F1: `balance >= 0`, enforced by [`InsuranceFund::debit`] refusing to
/// drive the balance negative — the caller (the liquidation engine) is
/// expected to trigger ADL for any shortfall `debit` reports instead of
/// forcing the withdrawal through.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InsuranceFund {
    pub balance: Amount,
    pub total_contributions: Amount,
    pub total_payouts: Amount,
}

impl InsuranceFund {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&mut self, amount: Amount) {
        debug_assert!(amount.is_sign_positive() || amount.is_zero());
        self.balance += amount;
        self.total_contributions += amount;
    }

    /// Attempts to pay out `amount`. Returns the shortfall (zero if the
    /// fund covered it in full) without ever letting `balance` go negative.
    #[must_use]
    pub fn debit(&mut self, amount: Amount) -> Amount {
        if amount.is_zero() {
            return Amount::ZERO;
        }
        let covered = amount.min(self.balance);
        self.balance -= covered;
        self.total_payouts += covered;
        amount - covered
    }

    pub fn is_healthy(&self, min_balance: Amount) -> bool {
        self.balance >= min_balance
    }
}
