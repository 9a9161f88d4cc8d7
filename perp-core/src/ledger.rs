//! Shared account/position store used by settlement, funding and
//! liquidation. Grounded on the `rtavarezz-perps-market` test files'
//! `engine.get_account(id)`/`.get_position(market_id)` access pattern,
//! which keeps collateral accounts and per-market positions as separate
//! lookups rather than nesting one inside the other.

use crate::account::Account;
use crate::decimal::Amount;
use crate::ids::{MarketId, TraderId};
use crate::position::Position;
use std::collections::HashMap;

#[derive(Default)]
pub struct Ledger {
    accounts: HashMap<TraderId, Account>,
    positions: HashMap<(TraderId, MarketId), Position>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_account(&mut self, trader: TraderId) -> &mut Account {
        self.accounts.entry(trader).or_insert_with(|| Account::new(trader))
    }

    pub fn account(&self, trader: TraderId) -> Option<&Account> {
        self.accounts.get(&trader)
    }

    pub fn account_mut(&mut self, trader: TraderId) -> Option<&mut Account> {
        self.accounts.get_mut(&trader)
    }

    pub fn position(&self, trader: TraderId, market_id: MarketId) -> Option<&Position> {
        self.positions.get(&(trader, market_id))
    }

    pub fn position_or_flat_mut(&mut self, trader: TraderId, market_id: MarketId) -> &mut Position {
        self.positions
            .entry((trader, market_id))
            .or_insert_with(|| Position::flat(trader, market_id))
    }

    pub fn positions_in_market(&self, market_id: MarketId) -> impl Iterator<Item = &Position> {
        self.positions
            .values()
            .filter(move |p| p.market_id == market_id && !p.is_flat())
    }

    /// Drops a position record once it is fully closed, so flat positions
    /// don't linger in liquidation/funding scans.
    pub fn prune_if_flat(&mut self, trader: TraderId, market_id: MarketId) {
        if self
            .positions
            .get(&(trader, market_id))
            .is_some_and(Position::is_flat)
        {
            self.positions.remove(&(trader, market_id));
        }
    }

    /// Checks A1 (`locked_margin = Σ margin(positions of trader)`) across the
    /// whole ledger. Returns the first trader whose account disagrees with
    /// its own position set, if any.
    pub fn check_margin_invariant(&self) -> Result<(), TraderId> {
        let mut margin_by_trader: HashMap<TraderId, Amount> = HashMap::new();
        for position in self.positions.values() {
            if !position.is_flat() {
                *margin_by_trader.entry(position.trader).or_insert(Amount::ZERO) += position.margin;
            }
        }
        for (trader, account) in &self.accounts {
            let expected = margin_by_trader.get(trader).copied().unwrap_or(Amount::ZERO);
            if account.locked_margin != expected {
                return Err(*trader);
            }
        }
        Ok(())
    }
}
