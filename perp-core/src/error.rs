//! Typed error taxonomy. Each component boundary gets its own
//! `thiserror`-derived enum, adapted from the teacher's bare
//! `UpdateOrderError`/`CancelOrderError` split in `engine/error.rs` but
//! composable with `?` across components.

use crate::ids::{MarketId, OrderId, TraderId};
use crate::order::RejectReason;
use thiserror::Error;

/// Failures validating an order's own field combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("invalid match strategy for this order type")]
    InvalidMatchStrategy,
    #[error("invalid time in force for this order type")]
    InvalidTimeInForce,
    #[error("invalid liquidity directive for this order type")]
    InvalidLiquidityDirective,
    #[error("slippage tolerance is not applicable to this order type")]
    SlippageNotApplicable,
    #[error("slippage tolerance exceeds the maximum allowed value")]
    SlippageExceedsMaximum,
}

/// Failures admitting an order into a market (spec admission policy 1-5).
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("unknown market {0}")]
    UnknownMarket(MarketId),
    #[error(transparent)]
    InvalidOrder(#[from] OrderValidationError),
    #[error("price is not a multiple of the market tick size")]
    InvalidTickSize,
    #[error("quantity is not a multiple of the market lot size")]
    InvalidLotSize,
    #[error("post-only order would cross the book")]
    PostOnlyWouldCross,
    #[error("reduce-only order would increase position size")]
    ReduceOnlyViolation,
    #[error("insufficient available margin for this order")]
    InsufficientMargin,
    #[error("account {0} not found")]
    UnknownTrader(TraderId),
    #[error("order book rejected the order: {0:?}")]
    BookRejected(RejectReason),
}

/// Failures looking up or mutating an existing resting order.
#[derive(Debug, Error)]
pub enum OrderLookupError {
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error("order {0} is not modifiable")]
    NotModifiable(OrderId),
    #[error("order {0} is not cancellable")]
    NotCancellable(OrderId),
    #[error("invalid request for order {0}")]
    InvalidRequest(OrderId),
}

/// Failures settling a matched trade against both counterparties.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("account {0} not found")]
    AccountNotFound(TraderId),
    #[error("position not found for trader {0} market {1}")]
    PositionNotFound(TraderId, MarketId),
    #[error("fee exceeds settled proceeds and the market's underflow policy rejects the trade")]
    FeeUnderflow,
    #[error("insufficient available margin to open or increase this position")]
    InsufficientMargin,
}

/// Failures in the liquidation and risk engine.
#[derive(Debug, Error)]
pub enum LiquidationError {
    #[error("mark price unavailable for market {0}")]
    MarkPriceUnavailable(MarketId),
    #[error("position is healthy, liquidation not permitted")]
    PositionHealthy,
    #[error("position {0}/{1} is in liquidation cooldown")]
    InCooldown(TraderId, MarketId),
    #[error("insurance fund exhausted for market {0}")]
    InsuranceFundExhausted(MarketId),
}

/// Failures in the per-epoch driver and its worker pool.
#[derive(Debug, Error)]
pub enum EpochError {
    #[error("worker pool is at capacity")]
    Busy,
    #[error("worker timed out processing market {0}")]
    WorkerTimeout(MarketId),
    #[error("worker panicked while processing market {0}")]
    WorkerPanicked(MarketId),
    #[error("mark price source unavailable for market {0}")]
    OracleUnavailable(MarketId),
    #[error("fatal invariant violation: {0}")]
    InvariantViolation(String),
}
