//! Order record and its atomic lifecycle state machine.
//!
//! Adapted from the teacher's `engine/types.rs`: the `UnsafeCell`-backed
//! interior mutability and `AtomicU8` lifecycle compare-exchange dance are
//! unchanged. Price/Quantity now use the decimal newtypes from
//! [`crate::decimal`] instead of `crypto_bigint::U256`, and the struct grows
//! the fields a multi-market, multi-trader engine needs: `trader`,
//! `market_id`, `reduce_only`, `sequence`, and parent linkage for
//! synthesized child orders (OCO/TWAP/trailing/conditional).

use crate::decimal::{Price, Quantity};
use crate::error::OrderValidationError;
use crate::ids::{ManagerId, MarketId, OrderId, TraderId};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

/// Side indicates the direction of the order.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug, Hash)]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for Long/Buy-derived positions, -1 for Short/Sell-derived ones.
    pub fn sign(self) -> i32 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

/// OrderType determines how the order will be executed.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub enum OrderType {
    #[default]
    Limit,
    Market,
}

/// OrderStatus represents the current status of an order during its lifecycle.
#[derive(PartialEq, Eq, Default, Clone, Copy, Debug)]
pub enum OrderStatus {
    #[default]
    Pending,
    Placed,
    Filled,
    PartiallyFilled,
    Cancelled,
    Rejected,
    Expired,
}

/// Represents the lifecycle state of an order, used to coordinate safe
/// concurrent access between matching threads and cancellation threads.
///
/// Transitions: `Active` -> `Matched` (matching thread claims order),
/// `Active` -> `Finished` (cancellation removes order), `Matched` ->
/// `Active` (partially filled, re-inserted), `Matched` -> `Finished`
/// (fully filled or admission rejected).
#[derive(PartialEq, Eq, Default, Clone, Copy, Debug)]
pub enum OrderLifecycle {
    #[default]
    Active = 0,
    Matched = 1,
    Finished = 2,
}

impl From<u8> for OrderLifecycle {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Active,
            1 => Self::Matched,
            2 => Self::Finished,
            _ => unreachable!("invalid lifecycle state"),
        }
    }
}

impl From<OrderLifecycle> for u8 {
    fn from(l: OrderLifecycle) -> u8 {
        l as u8
    }
}

/// CancelReason indicates the reason for canceling an order.
#[derive(PartialEq, Eq, Default, Clone, Copy, Debug)]
pub enum CancelReason {
    #[default]
    UserRequest,
    TimeInForceExpired,
    ReduceOnlyViolation,
    PostOnlyWouldCross,
    SelfTrade,
    ParentOcoFilled,
    LiquidationCleanup,
}

/// RejectReason indicates the reason for rejecting an order.
#[derive(PartialEq, Eq, Default, Clone, Copy, Debug)]
pub enum RejectReason {
    #[default]
    TimestampConflict,
    InsufficientLiquidity,
    InvalidTickSize,
    InvalidLotSize,
    PostOnlyWouldCross,
    ReduceOnlyViolation,
    UnknownMarket,
}

/// MatchStrategy defines how aggressively or restrictively an order should
/// be matched.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub enum MatchStrategy {
    #[default]
    Standard,
    FillOrKill,
    ImmediateOrCancel,
}

/// LiquidityDirective specifies whether the order is allowed to take or must
/// provide liquidity.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub enum LiquidityDirective {
    #[default]
    AllowTaker,
    MakerOnly,
    TakerOnly,
}

/// TimeInForce specifies how long the order remains active on the book.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub enum TimeInForce {
    #[default]
    None,
    GoodTillCancelled,
    GoodTillDate(u64),
}

/// SlippageTolerance, expressed in basis points (1% = 100 bps).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct SlippageTolerance(pub u32);

pub const MAX_ALLOWED_SLIPPAGE_TOLERANCE: SlippageTolerance = SlippageTolerance(5000);
const BASIS_POINTS_DIVISOR: i64 = 10_000;

/// BookKey is a composite key for an order's position in the book, combining
/// price, priority (insertion order) and side, so a single skip list per
/// side sorts correctly without a secondary price-grouping level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookKey {
    pub price: Price,
    pub priority: u64,
    pub side: Side,
}

impl Ord for BookKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.side {
            Side::Buy => self
                .price
                .cmp(&other.price)
                .reverse()
                .then(self.priority.cmp(&other.priority)),
            Side::Sell => self
                .price
                .cmp(&other.price)
                .then(self.priority.cmp(&other.priority)),
        }
    }
}

impl PartialOrd for BookKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Links a synthesized child order back to the advanced-order manager that
/// produced it (OCO/TWAP/trailing/conditional), so fills and cancellations
/// can be reported back to the manager on the next epoch tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParentLink {
    pub manager: ManagerId,
}

/// `Order` represents a single order in the book.
///
/// Certain fields are wrapped with `UnsafeCell` for internal mutability.
///
/// SAFETY: all unsafe mutations are confined to the matching-engine thread
/// that currently holds the `Matched` lifecycle claim on this order, so
/// there is never a concurrent writer even though readers hold only shared
/// references.
#[derive(Debug)]
pub struct Order {
    pub id: OrderId,
    pub trader: TraderId,
    pub market_id: MarketId,
    pub side: Side,
    pub lifecycle: AtomicU8,
    pub order_type: OrderType,
    pub status: UnsafeCell<OrderStatus>,
    pub match_strategy: MatchStrategy,
    pub liquidity_directive: LiquidityDirective,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub price: Price,
    pub slippage_tolerance: Option<SlippageTolerance>,
    pub quantity: UnsafeCell<Quantity>,
    pub filled_quantity: UnsafeCell<Quantity>,
    pub cancel_reason: UnsafeCell<Option<CancelReason>>,
    pub reject_reason: UnsafeCell<Option<RejectReason>>,
    pub sequence: u64,
    pub parent: Option<ParentLink>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Default for Order {
    fn default() -> Self {
        Order {
            id: OrderId::default(),
            trader: TraderId::default(),
            market_id: MarketId::default(),
            side: Side::default(),
            lifecycle: AtomicU8::new(OrderLifecycle::Active.into()),
            order_type: OrderType::default(),
            status: UnsafeCell::new(OrderStatus::default()),
            match_strategy: MatchStrategy::default(),
            liquidity_directive: LiquidityDirective::default(),
            time_in_force: TimeInForce::default(),
            reduce_only: false,
            price: Price::zero(),
            slippage_tolerance: None,
            quantity: UnsafeCell::new(Quantity::zero()),
            filled_quantity: UnsafeCell::new(Quantity::zero()),
            cancel_reason: UnsafeCell::new(None),
            reject_reason: UnsafeCell::new(None),
            sequence: 0,
            parent: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl Clone for Order {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            trader: self.trader,
            market_id: self.market_id,
            side: self.side,
            lifecycle: AtomicU8::new(self.lifecycle.load(Ordering::Acquire).into()),
            order_type: self.order_type,
            status: UnsafeCell::new(unsafe { *self.status.get() }),
            match_strategy: self.match_strategy,
            liquidity_directive: self.liquidity_directive,
            time_in_force: self.time_in_force,
            reduce_only: self.reduce_only,
            price: self.price,
            slippage_tolerance: self.slippage_tolerance,
            quantity: UnsafeCell::new(unsafe { *self.quantity.get() }),
            filled_quantity: UnsafeCell::new(unsafe { *self.filled_quantity.get() }),
            cancel_reason: UnsafeCell::new(unsafe { *self.cancel_reason.get() }),
            reject_reason: UnsafeCell::new(unsafe { *self.reject_reason.get() }),
            sequence: self.sequence,
            parent: self.parent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

unsafe impl Sync for Order {}

impl Order {
    #[inline(always)]
    pub fn status(&self) -> OrderStatus {
        unsafe { *self.status.get() }
    }

    #[inline(always)]
    pub fn is_filled(&self) -> bool {
        self.status() == OrderStatus::Filled
    }

    #[inline(always)]
    pub fn quantity(&self) -> Quantity {
        unsafe { *self.quantity.get() }
    }

    #[inline(always)]
    pub fn filled_quantity(&self) -> Quantity {
        unsafe { *self.filled_quantity.get() }
    }

    #[inline(always)]
    pub fn book_key(&self) -> BookKey {
        BookKey {
            price: self.price,
            priority: self.priority(),
            side: self.side,
        }
    }

    #[inline(always)]
    pub(crate) fn is_finished(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == OrderLifecycle::Finished.into()
    }

    #[inline(always)]
    pub(crate) fn reset_lifecycle(&self) {
        self.lifecycle
            .store(OrderLifecycle::Active.into(), Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn enter_matched(&self) -> bool {
        self.lifecycle
            .compare_exchange_weak(
                OrderLifecycle::Active.into(),
                OrderLifecycle::Matched.into(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    #[inline(always)]
    pub(crate) fn exit_matched(&self) -> bool {
        self.lifecycle
            .compare_exchange_weak(
                OrderLifecycle::Matched.into(),
                OrderLifecycle::Active.into(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    #[inline(always)]
    pub(crate) fn enter_finished_from_active(&self) -> bool {
        self.lifecycle
            .compare_exchange_weak(
                OrderLifecycle::Active.into(),
                OrderLifecycle::Finished.into(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    #[inline(always)]
    pub(crate) fn enter_finished_from_matched(&self) -> bool {
        self.lifecycle
            .compare_exchange_weak(
                OrderLifecycle::Matched.into(),
                OrderLifecycle::Finished.into(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Priority used by the book: earlier sequence numbers sort first, with
    /// `updated_at` as the dominant key so a modified order loses priority.
    #[inline(always)]
    pub(crate) fn priority(&self) -> u64 {
        self.updated_at * 100 + self.sequence % 100
    }

    /// SAFETY: only the matching-engine thread holding the `Matched` claim
    /// mutates quantity/filled_quantity, so no data race occurs despite the
    /// shared reference.
    #[inline(always)]
    pub(crate) fn quantity_fill(&self, traded: Quantity) -> Quantity {
        unsafe {
            let remaining = (*self.quantity.get()).saturating_sub(traded);
            *self.quantity.get() = remaining;
            *self.filled_quantity.get() = (*self.filled_quantity.get()) + traded;
            remaining
        }
    }

    /// SAFETY: see [`Order::quantity_fill`].
    #[inline(always)]
    pub(crate) fn update_status(&self, status: OrderStatus) {
        unsafe {
            *self.status.get() = status;
        }
    }

    #[inline(always)]
    pub(crate) fn update_cancel_reason(&self, reason: CancelReason) {
        unsafe {
            *self.cancel_reason.get() = Some(reason);
        }
    }

    #[inline(always)]
    pub(crate) fn update_reject_reason(&self, reason: RejectReason) {
        unsafe {
            *self.reject_reason.get() = Some(reason);
        }
    }

    /// Returns the worst acceptable execution price under slippage
    /// tolerance, or `None` if no tolerance is set.
    pub fn slippage_bound_price(&self, price: Price) -> Option<Price> {
        let slippage = self.slippage_tolerance?;
        let bps = rust_decimal::Decimal::from(slippage.0 as i64)
            / rust_decimal::Decimal::from(BASIS_POINTS_DIVISOR);
        let delta = price.raw() * bps;
        let bound = match self.side {
            Side::Buy => price.raw() + delta,
            Side::Sell => (price.raw() - delta).max(rust_decimal::Decimal::ZERO),
        };
        Some(Price::new_unchecked(bound))
    }

    /// Validates order-type-specific field combinations.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        match self.order_type {
            OrderType::Limit => {
                if self.match_strategy != MatchStrategy::Standard {
                    return Err(OrderValidationError::InvalidMatchStrategy);
                }
                if !matches!(
                    self.time_in_force,
                    TimeInForce::GoodTillCancelled | TimeInForce::GoodTillDate(_)
                ) {
                    return Err(OrderValidationError::InvalidTimeInForce);
                }
                if self.slippage_tolerance.is_some() {
                    return Err(OrderValidationError::SlippageNotApplicable);
                }
                Ok(())
            }
            OrderType::Market => {
                if !matches!(
                    self.match_strategy,
                    MatchStrategy::ImmediateOrCancel | MatchStrategy::FillOrKill
                ) {
                    return Err(OrderValidationError::InvalidMatchStrategy);
                }
                if self.liquidity_directive == LiquidityDirective::MakerOnly {
                    return Err(OrderValidationError::InvalidLiquidityDirective);
                }
                if matches!(
                    self.time_in_force,
                    TimeInForce::GoodTillCancelled | TimeInForce::GoodTillDate(_)
                ) {
                    return Err(OrderValidationError::InvalidTimeInForce);
                }
                if let Some(slippage) = self.slippage_tolerance {
                    if slippage.0 > MAX_ALLOWED_SLIPPAGE_TOLERANCE.0 {
                        return Err(OrderValidationError::SlippageExceedsMaximum);
                    }
                }
                Ok(())
            }
        }
    }

    pub(crate) fn clone_reset_lifecycle(&self) -> Self {
        let cloned = self.clone();
        cloned.reset_lifecycle();
        cloned
    }
}
