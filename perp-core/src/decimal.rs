//! Fixed-point numeric representation used across the engine.
//!
//! Replaces the teacher's `crypto_bigint::U256` price/quantity aliases:
//! positions, PnL and funding deltas require signed arithmetic and an exact
//! decimal scale, which an unsigned 256-bit integer cannot express.
//! `rust_decimal::Decimal` gives us both, plus banker's rounding via
//! `round_dp_with_strategy`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// Every stored amount is normalized to this many fractional digits.
pub const DECIMAL_SCALE: u32 = 18;

/// Normalizes a raw decimal to the engine's fixed scale using banker's
/// rounding (round-half-to-even), as required for deterministic settlement.
pub fn normalize_18(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Unconstrained signed amount: PnL, funding payments, margin deltas.
pub type Amount = Decimal;

#[derive(Debug, Error)]
#[error("amount must be non-negative")]
pub struct NegativeAmountError;

macro_rules! nonneg_decimal_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Decimal);

        impl $name {
            /// Constructs a value, rejecting negatives.
            pub fn new(value: Decimal) -> Result<Self, NegativeAmountError> {
                if value.is_sign_negative() && !value.is_zero() {
                    return Err(NegativeAmountError);
                }
                Ok(Self(normalize_18(value)))
            }

            /// Constructs a value without the non-negativity check, for call
            /// sites that have already validated it (e.g. book-internal
            /// arithmetic that can only ever decrease toward zero).
            pub fn new_unchecked(value: Decimal) -> Self {
                Self(normalize_18(value))
            }

            pub const fn zero() -> Self {
                Self(Decimal::ZERO)
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn raw(self) -> Decimal {
                self.0
            }

            /// Saturating subtraction, clamped at zero.
            pub fn saturating_sub(self, rhs: Self) -> Self {
                let diff = self.0 - rhs.0;
                if diff.is_sign_negative() {
                    Self::zero()
                } else {
                    Self(normalize_18(diff))
                }
            }

            pub fn min(self, rhs: Self) -> Self {
                if self.0 <= rhs.0 { self } else { rhs }
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(normalize_18(self.0 + rhs.0))
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self::new_unchecked(self.0 - rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonneg_decimal_newtype!(Price);
nonneg_decimal_newtype!(Quantity);

impl Neg for Price {
    type Output = Amount;
    fn neg(self) -> Amount {
        -self.0
    }
}

/// `price * quantity`, normalized to the engine scale. Always non-negative.
pub fn notional(price: Price, quantity: Quantity) -> Amount {
    normalize_18(price.raw() * quantity.raw())
}
