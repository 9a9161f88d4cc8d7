//! Identifier newtypes. Components pass these across boundaries instead of
//! references, so the order book, settlement engine and liquidation engine
//! can each own their data independently (see DESIGN.md, "IDs not pointers").

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident, $repr:ty) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl $name {
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

use std::fmt;

id_newtype!(OrderId, u64);
id_newtype!(TradeId, u64);
id_newtype!(TraderId, u64);
id_newtype!(MarketId, u32);
id_newtype!(ManagerId, u64);
