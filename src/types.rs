//! Shared domain types: ladder rows, orders, trade records and market summaries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Wire name used by the exchange
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// One ladder row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }
}

/// The single resting user order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
}

impl OpenOrder {
    /// Quote-currency value of the order (price * amount)
    pub fn cost(&self) -> Decimal {
        self.price * self.amount
    }

    /// Same order moved to `new_price`, amount recomputed so the cost is preserved
    pub fn repriced(&self, new_price: Decimal) -> Self {
        let amount = if new_price.is_zero() {
            self.amount
        } else {
            (self.cost() / new_price).round_dp(8)
        };
        Self {
            id: self.id.clone(),
            side: self.side,
            price: new_price,
            amount,
        }
    }

    /// Pending cost including (buy) or net of (sell) the exchange fee
    pub fn cost_with_fee(&self, fee_rate: Decimal) -> Decimal {
        let gross = self.cost();
        match self.side {
            Side::Buy => gross + gross * fee_rate,
            Side::Sell => gross - gross * fee_rate,
        }
    }
}

/// A completed (or partially completed) trade as stored in the ledger
///
/// Records are written once by the archive synchronizer and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Exchange order id, unique key in the ledger
    pub order_id: String,
    /// Time of the last transaction on the order
    pub time: DateTime<Utc>,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Decimal,
    pub cost: Decimal,
    /// True when this trade improved on the previous one (see archive sync)
    pub profit: bool,
}

/// Rolling price range reported by the exchange ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: Decimal,
    pub high: Decimal,
}

impl PriceRange {
    pub fn midpoint(&self) -> Decimal {
        (self.low + self.high) / Decimal::TWO
    }

    /// True when `next` reaches outside this range
    pub fn widened_by(&self, next: &PriceRange) -> bool {
        self.low != self.high && (next.low < self.low || next.high > self.high)
    }
}

/// Available balances for the traded pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Base currency (e.g. BTC)
    pub base: Decimal,
    /// Quote currency (e.g. USD)
    pub quote: Decimal,
}
