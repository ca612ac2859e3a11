//! Exchange API data models
//!
//! Request and response types for the public and private REST endpoints.
//! Numeric fields arrive either as JSON numbers or numeric strings; both
//! decode into `Decimal`.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{Balance, OpenOrder, PriceRange, Side, TradeRecord};

// ============================================================================
// Public market data
// ============================================================================

/// Ticker for one pair
#[derive(Debug, Clone, Deserialize)]
pub struct Ticker {
    pub low: Decimal,
    pub high: Decimal,
    pub last: Decimal,
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub ask: Option<Decimal>,
}

impl Ticker {
    pub fn range(&self) -> PriceRange {
        PriceRange {
            low: self.low,
            high: self.high,
        }
    }
}

/// Last trade price of one pair
#[derive(Debug, Clone, Deserialize)]
pub struct LastPrice {
    pub symbol1: String,
    pub symbol2: String,
    pub lprice: Decimal,
}

/// Response from the last prices endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LastPrices {
    #[serde(default)]
    pub data: Vec<LastPrice>,
}

impl LastPrices {
    pub fn first_price(&self) -> EngineResult<Decimal> {
        self.data
            .first()
            .map(|p| p.lprice)
            .ok_or_else(|| EngineError::Decode("last prices response carries no data".into()))
    }
}

// ============================================================================
// Account
// ============================================================================

/// Open order as reported by the exchange
#[derive(Debug, Clone, Deserialize)]
pub struct RawOpenOrder {
    pub id: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub pending: Option<Decimal>,
}

impl From<RawOpenOrder> for OpenOrder {
    fn from(raw: RawOpenOrder) -> Self {
        OpenOrder {
            id: raw.id,
            side: raw.side,
            price: raw.price,
            amount: raw.amount,
        }
    }
}

/// Per-currency balance entry
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyBalance {
    #[serde(default)]
    pub available: Decimal,
    #[serde(default)]
    pub orders: Decimal,
}

/// Balance response: one entry per currency code next to metadata fields
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    #[serde(flatten)]
    pub entries: HashMap<String, serde_json::Value>,
}

impl BalanceResponse {
    /// Available amount of `currency`; absent currencies count as zero
    pub fn available(&self, currency: &str) -> EngineResult<Decimal> {
        match self.entries.get(currency) {
            Some(value) => {
                let entry: CurrencyBalance = serde_json::from_value(value.clone())?;
                Ok(entry.available)
            }
            None => Ok(Decimal::ZERO),
        }
    }

    pub fn for_pair(&self, base: &str, quote: &str) -> EngineResult<Balance> {
        Ok(Balance {
            base: self.available(base)?,
            quote: self.available(quote)?,
        })
    }
}

/// Archived (done or partially done) order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedOrder {
    pub order_id: String,
    pub last_tx_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub side: Side,
    pub amount: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Currency-suffixed totals such as `tfa:USD` and `tta:USD`
    #[serde(flatten)]
    pub totals: HashMap<String, serde_json::Value>,
}

impl ArchivedOrder {
    fn total(&self, primary: &str, fallback: &str, quote: &str) -> EngineResult<Decimal> {
        let value = self
            .totals
            .get(&format!("{primary}:{quote}"))
            .or_else(|| self.totals.get(&format!("{fallback}:{quote}")));
        match value {
            Some(v) => decimal_from_value(v),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Ledger record for this order; the profit flag is left for the synchronizer
    pub fn to_record(&self, quote: &str) -> EngineResult<TradeRecord> {
        Ok(TradeRecord {
            order_id: self.order_id.clone(),
            time: self.last_tx_time,
            side: self.side,
            price: self.price.unwrap_or_default(),
            amount: self.amount,
            fee: self.total("tfa", "fa", quote)?,
            cost: self.total("tta", "ta", quote)?,
            profit: false,
        })
    }
}

fn decimal_from_value(value: &serde_json::Value) -> EngineResult<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s)
            .map_err(|e| EngineError::Decode(format!("bad decimal {s:?}: {e}"))),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .map_err(|e| EngineError::Decode(format!("bad decimal {n}: {e}"))),
        other => Err(EngineError::Decode(format!("expected a number, got {other}"))),
    }
}

// ============================================================================
// Signed requests
// ============================================================================

/// Body of every private request: auth fields plus endpoint parameters
#[derive(Debug, Clone, Serialize)]
pub struct SignedRequest {
    pub key: String,
    pub signature: String,
    pub nonce: String,
    #[serde(flatten)]
    pub params: RequestParams,
}

/// Endpoint-specific parameters of a private request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    OpenOrders {},
    Balance {},
    Place {
        #[serde(rename = "type")]
        side: Side,
        amount: Decimal,
        price: Decimal,
    },
    Replace {
        #[serde(rename = "type")]
        side: Side,
        amount: Decimal,
        price: Decimal,
        order_id: String,
    },
    Cancel {
        id: String,
    },
    ArchivedOrders {
        #[serde(rename = "dateFrom", skip_serializing_if = "Option::is_none")]
        date_from: Option<i64>,
        #[serde(rename = "lastTxDateFrom", skip_serializing_if = "Option::is_none")]
        last_tx_date_from: Option<i64>,
        status: String,
    },
}

impl RequestParams {
    /// Endpoint path relative to the API root
    pub fn path(&self, base: &str, quote: &str) -> String {
        match self {
            RequestParams::OpenOrders {} => "open_orders/".to_string(),
            RequestParams::Balance {} => "balance/".to_string(),
            RequestParams::Place { .. } => format!("place_order/{base}/{quote}/"),
            RequestParams::Replace { .. } => format!("cancel_replace_order/{base}/{quote}/"),
            RequestParams::Cancel { .. } => "cancel_order/".to_string(),
            RequestParams::ArchivedOrders { .. } => format!("archived_orders/{base}/{quote}/"),
        }
    }

    /// Reads may be retried; order mutations may not
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            RequestParams::OpenOrders {} | RequestParams::Balance {} | RequestParams::ArchivedOrders { .. }
        )
    }
}
