//! Order book view
//!
//! Normalizes a raw snapshot into ordered bid/ask ladders and exposes the
//! top-of-book statistics the rest of the engine reads. Pure projection: a
//! missing side becomes an empty ladder, never an error.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{PriceLevel, Side};

/// Raw snapshot as delivered by the exchange: `[price, volume]` pairs per side
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawOrderBook {
    #[serde(default)]
    pub bids: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Bid and ask ladders of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBookView {
    /// Descending by price
    bids: Vec<PriceLevel>,
    /// Ascending by price
    asks: Vec<PriceLevel>,
}

impl OrderBookView {
    /// Build from already-shaped ladders; rows are stably re-sorted per side
    pub fn new(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        let mut bids = bids;
        let mut asks = asks;
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self { bids, asks }
    }

    pub fn from_snapshot(raw: &RawOrderBook) -> Self {
        let to_levels = |rows: &[(Decimal, Decimal)]| {
            rows.iter()
                .map(|&(price, volume)| PriceLevel::new(price, volume))
                .collect::<Vec<_>>()
        };
        Self::new(to_levels(&raw.bids), to_levels(&raw.asks))
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// The ladder an order of `side` rests on (bids for buys, asks for sells)
    pub fn ladder(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn top_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn top_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Sum of volumes over the first `n` rows; missing rows contribute zero
    pub fn volume_sum(&self, side: Side, n: usize) -> Decimal {
        self.ladder(side).iter().take(n).map(|l| l.volume).sum()
    }

    /// Ask volume over bid volume for the first `n` rows, in percent
    pub fn volume_ratio_pct(&self, n: usize) -> Option<Decimal> {
        let bid_total = self.volume_sum(Side::Buy, n);
        if bid_total.is_zero() {
            return None;
        }
        Some((self.volume_sum(Side::Sell, n) / bid_total * Decimal::ONE_HUNDRED).round_dp(0))
    }

    /// Index of the first row on `side` whose price equals `price`
    pub fn matched_index(&self, side: Side, price: Decimal) -> Option<usize> {
        self.ladder(side).iter().position(|l| l.price == price)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> OrderBookView {
        let raw: RawOrderBook = serde_json::from_str(
            r#"{"bids": [[100.5, 0.2], [101, 0.1], [99, 1.5]],
                "asks": [[103, 0.4], [102, 0.3]]}"#,
        )
        .unwrap();
        OrderBookView::from_snapshot(&raw)
    }

    #[test]
    fn test_ladders_are_ordered() {
        let book = sample();
        let bids: Vec<_> = book.bids().iter().map(|l| l.price).collect();
        let asks: Vec<_> = book.asks().iter().map(|l| l.price).collect();
        assert_eq!(bids, vec![dec!(101), dec!(100.5), dec!(99)]);
        assert_eq!(asks, vec![dec!(102), dec!(103)]);
        assert_eq!(book.top_bid(), Some(dec!(101)));
        assert_eq!(book.top_ask(), Some(dec!(102)));
    }

    #[test]
    fn test_volume_sum_beyond_depth() {
        let book = sample();
        assert_eq!(book.volume_sum(Side::Buy, 2), dec!(0.3));
        assert_eq!(book.volume_sum(Side::Sell, 10), dec!(0.7));
        assert_eq!(book.volume_sum(Side::Sell, 0), Decimal::ZERO);
    }

    #[test]
    fn test_missing_side_is_empty_ladder() {
        let raw: RawOrderBook = serde_json::from_str(r#"{"asks": [["250.1", "2"]]}"#).unwrap();
        let book = OrderBookView::from_snapshot(&raw);
        assert!(book.bids().is_empty());
        assert_eq!(book.top_bid(), None);
        assert_eq!(book.top_ask(), Some(dec!(250.1)));
        assert_eq!(book.volume_sum(Side::Buy, 10), Decimal::ZERO);
        assert_eq!(book.volume_ratio_pct(10), None);
    }

    #[test]
    fn test_matched_index() {
        let book = sample();
        assert_eq!(book.matched_index(Side::Buy, dec!(100.5)), Some(1));
        assert_eq!(book.matched_index(Side::Sell, dec!(100.5)), None);
    }
}
