//! Tally boards for auto-trade target prices
//!
//! Each side keeps a frequency count of the best opposing price, bucketed at
//! a fixed width over its half of the rolling range. Once the side's sampling
//! window is full, the most frequent bucket becomes that side's target price
//! and the board stops accumulating until restart.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::engine::book::OrderBookView;
use crate::types::{PriceRange, Side};

/// Phase of a tally board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyPhase {
    Accumulating,
    Locked { target_price: Decimal },
}

/// Result of offering one price to a board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Counted,
    /// This sample filled the window and locked the target
    Locked(Decimal),
    /// Price outside the board's half of the range
    OutOfRange,
    AlreadyLocked,
}

/// Frequency board for one side
///
/// Sell boards cover `[floor(mid), high]` with bucket 0 at the anchor and
/// indexes growing with price. Buy boards cover `[low, floor(mid)]` with
/// indexes growing as price falls.
#[derive(Debug, Clone)]
pub struct TallyBoard {
    side: Side,
    anchor: Decimal,
    bucket_width: Decimal,
    bucket_count: u32,
    buckets: BTreeMap<u32, u32>,
    window_size: u32,
    samples_taken: u32,
    phase: TallyPhase,
}

impl TallyBoard {
    pub fn new(side: Side, range: PriceRange, bucket_width: Decimal, window_size: u32) -> Self {
        let anchor = range.midpoint().floor();
        let span = match side {
            Side::Sell => range.high - anchor,
            Side::Buy => anchor - range.low,
        };
        let bucket_count = if bucket_width.is_zero() || span.is_sign_negative() {
            0
        } else {
            (span / bucket_width).floor().to_u32().unwrap_or(0) + 1
        };

        Self {
            side,
            anchor,
            bucket_width,
            bucket_count,
            buckets: BTreeMap::new(),
            window_size,
            samples_taken: 0,
            phase: TallyPhase::Accumulating,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn phase(&self) -> TallyPhase {
        self.phase
    }

    pub fn target_price(&self) -> Option<Decimal> {
        match self.phase {
            TallyPhase::Locked { target_price } => Some(target_price),
            TallyPhase::Accumulating => None,
        }
    }

    pub fn samples_taken(&self) -> u32 {
        self.samples_taken
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Bucket index holding `price`, if it lies on this board
    pub fn bucket_of(&self, price: Decimal) -> Option<u32> {
        if self.bucket_width.is_zero() {
            return None;
        }
        let offset = match self.side {
            Side::Sell => price - self.anchor,
            Side::Buy => self.anchor - price,
        };
        if offset.is_sign_negative() && !offset.is_zero() {
            return None;
        }
        let index = (offset / self.bucket_width).floor().to_u32()?;
        (index < self.bucket_count).then_some(index)
    }

    /// Lower-edge price of bucket `index`
    pub fn bucket_price(&self, index: u32) -> Decimal {
        let offset = Decimal::from(index) * self.bucket_width;
        match self.side {
            Side::Sell => self.anchor + offset,
            Side::Buy => self.anchor - offset,
        }
    }

    /// Non-empty buckets as `(price, count)`, in index order
    pub fn summary(&self) -> Vec<(Decimal, u32)> {
        self.buckets
            .iter()
            .map(|(&i, &count)| (self.bucket_price(i), count))
            .collect()
    }

    /// Count one observation of `price`
    pub fn record(&mut self, price: Decimal) -> SampleOutcome {
        if let TallyPhase::Locked { .. } = self.phase {
            return SampleOutcome::AlreadyLocked;
        }
        let Some(index) = self.bucket_of(price) else {
            debug!("{} tally ignores {} (outside board)", self.side, price);
            return SampleOutcome::OutOfRange;
        };

        *self.buckets.entry(index).or_insert(0) += 1;
        self.samples_taken += 1;

        if self.samples_taken >= self.window_size {
            if let Some(target_price) = self.select_target() {
                self.phase = TallyPhase::Locked { target_price };
                info!(
                    "{} tally locked at {} after {} samples",
                    self.side, target_price, self.samples_taken
                );
                return SampleOutcome::Locked(target_price);
            }
        }
        SampleOutcome::Counted
    }

    /// Highest-count bucket; ties go to the later (higher-index) bucket
    fn select_target(&self) -> Option<Decimal> {
        let mut best: Option<(u32, u32)> = None;
        for (&index, &count) in &self.buckets {
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if count < best_count => {}
                _ => best = Some((index, count)),
            }
        }
        best.map(|(index, _)| self.bucket_price(index))
    }
}

/// Per-side target price estimation from the live top of book
#[derive(Debug, Clone)]
pub struct TargetPriceEstimator {
    range: PriceRange,
    buy: TallyBoard,
    sell: TallyBoard,
}

impl TargetPriceEstimator {
    pub fn new(range: PriceRange, bucket_width: Decimal, buy_window: u32, sell_window: u32) -> Self {
        info!(
            "tally boards over L:{} H:{} (mid {}), windows buy={} sell={}",
            range.low,
            range.high,
            range.midpoint(),
            buy_window,
            sell_window
        );
        Self {
            range,
            buy: TallyBoard::new(Side::Buy, range, bucket_width, buy_window),
            sell: TallyBoard::new(Side::Sell, range, bucket_width, sell_window),
        }
    }

    pub fn range(&self) -> PriceRange {
        self.range
    }

    pub fn board(&self, side: Side) -> &TallyBoard {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    pub fn target_price(&self, side: Side) -> Option<Decimal> {
        self.board(side).target_price()
    }

    /// Sample one tick: best ask feeds the sell board, best bid the buy board
    pub fn observe(&mut self, book: &OrderBookView) -> [Option<SampleOutcome>; 2] {
        let sell = book.top_ask().map(|ask| self.sell.record(ask));
        let buy = book.top_bid().map(|bid| self.buy.record(bid));
        [buy, sell]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceLevel;
    use rust_decimal_macros::dec;

    fn range() -> PriceRange {
        PriceRange {
            low: dec!(99),
            high: dec!(103),
        }
    }

    #[test]
    fn test_sell_board_picks_most_frequent_bucket() {
        let mut board = TallyBoard::new(Side::Sell, range(), dec!(0.1), 60);
        for _ in 0..40 {
            board.record(dec!(101.0));
        }
        for _ in 0..19 {
            assert_eq!(board.record(dec!(101.5)), SampleOutcome::Counted);
        }
        assert_eq!(board.phase(), TallyPhase::Accumulating);
        assert_eq!(board.record(dec!(101.5)), SampleOutcome::Locked(dec!(101.0)));
        assert_eq!(board.target_price(), Some(dec!(101.0)));
        assert_eq!(board.samples_taken(), 60);
    }

    #[test]
    fn test_locked_board_stops_accumulating() {
        let mut board = TallyBoard::new(Side::Buy, range(), dec!(0.1), 2);
        board.record(dec!(100.3));
        board.record(dec!(100.3));
        assert_eq!(board.target_price(), Some(dec!(100.3)));
        assert_eq!(board.record(dec!(99.5)), SampleOutcome::AlreadyLocked);
        assert_eq!(board.samples_taken(), 2);
    }

    #[test]
    fn test_ties_go_to_higher_index() {
        let mut sell = TallyBoard::new(Side::Sell, range(), dec!(0.1), 4);
        for p in [dec!(101.2), dec!(102.0), dec!(101.2), dec!(102.0)] {
            sell.record(p);
        }
        assert_eq!(sell.target_price(), Some(dec!(102.0)));

        // On the buy board higher index means lower price
        let mut buy = TallyBoard::new(Side::Buy, range(), dec!(0.1), 4);
        for p in [dec!(100.5), dec!(99.5), dec!(100.5), dec!(99.5)] {
            buy.record(p);
        }
        assert_eq!(buy.target_price(), Some(dec!(99.5)));
    }

    #[test]
    fn test_out_of_range_samples_do_not_count() {
        let mut board = TallyBoard::new(Side::Sell, range(), dec!(0.1), 1);
        assert_eq!(board.record(dec!(100.9)), SampleOutcome::OutOfRange);
        assert_eq!(board.record(dec!(103.5)), SampleOutcome::OutOfRange);
        assert_eq!(board.samples_taken(), 0);
        assert_eq!(board.phase(), TallyPhase::Accumulating);
        assert_eq!(board.record(dec!(103)), SampleOutcome::Locked(dec!(103)));
    }

    #[test]
    fn test_zero_samples_never_lock() {
        let mut board = TallyBoard::new(Side::Buy, range(), dec!(0.1), 0);
        assert_eq!(board.phase(), TallyPhase::Accumulating);
        assert_eq!(board.record(dec!(200)), SampleOutcome::OutOfRange);
        assert_eq!(board.phase(), TallyPhase::Accumulating);
        assert!(board.summary().is_empty());
    }

    #[test]
    fn test_selected_bucket_has_samples() {
        let mut board = TallyBoard::new(Side::Sell, range(), dec!(0.1), 3);
        board.record(dec!(102.27));
        board.record(dec!(101.01));
        board.record(dec!(102.21));
        let target = board.target_price().unwrap();
        assert_eq!(target, dec!(102.2));
        let index = board.bucket_of(target).unwrap();
        assert!(board.summary().iter().any(|&(p, c)| p == board.bucket_price(index) && c > 0));
    }

    #[test]
    fn test_estimator_feeds_opposing_prices() {
        let mut estimator = TargetPriceEstimator::new(range(), dec!(0.1), 1, 1);
        let book = OrderBookView::new(
            vec![PriceLevel::new(dec!(100.4), dec!(1))],
            vec![PriceLevel::new(dec!(101.6), dec!(1))],
        );
        let [buy, sell] = estimator.observe(&book);
        assert_eq!(buy, Some(SampleOutcome::Locked(dec!(100.4))));
        assert_eq!(sell, Some(SampleOutcome::Locked(dec!(101.6))));
        assert_eq!(estimator.target_price(Side::Sell), Some(dec!(101.6)));
    }
}
