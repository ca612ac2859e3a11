//! Presentation of the loop state
//!
//! The loop builds a [`RenderModel`] once per book cycle and hands it to a
//! [`Presenter`]. The terminal presenter writes plain text to stdout.

use std::io::Write;

use rust_decimal::Decimal;
use tracing::warn;

use crate::engine::{FollowerState, OrderBookView, OrderCommand, TallyPhase, TargetPriceEstimator};
use crate::types::{OpenOrder, PriceRange, Side, TradeRecord};

/// Operator-facing alerts (bell)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Kicked {
        side: Side,
        price: Decimal,
        kicks: u32,
    },
    Filled(OpenOrder),
    Cancelled(OpenOrder),
    RangeWidened {
        previous: PriceRange,
        current: PriceRange,
    },
    TargetLocked {
        side: Side,
        price: Decimal,
    },
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alert::Kicked { side, price, kicks } => {
                write!(f, "{} kicked to {} ({} kick(s))", side, price, kicks)
            }
            Alert::Filled(order) => write!(f, "{} order #{} completed!", order.side, order.id),
            Alert::Cancelled(order) => write!(f, "{} order #{} cancelled.", order.side, order.id),
            Alert::RangeWidened { previous, current } => write!(
                f,
                "range widened: L:{} H:{} -> L:{} H:{}",
                previous.low, previous.high, current.low, current.high
            ),
            Alert::TargetLocked { side, price } => write!(f, "{} target locked at {}", side, price),
        }
    }
}

/// One rendered ladder row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRow {
    pub price: Decimal,
    pub volume: Decimal,
    /// The tracked order sits on this row
    pub matched: bool,
    /// Lock depth marker, on the first row at the lock price
    pub lock_marker: Option<usize>,
}

/// Top-of-book statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookStats {
    pub top_bid: Option<Decimal>,
    pub top_ask: Option<Decimal>,
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
    /// Ask volume over bid volume, in percent
    pub ratio_pct: Option<Decimal>,
}

/// Tally board summary for one side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallySummary {
    pub side: Side,
    pub samples: u32,
    pub window: u32,
    pub target: Option<Decimal>,
    /// Non-empty buckets as `(price, count)`
    pub buckets: Vec<(Decimal, u32)>,
}

/// The resting order with its fee-adjusted cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTrade {
    pub order: OpenOrder,
    pub cost_with_fee: Decimal,
}

/// Everything the presenter draws for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderModel {
    /// Ascending (best ask first)
    pub asks: Vec<LadderRow>,
    /// Descending (best bid first)
    pub bids: Vec<LadderRow>,
    pub stats: BookStats,
    pub range: Option<PriceRange>,
    pub last_price: Option<Decimal>,
    pub follower: FollowerState,
    pub lock_depth: usize,
    pub lock_price: Option<Decimal>,
    pub tally: Vec<TallySummary>,
    pub last_trade: Option<TradeRecord>,
    pub pending: Option<PendingTrade>,
    pub suggestion: Option<OrderCommand>,
}

/// Inputs for [`RenderModel::build`]
pub struct RenderInputs<'a> {
    pub book: &'a OrderBookView,
    pub rows: usize,
    pub volume_depth: usize,
    pub order: Option<&'a OpenOrder>,
    pub fee_rate: Decimal,
    pub follower: FollowerState,
    pub lock_depth: usize,
    pub lock_price: Option<Decimal>,
    pub estimator: Option<&'a TargetPriceEstimator>,
    pub range: Option<PriceRange>,
    pub last_price: Option<Decimal>,
    pub last_trade: Option<&'a TradeRecord>,
    pub suggestion: Option<&'a OrderCommand>,
}

impl RenderModel {
    pub fn build(inputs: RenderInputs<'_>) -> Self {
        let ladder_rows = |side: Side| -> Vec<LadderRow> {
            let order_here = inputs.order.filter(|o| o.side == side);
            let lock_here = order_here.and(inputs.lock_price).filter(|_| inputs.lock_depth > 0);
            let mut marker_placed = false;
            inputs
                .book
                .ladder(side)
                .iter()
                .take(inputs.rows)
                .map(|level| {
                    let lock_marker = match lock_here {
                        Some(price) if !marker_placed && level.price == price => {
                            marker_placed = true;
                            Some(inputs.lock_depth)
                        }
                        _ => None,
                    };
                    LadderRow {
                        price: level.price,
                        volume: level.volume,
                        matched: order_here.is_some_and(|o| o.price == level.price),
                        lock_marker,
                    }
                })
                .collect()
        };

        let tally = inputs
            .estimator
            .map(|estimator| {
                [Side::Buy, Side::Sell]
                    .into_iter()
                    .map(|side| {
                        let board = estimator.board(side);
                        TallySummary {
                            side,
                            samples: board.samples_taken(),
                            window: board.window_size(),
                            target: match board.phase() {
                                TallyPhase::Locked { target_price } => Some(target_price),
                                TallyPhase::Accumulating => None,
                            },
                            buckets: board.summary(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            asks: ladder_rows(Side::Sell),
            bids: ladder_rows(Side::Buy),
            stats: BookStats {
                top_bid: inputs.book.top_bid(),
                top_ask: inputs.book.top_ask(),
                bid_volume: inputs.book.volume_sum(Side::Buy, inputs.volume_depth),
                ask_volume: inputs.book.volume_sum(Side::Sell, inputs.volume_depth),
                ratio_pct: inputs.book.volume_ratio_pct(inputs.volume_depth),
            },
            range: inputs.range,
            last_price: inputs.last_price,
            follower: inputs.follower,
            lock_depth: inputs.lock_depth,
            lock_price: inputs.lock_price,
            tally,
            last_trade: inputs.last_trade.cloned(),
            pending: inputs.order.map(|order| PendingTrade {
                order: order.clone(),
                cost_with_fee: order.cost_with_fee(inputs.fee_rate).round_dp(2),
            }),
            suggestion: inputs.suggestion.cloned(),
        }
    }
}

/// Renders loop state and surfaces alerts
pub trait Presenter {
    fn render(&mut self, model: &RenderModel);
    fn alert(&mut self, alert: &Alert);
    fn history(&mut self, records: &[TradeRecord]);
    fn notice(&mut self, message: &str);
}

/// Plain-text presenter
pub struct TerminalPresenter<W: Write> {
    out: W,
}

impl TerminalPresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_row(&mut self, row: &LadderRow) -> std::io::Result<()> {
        let price = if row.matched {
            format!("[{}]", row.price)
        } else {
            format!(" {} ", row.price)
        };
        write!(self.out, "{:>14} {:>14}", price, row.volume)?;
        if let Some(depth) = row.lock_marker {
            write!(self.out, " <-L{}", depth)?;
        }
        writeln!(self.out)
    }

    fn write_model(&mut self, model: &RenderModel) -> std::io::Result<()> {
        writeln!(self.out)?;
        for row in model.asks.iter().rev() {
            self.write_row(row)?;
        }
        writeln!(self.out, "{:-^30}", "")?;
        for row in &model.bids {
            self.write_row(row)?;
        }

        let stats = &model.stats;
        write!(
            self.out,
            "bid vol {} | ask vol {}",
            stats.bid_volume, stats.ask_volume
        )?;
        if let Some(ratio) = stats.ratio_pct {
            write!(self.out, " | ask/bid {}%", ratio)?;
        }
        writeln!(self.out)?;

        if let Some(range) = model.range {
            write!(self.out, "L:{} H:{} M:{}", range.low, range.high, range.midpoint())?;
        }
        if let Some(last) = model.last_price {
            write!(self.out, " last {}", last)?;
        }
        writeln!(self.out, " | {} L{}", model.follower, model.lock_depth)?;

        for summary in &model.tally {
            write!(
                self.out,
                "{} tally {}/{}",
                summary.side, summary.samples, summary.window
            )?;
            if let Some(target) = summary.target {
                write!(self.out, " target {}", target)?;
            }
            writeln!(self.out)?;
        }

        if let Some(trade) = &model.last_trade {
            writeln!(
                self.out,
                "last: {} {} @ {} cost {} fee {}{}",
                trade.side,
                trade.amount,
                trade.price,
                trade.cost,
                trade.fee,
                if trade.profit { " +" } else { "" }
            )?;
        }
        if let Some(pending) = &model.pending {
            writeln!(
                self.out,
                "pending: {} {} @ {} ({} incl. fee)",
                pending.order.side, pending.order.amount, pending.order.price, pending.cost_with_fee
            )?;
        }
        if let Some(suggestion) = &model.suggestion {
            writeln!(self.out, "suggest: {}", suggestion)?;
        }
        self.out.flush()
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn render(&mut self, model: &RenderModel) {
        if let Err(e) = self.write_model(model) {
            warn!("render failed: {}", e);
        }
    }

    fn alert(&mut self, alert: &Alert) {
        if let Err(e) = writeln!(self.out, "\x07{}", alert).and_then(|_| self.out.flush()) {
            warn!("alert failed: {}", e);
        }
    }

    fn history(&mut self, records: &[TradeRecord]) {
        let mut write = || -> std::io::Result<()> {
            writeln!(self.out, "{:-^30}", " history ")?;
            for r in records {
                writeln!(
                    self.out,
                    "{} {} {} @ {} cost {} fee {}{}",
                    r.time.format("%Y-%m-%d %H:%M:%S"),
                    r.side,
                    r.amount,
                    r.price,
                    r.cost,
                    r.fee,
                    if r.profit { " +" } else { "" }
                )?;
            }
            self.out.flush()
        };
        if let Err(e) = write() {
            warn!("history render failed: {}", e);
        }
    }

    fn notice(&mut self, message: &str) {
        if let Err(e) = writeln!(self.out, "{}", message) {
            warn!("notice failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceLevel;
    use rust_decimal_macros::dec;

    fn book() -> OrderBookView {
        OrderBookView::new(
            vec![
                PriceLevel::new(dec!(100), dec!(1)),
                PriceLevel::new(dec!(99), dec!(2)),
                PriceLevel::new(dec!(99), dec!(3)),
                PriceLevel::new(dec!(98), dec!(1)),
            ],
            vec![
                PriceLevel::new(dec!(101), dec!(1)),
                PriceLevel::new(dec!(102), dec!(1)),
            ],
        )
    }

    fn inputs<'a>(book: &'a OrderBookView, order: Option<&'a OpenOrder>) -> RenderInputs<'a> {
        RenderInputs {
            book,
            rows: 40,
            volume_depth: 10,
            order,
            fee_rate: dec!(0.0026),
            follower: FollowerState::Tracking,
            lock_depth: 2,
            lock_price: Some(dec!(99)),
            estimator: None,
            range: None,
            last_price: None,
            last_trade: None,
            suggestion: None,
        }
    }

    #[test]
    fn test_matched_row_and_single_lock_marker() {
        let book = book();
        let order = OpenOrder {
            id: "1".into(),
            side: Side::Buy,
            price: dec!(98),
            amount: dec!(1),
        };
        let model = RenderModel::build(inputs(&book, Some(&order)));

        let markers: Vec<_> = model.bids.iter().map(|r| r.lock_marker).collect();
        assert_eq!(markers, vec![None, Some(2), None, None]);
        assert!(model.bids[3].matched);
        assert!(model.asks.iter().all(|r| !r.matched && r.lock_marker.is_none()));
        assert_eq!(model.stats.bid_volume, dec!(7));
        assert_eq!(model.stats.ratio_pct, Some(dec!(29)));
        assert_eq!(model.pending.unwrap().cost_with_fee, dec!(98.25));
    }

    #[test]
    fn test_no_marker_without_order() {
        let book = book();
        let model = RenderModel::build(inputs(&book, None));
        assert!(model.bids.iter().all(|r| r.lock_marker.is_none()));
        assert!(model.pending.is_none());
    }

    #[test]
    fn test_terminal_output() {
        let book = book();
        let order = OpenOrder {
            id: "1".into(),
            side: Side::Buy,
            price: dec!(98),
            amount: dec!(1),
        };
        let model = RenderModel::build(inputs(&book, Some(&order)));
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.render(&model);
        presenter.alert(&Alert::Cancelled(order));
        let text = String::from_utf8(presenter.into_inner()).unwrap();

        assert!(text.contains("[98]"));
        assert!(text.contains("<-L2"));
        assert!(text.contains("pending: BUY 1 @ 98"));
        assert!(text.contains("\x07BUY order #1 cancelled."));
    }
}
