//! Loop-owned state
//!
//! One value owns everything the poll loop mutates between cycles. Each
//! stage borrows the pieces it needs; nothing is shared globally.

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::present::{Alert, RenderInputs, RenderModel};
use crate::config::TraderConfig;
use crate::engine::{LockState, OrderBookView, OrderCommand, OrderFollower, TargetPriceEstimator};
use crate::types::{Balance, PriceRange, TradeRecord};

#[derive(Debug)]
pub struct SessionContext {
    pub config: TraderConfig,
    pub lock: LockState,
    pub follower: OrderFollower,
    /// Created from the first ticker range and never resized
    pub estimator: Option<TargetPriceEstimator>,
    /// Last successfully decoded book
    pub book: OrderBookView,
    pub range: Option<PriceRange>,
    pub last_price: Option<Decimal>,
    pub balance: Option<Balance>,
    /// Row skip queued for the next book cycle
    pub pending_skip: Option<i64>,
    pub last_trade: Option<TradeRecord>,
    pub suggestion: Option<OrderCommand>,
    pub cycle: u64,
}

impl SessionContext {
    pub fn new(config: TraderConfig) -> Self {
        Self {
            lock: LockState::new(config.lock_depth),
            follower: OrderFollower::new(config.kick_policy()),
            estimator: None,
            book: OrderBookView::default(),
            range: None,
            last_price: None,
            balance: None,
            pending_skip: None,
            last_trade: None,
            suggestion: None,
            cycle: 0,
            config,
        }
    }

    /// Install a fresh ticker range.
    ///
    /// The first range sizes the tally boards. Later ranges only replace the
    /// displayed one and yield an alert when they reach outside it.
    pub fn apply_range(&mut self, range: PriceRange) -> Option<Alert> {
        if range.low > range.high {
            warn!("ignoring inverted range L:{} H:{}", range.low, range.high);
            return None;
        }
        if self.estimator.is_none() {
            self.estimator = Some(TargetPriceEstimator::new(
                range,
                self.config.bucket_width,
                self.config.buy_window,
                self.config.sell_window,
            ));
        }
        let alert = match self.range {
            Some(previous) if previous.widened_by(&range) => {
                info!(
                    "range widened L:{} H:{} -> L:{} H:{}",
                    previous.low, previous.high, range.low, range.high
                );
                Some(Alert::RangeWidened {
                    previous,
                    current: range,
                })
            }
            _ => None,
        };
        self.range = Some(range);
        alert
    }

    /// Current lock price, when the lock is enabled and resolved
    pub fn lock_price(&self) -> Option<Decimal> {
        self.lock
            .resolved_price
            .filter(|_| self.lock.is_enabled())
    }

    pub fn render_model(&self) -> RenderModel {
        RenderModel::build(RenderInputs {
            book: &self.book,
            rows: self.config.book_rows,
            volume_depth: self.config.volume_depth,
            order: self.follower.order(),
            fee_rate: self.config.fee_rate,
            follower: self.follower.state(),
            lock_depth: self.lock.depth,
            lock_price: self.lock_price(),
            estimator: self.estimator.as_ref(),
            range: self.range,
            last_price: self.last_price,
            last_trade: self.last_trade.as_ref(),
            suggestion: self.suggestion.as_ref(),
        })
    }
}
