//! Order follower state machine
//!
//! Keeps the single resting order behind the lock price:
//! 1. PASSIVE - no resting order
//! 2. TRACKING - order rests on the compliant side of the lock
//! 3. KICKING - order crossed the lock and is being repriced away from it
//!
//! The follower never talks to the exchange. It emits [`OrderCommand`]
//! descriptors and the caller hands them to an order gateway.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::lock::LockState;
use crate::error::{EngineError, EngineResult};
use crate::types::{OpenOrder, Side};

/// Follower state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowerState {
    /// No resting order
    Passive,
    /// Order is compliant with the lock
    Tracking,
    /// Order is being repriced away from the lock
    Kicking,
}

impl std::fmt::Display for FollowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FollowerState::Passive => write!(f, "PASSIVE"),
            FollowerState::Tracking => write!(f, "TRACKING"),
            FollowerState::Kicking => write!(f, "KICKING"),
        }
    }
}

/// Command descriptor for the order gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OrderCommand {
    Place {
        side: Side,
        price: Decimal,
        amount: Decimal,
    },
    Replace {
        order_id: String,
        side: Side,
        price: Decimal,
        amount: Decimal,
    },
    Cancel {
        order_id: String,
    },
}

impl OrderCommand {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            OrderCommand::Place { .. } => None,
            OrderCommand::Replace { order_id, .. } | OrderCommand::Cancel { order_id } => {
                Some(order_id)
            }
        }
    }
}

impl std::fmt::Display for OrderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderCommand::Place { side, price, amount } => {
                write!(f, "PLACE {} {} @ {}", side, amount, price)
            }
            OrderCommand::Replace {
                order_id,
                side,
                price,
                amount,
            } => write!(f, "REPLACE #{} {} {} @ {}", order_id, side, amount, price),
            OrderCommand::Cancel { order_id } => write!(f, "CANCEL #{}", order_id),
        }
    }
}

/// Gateway answer to a submitted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAck {
    /// Accepted; carries the resulting order when the exchange returned one
    Accepted(Option<OpenOrder>),
    Rejected(String),
}

/// Repricing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KickPolicy {
    /// Distance from the lock price after a kick
    pub step: Decimal,
    /// Kicks before the lock is relaxed by one level
    pub relax_every: u32,
    /// Relaxation only happens while the depth is at or below this
    pub relax_ceiling: usize,
    /// Upper bound on kicks within one cycle
    pub max_kicks_per_cycle: u32,
}

impl Default for KickPolicy {
    fn default() -> Self {
        Self {
            step: dec!(2.0),
            relax_every: 4,
            relax_ceiling: 5,
            max_kicks_per_cycle: 16,
        }
    }
}

/// Result of one follow step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowOutcome {
    pub commands: Vec<OrderCommand>,
    pub kicks: u32,
    /// Lock depth after relaxation, if it happened
    pub relaxed_to: Option<usize>,
}

/// Whether `order` has caught up to or crossed `lock_price`
pub fn violates_lock(order: &OpenOrder, lock_price: Decimal) -> bool {
    match order.side {
        Side::Buy => order.price >= lock_price,
        Side::Sell => order.price <= lock_price,
    }
}

/// The single-order follower
#[derive(Debug, Clone)]
pub struct OrderFollower {
    state: FollowerState,
    order: Option<OpenOrder>,
    kick_count: u32,
    policy: KickPolicy,
}

impl OrderFollower {
    pub fn new(policy: KickPolicy) -> Self {
        Self {
            state: FollowerState::Passive,
            order: None,
            kick_count: 0,
            policy,
        }
    }

    pub fn state(&self) -> FollowerState {
        self.state
    }

    pub fn order(&self) -> Option<&OpenOrder> {
        self.order.as_ref()
    }

    pub fn kick_count(&self) -> u32 {
        self.kick_count
    }

    /// Feed the order list of this cycle.
    ///
    /// Returns the previously held order when it is gone (filled or cancelled).
    pub fn observe(&mut self, current: Option<OpenOrder>) -> Option<OpenOrder> {
        match current {
            Some(order) => {
                if self.state == FollowerState::Passive {
                    info!("tracking {} order #{} @ {}", order.side, order.id, order.price);
                    self.state = FollowerState::Tracking;
                }
                self.order = Some(order);
                None
            }
            None => {
                let vanished = self.order.take();
                if let Some(order) = &vanished {
                    info!("order #{} no longer resting", order.id);
                }
                self.state = FollowerState::Passive;
                self.kick_count = 0;
                vanished
            }
        }
    }

    /// Reprice the held order until it is compliant with `lock_price`
    pub fn follow(&mut self, lock: &mut LockState, lock_price: Decimal) -> FollowOutcome {
        let mut outcome = FollowOutcome::default();
        if !lock.is_enabled() {
            return outcome;
        }
        let Some(mut order) = self.order.clone() else {
            return outcome;
        };

        while violates_lock(&order, lock_price) {
            if outcome.kicks >= self.policy.max_kicks_per_cycle {
                warn!(
                    "order #{} still crosses lock {} after {} kicks",
                    order.id, lock_price, outcome.kicks
                );
                break;
            }
            self.state = FollowerState::Kicking;

            let new_price = match order.side {
                Side::Buy => lock_price - self.policy.step,
                Side::Sell => lock_price + self.policy.step,
            };
            info!(
                "kick {} #{}: {} -> {} (lock L{} @ {})",
                order.side, order.id, order.price, new_price, lock.depth, lock_price
            );
            order = order.repriced(new_price);
            outcome.commands.push(OrderCommand::Replace {
                order_id: order.id.clone(),
                side: order.side,
                price: order.price,
                amount: order.amount,
            });
            outcome.kicks += 1;
            self.kick_count += 1;

            if self.kick_count >= self.policy.relax_every && lock.depth <= self.policy.relax_ceiling {
                lock.relax();
                self.kick_count = 0;
                outcome.relaxed_to = Some(lock.depth);
                info!("lock relaxed to L{}", lock.depth);
            }
        }

        self.order = Some(order);
        self.state = FollowerState::Tracking;
        outcome
    }

    /// Manual reprice of the held order to `price`
    pub fn replace_at(&mut self, price: Decimal) -> EngineResult<OrderCommand> {
        let Some(order) = self.order.as_mut() else {
            return Err(EngineError::logic("no resting order to reprice"));
        };
        if price <= Decimal::ZERO {
            return Err(EngineError::logic(format!("invalid price {}", price)));
        }
        *order = order.repriced(price);
        debug!("manual reprice #{} to {}", order.id, price);
        Ok(OrderCommand::Replace {
            order_id: order.id.clone(),
            side: order.side,
            price: order.price,
            amount: order.amount,
        })
    }

    pub fn cancel(&self) -> EngineResult<OrderCommand> {
        self.order
            .as_ref()
            .map(|o| OrderCommand::Cancel {
                order_id: o.id.clone(),
            })
            .ok_or_else(|| EngineError::logic("no resting order to cancel"))
    }

    /// Apply the gateway's answer to a submitted command
    pub fn acknowledge(&mut self, command: &OrderCommand, ack: &SubmitAck) {
        match ack {
            SubmitAck::Accepted(Some(order)) => {
                if !matches!(command, OrderCommand::Cancel { .. }) {
                    self.order = Some(order.clone());
                    if self.state == FollowerState::Passive {
                        self.state = FollowerState::Tracking;
                    }
                }
            }
            SubmitAck::Accepted(None) => {}
            SubmitAck::Rejected(reason) => {
                // Next observe() restores the exchange's view of the order
                warn!("{} rejected: {}", command, reason);
            }
        }
    }
}

impl Default for OrderFollower {
    fn default() -> Self {
        Self::new(KickPolicy::default())
    }
}
