//! Decision engine
//!
//! Turns order book snapshots into price targets and keeps the resting order
//! compliant with them:
//! - Order book normalization and top-of-book statistics
//! - Lock resolution over distinct price levels
//! - Index navigation relative to the tracked order
//! - Tally-based target price estimation
//! - The order follower state machine

pub mod book;
pub mod lock;
pub mod navigator;
pub mod tally;
pub mod follower;

// Re-export commonly used types
pub use book::{OrderBookView, RawOrderBook};
pub use lock::{compress_levels, resolve_lock, LockResolution, LockState};
pub use navigator::{navigate, IndexNavigator};
pub use tally::{SampleOutcome, TallyBoard, TallyPhase, TargetPriceEstimator};
pub use follower::{
    violates_lock, FollowOutcome, FollowerState, KickPolicy, OrderCommand, OrderFollower, SubmitAck,
};
