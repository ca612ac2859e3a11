//! Price lock resolution
//!
//! Compresses a ladder into its first N visually distinct price levels and
//! yields the Nth as the lock price a resting order has to stay behind.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::types::PriceLevel;

/// Lock depth and the price it last resolved to
///
/// `depth == 0` means the lock is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockState {
    pub depth: usize,
    pub resolved_price: Option<Decimal>,
}

impl LockState {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            resolved_price: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.depth > 0
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
        self.resolved_price = None;
    }

    pub fn disable(&mut self) {
        self.set_depth(0);
    }

    /// Loosen (positive) or tighten (negative) the lock, never below zero
    pub fn shift_depth(&mut self, delta: i64) {
        let next = (self.depth as i64 + delta).max(0) as usize;
        self.set_depth(next);
    }

    /// Loosen by one level after repeated kicks. The price resolved at the
    /// old depth stays until the next refresh.
    pub fn relax(&mut self) {
        self.depth += 1;
    }

    /// Resolve against `ladder` and remember the result
    ///
    /// A rejected resolution leaves the previous price in place.
    pub fn refresh(&mut self, ladder: &[PriceLevel]) -> EngineResult<Decimal> {
        let resolution = resolve_lock(ladder, self.depth)?;
        if self.resolved_price != Some(resolution.price) {
            debug!(
                "lock L{} resolved to {} (levels {:?})",
                self.depth, resolution.price, resolution.levels
            );
        }
        self.resolved_price = Some(resolution.price);
        Ok(resolution.price)
    }
}

/// Outcome of a lock resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockResolution {
    /// Filled slots, front to back (may be shorter than the depth)
    pub levels: Vec<Decimal>,
    pub price: Decimal,
}

/// Fill up to `depth` slots with ladder prices, front to back.
///
/// A row goes into the first unfilled slot only when its price differs from
/// the slot immediately before it; otherwise the row is skipped. Only the
/// preceding slot is compared, not the full set of filled slots.
pub fn compress_levels(ladder: &[PriceLevel], depth: usize) -> Vec<Decimal> {
    let mut slots: Vec<Decimal> = Vec::with_capacity(depth);
    for row in ladder {
        if slots.len() == depth {
            break;
        }
        match slots.last() {
            Some(prev) if *prev == row.price => continue,
            _ => slots.push(row.price),
        }
    }
    slots
}

/// Resolve the lock price at `depth` distinct levels.
///
/// When the ladder runs out before every slot is filled the last row's
/// price is used instead.
pub fn resolve_lock(ladder: &[PriceLevel], depth: usize) -> EngineResult<LockResolution> {
    if depth == 0 {
        return Err(EngineError::logic("lock is disabled"));
    }
    let Some(last_row) = ladder.last() else {
        return Err(EngineError::logic("cannot resolve lock against an empty ladder"));
    };

    let levels = compress_levels(ladder, depth);
    let price = if levels.len() == depth {
        levels[depth - 1]
    } else {
        last_row.price
    };

    Ok(LockResolution { levels, price })
}
