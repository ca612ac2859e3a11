//! Index navigation relative to the tracked order's matched row

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::types::PriceLevel;

/// Price at `origin + skip` on `ladder`.
///
/// Negative `skip` moves toward better prices (front of the ladder), positive
/// toward worse ones. Out-of-range targets are rejected, never clamped.
pub fn navigate(ladder: &[PriceLevel], origin: usize, skip: i64) -> EngineResult<Decimal> {
    if origin >= ladder.len() {
        return Err(EngineError::logic(format!(
            "origin {} outside ladder of {} rows",
            origin,
            ladder.len()
        )));
    }

    let out_of_range = || {
        EngineError::logic(format!(
            "cannot skip {} rows from index {} (ladder has {} rows)",
            skip,
            origin,
            ladder.len()
        ))
    };
    let target = (origin as i64)
        .checked_add(skip)
        .and_then(|t| usize::try_from(t).ok())
        .filter(|&t| t < ladder.len())
        .ok_or_else(out_of_range)?;

    Ok(ladder[target].price)
}

/// Navigator bound to one ladder and the row the tracked order sits on
#[derive(Debug, Clone, Copy)]
pub struct IndexNavigator<'a> {
    ladder: &'a [PriceLevel],
    origin: usize,
}

impl<'a> IndexNavigator<'a> {
    /// Locate `order_price` on `ladder`; `None` when the order is not on it
    pub fn locate(ladder: &'a [PriceLevel], order_price: Decimal) -> Option<Self> {
        ladder
            .iter()
            .position(|l| l.price == order_price)
            .map(|origin| Self { ladder, origin })
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn price_at(&self, skip: i64) -> EngineResult<Decimal> {
        navigate(self.ladder, self.origin, skip)
    }
}
