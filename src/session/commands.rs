//! Operator commands against the loop state
//!
//! Each function validates against the last good book and either mutates
//! local state (lock, queued skip) or returns the order command to submit.
//! A rejected command leaves the order untouched.

use rust_decimal::Decimal;
use tracing::info;

use super::context::SessionContext;
use crate::config::TraderConfig;
use crate::engine::{IndexNavigator, OrderCommand};
use crate::error::{EngineError, EngineResult};
use crate::types::{Balance, Side};

/// Move the order one tick past its neighbouring row, or shift the lock
/// when no order rests.
///
/// `up` targets the next better row (higher bid, lower ask), otherwise the
/// next worse one. Without an order `up` tightens the lock by two levels and
/// `down` loosens it by two.
pub fn reprice(ctx: &mut SessionContext, up: bool) -> EngineResult<Option<OrderCommand>> {
    let Some(order) = ctx.follower.order() else {
        ctx.lock.shift_depth(if up { -2 } else { 2 });
        info!("lock depth now L{}", ctx.lock.depth);
        return Ok(None);
    };

    let ladder = ctx.book.ladder(order.side);
    let navigator = IndexNavigator::locate(ladder, order.price)
        .ok_or_else(|| EngineError::logic(format!("order price {} is not on the book", order.price)))?;

    let step: i64 = if up { -1 } else { 1 };
    let mut skip = step;
    let neighbour = loop {
        let price = navigator.price_at(skip)?;
        if price != order.price {
            break price;
        }
        skip += step;
    };

    let tick = ctx.config.tick_size;
    let price = match (order.side, up) {
        (Side::Buy, true) | (Side::Sell, false) => neighbour + tick,
        (Side::Buy, false) | (Side::Sell, true) => neighbour - tick,
    };
    ctx.follower.replace_at(price).map(Some)
}

/// Drop the lock if one is set, otherwise cancel the resting order
pub fn cancel_or_unlock(ctx: &mut SessionContext) -> EngineResult<Option<OrderCommand>> {
    if ctx.lock.is_enabled() {
        ctx.lock.disable();
        info!("lock disabled");
        return Ok(None);
    }
    ctx.follower.cancel().map(Some)
}

/// Queue a row skip for the next book cycle
pub fn queue_skip(ctx: &mut SessionContext, skip: i64) {
    ctx.pending_skip = Some(skip);
}

pub fn set_lock(ctx: &mut SessionContext, depth: usize) {
    ctx.lock.set_depth(depth);
    info!("lock depth set to L{}", depth);
}

/// Resolve a queued skip against the current book
pub fn skip_command(ctx: &mut SessionContext, skip: i64) -> EngineResult<OrderCommand> {
    let order = ctx
        .follower
        .order()
        .ok_or_else(|| EngineError::logic("no resting order to move"))?;
    let ladder = ctx.book.ladder(order.side);
    let price = IndexNavigator::locate(ladder, order.price)
        .ok_or_else(|| EngineError::logic(format!("order price {} is not on the book", order.price)))?
        .price_at(skip)?;
    ctx.follower.replace_at(price)
}

/// Replace the resting order at `price`, or open a new order when none rests.
///
/// Buys may not be priced above the best bid, sells not below the best ask.
/// `balance` is only read when no order rests.
pub fn enter_price(
    ctx: &mut SessionContext,
    price: Decimal,
    balance: Option<Balance>,
) -> EngineResult<OrderCommand> {
    if price <= Decimal::ZERO {
        return Err(EngineError::logic(format!("invalid price {}", price)));
    }
    let Some(order) = ctx.follower.order() else {
        let balance = balance.ok_or_else(|| EngineError::logic("balance unknown"))?;
        return new_order_command(&ctx.config, balance, price);
    };

    match order.side {
        Side::Buy => {
            let best = ctx
                .book
                .top_bid()
                .ok_or_else(|| EngineError::logic("no bids to validate against"))?;
            if price > best {
                return Err(EngineError::logic(format!("buy price must be <= highest bid ({})", best)));
            }
        }
        Side::Sell => {
            let best = ctx
                .book
                .top_ask()
                .ok_or_else(|| EngineError::logic("no asks to validate against"))?;
            if price < best {
                return Err(EngineError::logic(format!("sell price must be >= lowest ask ({})", best)));
            }
        }
    }
    ctx.follower.replace_at(price)
}

/// New order at `price` with the side picked from balances: sell all base
/// when quote is short and base is held, otherwise buy with quote net of fee
pub fn new_order_command(
    config: &TraderConfig,
    balance: Balance,
    price: Decimal,
) -> EngineResult<OrderCommand> {
    if balance.quote < config.quote_min && balance.base > config.base_sell_min {
        return Ok(OrderCommand::Place {
            side: Side::Sell,
            price,
            amount: balance.base,
        });
    }

    let spendable = balance.quote - balance.quote * config.fee_rate;
    let amount = (spendable / price).round_dp(8);
    if amount <= Decimal::ZERO {
        return Err(EngineError::logic(format!(
            "nothing to trade (base {}, quote {})",
            balance.base, balance.quote
        )));
    }
    Ok(OrderCommand::Place {
        side: Side::Buy,
        price,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OrderBookView;
    use crate::types::{OpenOrder, PriceLevel};
    use rust_decimal_macros::dec;

    fn levels(prices: &[Decimal]) -> Vec<PriceLevel> {
        prices.iter().map(|&p| PriceLevel::new(p, dec!(1))).collect()
    }

    fn ctx_with(order: Option<OpenOrder>) -> SessionContext {
        let mut ctx = SessionContext::new(TraderConfig::default());
        ctx.book = OrderBookView::new(
            levels(&[dec!(100), dec!(98), dec!(98), dec!(95)]),
            levels(&[dec!(101), dec!(103), dec!(104)]),
        );
        ctx.follower.observe(order);
        ctx
    }

    fn buy_at(price: Decimal) -> OpenOrder {
        OpenOrder {
            id: "7".into(),
            side: Side::Buy,
            price,
            amount: dec!(1),
        }
    }

    fn price_of(command: &OrderCommand) -> Decimal {
        match command {
            OrderCommand::Place { price, .. } | OrderCommand::Replace { price, .. } => *price,
            OrderCommand::Cancel { .. } => panic!("no price on cancel"),
        }
    }

    #[test]
    fn test_reprice_up_jumps_ahead_of_better_row() {
        let mut ctx = ctx_with(Some(buy_at(dec!(98))));
        let command = reprice(&mut ctx, true).unwrap().unwrap();
        assert_eq!(price_of(&command), dec!(101));
    }

    #[test]
    fn test_reprice_down_skips_rows_at_own_price() {
        let mut ctx = ctx_with(Some(buy_at(dec!(98))));
        let command = reprice(&mut ctx, false).unwrap().unwrap();
        assert_eq!(price_of(&command), dec!(94));
        assert_eq!(ctx.follower.order().unwrap().price, dec!(94));
    }

    #[test]
    fn test_reprice_sell_moves_the_other_way() {
        let sell = OpenOrder {
            side: Side::Sell,
            ..buy_at(dec!(103))
        };
        let mut ctx = ctx_with(Some(sell));
        assert_eq!(price_of(&reprice(&mut ctx, true).unwrap().unwrap()), dec!(100));
    }

    #[test]
    fn test_reprice_at_edge_is_rejected() {
        let mut ctx = ctx_with(Some(buy_at(dec!(100))));
        assert!(matches!(reprice(&mut ctx, true), Err(EngineError::Logic(_))));
        assert_eq!(ctx.follower.order().unwrap().price, dec!(100));
    }

    #[test]
    fn test_reprice_without_order_shifts_lock() {
        let mut ctx = ctx_with(None);
        assert_eq!(ctx.lock.depth, 5);
        assert!(reprice(&mut ctx, true).unwrap().is_none());
        assert_eq!(ctx.lock.depth, 3);
        reprice(&mut ctx, false).unwrap();
        reprice(&mut ctx, false).unwrap();
        assert_eq!(ctx.lock.depth, 7);
    }

    #[test]
    fn test_cancel_or_unlock() {
        let mut ctx = ctx_with(Some(buy_at(dec!(95))));
        assert!(cancel_or_unlock(&mut ctx).unwrap().is_none());
        assert!(!ctx.lock.is_enabled());
        let command = cancel_or_unlock(&mut ctx).unwrap().unwrap();
        assert_eq!(command, OrderCommand::Cancel { order_id: "7".into() });
    }

    #[test]
    fn test_skip_command_uses_navigator() {
        let mut ctx = ctx_with(Some(buy_at(dec!(98))));
        let command = skip_command(&mut ctx, 2).unwrap();
        assert_eq!(price_of(&command), dec!(95));
        assert!(skip_command(&mut ctx, 5).is_err());
    }

    #[test]
    fn test_enter_price_validates_against_top_of_book() {
        let mut ctx = ctx_with(Some(buy_at(dec!(95))));
        assert!(enter_price(&mut ctx, dec!(100.5), None).is_err());
        assert_eq!(price_of(&enter_price(&mut ctx, dec!(99), None).unwrap()), dec!(99));

        let sell = OpenOrder {
            side: Side::Sell,
            ..buy_at(dec!(104))
        };
        let mut ctx = ctx_with(Some(sell));
        assert!(enter_price(&mut ctx, dec!(100), None).is_err());
        assert!(enter_price(&mut ctx, dec!(101), None).is_ok());
    }

    #[test]
    fn test_new_order_side_from_balance() {
        let config = TraderConfig::default();
        let sell = new_order_command(
            &config,
            Balance {
                base: dec!(0.5),
                quote: dec!(20),
            },
            dec!(100),
        )
        .unwrap();
        assert_eq!(
            sell,
            OrderCommand::Place {
                side: Side::Sell,
                price: dec!(100),
                amount: dec!(0.5)
            }
        );

        let buy = new_order_command(
            &config,
            Balance {
                base: dec!(0),
                quote: dec!(1000),
            },
            dec!(100),
        )
        .unwrap();
        assert_eq!(
            buy,
            OrderCommand::Place {
                side: Side::Buy,
                price: dec!(100),
                amount: dec!(9.974)
            }
        );

        assert!(new_order_command(&config, Balance::default(), dec!(100)).is_err());
    }
}
