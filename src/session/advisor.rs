//! Auto-trade advisor
//!
//! While no order rests, the balance picks the side worth trading. Once that
//! side's tally board has locked a target and the market sits on the
//! favourable half of the range, the advisor proposes a limit order at the
//! target price.

use rust_decimal::Decimal;

use crate::config::TraderConfig;
use crate::engine::{OrderBookView, OrderCommand, TargetPriceEstimator};
use crate::types::{Balance, Side};

/// Side the balance calls for, if any
pub fn intended_side(config: &TraderConfig, balance: &Balance) -> Option<Side> {
    if balance.base > config.base_dust && balance.quote <= config.quote_min {
        Some(Side::Sell)
    } else if balance.base < config.base_dust && balance.quote >= config.quote_min {
        Some(Side::Buy)
    } else {
        None
    }
}

/// Suggested order, when the target is known and the market is past mid
pub fn advise(
    config: &TraderConfig,
    estimator: &TargetPriceEstimator,
    book: &OrderBookView,
    balance: &Balance,
) -> Option<OrderCommand> {
    let side = intended_side(config, balance)?;
    let target = estimator.target_price(side)?;
    let range = estimator.range();

    let favourable = match side {
        // best ask closer to the high than to the low
        Side::Sell => book
            .top_ask()
            .is_some_and(|ask| range.high - ask < ask - range.low),
        Side::Buy => book
            .top_bid()
            .is_some_and(|bid| bid - range.low < range.high - bid),
    };
    if !favourable || target <= Decimal::ZERO {
        return None;
    }

    let amount = match side {
        Side::Sell => balance.base,
        Side::Buy => ((balance.quote - balance.quote * config.fee_rate) / target).round_dp(8),
    };
    Some(OrderCommand::Place {
        side,
        price: target,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceLevel, PriceRange};
    use rust_decimal_macros::dec;

    fn locked_estimator() -> TargetPriceEstimator {
        let mut estimator = TargetPriceEstimator::new(
            PriceRange {
                low: dec!(99),
                high: dec!(103),
            },
            dec!(0.1),
            1,
            1,
        );
        estimator.observe(&book(dec!(100.2), dec!(102.5)));
        estimator
    }

    fn book(bid: Decimal, ask: Decimal) -> OrderBookView {
        OrderBookView::new(
            vec![PriceLevel::new(bid, dec!(1))],
            vec![PriceLevel::new(ask, dec!(1))],
        )
    }

    #[test]
    fn test_intended_side() {
        let config = TraderConfig::default();
        let holding = Balance {
            base: dec!(0.5),
            quote: dec!(10),
        };
        let flat = Balance {
            base: dec!(0),
            quote: dec!(500),
        };
        let mixed = Balance {
            base: dec!(0.5),
            quote: dec!(500),
        };
        assert_eq!(intended_side(&config, &holding), Some(Side::Sell));
        assert_eq!(intended_side(&config, &flat), Some(Side::Buy));
        assert_eq!(intended_side(&config, &mixed), None);
    }

    #[test]
    fn test_sell_suggested_past_mid() {
        let config = TraderConfig::default();
        let estimator = locked_estimator();
        let holding = Balance {
            base: dec!(0.5),
            quote: dec!(10),
        };

        let suggestion = advise(&config, &estimator, &book(dec!(102), dec!(102.4)), &holding);
        assert_eq!(
            suggestion,
            Some(OrderCommand::Place {
                side: Side::Sell,
                price: dec!(102.5),
                amount: dec!(0.5)
            })
        );

        // Ask below mid: wait
        assert!(advise(&config, &estimator, &book(dec!(99.5), dec!(100)), &holding).is_none());
    }

    #[test]
    fn test_buy_needs_locked_target() {
        let config = TraderConfig::default();
        let flat = Balance {
            base: dec!(0),
            quote: dec!(1000),
        };
        let fresh = TargetPriceEstimator::new(
            PriceRange {
                low: dec!(99),
                high: dec!(103),
            },
            dec!(0.1),
            8,
            60,
        );
        let cheap = book(dec!(99.5), dec!(100));
        assert!(advise(&config, &fresh, &cheap, &flat).is_none());

        let Some(OrderCommand::Place { side, price, .. }) =
            advise(&config, &locked_estimator(), &cheap, &flat)
        else {
            panic!("expected a buy suggestion");
        };
        assert_eq!((side, price), (Side::Buy, dec!(100.2)));
    }
}
