//! Exchange collaborator traits and the paper-trading gateway

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::models::Ticker;
use crate::archive::{ArchiveSource, ArchiveStatus};
use crate::engine::{OrderCommand, RawOrderBook, SubmitAck};
use crate::error::EngineResult;
use crate::types::{Balance, OpenOrder, Side, TradeRecord};

/// Public market data for the traded pair
#[allow(async_fn_in_trait)]
pub trait MarketData {
    async fn order_book(&self) -> EngineResult<RawOrderBook>;
    async fn ticker(&self) -> EngineResult<Ticker>;
    async fn last_price(&self) -> EngineResult<Decimal>;
}

/// Private account state
#[allow(async_fn_in_trait)]
pub trait AccountData {
    async fn open_orders(&self) -> EngineResult<Vec<OpenOrder>>;
    async fn balance(&self) -> EngineResult<Balance>;
}

/// Executes order command descriptors
#[allow(async_fn_in_trait)]
pub trait OrderGateway {
    async fn submit(&self, command: &OrderCommand) -> EngineResult<SubmitAck>;
}

/// Paper account used in simulation mode
///
/// Keeps one resting order and a balance in memory. Orders only fill when
/// [`SimulatedGateway::fill_resting`] is called.
#[derive(Debug)]
pub struct SimulatedGateway {
    order: RefCell<Option<OpenOrder>>,
    balance: RefCell<Balance>,
    fee_rate: Decimal,
}

impl SimulatedGateway {
    pub fn new(balance: Balance, fee_rate: Decimal) -> Self {
        Self {
            order: RefCell::new(None),
            balance: RefCell::new(balance),
            fee_rate,
        }
    }

    pub fn resting(&self) -> Option<OpenOrder> {
        self.order.borrow().clone()
    }

    /// Execute the resting order in full against the paper balance
    pub fn fill_resting(&self) -> Option<OpenOrder> {
        let order = self.order.borrow_mut().take()?;
        let mut balance = self.balance.borrow_mut();
        let fee = order.cost() * self.fee_rate;
        match order.side {
            Side::Buy => {
                balance.quote -= order.cost() + fee;
                balance.base += order.amount;
            }
            Side::Sell => {
                balance.base -= order.amount;
                balance.quote += order.cost() - fee;
            }
        }
        info!("[SIM] filled {} {} @ {}", order.side, order.amount, order.price);
        Some(order)
    }
}

impl AccountData for SimulatedGateway {
    async fn open_orders(&self) -> EngineResult<Vec<OpenOrder>> {
        Ok(self.order.borrow().iter().cloned().collect())
    }

    async fn balance(&self) -> EngineResult<Balance> {
        Ok(*self.balance.borrow())
    }
}

impl OrderGateway for SimulatedGateway {
    async fn submit(&self, command: &OrderCommand) -> EngineResult<SubmitAck> {
        info!("[SIM] {}", command);
        let mut resting = self.order.borrow_mut();
        let ack = match command {
            OrderCommand::Place { side, price, amount } => {
                if resting.is_some() {
                    return Ok(SubmitAck::Rejected("an order is already resting".into()));
                }
                let order = OpenOrder {
                    id: Uuid::new_v4().to_string(),
                    side: *side,
                    price: *price,
                    amount: *amount,
                };
                *resting = Some(order.clone());
                SubmitAck::Accepted(Some(order))
            }
            OrderCommand::Replace {
                order_id,
                side,
                price,
                amount,
            } => match resting.as_ref() {
                Some(current) if current.id == *order_id => {
                    let order = OpenOrder {
                        id: Uuid::new_v4().to_string(),
                        side: *side,
                        price: *price,
                        amount: *amount,
                    };
                    *resting = Some(order.clone());
                    SubmitAck::Accepted(Some(order))
                }
                _ => SubmitAck::Rejected(format!("order #{} not found", order_id)),
            },
            OrderCommand::Cancel { order_id } => match resting.as_ref() {
                Some(current) if current.id == *order_id => {
                    *resting = None;
                    SubmitAck::Accepted(None)
                }
                _ => SubmitAck::Rejected(format!("order #{} not found", order_id)),
            },
        };
        Ok(ack)
    }
}

impl ArchiveSource for SimulatedGateway {
    async fn fetch_archive(
        &self,
        _status: ArchiveStatus,
        _since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<TradeRecord>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gateway() -> SimulatedGateway {
        SimulatedGateway::new(
            Balance {
                base: dec!(0),
                quote: dec!(1000),
            },
            dec!(0.0026),
        )
    }

    #[tokio::test]
    async fn test_place_replace_cancel() {
        let sim = gateway();
        let place = OrderCommand::Place {
            side: Side::Buy,
            price: dec!(100),
            amount: dec!(2),
        };
        let SubmitAck::Accepted(Some(placed)) = sim.submit(&place).await.unwrap() else {
            panic!("place rejected");
        };
        assert_eq!(sim.open_orders().await.unwrap(), vec![placed.clone()]);
        assert!(matches!(sim.submit(&place).await.unwrap(), SubmitAck::Rejected(_)));

        let replace = OrderCommand::Replace {
            order_id: placed.id.clone(),
            side: Side::Buy,
            price: dec!(98),
            amount: dec!(2.04),
        };
        let SubmitAck::Accepted(Some(moved)) = sim.submit(&replace).await.unwrap() else {
            panic!("replace rejected");
        };
        assert_ne!(moved.id, placed.id);
        assert_eq!(sim.resting().unwrap().price, dec!(98));

        let stale = OrderCommand::Cancel { order_id: placed.id };
        assert!(matches!(sim.submit(&stale).await.unwrap(), SubmitAck::Rejected(_)));
        let cancel = OrderCommand::Cancel { order_id: moved.id };
        assert_eq!(sim.submit(&cancel).await.unwrap(), SubmitAck::Accepted(None));
        assert!(sim.open_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fill_moves_balance() {
        let sim = gateway();
        sim.submit(&OrderCommand::Place {
            side: Side::Buy,
            price: dec!(100),
            amount: dec!(2),
        })
        .await
        .unwrap();

        sim.fill_resting().unwrap();
        let balance = sim.balance().await.unwrap();
        assert_eq!(balance.base, dec!(2));
        assert_eq!(balance.quote, dec!(1000) - dec!(200) - dec!(0.52));
        assert!(sim.fill_resting().is_none());
    }
}
