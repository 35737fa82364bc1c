//! Paper exchange
//!
//! In-memory implementation of the market connector and order executor
//! seams. Market orders fill immediately at the current price; limit
//! orders rest until a price update crosses them. Balances, trade history,
//! and fill notifications behave like a tiny spot exchange so the engine
//! can run full sessions without connectivity.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::connector::MarketConnector;
use crate::executor::OrderExecutor;
use crate::types::{
    next_order_id, ActiveOrder, FillEvent, OrderCandidate, OrderId, OrderType, Side, TradeRecord,
    TradingPair,
};

#[derive(Debug, Default)]
pub struct PaperExchange {
    prices: HashMap<TradingPair, Decimal>,
    balances: HashMap<String, Decimal>,
    trade_history: Vec<TradeRecord>,
    active: Vec<ActiveOrder>,
    pending_fills: Vec<FillEvent>,
    orders_placed: usize,
    fills_recorded: usize,
    /// Fee charged on each fill's notional, quote side
    fee_rate: Decimal,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Update the mid price for a pair
    pub fn set_price(&mut self, pair: &TradingPair, price: Decimal) {
        self.prices.insert(pair.clone(), price);
    }

    /// Credit an asset balance
    pub fn deposit(&mut self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_default() += amount;
    }

    /// Total balance of an asset, including amounts locked in orders
    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or_default()
    }

    /// Fill notifications accumulated since the last drain
    pub fn take_fills(&mut self) -> Vec<FillEvent> {
        std::mem::take(&mut self.pending_fills)
    }

    /// Total orders placed over the session
    pub fn order_count(&self) -> usize {
        self.orders_placed
    }

    /// Total fills recorded over the session
    pub fn fill_count(&self) -> usize {
        self.fills_recorded
    }

    /// Amount of an asset locked by resting orders
    fn locked(&self, asset: &str) -> Decimal {
        self.active
            .iter()
            .map(|o| match o.side {
                Side::Buy if o.pair.quote() == asset => o.price * o.amount,
                Side::Sell if o.pair.base() == asset => o.amount,
                _ => Decimal::ZERO,
            })
            .sum()
    }

    /// Cross resting limit orders against the current price.
    /// Call after every price update; fills execute at the limit price.
    pub fn match_orders(&mut self, now: DateTime<Utc>) {
        let mut crossed = Vec::new();
        let prices = &self.prices;
        self.active.retain(|order| {
            let price = match prices.get(&order.pair) {
                Some(p) => *p,
                None => return true,
            };
            let fills = match order.side {
                Side::Buy => price <= order.price,
                Side::Sell => price >= order.price,
            };
            if fills {
                crossed.push(order.clone());
            }
            !fills
        });

        for order in crossed {
            self.settle(
                &order.pair,
                order.side,
                order.order_type,
                order.price,
                order.amount,
                order.id,
                now,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn settle(
        &mut self,
        pair: &TradingPair,
        side: Side,
        order_type: OrderType,
        price: Decimal,
        amount: Decimal,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) {
        let notional = price * amount;
        let fee = notional * self.fee_rate;
        match side {
            Side::Buy => {
                *self.balances.entry(pair.quote().to_string()).or_default() -= notional + fee;
                *self.balances.entry(pair.base().to_string()).or_default() += amount;
            }
            Side::Sell => {
                *self.balances.entry(pair.base().to_string()).or_default() -= amount;
                *self.balances.entry(pair.quote().to_string()).or_default() += notional - fee;
            }
        }
        self.trade_history.push(TradeRecord {
            pair: pair.clone(),
            side,
            price,
            amount,
            timestamp: now,
        });
        self.pending_fills.push(FillEvent {
            order_id,
            pair: pair.clone(),
            side,
            order_type,
            price,
            amount,
            timestamp: now,
        });
        self.fills_recorded += 1;
        debug!(order_id, %side, %price, %amount, "Paper fill settled");
    }
}

impl MarketConnector for PaperExchange {
    fn mid_price(&self, pair: &TradingPair) -> Result<Decimal> {
        self.prices
            .get(pair)
            .copied()
            .ok_or_else(|| anyhow!("No price for {pair}"))
    }

    fn available_balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self.balance(asset) - self.locked(asset))
    }

    fn trades(&self, pair: &TradingPair) -> Result<Vec<TradeRecord>> {
        Ok(self
            .trade_history
            .iter()
            .filter(|t| &t.pair == pair)
            .cloned()
            .collect())
    }
}

impl OrderExecutor for PaperExchange {
    fn active_orders(&self, pair: &TradingPair) -> Vec<ActiveOrder> {
        self.active
            .iter()
            .filter(|o| &o.pair == pair)
            .cloned()
            .collect()
    }

    fn adjust_to_budget(&self, candidates: Vec<OrderCandidate>) -> Vec<OrderCandidate> {
        let mut spent: HashMap<String, Decimal> = HashMap::new();
        candidates
            .into_iter()
            .filter(|candidate| {
                let (asset, needed) = match candidate.side {
                    Side::Buy => (
                        candidate.pair.quote(),
                        candidate.notional() * (Decimal::ONE + self.fee_rate),
                    ),
                    Side::Sell => (candidate.pair.base(), candidate.amount),
                };
                let available = self.available_balance(asset).unwrap_or_default()
                    - spent.get(asset).copied().unwrap_or_default();
                if available >= needed {
                    *spent.entry(asset.to_string()).or_default() += needed;
                    true
                } else {
                    debug!(
                        side = %candidate.side,
                        %needed,
                        %available,
                        "Candidate dropped by budget checker"
                    );
                    false
                }
            })
            .collect()
    }

    fn place(&mut self, candidate: OrderCandidate) -> Result<OrderId> {
        let id = next_order_id();
        self.orders_placed += 1;
        match candidate.order_type {
            OrderType::Market => {
                let price = self.mid_price(&candidate.pair)?;
                self.settle(
                    &candidate.pair,
                    candidate.side,
                    OrderType::Market,
                    price,
                    candidate.amount,
                    id,
                    Utc::now(),
                );
            }
            OrderType::Limit => {
                self.active.push(ActiveOrder {
                    id,
                    pair: candidate.pair,
                    side: candidate.side,
                    order_type: OrderType::Limit,
                    price: candidate.price,
                    amount: candidate.amount,
                });
            }
        }
        Ok(id)
    }

    fn cancel(&mut self, pair: &TradingPair, order_id: OrderId) -> Result<()> {
        let before = self.active.len();
        self.active
            .retain(|o| !(o.id == order_id && &o.pair == pair));
        if self.active.len() == before {
            bail!("Unknown order id {order_id} for {pair}");
        }
        Ok(())
    }
}
