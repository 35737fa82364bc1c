//! Order executor / budget checker seam
//!
//! Receives the engine's order candidates, sizes them against available
//! budget, places them, and accepts cancellations by order id. Order
//! lifecycle beyond that (acks, partial fills, retries) is the host's
//! responsibility.

use anyhow::Result;

use crate::types::{ActiveOrder, OrderCandidate, OrderId, TradingPair};

/// Order placement and cancellation supplied by the host
pub trait OrderExecutor {
    /// Orders currently resting with the exchange for the pair
    fn active_orders(&self, pair: &TradingPair) -> Vec<ActiveOrder>;

    /// Adjust candidates to the available budget, all-or-none per
    /// candidate: a candidate that cannot be funded at full size is
    /// dropped, never shrunk.
    fn adjust_to_budget(&self, candidates: Vec<OrderCandidate>) -> Vec<OrderCandidate>;

    /// Submit a candidate; returns the assigned order id
    fn place(&mut self, candidate: OrderCandidate) -> Result<OrderId>;

    /// Cancel a resting order by id
    fn cancel(&mut self, pair: &TradingPair, order_id: OrderId) -> Result<()>;
}
