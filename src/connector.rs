//! Market connector seam
//!
//! The engine never talks to an exchange directly; it consumes price,
//! balance, and trade-history data through this trait. The host framework
//! (or the paper exchange in this crate) provides the implementation.

use anyhow::Result;
use rust_decimal::Decimal;

use crate::types::{TradeRecord, TradingPair};

/// Point-in-time market data consumed by one evaluation cycle
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub mid_price: Decimal,
    /// Available (unlocked) base-asset balance
    pub base_balance: Decimal,
    /// Available (unlocked) quote-asset balance
    pub quote_balance: Decimal,
    /// Own trade history, oldest first
    pub trades: Vec<TradeRecord>,
}

/// Read-only market data supplied by the host
pub trait MarketConnector {
    /// Current mid price for the pair
    fn mid_price(&self, pair: &TradingPair) -> Result<Decimal>;

    /// Available balance for an asset, excluding amounts locked in orders
    fn available_balance(&self, asset: &str) -> Result<Decimal>;

    /// Own trade history for the pair, oldest first
    fn trades(&self, pair: &TradingPair) -> Result<Vec<TradeRecord>>;

    /// Gather everything one evaluation cycle needs in a single snapshot
    fn snapshot(&self, pair: &TradingPair) -> Result<MarketSnapshot> {
        Ok(MarketSnapshot {
            mid_price: self.mid_price(pair)?,
            base_balance: self.available_balance(pair.base())?,
            quote_balance: self.available_balance(pair.quote())?,
            trades: self.trades(pair)?,
        })
    }
}
