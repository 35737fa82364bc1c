//! Core data types used across the proposal engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Validation errors for trading pair strings
#[derive(Debug, Error)]
pub enum PairParseError {
    #[error("trading pair '{0}' must be of the form BASE-QUOTE")]
    MissingSeparator(String),

    #[error("trading pair '{0}' has an empty base or quote asset")]
    EmptyAsset(String),
}

/// Trading pair like "ATOM-USD" using Arc<str> for cheap cloning
///
/// Pairs are cloned into every order candidate and log event. Arc<str>
/// keeps those clones at O(1) instead of a heap allocation each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    symbol: std::sync::Arc<str>,
    // Byte offset of the '-' separator, validated at construction.
    sep: usize,
}

impl TradingPair {
    pub fn new(s: impl AsRef<str>) -> Result<Self, PairParseError> {
        let s = s.as_ref();
        let sep = s
            .find('-')
            .ok_or_else(|| PairParseError::MissingSeparator(s.to_string()))?;
        if sep == 0 || sep + 1 == s.len() {
            return Err(PairParseError::EmptyAsset(s.to_string()));
        }
        Ok(TradingPair {
            symbol: std::sync::Arc::from(s),
            sep,
        })
    }

    /// Base asset (the side being accumulated), e.g. "ATOM"
    pub fn base(&self) -> &str {
        &self.symbol[..self.sep]
    }

    /// Quote asset (the side being spent), e.g. "USD"
    pub fn quote(&self) -> &str {
        &self.symbol[self.sep + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.symbol
    }
}

impl TryFrom<String> for TradingPair {
    type Error = PairParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TradingPair::new(s)
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.symbol.to_string()
    }
}

impl std::fmt::Display for TradingPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order execution style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Execute immediately at the prevailing price
    Market,

    /// Rest at the given price until filled or cancelled
    Limit,
}

/// Order ID type - u64 for performance
pub type OrderId = u64;

static ORDER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate next order ID (thread-safe, lock-free)
pub fn next_order_id() -> OrderId {
    ORDER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Proposed order emitted by the engine for one evaluation cycle
///
/// Ephemeral: produced by `create_proposal`, passed through budget
/// adjustment, then handed to the executor. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCandidate {
    pub pair: TradingPair,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Decimal,
    pub amount: Decimal,
}

impl OrderCandidate {
    pub fn market_buy(pair: TradingPair, price: Decimal, amount: Decimal) -> Self {
        Self {
            pair,
            side: Side::Buy,
            order_type: OrderType::Market,
            price,
            amount,
        }
    }

    pub fn limit_buy(pair: TradingPair, price: Decimal, amount: Decimal) -> Self {
        Self {
            pair,
            side: Side::Buy,
            order_type: OrderType::Limit,
            price,
            amount,
        }
    }

    pub fn limit_sell(pair: TradingPair, price: Decimal, amount: Decimal) -> Self {
        Self {
            pair,
            side: Side::Sell,
            order_type: OrderType::Limit,
            price,
            amount,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    /// Quote-asset value of the candidate at its proposed price
    pub fn notional(&self) -> Decimal {
        self.price * self.amount
    }
}

/// One executed trade from the connector's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub pair: TradingPair,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Fill notification delivered by the host when an order executes
#[derive(Debug, Clone)]
pub struct FillEvent {
    pub order_id: OrderId,
    pub pair: TradingPair,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Decimal,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// An order resting with the executor
#[derive(Debug, Clone)]
pub struct ActiveOrder {
    pub id: OrderId,
    pub pair: TradingPair,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Decimal,
    pub amount: Decimal,
}

impl ActiveOrder {
    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pair_parsing() {
        let pair = TradingPair::new("ATOM-USD").unwrap();
        assert_eq!(pair.base(), "ATOM");
        assert_eq!(pair.quote(), "USD");
        assert_eq!(pair.as_str(), "ATOM-USD");
    }

    #[test]
    fn test_pair_rejects_malformed() {
        assert!(TradingPair::new("ATOMUSD").is_err());
        assert!(TradingPair::new("-USD").is_err());
        assert!(TradingPair::new("ATOM-").is_err());
    }

    #[test]
    fn test_pair_serde_roundtrip() {
        let pair = TradingPair::new("BTC-USDT").unwrap();
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"BTC-USDT\"");
        let parsed: TradingPair = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, pair);
    }

    #[test]
    fn test_order_id_generation() {
        let id1 = next_order_id();
        let id2 = next_order_id();
        assert!(id2 > id1);
    }

    #[test]
    fn test_candidate_notional() {
        let pair = TradingPair::new("ATOM-USD").unwrap();
        let candidate = OrderCandidate::limit_buy(pair, dec!(10.5), dec!(4));
        assert!(candidate.is_buy());
        assert_eq!(candidate.notional(), dec!(42.0));
    }
}
