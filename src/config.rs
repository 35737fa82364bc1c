//! Configuration management
//!
//! Loads the engine configuration from a JSON file. The config is immutable
//! for the lifetime of a run; every component receives it by value.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::TradingPair;

/// Where buy orders are priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuyStyle {
    /// Take the current price immediately (market order)
    #[default]
    Market,

    /// Rest a limit order below the reference price: `entry_offset` under
    /// the mid for the first entry, `dca_step` under the highest existing
    /// entry for averaging buys
    SteppedLimit,
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("order_amount ({0}) must be positive")]
    NonPositiveOrderAmount(Decimal),

    #[error("max_positions must be at least 1")]
    ZeroMaxPositions,

    #[error("min_profitability ({0}) must not be negative")]
    NegativeProfitability(Decimal),

    #[error("fees must not be negative: maker={maker}, taker={taker}")]
    NegativeFee { maker: Decimal, taker: Decimal },

    #[error("dca_step ({0}) must be positive")]
    NonPositiveDcaStep(Decimal),

    #[error("entry_offset ({0}) must not be negative")]
    NegativeEntryOffset(Decimal),
}

/// Engine configuration
///
/// Defaults match a small-account ATOM-USD scalping setup: 15 ATOM lots,
/// 0.2% profit target on top of maker+taker fees, up to 5 averaged entries
/// spaced 0.2% apart, re-evaluated every 15 seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Trading pair the engine manages, e.g. "ATOM-USD"
    pub pair: TradingPair,

    /// Order size denominated in the base asset (default: 15)
    pub order_amount: Decimal,

    /// Minimum profitability target over cost basis, 1.0 = 100% (default: 0.002)
    pub min_profitability: Decimal,

    /// Maker fee charged on resting orders (default: 0.0006)
    pub maker_fee: Decimal,

    /// Taker fee charged on immediate executions (default: 0.0120)
    pub taker_fee: Decimal,

    /// Maximum number of open positions (default: 5)
    pub max_positions: usize,

    /// Required price drop below the highest entry before averaging in,
    /// 1.0 = 100% (default: 0.002)
    pub dca_step: Decimal,

    /// Offset below mid for the first stepped-limit entry (default: 0.001)
    pub entry_offset: Decimal,

    /// Buy order placement style (default: market)
    #[serde(default)]
    pub buy_style: BuyStyle,

    /// Restrict cost basis and sell sizing to whole multiples of
    /// order_amount (default: true)
    pub lot_accounting: bool,

    /// Seconds between proposal evaluations (default: 15)
    pub order_refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pair: TradingPair::new("ATOM-USD").expect("static pair is valid"),
            order_amount: dec!(15),
            min_profitability: dec!(0.002),
            maker_fee: dec!(0.0006),
            taker_fee: dec!(0.0120),
            max_positions: 5,
            dca_step: dec!(0.002),
            entry_offset: dec!(0.001),
            buy_style: BuyStyle::Market,
            lot_accounting: true,
            order_refresh_secs: 15,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order_amount <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveOrderAmount(self.order_amount));
        }
        if self.max_positions == 0 {
            return Err(ConfigError::ZeroMaxPositions);
        }
        if self.min_profitability < Decimal::ZERO {
            return Err(ConfigError::NegativeProfitability(self.min_profitability));
        }
        if self.maker_fee < Decimal::ZERO || self.taker_fee < Decimal::ZERO {
            return Err(ConfigError::NegativeFee {
                maker: self.maker_fee,
                taker: self.taker_fee,
            });
        }
        if self.dca_step <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveDcaStep(self.dca_step));
        }
        if self.entry_offset < Decimal::ZERO {
            return Err(ConfigError::NegativeEntryOffset(self.entry_offset));
        }
        Ok(())
    }

    /// Total round-trip fee rate applied on top of the profit target
    pub fn total_fees(&self) -> Decimal {
        self.maker_fee + self.taker_fee
    }

    /// Multiplier applied to cost basis when pricing a sell
    pub fn sell_multiplier(&self) -> Decimal {
        Decimal::ONE + self.min_profitability + self.total_fees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sell_multiplier_includes_fees() {
        let config = Config {
            min_profitability: dec!(0.005),
            maker_fee: dec!(0.0006),
            taker_fee: dec!(0.0120),
            ..Config::default()
        };
        assert_eq!(config.sell_multiplier(), dec!(1.0176));
    }

    #[test]
    fn test_rejects_zero_order_amount() {
        let config = Config {
            order_amount: Decimal::ZERO,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveOrderAmount(_))
        ));
    }

    #[test]
    fn test_rejects_zero_max_positions() {
        let config = Config {
            max_positions: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroMaxPositions)
        ));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.order_amount, config.order_amount);
        assert_eq!(parsed.buy_style, config.buy_style);
        assert_eq!(parsed.pair, config.pair);
    }
}
