//! Scalp-DCA
//!
//! A scalping-with-dollar-cost-averaging trading policy: position tracking
//! in a bounded ring buffer, weighted-average cost-basis accounting, and a
//! per-cycle order proposal state machine. Market connectivity and order
//! lifecycle are behind trait seams; a paper exchange implementation is
//! included for simulated sessions and tests.

pub mod config;
pub mod connector;
pub mod engine;
pub mod executor;
pub mod paper;
pub mod positions;
pub mod types;

pub use config::{BuyStyle, Config};
pub use connector::{MarketConnector, MarketSnapshot};
pub use engine::ScalpDcaEngine;
pub use executor::OrderExecutor;
pub use paper::PaperExchange;
pub use positions::{cost_basis_from_trades, Position, PositionBook};
pub use types::*;
