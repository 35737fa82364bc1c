//! Paper trading command
//!
//! Runs the engine against the in-memory paper exchange with a
//! deterministic sawtooth price path: the price grinds down for most of a
//! cycle (triggering the initial entry and DCA buys) then snaps back up
//! (crossing the resting sell). One simulated refresh interval elapses per
//! tick so the evaluation gate is exercised exactly once per loop.

use anyhow::Result;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use tracing::{info, warn};

use scalp_dca::{Config, PaperExchange, ScalpDcaEngine};

pub fn run(config_path: String, ticks: u64, tick_secs: u64) -> Result<()> {
    let config = if Path::new(&config_path).exists() {
        Config::from_file(&config_path)?
    } else {
        warn!(path = %config_path, "Config file not found - using defaults");
        Config::default()
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_session(config, ticks, tick_secs))
}

async fn run_session(config: Config, ticks: u64, tick_secs: u64) -> Result<()> {
    let pair = config.pair.clone();
    let start_price = dec!(10);

    let mut exchange = PaperExchange::new();
    exchange.set_price(&pair, start_price);

    // Fund enough quote for a full ladder of entries plus slack.
    let funding =
        config.order_amount * start_price * Decimal::from(config.max_positions as u64 + 1) * dec!(2);
    exchange.deposit(pair.quote(), funding);
    info!(quote = %funding, asset = pair.quote(), "Paper account funded");

    let mut engine = ScalpDcaEngine::new(config.clone());

    let mut price = start_price;
    let mut now = Utc::now();
    let step = Duration::seconds(config.order_refresh_secs as i64);

    for tick in 0..ticks {
        price = next_price(price, tick);
        exchange.set_price(&pair, price);

        // Limit orders cross against the new price before the engine looks.
        exchange.match_orders(now);
        for fill in exchange.take_fills() {
            engine.on_fill(&fill);
        }

        engine.on_tick(now, &mut exchange);

        // Market orders fill inside the tick.
        for fill in exchange.take_fills() {
            engine.on_fill(&fill);
        }

        now += step;
        if tick_secs > 0 {
            tokio::time::sleep(std::time::Duration::from_secs(tick_secs)).await;
        }
    }

    let quote = exchange.balance(pair.quote());
    let base = exchange.balance(pair.base());
    let equity = quote + base * price;
    info!(
        ticks,
        final_price = %price,
        quote_balance = %quote,
        base_balance = %base,
        equity = %equity,
        pnl = %(equity - funding),
        orders = exchange.order_count(),
        fills = exchange.fill_count(),
        open_positions = engine.positions().len(),
        "Paper session complete"
    );
    Ok(())
}

/// Deterministic sawtooth: eight down-ticks of 0.3%, four up-ticks of 1.5%
fn next_price(current: Decimal, tick: u64) -> Decimal {
    if tick % 12 < 8 {
        current * dec!(0.997)
    } else {
        current * dec!(1.015)
    }
}
