//! Config check command

use anyhow::Result;
use tracing::info;

use scalp_dca::Config;

pub fn run(config_path: String) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    info!(
        pair = %config.pair,
        order_amount = %config.order_amount,
        min_profitability = %config.min_profitability,
        maker_fee = %config.maker_fee,
        taker_fee = %config.taker_fee,
        sell_multiplier = %config.sell_multiplier(),
        max_positions = config.max_positions,
        dca_step = %config.dca_step,
        buy_style = ?config.buy_style,
        lot_accounting = config.lot_accounting,
        order_refresh_secs = config.order_refresh_secs,
        "Config is valid"
    );
    Ok(())
}
