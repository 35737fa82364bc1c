//! Position & Proposal Engine
//!
//! The decision core of the scalping-with-DCA strategy. Each evaluation
//! cycle it looks at the current mid price, available balances, and the
//! position book, then emits order candidates:
//!
//! 1. Open positions with a computable cost basis produce exactly one sell
//!    at `cost_basis * (1 + min_profitability + fees)`. Sells preempt buys.
//! 2. Otherwise, with capacity and quote balance to spare, it proposes the
//!    initial entry, or an averaging buy once price has dropped `dca_step`
//!    below the highest existing entry.
//!
//! Nothing here is fatal: a missing price, an absent cost basis, or an
//! underfunded balance skips the proposal and surfaces as a tracing event.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::config::{BuyStyle, Config};
use crate::connector::{MarketConnector, MarketSnapshot};
use crate::executor::OrderExecutor;
use crate::positions::{cost_basis_from_trades, Position, PositionBook};
use crate::types::{FillEvent, OrderCandidate, OrderType, Side, TradeRecord};

/// Balance differences below this are treated as dust, not position changes
const DUST_EPSILON: Decimal = dec!(0.00000001);

pub struct ScalpDcaEngine {
    config: Config,
    positions: PositionBook,
    next_eval_at: Option<DateTime<Utc>>,
}

impl ScalpDcaEngine {
    pub fn new(config: Config) -> Self {
        let positions = PositionBook::new(config.max_positions);
        info!(
            pair = %config.pair,
            order_amount = %config.order_amount,
            min_profitability = %config.min_profitability,
            max_positions = config.max_positions,
            dca_step = %config.dca_step,
            buy_style = ?config.buy_style,
            "Engine initialized"
        );
        Self {
            config,
            positions,
            next_eval_at: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    /// Cost basis of current holdings.
    ///
    /// With lot accounting the book is restricted to complete units and
    /// falls back to reconstructing from trade history when the book
    /// itself yields nothing; `target_units` bounds how much history the
    /// fallback consumes. Without lot accounting it is the plain
    /// volume-weighted average.
    pub fn cost_basis(&self, trades: &[TradeRecord], target_units: Decimal) -> Option<Decimal> {
        if !self.config.lot_accounting {
            return self.positions.weighted_average();
        }
        // Below one complete unit there is nothing sellable and no basis;
        // the trade-history fallback only applies to fragmented books.
        if target_units < Decimal::ONE {
            return None;
        }
        self.positions
            .lot_cost_basis(self.config.order_amount)
            .or_else(|| cost_basis_from_trades(trades, self.config.order_amount, target_units))
    }

    /// One full evaluation cycle, gated by the refresh interval.
    ///
    /// The host calls this from its clock callback; fills and ticks are
    /// expected to be serialized by the caller.
    pub fn on_tick<H>(&mut self, now: DateTime<Utc>, host: &mut H)
    where
        H: MarketConnector + OrderExecutor,
    {
        if let Some(next) = self.next_eval_at {
            if now < next {
                return;
            }
        }
        debug!(pair = %self.config.pair, "Evaluation cycle started");

        // Active sells sit until filled; nothing else happens this cycle.
        let active = host.active_orders(&self.config.pair);
        let active_sells: Vec<_> = active.iter().filter(|o| !o.is_buy()).collect();
        if !active_sells.is_empty() {
            for order in &active_sells {
                info!(
                    order_id = order.id,
                    price = %order.price,
                    amount = %order.amount,
                    "Active sell order - letting it sit"
                );
            }
            self.schedule_next(now);
            return;
        }

        // Only buys can be stale at this point; sells were gated above.
        // Cancel before taking the snapshot so the quote they locked is
        // available to this cycle's balance gate.
        for order in active.iter().filter(|o| o.is_buy()) {
            match host.cancel(&self.config.pair, order.id) {
                Ok(()) => debug!(order_id = order.id, "Cancelled stale buy order"),
                Err(e) => warn!(order_id = order.id, error = %e, "Buy cancellation failed"),
            }
        }

        let snapshot = match host.snapshot(&self.config.pair) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Market snapshot unavailable - skipping cycle");
                self.schedule_next(now);
                return;
            }
        };

        self.reconcile_from_balance(&snapshot);

        let proposal = self.create_proposal(&snapshot);
        debug!(candidates = proposal.len(), "Proposal created");

        let adjusted = host.adjust_to_budget(proposal);
        for candidate in adjusted {
            let (side, price, amount) = (candidate.side, candidate.price, candidate.amount);
            match host.place(candidate) {
                Ok(order_id) => {
                    info!(order_id, %side, %price, %amount, "Order placed")
                }
                Err(e) => warn!(%side, %price, %amount, error = %e, "Order placement failed"),
            }
        }

        self.schedule_next(now);
        debug!(pair = %self.config.pair, "Evaluation cycle completed");
    }

    /// Build this cycle's order candidates from a market snapshot.
    pub fn create_proposal(&self, snapshot: &MarketSnapshot) -> Vec<OrderCandidate> {
        let mut proposal = Vec::new();
        let mid = snapshot.mid_price;
        debug!(mid_price = %mid, "Current market price");

        // First priority: exit existing positions at a profitable level.
        if !self.positions.is_empty() {
            let target_units = self.positions.complete_units(self.config.order_amount);
            if let Some(basis) = self.cost_basis(&snapshot.trades, target_units) {
                let sell_price = basis * self.config.sell_multiplier();
                let sellable = if self.config.lot_accounting {
                    self.positions.sellable_amount(self.config.order_amount)
                } else {
                    self.positions.total_amount()
                };
                if sellable > Decimal::ZERO {
                    info!(
                        cost_basis = %basis,
                        sell_price = %sell_price,
                        amount = %sellable,
                        "Proposing sell"
                    );
                    proposal.push(OrderCandidate::limit_sell(
                        self.config.pair.clone(),
                        sell_price,
                        sellable,
                    ));
                }
                // Sell-side priority is absolute: no buys while an exit
                // is warranted.
                return proposal;
            }
            debug!(
                held = %self.positions.total_amount(),
                "Holdings below one complete unit - continuing to average"
            );
        }

        // Second priority: open or extend the position ladder.
        if self.positions.len() >= self.config.max_positions {
            debug!(
                positions = self.positions.len(),
                "Position capacity reached - no buys"
            );
            return proposal;
        }

        let required_quote = self.config.order_amount * mid;
        if snapshot.quote_balance < required_quote {
            debug!(
                quote_balance = %snapshot.quote_balance,
                required = %required_quote,
                "Insufficient quote balance - skipping buy"
            );
            return proposal;
        }

        if self.positions.is_empty() {
            let candidate = self.initial_buy(mid);
            info!(price = %candidate.price, amount = %candidate.amount, "Proposing initial buy");
            proposal.push(candidate);
            return proposal;
        }

        // Averaging buy: only when price has stepped far enough below the
        // highest existing entry.
        if let Some(highest) = self.positions.highest_entry() {
            let drop = (highest - mid) / highest;
            if drop >= self.config.dca_step {
                let candidate = self.dca_buy(mid, highest);
                info!(
                    drop_pct = %(drop * dec!(100)),
                    price = %candidate.price,
                    amount = %candidate.amount,
                    "Proposing DCA buy"
                );
                proposal.push(candidate);
            } else {
                debug!(
                    drop_pct = %(drop * dec!(100)),
                    needed_pct = %(self.config.dca_step * dec!(100)),
                    "Price drop insufficient for DCA"
                );
            }
        }

        proposal
    }

    fn initial_buy(&self, mid: Decimal) -> OrderCandidate {
        match self.config.buy_style {
            BuyStyle::Market => {
                OrderCandidate::market_buy(self.config.pair.clone(), mid, self.config.order_amount)
            }
            BuyStyle::SteppedLimit => OrderCandidate::limit_buy(
                self.config.pair.clone(),
                mid * (Decimal::ONE - self.config.entry_offset),
                self.config.order_amount,
            ),
        }
    }

    fn dca_buy(&self, mid: Decimal, highest_entry: Decimal) -> OrderCandidate {
        match self.config.buy_style {
            BuyStyle::Market => {
                OrderCandidate::market_buy(self.config.pair.clone(), mid, self.config.order_amount)
            }
            BuyStyle::SteppedLimit => OrderCandidate::limit_buy(
                self.config.pair.clone(),
                highest_entry * (Decimal::ONE - self.config.dca_step),
                self.config.order_amount,
            ),
        }
    }

    /// Align the position book with the connector's base-asset balance.
    ///
    /// Fills can land outside our own bookkeeping (manual trades, dust
    /// sweeps, restarts), so the balance is authoritative: zero usable
    /// balance clears the book, and a material difference consolidates it
    /// into a single position at the best-known cost basis.
    pub fn reconcile_from_balance(&mut self, snapshot: &MarketSnapshot) {
        let (usable, units) = if self.config.lot_accounting {
            let units = (snapshot.base_balance / self.config.order_amount).floor();
            (units * self.config.order_amount, units)
        } else {
            (snapshot.base_balance, Decimal::ONE)
        };

        if usable.is_zero() {
            if !self.positions.is_empty() {
                info!("No usable base balance - clearing positions");
                self.positions.clear();
            }
            return;
        }

        let tracked = self.positions.total_amount();
        if (usable - tracked).abs() > DUST_EPSILON {
            let basis = self
                .cost_basis(&snapshot.trades, units)
                .unwrap_or(snapshot.mid_price);
            self.positions.consolidate(Position::new(basis, usable));
            info!(
                amount = %usable,
                cost_basis = %basis,
                "Consolidated position from balance"
            );
            let remainder = snapshot.base_balance - usable;
            if remainder > Decimal::ZERO {
                debug!(remainder = %remainder, "Sub-unit balance left untracked");
            }
        }
    }

    /// Apply a fill notification from the host.
    ///
    /// Buy fills append to the book with the entry price adjusted for the
    /// fee actually paid; sell fills are a full exit and clear the book.
    pub fn on_fill(&mut self, event: &FillEvent) {
        match event.side {
            Side::Buy => {
                let fee = match event.order_type {
                    OrderType::Market => self.config.taker_fee,
                    OrderType::Limit => self.config.maker_fee,
                };
                let entry_price = event.price * (Decimal::ONE + fee);
                let evicted = self
                    .positions
                    .push(Position::new(entry_price, event.amount));
                info!(
                    fill_price = %event.price,
                    entry_price = %entry_price,
                    amount = %event.amount,
                    positions = self.positions.len(),
                    "Buy filled - position added"
                );
                if let Some(old) = evicted {
                    warn!(
                        entry_price = %old.entry_price,
                        amount = %old.amount,
                        "Position capacity exceeded - oldest entry evicted"
                    );
                }
            }
            Side::Sell => {
                info!(
                    fill_price = %event.price,
                    amount = %event.amount,
                    cleared = self.positions.len(),
                    "Sell filled - full exit, clearing positions"
                );
                self.positions.clear();
            }
        }
    }

    fn schedule_next(&mut self, now: DateTime<Utc>) {
        let next = now + Duration::seconds(self.config.order_refresh_secs as i64);
        self.next_eval_at = Some(next);
        debug!(next_eval = %next, "Next evaluation scheduled");
    }
}
