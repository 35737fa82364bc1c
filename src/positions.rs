//! Position tracking and cost-basis accounting
//!
//! Open positions live in a fixed-capacity ring buffer: appending beyond
//! capacity evicts the oldest entry. Cost basis is the volume-weighted
//! average entry price, optionally restricted to whole multiples of the
//! configured order size ("complete units") so that sells never leave a
//! sub-lot remainder behind.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Side, TradeRecord};

/// A single open position: entry price and base-asset amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub entry_price: Decimal,
    pub amount: Decimal,
}

impl Position {
    pub fn new(entry_price: Decimal, amount: Decimal) -> Self {
        Self {
            entry_price,
            amount,
        }
    }

    /// Quote-asset value at entry
    pub fn entry_value(&self) -> Decimal {
        self.entry_price * self.amount
    }
}

/// Fixed-capacity ring buffer of open positions
///
/// Slots are stored in a Vec that grows up to `capacity`; once full, `push`
/// overwrites the slot at `head` (the oldest entry) and advances the index.
/// Iteration is always presented oldest-first regardless of the physical
/// layout.
#[derive(Debug, Clone)]
pub struct PositionBook {
    slots: Vec<Position>,
    capacity: usize,
    // Index of the oldest entry once the buffer has wrapped.
    head: usize,
}

impl PositionBook {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "position book capacity must be positive");
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append a position, evicting the oldest when at capacity.
    /// Returns the evicted position, if any.
    pub fn push(&mut self, position: Position) -> Option<Position> {
        if self.slots.len() < self.capacity {
            self.slots.push(position);
            None
        } else {
            let evicted = std::mem::replace(&mut self.slots[self.head], position);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    /// Drop all positions (full exit)
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    /// Replace the whole book with a single consolidated position
    pub fn consolidate(&mut self, position: Position) {
        self.clear();
        self.slots.push(position);
    }

    /// Iterate oldest-first
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        let (wrapped, ordered) = self.slots.split_at(self.head);
        ordered.iter().chain(wrapped.iter())
    }

    /// Iterate newest-first
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &Position> {
        let (wrapped, ordered) = self.slots.split_at(self.head);
        wrapped.iter().rev().chain(ordered.iter().rev())
    }

    /// Total base-asset amount across all positions
    pub fn total_amount(&self) -> Decimal {
        self.slots.iter().map(|p| p.amount).sum()
    }

    /// Highest entry price among open positions
    pub fn highest_entry(&self) -> Option<Decimal> {
        self.slots.iter().map(|p| p.entry_price).max()
    }

    /// Lowest entry price among open positions
    pub fn lowest_entry(&self) -> Option<Decimal> {
        self.slots.iter().map(|p| p.entry_price).min()
    }

    /// Volume-weighted average entry price over all open positions.
    /// None when the book is empty.
    pub fn weighted_average(&self) -> Option<Decimal> {
        let total = self.total_amount();
        if total.is_zero() {
            return None;
        }
        let value: Decimal = self.slots.iter().map(|p| p.entry_value()).sum();
        Some(value / total)
    }

    /// Number of complete units held, given the configured order size
    pub fn complete_units(&self, order_amount: Decimal) -> Decimal {
        if order_amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.total_amount() / order_amount).floor()
    }

    /// Amount sellable as whole units of `order_amount`
    pub fn sellable_amount(&self, order_amount: Decimal) -> Decimal {
        self.complete_units(order_amount) * order_amount
    }

    /// Cost basis restricted to complete units of `order_amount`.
    ///
    /// Walks positions newest-first, taking whole-unit amounts from each
    /// until the unit budget is exhausted. None when the book holds less
    /// than one complete unit, or when every individual position is a
    /// sub-unit fragment (the caller falls back to trade history).
    pub fn lot_cost_basis(&self, order_amount: Decimal) -> Option<Decimal> {
        let mut remaining_units = self.complete_units(order_amount);
        if remaining_units.is_zero() {
            return None;
        }

        let mut considered_amount = Decimal::ZERO;
        let mut considered_value = Decimal::ZERO;

        for position in self.iter_newest_first() {
            if remaining_units <= Decimal::ZERO {
                break;
            }
            let position_units = (position.amount / order_amount).floor();
            let units_to_take = position_units.min(remaining_units);
            if units_to_take > Decimal::ZERO {
                let amount_to_take = units_to_take * order_amount;
                considered_amount += amount_to_take;
                considered_value += amount_to_take * position.entry_price;
                remaining_units -= units_to_take;
            }
        }

        if considered_amount > Decimal::ZERO {
            Some(considered_value / considered_amount)
        } else {
            None
        }
    }
}

/// Cost basis reconstructed from trade history, complete units only.
///
/// Walks buy trades newest-first, counting only the portions of each fill
/// that complete a whole unit of `order_amount`, and stops once
/// `target_units` worth of amount is covered. None when less than one
/// complete unit of buy history exists.
pub fn cost_basis_from_trades(
    trades: &[TradeRecord],
    order_amount: Decimal,
    target_units: Decimal,
) -> Option<Decimal> {
    if order_amount <= Decimal::ZERO || target_units <= Decimal::ZERO {
        return None;
    }

    let mut buy_value = Decimal::ZERO;
    let mut buy_amount = Decimal::ZERO;
    let target_amount = target_units * order_amount;

    for trade in trades.iter().rev() {
        if trade.side != Side::Buy {
            continue;
        }
        let current_total = buy_amount + trade.amount;
        let current_units = (current_total / order_amount).floor();
        let previous_units = (buy_amount / order_amount).floor();

        if current_units > previous_units {
            // Only the slice of this fill that completes a unit counts.
            let usable = (current_units * order_amount - buy_amount).min(trade.amount);
            buy_amount += usable;
            buy_value += usable * trade.price;

            if buy_amount >= target_amount {
                break;
            }
        }
    }

    if buy_amount >= order_amount {
        Some(buy_value / buy_amount)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradingPair;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn buy_trade(price: Decimal, amount: Decimal) -> TradeRecord {
        TradeRecord {
            pair: TradingPair::new("ATOM-USD").unwrap(),
            side: Side::Buy,
            price,
            amount,
            timestamp: Utc::now(),
        }
    }

    fn sell_trade(price: Decimal, amount: Decimal) -> TradeRecord {
        TradeRecord {
            side: Side::Sell,
            ..buy_trade(price, amount)
        }
    }

    #[test]
    fn test_weighted_average_matches_formula() {
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(10), dec!(5)));
        book.push(Position::new(dec!(12), dec!(5)));
        // (10*5 + 12*5) / 10 = 11
        assert_eq!(book.weighted_average(), Some(dec!(11)));
    }

    #[test]
    fn test_weighted_average_empty_book() {
        let book = PositionBook::new(5);
        assert_eq!(book.weighted_average(), None);
    }

    #[test]
    fn test_weighted_average_uneven_amounts() {
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(100), dec!(1)));
        book.push(Position::new(dec!(200), dec!(3)));
        // (100 + 600) / 4 = 175
        assert_eq!(book.weighted_average(), Some(dec!(175)));
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut book = PositionBook::new(3);
        assert!(book.push(Position::new(dec!(1), dec!(1))).is_none());
        assert!(book.push(Position::new(dec!(2), dec!(1))).is_none());
        assert!(book.push(Position::new(dec!(3), dec!(1))).is_none());

        let evicted = book.push(Position::new(dec!(4), dec!(1)));
        assert_eq!(evicted, Some(Position::new(dec!(1), dec!(1))));
        assert_eq!(book.len(), 3);

        let entries: Vec<Decimal> = book.iter().map(|p| p.entry_price).collect();
        assert_eq!(entries, vec![dec!(2), dec!(3), dec!(4)]);
    }

    #[test]
    fn test_ring_buffer_never_exceeds_capacity() {
        let mut book = PositionBook::new(5);
        for i in 1..=20 {
            book.push(Position::new(Decimal::from(i), dec!(1)));
        }
        assert_eq!(book.len(), 5);
        let entries: Vec<Decimal> = book.iter().map(|p| p.entry_price).collect();
        assert_eq!(
            entries,
            vec![dec!(16), dec!(17), dec!(18), dec!(19), dec!(20)]
        );
    }

    #[test]
    fn test_newest_first_iteration_after_wrap() {
        let mut book = PositionBook::new(3);
        for i in 1..=5 {
            book.push(Position::new(Decimal::from(i), dec!(1)));
        }
        let entries: Vec<Decimal> = book.iter_newest_first().map(|p| p.entry_price).collect();
        assert_eq!(entries, vec![dec!(5), dec!(4), dec!(3)]);
    }

    #[test]
    fn test_highest_and_lowest_entry() {
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(10.5), dec!(1)));
        book.push(Position::new(dec!(9.8), dec!(1)));
        book.push(Position::new(dec!(11.2), dec!(1)));
        assert_eq!(book.highest_entry(), Some(dec!(11.2)));
        assert_eq!(book.lowest_entry(), Some(dec!(9.8)));
    }

    #[test]
    fn test_clear_empties_book() {
        let mut book = PositionBook::new(3);
        book.push(Position::new(dec!(10), dec!(5)));
        book.clear();
        assert!(book.is_empty());
        assert_eq!(book.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_sellable_amount_whole_units_only() {
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(10), dec!(15)));
        book.push(Position::new(dec!(11), dec!(22)));
        // 37 total, order size 15 -> 2 units = 30
        assert_eq!(book.sellable_amount(dec!(15)), dec!(30));
    }

    #[test]
    fn test_lot_cost_basis_walks_newest_first() {
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(10), dec!(15)));
        book.push(Position::new(dec!(12), dec!(15)));
        book.push(Position::new(dec!(14), dec!(15)));
        // 3 complete units; all positions are exactly one unit each,
        // so everything is counted: (10+12+14)/3 = 12
        assert_eq!(book.lot_cost_basis(dec!(15)), Some(dec!(12)));
    }

    #[test]
    fn test_lot_cost_basis_skips_fragments() {
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(10), dec!(30)));
        book.push(Position::new(dec!(20), dec!(7)));
        // 37 total -> 2 units, but the newest position is a fragment and
        // contributes nothing; both units come from the older 30 @ 10.
        assert_eq!(book.lot_cost_basis(dec!(15)), Some(dec!(10)));
    }

    #[test]
    fn test_lot_cost_basis_below_one_unit() {
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(10), dec!(7)));
        assert_eq!(book.lot_cost_basis(dec!(15)), None);
    }

    #[test]
    fn test_lot_cost_basis_all_fragments() {
        // Total covers a unit but every slot is a sub-unit fragment:
        // the walk finds nothing and the caller must use trade history.
        let mut book = PositionBook::new(5);
        book.push(Position::new(dec!(10), dec!(8)));
        book.push(Position::new(dec!(11), dec!(8)));
        assert_eq!(book.lot_cost_basis(dec!(15)), None);
    }

    #[test]
    fn test_trade_fallback_basic() {
        let trades = vec![buy_trade(dec!(10), dec!(15)), buy_trade(dec!(12), dec!(15))];
        let basis = cost_basis_from_trades(&trades, dec!(15), dec!(2));
        assert_eq!(basis, Some(dec!(11)));
    }

    #[test]
    fn test_trade_fallback_ignores_sells() {
        let trades = vec![
            buy_trade(dec!(10), dec!(15)),
            sell_trade(dec!(50), dec!(15)),
            buy_trade(dec!(12), dec!(15)),
        ];
        let basis = cost_basis_from_trades(&trades, dec!(15), dec!(2));
        assert_eq!(basis, Some(dec!(11)));
    }

    #[test]
    fn test_trade_fallback_stops_at_target_units() {
        let trades = vec![
            buy_trade(dec!(8), dec!(15)),
            buy_trade(dec!(10), dec!(15)),
            buy_trade(dec!(12), dec!(15)),
        ];
        // Only one unit wanted: newest-first walk takes the 12 fill only.
        let basis = cost_basis_from_trades(&trades, dec!(15), dec!(1));
        assert_eq!(basis, Some(dec!(12)));
    }

    #[test]
    fn test_trade_fallback_insufficient_history() {
        let trades = vec![buy_trade(dec!(10), dec!(7))];
        assert_eq!(cost_basis_from_trades(&trades, dec!(15), dec!(1)), None);
    }

    #[test]
    fn test_trade_fallback_counts_whole_unit_slice_of_oversized_fill() {
        // Newest fill is a sub-unit fragment and is skipped; the older
        // 20-amount fill crosses a unit boundary and contributes exactly
        // one unit's worth (15 of 20).
        let trades = vec![buy_trade(dec!(10), dec!(20)), buy_trade(dec!(12), dec!(10))];
        let basis = cost_basis_from_trades(&trades, dec!(15), dec!(1));
        assert_eq!(basis, Some(dec!(10)));
    }

    #[test]
    fn test_trade_fallback_fragments_never_accumulate() {
        // Two sub-unit fills sum past a unit but neither crosses a
        // boundary on its own, so no basis is reconstructable.
        let trades = vec![buy_trade(dec!(10), dec!(8)), buy_trade(dec!(12), dec!(8))];
        assert_eq!(cost_basis_from_trades(&trades, dec!(15), dec!(1)), None);
    }
}
