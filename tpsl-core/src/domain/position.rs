use serde::{Deserialize, Serialize};

/// Relative tolerance for quantity comparisons.
///
/// Fractional fills such as `0.1 + 0.2` do not sum exactly, so a close of
/// the nominal size must still flatten the position.
pub const QTY_EPSILON: f64 = 1e-9;

/// Held quantity and cost basis of a single position.
///
/// `hold_qty` is never negative; direction lives in the engine config.
/// A flat position carries no cost basis: `hold_qty == 0 ⟺ hold_price == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Weighted-average entry price (0 when flat)
    pub hold_price: f64,
    /// Held size (0 when flat)
    pub hold_qty: f64,
    /// Last observed market price
    pub mark_price: f64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.hold_qty <= 0.0
    }

    /// Add `qty` filled at `price`, averaging the cost basis.
    ///
    /// Returns false (and leaves the position untouched) for `qty <= 0`.
    pub fn add(&mut self, qty: f64, price: f64) -> bool {
        if qty <= 0.0 {
            return false;
        }
        if self.is_flat() {
            self.hold_qty = qty;
            self.hold_price = price;
            return true;
        }
        let total = self.hold_price * self.hold_qty + price * qty;
        self.hold_qty += qty;
        self.hold_price = total / self.hold_qty;
        true
    }

    /// Remove `qty` filled at `price`.
    ///
    /// Rejected when `qty <= 0` or `qty` exceeds `hold_qty` by more than
    /// rounding noise; a rejected call never partially applies. The
    /// remaining quantity carries the remaining weighted cost, and a
    /// remainder within [`QTY_EPSILON`] of the held size closes the
    /// position and zeroes the cost basis.
    pub fn reduce(&mut self, qty: f64, price: f64) -> bool {
        let tolerance = self.hold_qty * QTY_EPSILON;
        if qty <= 0.0 || qty > self.hold_qty + tolerance {
            return false;
        }
        let remaining = self.hold_qty - qty;
        if remaining <= tolerance {
            self.hold_qty = 0.0;
            self.hold_price = 0.0;
            return true;
        }
        let total = self.hold_price * self.hold_qty - price * qty;
        self.hold_qty = remaining;
        self.hold_price = total / remaining;
        true
    }

    /// Overwrite quantity and cost basis from an externally confirmed record.
    ///
    /// A non-positive quantity flattens the position.
    pub fn sync(&mut self, hold_qty: f64, hold_price: f64) {
        if hold_qty > 0.0 {
            self.hold_qty = hold_qty;
            self.hold_price = hold_price;
        } else {
            self.hold_qty = 0.0;
            self.hold_price = 0.0;
        }
    }

    /// Notional value at the last mark.
    pub fn market_value(&self) -> f64 {
        self.hold_qty * self.mark_price
    }
}
