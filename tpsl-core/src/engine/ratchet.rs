//! Trailing stop ratchet with hysteresis
//!
//! **Core Rule:** the stop may tighten, never loosen.
//!
//! A stop only advances once the market has travelled past the ratchet
//! price (the opposite-side bound recorded at the last advance). Without
//! that threshold every small favorable tick would re-quote the stop.

use serde::{Deserialize, Serialize};

use crate::domain::Side;
use crate::pricing::{quantize, CloseBounds};

/// Stop and hysteresis levels for one position.
///
/// Zero in either level means "not anchored yet".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopRatchet {
    side: Side,
    stop_price: f64,
    ratchet_price: f64,
}

impl StopRatchet {
    /// Create an unanchored ratchet
    pub fn new(side: Side) -> Self {
        Self {
            side,
            stop_price: 0.0,
            ratchet_price: 0.0,
        }
    }

    /// Create a ratchet at known levels (restoring a snapshot)
    pub fn with_levels(side: Side, stop_price: f64, ratchet_price: f64) -> Self {
        Self {
            side,
            stop_price,
            ratchet_price,
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.stop_price != 0.0 && self.ratchet_price != 0.0
    }

    /// Offer the bounds computed around `mark`.
    ///
    /// Returns true if the stop moved to a different level. The first call
    /// on an unanchored ratchet always anchors it. Both levels stay put
    /// when the quantized proposal is no tighter than the current stop.
    ///
    /// # Example
    /// ```
    /// use tpsl_core::domain::Side;
    /// use tpsl_core::engine::StopRatchet;
    /// use tpsl_core::pricing::CloseBounds;
    ///
    /// let mut ratchet = StopRatchet::new(Side::Long);
    /// let anchor = CloseBounds { upper_bound: 105.0, lower_bound: 95.0 };
    /// assert!(ratchet.apply(&anchor, 100.0, 0.25));
    ///
    /// // Price has not crossed 105 yet: the stop stays at 95
    /// let higher = CloseBounds { upper_bound: 109.0, lower_bound: 99.0 };
    /// assert!(!ratchet.apply(&higher, 104.0, 0.25));
    /// assert_eq!(ratchet.stop_price(), 95.0);
    /// ```
    pub fn apply(&mut self, bounds: &CloseBounds, mark: f64, step: f64) -> bool {
        let (stop_bound, ratchet_bound) = match self.side {
            Side::Long => (bounds.lower_bound, bounds.upper_bound),
            Side::Short => (bounds.upper_bound, bounds.lower_bound),
        };

        let advance = !self.is_anchored()
            || match self.side {
                Side::Long => stop_bound > self.stop_price && mark > self.ratchet_price,
                Side::Short => stop_bound < self.stop_price && mark < self.ratchet_price,
            };

        if !advance {
            return false;
        }

        let proposed = quantize(stop_bound, step);
        if self.is_anchored() {
            // A sub-step improvement truncates back to the current stop
            let tighter = match self.side {
                Side::Long => proposed > self.stop_price,
                Side::Short => proposed < self.stop_price,
            };
            if !tighter {
                return false;
            }
        }
        self.stop_price = proposed;
        self.ratchet_price = quantize(ratchet_bound, step);
        true
    }

    /// Whether `mark` has reached the stop
    pub fn is_hit(&self, mark: f64) -> bool {
        match self.side {
            Side::Long => mark <= self.stop_price,
            Side::Short => mark >= self.stop_price,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn stop_price(&self) -> f64 {
        self.stop_price
    }

    pub fn ratchet_price(&self) -> f64 {
        self.ratchet_price
    }

    /// Drop both levels so the next tick re-anchors
    pub fn clear(&mut self) {
        self.stop_price = 0.0;
        self.ratchet_price = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(lower: f64, upper: f64) -> CloseBounds {
        CloseBounds {
            upper_bound: upper,
            lower_bound: lower,
        }
    }

    #[test]
    fn test_first_apply_anchors() {
        let mut ratchet = StopRatchet::new(Side::Long);
        assert!(!ratchet.is_anchored());
        assert!(ratchet.apply(&bounds(95.0, 105.0), 100.0, 0.25));
        assert!(ratchet.is_anchored());
        assert_eq!(ratchet.stop_price(), 95.0);
        assert_eq!(ratchet.ratchet_price(), 105.0);
    }

    #[test]
    fn test_long_tightening_past_ratchet() {
        let mut ratchet = StopRatchet::with_levels(Side::Long, 95.0, 105.0);
        assert!(ratchet.apply(&bounds(101.0, 111.0), 106.0, 0.25));
        assert_eq!(ratchet.stop_price(), 101.0);
        assert_eq!(ratchet.ratchet_price(), 111.0);
    }

    #[test]
    fn test_long_loosening_blocked() {
        let mut ratchet = StopRatchet::with_levels(Side::Long, 95.0, 105.0);
        // Price past the ratchet but the proposed stop is lower
        assert!(!ratchet.apply(&bounds(90.0, 110.0), 106.0, 0.25));
        assert_eq!(ratchet.stop_price(), 95.0);
    }

    #[test]
    fn test_short_tightening_past_ratchet() {
        let mut ratchet = StopRatchet::with_levels(Side::Short, 105.0, 95.0);
        assert!(ratchet.apply(&bounds(89.0, 99.0), 94.0, 0.25));
        assert_eq!(ratchet.stop_price(), 99.0);
        assert_eq!(ratchet.ratchet_price(), 89.0);
    }

    #[test]
    fn test_short_loosening_blocked() {
        let mut ratchet = StopRatchet::with_levels(Side::Short, 105.0, 95.0);
        assert!(!ratchet.apply(&bounds(99.0, 110.0), 94.0, 0.25));
        assert_eq!(ratchet.stop_price(), 105.0);
    }

    #[test]
    fn test_short_hysteresis_blocks_small_move() {
        let mut ratchet = StopRatchet::with_levels(Side::Short, 105.0, 95.0);
        // Tighter stop proposed but price still above the ratchet
        assert!(!ratchet.apply(&bounds(92.0, 102.0), 97.0, 0.25));
        assert_eq!(ratchet.stop_price(), 105.0);
    }

    #[test]
    fn test_long_sub_step_improvement_is_not_a_move() {
        let mut ratchet = StopRatchet::with_levels(Side::Long, 95.0, 105.0);
        // 95.1 truncates to 95.0 on a 0.25 grid
        assert!(!ratchet.apply(&bounds(95.1, 110.0), 106.0, 0.25));
        assert_eq!(ratchet.stop_price(), 95.0);
        assert_eq!(ratchet.ratchet_price(), 105.0);
    }

    #[test]
    fn test_short_sub_step_improvement_rounds_tighter() {
        let mut ratchet = StopRatchet::with_levels(Side::Short, 105.0, 95.0);
        // Truncation lowers a short stop, so any improvement lands a full step down
        assert!(ratchet.apply(&bounds(89.0, 104.9), 94.0, 0.25));
        assert_eq!(ratchet.stop_price(), 104.75);
        assert_eq!(ratchet.ratchet_price(), 89.0);
    }

    #[test]
    fn test_is_hit() {
        let long = StopRatchet::with_levels(Side::Long, 95.0, 105.0);
        assert!(long.is_hit(95.0));
        assert!(!long.is_hit(95.01));

        let short = StopRatchet::with_levels(Side::Short, 105.0, 95.0);
        assert!(short.is_hit(105.0));
        assert!(!short.is_hit(104.99));
    }

    #[test]
    fn test_clear_reanchors() {
        let mut ratchet = StopRatchet::with_levels(Side::Long, 95.0, 105.0);
        ratchet.clear();
        assert!(!ratchet.is_anchored());
        assert!(ratchet.apply(&bounds(80.0, 90.0), 85.0, 0.25));
        assert_eq!(ratchet.stop_price(), 80.0);
    }

    #[test]
    fn test_levels_are_quantized() {
        let mut ratchet = StopRatchet::new(Side::Long);
        ratchet.apply(&bounds(6.38657, 6.41345), 6.4, 0.001);
        assert!((ratchet.stop_price() - 6.386).abs() < 1e-9);
        assert!((ratchet.ratchet_price() - 6.413).abs() < 1e-9);
    }
}
