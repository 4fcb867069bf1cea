//! Pricing formulas for leveraged futures.
//!
//! All functions are pure. Fees are applied on both legs: the entry costs
//! `open·(1+fee)` and the exit returns `close·(1−fee)` for a long (the fee
//! sides swap for a short). Returns are scaled by leverage.
//!
//! Bounds are parameterized by a signed target ratio, never by direction.
//! Picking which bound is the take-profit and which is the stop is done by
//! the direction dispatch in [`triggers`].

use serde::{Deserialize, Serialize};

use crate::domain::Side;

/// Leveraged return of a round trip, for both directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnRatio {
    pub long_ratio: f64,
    pub short_ratio: f64,
}

impl ReturnRatio {
    /// The ratio matching the position's side.
    pub fn for_side(&self, side: Side) -> f64 {
        match side {
            Side::Long => self.long_ratio,
            Side::Short => self.short_ratio,
        }
    }
}

/// Close prices that realize a target ratio above and below an open price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloseBounds {
    pub upper_bound: f64,
    pub lower_bound: f64,
}

/// Take-profit and stop-loss trigger levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerPrices {
    pub trigger_win: f64,
    pub trigger_lose: f64,
}

/// Order prices submitted once a trigger fires.
///
/// With no slippage only one price is meaningful and it comes back as
/// `Single`. Callers must handle both shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderPrices {
    Single(f64),
    Pair { close_win: f64, close_lose: f64 },
}

/// Leveraged return ratio of opening at `open` and closing at `close`.
///
/// ```
/// use tpsl_core::pricing::return_ratio;
///
/// let r = return_ratio(100.0, 110.0, 0.0, 10.0);
/// assert!((r.long_ratio - 1.0).abs() < 1e-12);
/// assert!((r.short_ratio + 1.0).abs() < 1e-12);
/// ```
pub fn return_ratio(open: f64, close: f64, fee: f64, leverage: f64) -> ReturnRatio {
    let long_ratio = leverage * ((close * (1.0 - fee)) / (open * (1.0 + fee)) - 1.0);
    let short_ratio = leverage * (1.0 - (close * (1.0 + fee)) / (open * (1.0 - fee)));
    ReturnRatio {
        long_ratio,
        short_ratio,
    }
}

/// Inverse of [`return_ratio`]: the close prices that realize `ratio`.
///
/// `upper_bound` is the long take-profit / short stop-loss level for a
/// positive ratio, `lower_bound` the long stop-loss / short take-profit level.
pub fn close_bounds(open: f64, ratio: f64, fee: f64, leverage: f64) -> CloseBounds {
    let upper_bound = (ratio / leverage + 1.0) * (open * (1.0 + fee)) / (1.0 - fee);
    let lower_bound = (1.0 - ratio / leverage) * (open * (1.0 - fee)) / (1.0 + fee);
    CloseBounds {
        upper_bound,
        lower_bound,
    }
}

/// Trigger levels for a long: win above, lose below.
pub fn long_triggers(
    open: f64,
    win_ratio: f64,
    lose_ratio: f64,
    fee: f64,
    leverage: f64,
) -> TriggerPrices {
    TriggerPrices {
        trigger_win: close_bounds(open, win_ratio, fee, leverage).upper_bound,
        trigger_lose: close_bounds(open, lose_ratio, fee, leverage).lower_bound,
    }
}

/// Trigger levels for a short: win below, lose above.
pub fn short_triggers(
    open: f64,
    win_ratio: f64,
    lose_ratio: f64,
    fee: f64,
    leverage: f64,
) -> TriggerPrices {
    TriggerPrices {
        trigger_win: close_bounds(open, win_ratio, fee, leverage).lower_bound,
        trigger_lose: close_bounds(open, lose_ratio, fee, leverage).upper_bound,
    }
}

/// Direction dispatch over [`long_triggers`] / [`short_triggers`].
pub fn triggers(
    side: Side,
    open: f64,
    win_ratio: f64,
    lose_ratio: f64,
    fee: f64,
    leverage: f64,
) -> TriggerPrices {
    match side {
        Side::Long => long_triggers(open, win_ratio, lose_ratio, fee, leverage),
        Side::Short => short_triggers(open, win_ratio, lose_ratio, fee, leverage),
    }
}

/// Order price for a single trigger leg.
///
/// Both exits of a long sell into the market, so the price is discounted;
/// both exits of a short buy, so it is inflated.
pub fn order_price(trigger: f64, slippage: f64, side: Side) -> f64 {
    match side {
        Side::Long => trigger * (1.0 - slippage),
        Side::Short => trigger * (1.0 + slippage),
    }
}

/// Order prices for both legs of a take-profit / stop-loss pair.
///
/// ```
/// use tpsl_core::domain::Side;
/// use tpsl_core::pricing::{order_price_on_close, OrderPrices};
///
/// assert_eq!(order_price_on_close(110.0, 90.0, None, Side::Long), OrderPrices::Single(110.0));
/// ```
pub fn order_price_on_close(
    trigger_win: f64,
    trigger_lose: f64,
    slippage: Option<f64>,
    side: Side,
) -> OrderPrices {
    match slippage {
        Some(slippage) if slippage != 0.0 => OrderPrices::Pair {
            close_win: order_price(trigger_win, slippage, side),
            close_lose: order_price(trigger_lose, slippage, side),
        },
        _ => OrderPrices::Single(trigger_win),
    }
}

/// Truncate `value` toward zero to a multiple of `step`.
///
/// Not floor and not round: `quantize(-1.2345, 0.01)` is `-1.23`.
pub fn quantize(value: f64, step: f64) -> f64 {
    (value / step).trunc() * step
}

/// Express a ratio in percent, truncated toward zero to a multiple of `step`.
pub fn quantize_percent(value: f64, step: f64) -> f64 {
    (value / step * 100.0).trunc() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: f64 = 6.320;
    const LEVERAGE: f64 = 20.0;
    const FEE: f64 = 0.0003;
    const STEP: f64 = 0.001;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    #[test]
    fn test_return_ratio_no_fee() {
        let r = return_ratio(100.0, 101.0, 0.0, 20.0);
        assert_close(r.long_ratio, 0.2, 1e-12);
        assert_close(r.short_ratio, -0.2, 1e-12);
    }

    #[test]
    fn test_return_ratio_flat_price_loses_fees() {
        let r = return_ratio(OPEN, OPEN, FEE, LEVERAGE);
        assert!(r.long_ratio < 0.0);
        assert!(r.short_ratio < 0.0);
    }

    #[test]
    fn test_return_ratio_mirror_under_side_swap() {
        // Swapping direction and fee side maps one formula onto the other.
        let r = return_ratio(OPEN, 6.45, FEE, LEVERAGE);
        let mirrored = return_ratio(OPEN, 6.45, -FEE, LEVERAGE);
        let long_as_short = LEVERAGE * (1.0 - 6.45 * (1.0 - FEE) / (OPEN * (1.0 + FEE)));
        assert_close(-r.long_ratio, long_as_short, 1e-12);
        assert_close(mirrored.short_ratio, long_as_short, 1e-12);
    }

    #[test]
    fn test_close_bounds_invert_return_ratio() {
        for ratio in [0.01, 0.03, 0.1, 0.5] {
            let b = close_bounds(OPEN, ratio, FEE, LEVERAGE);
            let up = return_ratio(OPEN, b.upper_bound, FEE, LEVERAGE);
            let down = return_ratio(OPEN, b.lower_bound, FEE, LEVERAGE);
            assert_close(up.long_ratio, ratio, 1e-9);
            assert_close(down.short_ratio, ratio, 1e-9);
        }
    }

    #[test]
    fn test_long_triggers_straddle_open() {
        let t = long_triggers(OPEN, 0.1, 0.03, FEE, LEVERAGE);
        assert!(t.trigger_lose < OPEN && OPEN < t.trigger_win);
    }

    #[test]
    fn test_short_triggers_straddle_open() {
        let t = short_triggers(OPEN, 0.1, 0.03, FEE, LEVERAGE);
        assert!(t.trigger_win < OPEN && OPEN < t.trigger_lose);
    }

    #[test]
    fn test_triggers_dispatch() {
        assert_eq!(
            triggers(Side::Long, OPEN, 0.1, 0.03, FEE, LEVERAGE),
            long_triggers(OPEN, 0.1, 0.03, FEE, LEVERAGE)
        );
        assert_eq!(
            triggers(Side::Short, OPEN, 0.1, 0.03, FEE, LEVERAGE),
            short_triggers(OPEN, 0.1, 0.03, FEE, LEVERAGE)
        );
    }

    #[test]
    fn test_long_scenario_prices() {
        let t = long_triggers(OPEN, 0.1, 0.03, FEE, LEVERAGE);
        let OrderPrices::Pair { close_win, close_lose } =
            order_price_on_close(t.trigger_win, t.trigger_lose, Some(0.0005), Side::Long)
        else {
            panic!("expected a price pair");
        };
        assert_close(quantize(t.trigger_win, STEP), 6.355, STEP);
        assert_close(quantize(close_win, STEP), 6.352, STEP);
        assert_close(quantize(t.trigger_lose, STEP), 6.306, STEP);
        assert_close(quantize(close_lose, STEP), 6.303, STEP);
    }

    #[test]
    fn test_short_scenario_prices() {
        let t = short_triggers(OPEN, 0.1, 0.03, FEE, LEVERAGE);
        let OrderPrices::Pair { close_win, close_lose } =
            order_price_on_close(t.trigger_win, t.trigger_lose, Some(0.0005), Side::Short)
        else {
            panic!("expected a price pair");
        };
        assert_close(quantize(t.trigger_win, STEP), 6.284, STEP);
        assert_close(quantize(close_win, STEP), 6.287, STEP);
        assert_close(quantize(t.trigger_lose, STEP), 6.333, STEP);
        assert_close(quantize(close_lose, STEP), 6.336, STEP);
    }

    #[test]
    fn test_order_price_on_close_degenerate_slippage() {
        assert_eq!(
            order_price_on_close(6.4, 6.2, Some(0.0), Side::Short),
            OrderPrices::Single(6.4)
        );
        assert_eq!(
            order_price_on_close(6.4, 6.2, None, Side::Long),
            OrderPrices::Single(6.4)
        );
    }

    #[test]
    fn test_order_price_direction() {
        assert!(order_price(100.0, 0.001, Side::Long) < 100.0);
        assert!(order_price(100.0, 0.001, Side::Short) > 100.0);
    }

    #[test]
    fn test_quantize_truncates_toward_zero() {
        assert_close(quantize(6.3559, STEP), 6.355, 1e-12);
        assert_close(quantize(-1.2345, 0.01), -1.23, 1e-12);
        assert_close(quantize(0.0, STEP), 0.0, 0.0);
    }

    #[test]
    fn test_quantize_percent() {
        // 0.05 → 5%
        assert_close(quantize_percent(0.05123, 0.01), 5.12, 1e-9);
        assert_close(quantize_percent(-0.05129, 0.01), -5.12, 1e-9);
    }

    #[test]
    fn test_quantize_non_finite_propagates() {
        assert!(quantize(f64::NAN, STEP).is_nan());
        assert!(quantize(f64::INFINITY, STEP).is_infinite());
    }
}
