//! Fixed take-profit / stop-loss engine
//!
//! Both trigger levels are derived from the cost basis, so they are
//! recomputed on every fill and stay put while the market moves.

use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::config::{ContractParams, FixedTriggerConfig};
use crate::domain::{Position, Side};
use crate::engine::events::{FillOutcome, TriggerEvent};
use crate::engine::SnapshotError;
use crate::pricing::{self, quantize, quantize_percent, OrderPrices};

/// Trigger and order prices of the current position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedTriggerState {
    pub trigger_win_price: f64,
    pub trigger_lose_price: f64,
    pub close_win_price: f64,
    pub close_lose_price: f64,
    /// Last unrealized leveraged return (fraction)
    pub pnl_ratio: f64,
}

/// Flat persistence record of a [`FixedTrigger`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedTriggerSnapshot {
    pub side: Side,
    pub leverage: f64,
    pub fee_rate: f64,
    pub win_ratio: f64,
    pub lose_ratio: f64,
    pub slippage: f64,
    pub quant_step: f64,
    pub hold_price: f64,
    pub hold_qty: f64,
    pub mark_price: f64,
    pub trigger_win_price: f64,
    pub trigger_lose_price: f64,
    pub close_win_price: f64,
    pub close_lose_price: f64,
    pub pnl_ratio: f64,
}

#[derive(Debug, Clone)]
pub struct FixedTrigger {
    config: FixedTriggerConfig,
    position: Position,
    state: FixedTriggerState,
    span: Span,
}

impl FixedTrigger {
    /// Create a flat engine
    pub fn new(config: FixedTriggerConfig) -> Self {
        Self {
            config,
            position: Position::default(),
            state: FixedTriggerState::default(),
            span: Span::none(),
        }
    }

    /// Attach the span that every log record of this engine is emitted in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &FixedTriggerConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn state(&self) -> &FixedTriggerState {
        &self.state
    }

    pub fn side(&self) -> Side {
        self.config.contract.side
    }

    /// Open or add to the position.
    ///
    /// A negative `qty` is a reduction of `-qty`; zero is rejected.
    pub fn add_quantity(&mut self, qty: f64, price: f64) -> FillOutcome {
        if qty < 0.0 {
            return self.reduce_quantity(-qty, price);
        }
        if !self.position.add(qty, price) {
            return FillOutcome::rejected(self.position.hold_qty);
        }
        self.on_position_change("add", qty, price)
    }

    /// Reduce the position after a confirmed fill.
    ///
    /// Rejected with no state change when `qty <= 0` or `qty > hold_qty`.
    pub fn reduce_quantity(&mut self, qty: f64, price: f64) -> FillOutcome {
        if !self.position.reduce(qty, price) {
            let _enter = self.span.enter();
            tracing::debug!(qty, hold_qty = self.position.hold_qty, "reduce rejected");
            return FillOutcome::rejected(self.position.hold_qty);
        }
        self.on_position_change("reduce", qty, price)
    }

    /// Replace quantity and cost basis with exchange-confirmed values.
    pub fn sync_position(&mut self, hold_qty: f64, hold_price: f64) -> FillOutcome {
        self.position.sync(hold_qty, hold_price);
        self.on_position_change("sync", hold_qty, hold_price)
    }

    /// Evaluate a market tick against both triggers.
    ///
    /// Emits a close signal when either trigger is crossed. The position is
    /// left as is: the caller reduces it once the close order has filled.
    pub fn on_price_tick(&mut self, price: f64) -> Vec<TriggerEvent> {
        if self.position.is_flat() {
            return Vec::new();
        }
        self.position.mark_price = price;

        let s = &self.state;
        let hit = match self.side() {
            Side::Long => price <= s.trigger_lose_price || price >= s.trigger_win_price,
            Side::Short => price >= s.trigger_lose_price || price <= s.trigger_win_price,
        };

        let _enter = self.span.enter();
        if hit {
            tracing::info!(
                side = %self.side(),
                mark = price,
                hold_price = self.position.hold_price,
                hold_qty = self.position.hold_qty,
                "trigger hit, closing position"
            );
            return vec![TriggerEvent::closed(
                self.side(),
                self.position.hold_qty,
                self.position.hold_price,
            )];
        }

        let c = &self.config.contract;
        let ratio = pricing::return_ratio(self.position.hold_price, price, c.fee_rate, c.leverage);
        self.state.pnl_ratio = ratio.for_side(c.side);
        tracing::debug!(
            mark = price,
            pnl_pct = quantize_percent(self.state.pnl_ratio, c.quant_step),
            "price changed"
        );
        vec![TriggerEvent::PriceChanged {
            mark_price: price,
            pnl_ratio: self.state.pnl_ratio,
        }]
    }

    /// Flat persistence record.
    pub fn snapshot(&self) -> FixedTriggerSnapshot {
        let c = &self.config.contract;
        FixedTriggerSnapshot {
            side: c.side,
            leverage: c.leverage,
            fee_rate: c.fee_rate,
            win_ratio: self.config.win_ratio,
            lose_ratio: self.config.lose_ratio,
            slippage: c.slippage,
            quant_step: c.quant_step,
            hold_price: self.position.hold_price,
            hold_qty: self.position.hold_qty,
            mark_price: self.position.mark_price,
            trigger_win_price: self.state.trigger_win_price,
            trigger_lose_price: self.state.trigger_lose_price,
            close_win_price: self.state.close_win_price,
            close_lose_price: self.state.close_lose_price,
            pnl_ratio: self.state.pnl_ratio,
        }
    }

    /// Restore an engine exactly as recorded.
    pub fn from_snapshot(snapshot: FixedTriggerSnapshot) -> Self {
        let config = FixedTriggerConfig {
            contract: ContractParams {
                side: snapshot.side,
                leverage: snapshot.leverage,
                fee_rate: snapshot.fee_rate,
                slippage: snapshot.slippage,
                quant_step: snapshot.quant_step,
            },
            win_ratio: snapshot.win_ratio,
            lose_ratio: snapshot.lose_ratio,
        };
        Self {
            config,
            position: Position {
                hold_price: snapshot.hold_price,
                hold_qty: snapshot.hold_qty,
                mark_price: snapshot.mark_price,
            },
            state: FixedTriggerState {
                trigger_win_price: snapshot.trigger_win_price,
                trigger_lose_price: snapshot.trigger_lose_price,
                close_win_price: snapshot.close_win_price,
                close_lose_price: snapshot.close_lose_price,
                pnl_ratio: snapshot.pnl_ratio,
            },
            span: Span::none(),
        }
    }

    /// Encode the flat record as JSON.
    ///
    /// Round trips are exact for finite state. Non-finite prices encode as
    /// `null` and will not load again, so callers must drop NaN or infinite
    /// ticks before they reach the engine.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    fn on_position_change(&mut self, action: &'static str, qty: f64, price: f64) -> FillOutcome {
        self.recompute_triggers();
        let _enter = self.span.enter();
        tracing::info!(
            action,
            qty,
            price,
            hold_qty = self.position.hold_qty,
            hold_price = self.position.hold_price,
            trigger_win = self.state.trigger_win_price,
            trigger_lose = self.state.trigger_lose_price,
            "position changed"
        );
        FillOutcome::applied(self.position.hold_qty, self.position.hold_price)
    }

    /// Recompute all four prices from the cost basis in one go.
    ///
    /// A flat position has a zero cost basis, which zeroes every price.
    fn recompute_triggers(&mut self) {
        let c = &self.config.contract;
        let t = pricing::triggers(
            c.side,
            self.position.hold_price,
            self.config.win_ratio,
            self.config.lose_ratio,
            c.fee_rate,
            c.leverage,
        );
        let (close_win, close_lose) =
            match pricing::order_price_on_close(t.trigger_win, t.trigger_lose, Some(c.slippage), c.side) {
                OrderPrices::Pair {
                    close_win,
                    close_lose,
                } => (close_win, close_lose),
                // No slippage: order prices equal the triggers
                OrderPrices::Single(close_win) => (close_win, t.trigger_lose),
            };

        self.state.trigger_win_price = quantize(t.trigger_win, c.quant_step);
        self.state.trigger_lose_price = quantize(t.trigger_lose, c.quant_step);
        self.state.close_win_price = quantize(close_win, c.quant_step);
        self.state.close_lose_price = quantize(close_lose, c.quant_step);
    }
}
