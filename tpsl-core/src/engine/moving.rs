//! Moving (trailing) stop engine
//!
//! One stop, no take-profit. The stop is derived from the current market
//! price on every tick and ratchets only in the holder's favor. Fills move
//! the cost basis but never the stop.

use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::config::{ContractParams, MovingTriggerConfig};
use crate::domain::{Position, Side};
use crate::engine::events::{FillOutcome, TriggerEvent};
use crate::engine::ratchet::StopRatchet;
use crate::engine::SnapshotError;
use crate::pricing::{self, quantize, quantize_percent, CloseBounds};

/// Stop levels of the current position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingTriggerState {
    /// Bounds around the last mark price
    pub upper_bound: f64,
    pub lower_bound: f64,
    /// Price that must be crossed before the stop moves again
    pub ratchet_price: f64,
    /// Active stop trigger
    pub stop_price: f64,
    /// Stop order price after slippage
    pub close_price: f64,
    /// Last unrealized leveraged return (fraction)
    pub pnl_ratio: f64,
}

/// Flat persistence record of a [`MovingTrigger`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingTriggerSnapshot {
    pub side: Side,
    pub leverage: f64,
    pub fee_rate: f64,
    pub stop_ratio: f64,
    pub slippage: f64,
    pub quant_step: f64,
    pub hold_price: f64,
    pub hold_qty: f64,
    pub mark_price: f64,
    pub upper_bound: f64,
    pub lower_bound: f64,
    pub ratchet_price: f64,
    pub stop_price: f64,
    pub close_price: f64,
    pub pnl_ratio: f64,
}

#[derive(Debug, Clone)]
pub struct MovingTrigger {
    config: MovingTriggerConfig,
    position: Position,
    bounds: CloseBounds,
    ratchet: StopRatchet,
    close_price: f64,
    pnl_ratio: f64,
    span: Span,
}

impl MovingTrigger {
    /// Create a flat engine with an unanchored stop
    pub fn new(config: MovingTriggerConfig) -> Self {
        Self {
            config,
            position: Position::default(),
            bounds: zero_bounds(),
            ratchet: StopRatchet::new(config.contract.side),
            close_price: 0.0,
            pnl_ratio: 0.0,
            span: Span::none(),
        }
    }

    /// Attach the span that every log record of this engine is emitted in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &MovingTriggerConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn side(&self) -> Side {
        self.config.contract.side
    }

    pub fn state(&self) -> MovingTriggerState {
        MovingTriggerState {
            upper_bound: self.bounds.upper_bound,
            lower_bound: self.bounds.lower_bound,
            ratchet_price: self.ratchet.ratchet_price(),
            stop_price: self.ratchet.stop_price(),
            close_price: self.close_price,
            pnl_ratio: self.pnl_ratio,
        }
    }

    /// Open or add to the position. The stop is left for the next tick.
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

    /// Ratchet the stop around `price`, then check it.
    ///
    /// Emits `StopMoved` when the stop advanced, followed by either a close
    /// signal or `PriceChanged`.
    pub fn on_price_tick(&mut self, price: f64) -> Vec<TriggerEvent> {
        if self.position.is_flat() {
            return Vec::new();
        }
        self.position.mark_price = price;

        let c = self.config.contract;
        self.bounds = pricing::close_bounds(price, self.config.stop_ratio, c.fee_rate, c.leverage);

        let _enter = self.span.enter();
        let mut events = Vec::new();
        if self.ratchet.apply(&self.bounds, price, c.quant_step) {
            self.close_price = quantize(
                pricing::order_price(self.ratchet.stop_price(), c.slippage, c.side),
                c.quant_step,
            );
            tracing::debug!(
                mark = price,
                stop = self.ratchet.stop_price(),
                close = self.close_price,
                ratchet = self.ratchet.ratchet_price(),
                "stop moved"
            );
            events.push(TriggerEvent::StopMoved {
                stop_price: self.ratchet.stop_price(),
                ratchet_price: self.ratchet.ratchet_price(),
                close_price: self.close_price,
            });
        }

        if self.ratchet.is_hit(price) {
            tracing::info!(
                side = %c.side,
                mark = price,
                stop = self.ratchet.stop_price(),
                hold_price = self.position.hold_price,
                hold_qty = self.position.hold_qty,
                "stop hit, closing position"
            );
            events.push(TriggerEvent::closed(
                c.side,
                self.position.hold_qty,
                self.position.hold_price,
            ));
            return events;
        }

        let ratio = pricing::return_ratio(self.position.hold_price, price, c.fee_rate, c.leverage);
        self.pnl_ratio = ratio.for_side(c.side);
        tracing::debug!(
            mark = price,
            pnl_pct = quantize_percent(self.pnl_ratio, c.quant_step),
            "price changed"
        );
        events.push(TriggerEvent::PriceChanged {
            mark_price: price,
            pnl_ratio: self.pnl_ratio,
        });
        events
    }

    /// Flat persistence record.
    pub fn snapshot(&self) -> MovingTriggerSnapshot {
        let c = &self.config.contract;
        MovingTriggerSnapshot {
            side: c.side,
            leverage: c.leverage,
            fee_rate: c.fee_rate,
            stop_ratio: self.config.stop_ratio,
            slippage: c.slippage,
            quant_step: c.quant_step,
            hold_price: self.position.hold_price,
            hold_qty: self.position.hold_qty,
            mark_price: self.position.mark_price,
            upper_bound: self.bounds.upper_bound,
            lower_bound: self.bounds.lower_bound,
            ratchet_price: self.ratchet.ratchet_price(),
            stop_price: self.ratchet.stop_price(),
            close_price: self.close_price,
            pnl_ratio: self.pnl_ratio,
        }
    }

    /// Restore an engine exactly as recorded.
    pub fn from_snapshot(snapshot: MovingTriggerSnapshot) -> Self {
        let config = MovingTriggerConfig {
            contract: ContractParams {
                side: snapshot.side,
                leverage: snapshot.leverage,
                fee_rate: snapshot.fee_rate,
                slippage: snapshot.slippage,
                quant_step: snapshot.quant_step,
            },
            stop_ratio: snapshot.stop_ratio,
        };
        Self {
            config,
            position: Position {
                hold_price: snapshot.hold_price,
                hold_qty: snapshot.hold_qty,
                mark_price: snapshot.mark_price,
            },
            bounds: CloseBounds {
                upper_bound: snapshot.upper_bound,
                lower_bound: snapshot.lower_bound,
            },
            ratchet: StopRatchet::with_levels(
                snapshot.side,
                snapshot.stop_price,
                snapshot.ratchet_price,
            ),
            close_price: snapshot.close_price,
            pnl_ratio: snapshot.pnl_ratio,
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
        if self.position.is_flat() {
            // A reused engine anchors a fresh stop on its next position
            self.ratchet.clear();
            self.bounds = zero_bounds();
            self.close_price = 0.0;
        }
        let _enter = self.span.enter();
        tracing::info!(
            action,
            qty,
            price,
            hold_qty = self.position.hold_qty,
            hold_price = self.position.hold_price,
            "position changed"
        );
        FillOutcome::applied(self.position.hold_qty, self.position.hold_price)
    }
}

fn zero_bounds() -> CloseBounds {
    CloseBounds {
        upper_bound: 0.0,
        lower_bound: 0.0,
    }
}
