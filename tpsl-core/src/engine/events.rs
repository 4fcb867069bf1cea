//! Trigger engine events
//!
//! Every mutating engine call returns the events it produced, in order.
//! Close events are signals for the order-execution layer: the engine keeps
//! the position until the caller reports the confirmed fill via a reduce.

use serde::{Deserialize, Serialize};

use crate::domain::Side;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// Quantity or cost basis changed
    PositionChanged { hold_qty: f64, hold_price: f64 },

    /// A tick was evaluated without closing
    PriceChanged { mark_price: f64, pnl_ratio: f64 },

    /// The trailing stop advanced (moving engine only)
    StopMoved {
        stop_price: f64,
        ratchet_price: f64,
        close_price: f64,
    },

    /// Close the long position at market
    ClosedLong { hold_qty: f64, hold_price: f64 },

    /// Close the short position at market
    ClosedShort { hold_qty: f64, hold_price: f64 },
}

impl TriggerEvent {
    /// The close signal for `side`.
    pub fn closed(side: Side, hold_qty: f64, hold_price: f64) -> Self {
        match side {
            Side::Long => TriggerEvent::ClosedLong {
                hold_qty,
                hold_price,
            },
            Side::Short => TriggerEvent::ClosedShort {
                hold_qty,
                hold_price,
            },
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(
            self,
            TriggerEvent::ClosedLong { .. } | TriggerEvent::ClosedShort { .. }
        )
    }
}

/// Result of a fill applied to an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    /// False when the fill was rejected and nothing changed
    pub applied: bool,
    /// Held quantity after the call
    pub hold_qty: f64,
    pub events: Vec<TriggerEvent>,
}

impl FillOutcome {
    pub(crate) fn rejected(hold_qty: f64) -> Self {
        Self {
            applied: false,
            hold_qty,
            events: Vec::new(),
        }
    }

    pub(crate) fn applied(hold_qty: f64, hold_price: f64) -> Self {
        Self {
            applied: true,
            hold_qty,
            events: vec![TriggerEvent::PositionChanged {
                hold_qty,
                hold_price,
            }],
        }
    }
}
