//! Config-driven engine selection
//!
//! Callers that load the engine kind from a config file drive either engine
//! through one surface.

use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::config::TriggerConfig;
use crate::domain::Position;
use crate::engine::events::{FillOutcome, TriggerEvent};
use crate::engine::fixed::{FixedTrigger, FixedTriggerSnapshot};
use crate::engine::moving::{MovingTrigger, MovingTriggerSnapshot};
use crate::engine::SnapshotError;

/// Either trigger engine.
#[derive(Debug, Clone)]
pub enum AnyTrigger {
    Fixed(FixedTrigger),
    Moving(MovingTrigger),
}

/// Persistence record of either engine, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnySnapshot {
    Fixed(FixedTriggerSnapshot),
    Moving(MovingTriggerSnapshot),
}

/// Build a flat engine from a config, logging inside `span`.
pub fn build_engine(config: &TriggerConfig, span: Span) -> AnyTrigger {
    match config {
        TriggerConfig::Fixed(c) => AnyTrigger::Fixed(FixedTrigger::new(*c).with_span(span)),
        TriggerConfig::Moving(c) => AnyTrigger::Moving(MovingTrigger::new(*c).with_span(span)),
    }
}

impl AnyTrigger {
    pub fn add_quantity(&mut self, qty: f64, price: f64) -> FillOutcome {
        match self {
            AnyTrigger::Fixed(e) => e.add_quantity(qty, price),
            AnyTrigger::Moving(e) => e.add_quantity(qty, price),
        }
    }

    pub fn reduce_quantity(&mut self, qty: f64, price: f64) -> FillOutcome {
        match self {
            AnyTrigger::Fixed(e) => e.reduce_quantity(qty, price),
            AnyTrigger::Moving(e) => e.reduce_quantity(qty, price),
        }
    }

    pub fn sync_position(&mut self, hold_qty: f64, hold_price: f64) -> FillOutcome {
        match self {
            AnyTrigger::Fixed(e) => e.sync_position(hold_qty, hold_price),
            AnyTrigger::Moving(e) => e.sync_position(hold_qty, hold_price),
        }
    }

    pub fn on_price_tick(&mut self, price: f64) -> Vec<TriggerEvent> {
        match self {
            AnyTrigger::Fixed(e) => e.on_price_tick(price),
            AnyTrigger::Moving(e) => e.on_price_tick(price),
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            AnyTrigger::Fixed(e) => e.position(),
            AnyTrigger::Moving(e) => e.position(),
        }
    }

    pub fn snapshot(&self) -> AnySnapshot {
        match self {
            AnyTrigger::Fixed(e) => AnySnapshot::Fixed(e.snapshot()),
            AnyTrigger::Moving(e) => AnySnapshot::Moving(e.snapshot()),
        }
    }

    pub fn from_snapshot(snapshot: AnySnapshot) -> Self {
        match snapshot {
            AnySnapshot::Fixed(s) => AnyTrigger::Fixed(FixedTrigger::from_snapshot(s)),
            AnySnapshot::Moving(s) => AnyTrigger::Moving(MovingTrigger::from_snapshot(s)),
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

    /// Restore from a tagged record, checking it matches `config`'s kind.
    pub fn resume(config: &TriggerConfig, json: &str, span: Span) -> Result<Self, SnapshotError> {
        let snapshot: AnySnapshot = serde_json::from_str(json)?;
        match (config, snapshot) {
            (TriggerConfig::Fixed(_), AnySnapshot::Fixed(s)) => {
                Ok(AnyTrigger::Fixed(FixedTrigger::from_snapshot(s).with_span(span)))
            }
            (TriggerConfig::Moving(_), AnySnapshot::Moving(s)) => {
                Ok(AnyTrigger::Moving(MovingTrigger::from_snapshot(s).with_span(span)))
            }
            (config, snapshot) => Err(SnapshotError::KindMismatch {
                expected: config.kind(),
                found: snapshot.kind(),
            }),
        }
    }
}

impl AnySnapshot {
    pub fn kind(&self) -> &'static str {
        match self {
            AnySnapshot::Fixed(_) => "fixed",
            AnySnapshot::Moving(_) => "moving",
        }
    }
}
