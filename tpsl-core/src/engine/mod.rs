//! Trigger engines: fixed take-profit/stop-loss and trailing stop.
//!
//! Each engine owns one position. Fills and ticks must be applied in
//! chronological order; every mutating call returns the events it produced.

pub mod any;
pub mod events;
pub mod fixed;
pub mod moving;
pub mod ratchet;

use thiserror::Error;

pub use any::{build_engine, AnySnapshot, AnyTrigger};
pub use events::{FillOutcome, TriggerEvent};
pub use fixed::{FixedTrigger, FixedTriggerSnapshot, FixedTriggerState};
pub use moving::{MovingTrigger, MovingTriggerSnapshot, MovingTriggerState};
pub use ratchet::StopRatchet;

/// Errors from encoding or decoding a persisted engine record.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot is for a {found} engine, config expects {expected}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
