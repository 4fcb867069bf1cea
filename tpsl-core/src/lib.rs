//! tpsl core: take-profit / stop-loss pricing for leveraged futures.
//!
//! This crate contains:
//! - Pricing formulas (return ratio, close bounds, trigger and order prices, quantization)
//! - Position cost-basis accounting
//! - Fixed trigger engine (take-profit + stop-loss anchored to cost basis)
//! - Moving trigger engine (trailing stop anchored to the market price)
//! - Trigger configuration and flat persistence records
//!
//! The engines never place orders. They turn fills and ticks into prices and
//! events for an external execution layer.

pub mod config;
pub mod domain;
pub mod engine;
pub mod pricing;

pub use config::{ConfigError, ContractParams, FixedTriggerConfig, MovingTriggerConfig, TriggerConfig};
pub use domain::{Position, Side};
pub use engine::{
    build_engine, AnySnapshot, AnyTrigger, FillOutcome, FixedTrigger, MovingTrigger,
    SnapshotError, TriggerEvent,
};
