//! Replay a recorded fill/tick stream through a trigger engine.
//!
//! Input is CSV with a header row:
//!
//! ```text
//! timestamp,kind,qty,price
//! 2024-03-01T09:30:00Z,fill,10,6.320
//! 2024-03-01T09:30:05Z,tick,,6.400
//! 2024-03-01T09:31:00Z,sync,10,6.320
//! ```
//!
//! `fill` rows add a signed quantity (negative reduces), `tick` rows carry a
//! market price, `sync` rows overwrite the position with an exchange record.
//! Rows must be in chronological order: cost basis and the trailing stop
//! both depend on it.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use tpsl_core::engine::{AnyTrigger, TriggerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Fill,
    Tick,
    Sync,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRow {
    pub timestamp: DateTime<Utc>,
    pub kind: RowKind,
    #[serde(default)]
    pub qty: Option<f64>,
    pub price: f64,
}

/// One output line: the event and the row time that produced it.
#[derive(Debug, Serialize)]
struct EventLine<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a TriggerEvent,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplaySummary {
    pub rows: usize,
    pub events: usize,
    pub rejected_fills: usize,
    pub close_signals: usize,
}

/// Drive `engine` with every row of `input`, writing events as JSON lines.
pub fn replay<R: Read, W: Write>(
    engine: &mut AnyTrigger,
    input: R,
    out: &mut W,
) -> Result<ReplaySummary> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut summary = ReplaySummary::default();
    let mut last_ts: Option<DateTime<Utc>> = None;

    for (i, row) in reader.deserialize::<ReplayRow>().enumerate() {
        let line = i + 2; // header is line 1
        let row = row.with_context(|| format!("parse row at line {line}"))?;

        if let Some(prev) = last_ts {
            if row.timestamp < prev {
                bail!(
                    "line {line}: timestamp {} is earlier than {prev}; rows must be chronological",
                    row.timestamp
                );
            }
        }
        last_ts = Some(row.timestamp);
        summary.rows += 1;

        let events = match row.kind {
            RowKind::Tick => engine.on_price_tick(row.price),
            RowKind::Fill | RowKind::Sync => {
                let Some(qty) = row.qty else {
                    bail!("line {line}: {:?} row needs a qty", row.kind);
                };
                let outcome = if row.kind == RowKind::Fill {
                    engine.add_quantity(qty, row.price)
                } else {
                    engine.sync_position(qty, row.price)
                };
                if !outcome.applied {
                    tracing::warn!(line, qty, price = row.price, "fill rejected");
                    summary.rejected_fills += 1;
                }
                outcome.events
            }
        };

        for event in &events {
            let json = serde_json::to_string(&EventLine {
                timestamp: row.timestamp,
                event,
            })?;
            writeln!(out, "{json}")?;
            if event.is_close() {
                summary.close_signals += 1;
            }
        }
        summary.events += events.len();
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpsl_core::{build_engine, ContractParams, MovingTriggerConfig, Side, TriggerConfig};
    use tracing::Span;

    fn moving_long() -> AnyTrigger {
        let config = TriggerConfig::Moving(MovingTriggerConfig {
            contract: ContractParams {
                side: Side::Long,
                leverage: 20.0,
                fee_rate: 0.0003,
                slippage: 0.0005,
                quant_step: 0.001,
            },
            stop_ratio: 0.2,
        });
        build_engine(&config, Span::none())
    }

    #[test]
    fn replays_rise_pullback_stop_out() {
        let csv = "timestamp,kind,qty,price
2024-03-01T09:30:00Z,fill,10,6.320
2024-03-01T09:30:05Z,tick,,6.400
2024-03-01T09:30:10Z,tick,,6.350
2024-03-01T09:30:15Z,tick,,6.300
2024-03-01T09:30:20Z,fill,-10,6.300
";
        let mut engine = moving_long();
        let mut out = Vec::new();
        let summary = replay(&mut engine, csv.as_bytes(), &mut out).unwrap();

        assert_eq!(summary.rows, 5);
        assert_eq!(summary.close_signals, 1);
        assert_eq!(summary.rejected_fills, 0);
        assert!(engine.position().is_flat());

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), summary.events);
        assert!(lines[0].contains("\"event\":\"position_changed\""));
        assert!(text.contains("\"event\":\"closed_long\""));
        assert!(text.contains("\"timestamp\":\"2024-03-01T09:30:15Z\""));
    }

    #[test]
    fn rejects_out_of_order_rows() {
        let csv = "timestamp,kind,qty,price
2024-03-01T09:30:05Z,fill,10,6.320
2024-03-01T09:30:00Z,tick,,6.400
";
        let err = replay(&mut moving_long(), csv.as_bytes(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("chronological"));
    }

    #[test]
    fn fill_without_qty_is_an_error() {
        let csv = "timestamp,kind,qty,price
2024-03-01T09:30:00Z,fill,,6.320
";
        assert!(replay(&mut moving_long(), csv.as_bytes(), &mut Vec::new()).is_err());
    }

    #[test]
    fn counts_rejected_fills() {
        let csv = "timestamp,kind,qty,price
2024-03-01T09:30:00Z,fill,10,6.320
2024-03-01T09:30:01Z,fill,-11,6.330
";
        let mut engine = moving_long();
        let summary = replay(&mut engine, csv.as_bytes(), &mut Vec::new()).unwrap();
        assert_eq!(summary.rejected_fills, 1);
        assert_eq!(engine.position().hold_qty, 10.0);
    }

    #[test]
    fn sync_row_overwrites_position() {
        let csv = "timestamp,kind,qty,price
2024-03-01T09:30:00Z,fill,10,6.320
2024-03-01T09:30:01Z,sync,4,6.500
";
        let mut engine = moving_long();
        replay(&mut engine, csv.as_bytes(), &mut Vec::new()).unwrap();
        assert_eq!(engine.position().hold_qty, 4.0);
        assert_eq!(engine.position().hold_price, 6.5);
    }
}
