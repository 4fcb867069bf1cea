//! tpsl CLI: pricing calculators and event replay.
//!
//! Commands:
//! - `ratio`: leveraged return of an open/close pair, in truncated percent
//! - `bounds`: close prices that realize a target return
//! - `triggers`: take-profit / stop-loss trigger and order prices for one side
//! - `replay`: drive a trigger engine from a CSV of fills and ticks

mod replay;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use tpsl_core::engine::AnyTrigger;
use tpsl_core::pricing::{
    close_bounds, order_price_on_close, quantize, quantize_percent, return_ratio, triggers,
    OrderPrices,
};
use tpsl_core::{build_engine, Side, TriggerConfig};

#[derive(Parser)]
#[command(
    name = "tpsl",
    about = "tpsl CLI: take-profit / stop-loss pricing for leveraged futures"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Leveraged return of closing at `close` a position opened at `open`.
    Ratio {
        #[arg(long)]
        open: f64,

        #[arg(long)]
        close: f64,

        /// Fee rate per side (e.g., 0.0003).
        #[arg(long, default_value_t = 0.0003)]
        fee: f64,

        #[arg(long, default_value_t = 20.0)]
        leverage: f64,

        /// Percent truncation step.
        #[arg(long, default_value_t = 0.01)]
        step: f64,
    },
    /// Close prices at which a position opened at `open` earns `ratio`.
    Bounds {
        #[arg(long)]
        open: f64,

        /// Target leveraged return as a fraction (0.1 = 10%).
        #[arg(long)]
        ratio: f64,

        #[arg(long, default_value_t = 0.0003)]
        fee: f64,

        #[arg(long, default_value_t = 20.0)]
        leverage: f64,

        /// Price tick size.
        #[arg(long, default_value_t = 0.001)]
        step: f64,
    },
    /// Trigger and order prices for a fixed take-profit / stop-loss pair.
    Triggers {
        /// Position direction: long or short.
        #[arg(long)]
        side: Side,

        #[arg(long)]
        open: f64,

        /// Take-profit return as a fraction.
        #[arg(long)]
        win: f64,

        /// Stop-loss return as a fraction.
        #[arg(long)]
        lose: f64,

        #[arg(long, default_value_t = 0.0003)]
        fee: f64,

        #[arg(long, default_value_t = 20.0)]
        leverage: f64,

        /// Order price offset from the trigger. Omit or 0 for a single order price.
        #[arg(long)]
        slippage: Option<f64>,

        #[arg(long, default_value_t = 0.001)]
        step: f64,
    },
    /// Replay a CSV of fills and ticks through a trigger engine.
    Replay {
        /// Path to a TOML trigger config.
        #[arg(long)]
        config: PathBuf,

        /// CSV with `timestamp,kind,qty,price` rows.
        #[arg(long)]
        events: PathBuf,

        /// Resume from a snapshot written by an earlier replay.
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Write the final engine snapshot here.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ratio {
            open,
            close,
            fee,
            leverage,
            step,
        } => run_ratio(open, close, fee, leverage, step),
        Commands::Bounds {
            open,
            ratio,
            fee,
            leverage,
            step,
        } => run_bounds(open, ratio, fee, leverage, step),
        Commands::Triggers {
            side,
            open,
            win,
            lose,
            fee,
            leverage,
            slippage,
            step,
        } => run_triggers(side, open, win, lose, fee, leverage, slippage, step),
        Commands::Replay {
            config,
            events,
            resume,
            snapshot,
        } => run_replay(&config, &events, resume.as_deref(), snapshot.as_deref()),
    }
}

fn check_prices(open: f64, leverage: f64) -> Result<()> {
    if open <= 0.0 {
        bail!("--open must be positive, got {open}");
    }
    if leverage <= 0.0 {
        bail!("--leverage must be positive, got {leverage}");
    }
    Ok(())
}

fn run_ratio(open: f64, close: f64, fee: f64, leverage: f64, step: f64) -> Result<()> {
    check_prices(open, leverage)?;
    let r = return_ratio(open, close, fee, leverage);
    println!("Open:   {open}");
    println!("Close:  {close}");
    println!("Long:   {:.2}%", quantize_percent(r.long_ratio, step));
    println!("Short:  {:.2}%", quantize_percent(r.short_ratio, step));
    Ok(())
}

fn run_bounds(open: f64, ratio: f64, fee: f64, leverage: f64, step: f64) -> Result<()> {
    check_prices(open, leverage)?;
    if ratio >= leverage {
        bail!("--ratio {ratio} would put the lower bound at or below zero (leverage {leverage})");
    }
    let b = close_bounds(open, ratio, fee, leverage);
    println!("Open:   {open}");
    println!("Upper:  {}", quantize(b.upper_bound, step));
    println!("Lower:  {}", quantize(b.lower_bound, step));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_triggers(
    side: Side,
    open: f64,
    win: f64,
    lose: f64,
    fee: f64,
    leverage: f64,
    slippage: Option<f64>,
    step: f64,
) -> Result<()> {
    check_prices(open, leverage)?;
    let t = triggers(side, open, win, lose, fee, leverage);
    println!("Side:          {side}");
    println!("Trigger win:   {}", quantize(t.trigger_win, step));
    println!("Trigger lose:  {}", quantize(t.trigger_lose, step));
    match order_price_on_close(t.trigger_win, t.trigger_lose, slippage, side) {
        OrderPrices::Single(price) => println!("Order price:   {}", quantize(price, step)),
        OrderPrices::Pair {
            close_win,
            close_lose,
        } => {
            println!("Close win:     {}", quantize(close_win, step));
            println!("Close lose:    {}", quantize(close_lose, step));
        }
    }
    Ok(())
}

fn run_replay(
    config_path: &Path,
    events_path: &Path,
    resume: Option<&Path>,
    snapshot_path: Option<&Path>,
) -> Result<()> {
    let config = TriggerConfig::from_file(config_path)?;
    let config_id = config.config_id();
    let span = tracing::info_span!("trigger", kind = config.kind(), config_id = %&config_id[..12]);

    let mut engine = match resume {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("read snapshot {}", path.display()))?;
            AnyTrigger::resume(&config, &json, span)?
        }
        None => build_engine(&config, span),
    };

    let input = File::open(events_path)
        .with_context(|| format!("open events {}", events_path.display()))?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let summary = replay::replay(&mut engine, input, &mut out)?;
    out.flush()?;

    let pos = engine.position();
    tracing::info!(
        rows = summary.rows,
        events = summary.events,
        rejected = summary.rejected_fills,
        closes = summary.close_signals,
        hold_qty = pos.hold_qty,
        hold_price = pos.hold_price,
        market_value = pos.market_value(),
        "replay finished"
    );

    if let Some(path) = snapshot_path {
        std::fs::write(path, engine.to_json()?)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "snapshot saved");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVING_LONG: &str = r#"
type = "moving"
stop_ratio = 0.2

[contract]
side = "long"
leverage = 20
fee_rate = 0.0003
slippage = 0.0005
quant_step = 0.001
"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_replay_writes_and_resumes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "trigger.toml", MOVING_LONG);
        let first = write(
            dir.path(),
            "first.csv",
            "timestamp,kind,qty,price\n\
             2024-03-01T09:30:00Z,fill,10,6.320\n\
             2024-03-01T09:30:05Z,tick,,6.400\n",
        );
        let snapshot = dir.path().join("state.json");

        run_replay(&config, &first, None, Some(&snapshot)).unwrap();
        let json = std::fs::read_to_string(&snapshot).unwrap();
        assert!(json.contains("\"type\":\"moving\""));

        let cfg = TriggerConfig::from_file(&config).unwrap();
        let engine = AnyTrigger::resume(&cfg, &json, tracing::Span::none()).unwrap();
        assert_eq!(engine.position().hold_qty, 10.0);

        let second = write(
            dir.path(),
            "second.csv",
            "timestamp,kind,qty,price\n2024-03-01T09:30:10Z,tick,,6.300\n",
        );
        run_replay(&config, &second, Some(&snapshot), None).unwrap();
    }

    #[test]
    fn test_resume_rejects_other_engine_kind() {
        let dir = tempfile::tempdir().unwrap();
        let config = write(dir.path(), "trigger.toml", MOVING_LONG);
        let events = write(dir.path(), "events.csv", "timestamp,kind,qty,price\n");
        let fixed_toml = MOVING_LONG.replace(
            "type = \"moving\"\nstop_ratio = 0.2",
            "type = \"fixed\"\nwin_ratio = 0.1\nlose_ratio = 0.03",
        );
        let fixed = build_engine(
            &TriggerConfig::from_toml(&fixed_toml).unwrap(),
            tracing::Span::none(),
        );
        let bogus = write(dir.path(), "state.json", &fixed.to_json().unwrap());
        assert!(run_replay(&config, &events, Some(&bogus), None).is_err());
    }

    #[test]
    fn test_bounds_rejects_ratio_beyond_leverage() {
        assert!(run_bounds(6.32, 20.0, 0.0003, 20.0, 0.001).is_err());
        assert!(run_bounds(6.32, 0.1, 0.0003, 20.0, 0.001).is_ok());
    }
}
