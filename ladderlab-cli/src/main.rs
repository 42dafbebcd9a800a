//! LadderLab CLI — backtest, optimize, and heatmap commands.
//!
//! Commands:
//! - `backtest` — simulate one strategy over CSV or synthetic candles
//! - `optimize` — grid-search the `[optimizer]` ranges of a run file
//! - `heatmap` — score a dense two-parameter grid
//!
//! Every command reads candles from `--candles <csv>` or generates a seeded
//! random walk with `--synthetic N`. Logging honours `RUST_LOG`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ladderlab_core::domain::Candle;
use ladderlab_runner::export::{
    export_heatmap_csv, export_heatmap_json, export_summary_json, generate_report, save_artifacts,
};
use ladderlab_runner::{
    load_candles_csv, random_walk, run_backtest, run_heatmap, BacktestObjective, ObjectiveMetric,
    OptimizationSummary, Optimizer, OptimizerEvent, RunFile, SearchMode, SyntheticConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ladderlab",
    about = "LadderLab CLI — channel-breakout backtester with take-profit ladders"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// CSV file with time,open,high,low,close,volume rows.
    #[arg(long, conflicts_with = "synthetic")]
    candles: Option<PathBuf>,

    /// Generate N synthetic candles instead of reading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest and print its report.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// TOML run file. Defaults to the built-in strategy.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Save result.json, trades.csv and equity.csv under this directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Grid-search the ranges listed in the run file's [optimizer] section.
    Optimize {
        #[command(flatten)]
        data: DataArgs,

        /// TOML run file with an [optimizer] section.
        #[arg(long)]
        config: PathBuf,

        /// Worker threads (0 = available parallelism).
        #[arg(long)]
        workers: Option<usize>,

        /// Search mode: indicator, take_profit, stop_loss, filters, full.
        #[arg(long)]
        mode: Option<String>,

        /// Objective: profit_pct, win_rate, composite, risk_adjusted.
        #[arg(long)]
        metric: Option<String>,

        /// Write the summary JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score every combination of two parameters from the run file.
    Heatmap {
        #[command(flatten)]
        data: DataArgs,

        /// TOML run file with an [optimizer] section listing both ranges.
        #[arg(long)]
        config: PathBuf,

        /// Column parameter.
        #[arg(long)]
        x: String,

        /// Row parameter.
        #[arg(long)]
        y: String,

        /// Write the heatmap JSON to this file; CSV goes to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            data,
            config,
            output,
        } => run_backtest_cmd(&data, config.as_deref(), output.as_deref()),
        Commands::Optimize {
            data,
            config,
            workers,
            mode,
            metric,
            output,
        } => run_optimize_cmd(
            &data,
            &config,
            workers,
            mode.as_deref(),
            metric.as_deref(),
            output.as_deref(),
        ),
        Commands::Heatmap {
            data,
            config,
            x,
            y,
            output,
        } => run_heatmap_cmd(&data, &config, &x, &y, output.as_deref()),
    }
}

fn load_candles(data: &DataArgs) -> Result<Vec<Candle>> {
    match (&data.candles, data.synthetic) {
        (Some(path), _) => load_candles_csv(path)
            .with_context(|| format!("failed to load candles from {}", path.display())),
        (None, Some(n)) => {
            info!(candles = n, seed = data.seed, "generating synthetic candles");
            Ok(random_walk(&SyntheticConfig {
                candles: n,
                seed: data.seed,
                ..SyntheticConfig::default()
            }))
        }
        (None, None) => bail!("one of --candles or --synthetic is required"),
    }
}

fn load_run_file(path: &Path) -> Result<RunFile> {
    RunFile::load(path).with_context(|| format!("failed to load run file {}", path.display()))
}

fn run_backtest_cmd(data: &DataArgs, config: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let candles = load_candles(data)?;
    let run = match config {
        Some(path) => load_run_file(path)?,
        None => RunFile::default(),
    };

    let result = run_backtest(&candles, &run.strategy)?;
    print!("{}", generate_report(&result));

    if let Some(dir) = output {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_optimize_cmd(
    data: &DataArgs,
    config: &Path,
    workers: Option<usize>,
    mode: Option<&str>,
    metric: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let candles = load_candles(data)?;
    let run = load_run_file(config)?;
    let mut section = run.optimizer()?.clone();

    if let Some(n) = workers {
        section.config.workers = n;
    }
    if let Some(m) = mode {
        section.config.mode = m.parse::<SearchMode>().map_err(|e| anyhow!(e))?;
    }
    if let Some(m) = metric {
        section.config.metric = m.parse::<ObjectiveMetric>().map_err(|e| anyhow!(e))?;
    }

    let space = section.space()?;
    let objective = BacktestObjective::new(&candles, run.strategy.clone(), section.config.metric)?;
    let optimizer = Optimizer::new(section.config.clone());
    let (tx, rx) = optimizer.channel();

    // The channel is bounded: drain on this thread while the search runs.
    let summary = std::thread::scope(|s| {
        let search = s.spawn(move || optimizer.run(&space, &objective, Some(&tx), None));
        for event in rx {
            print_event(&event);
        }
        search
            .join()
            .map_err(|_| anyhow!("optimizer thread panicked"))
    })??;

    print_summary(&summary);
    if let Some(path) = output {
        std::fs::write(path, export_summary_json(&summary)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Summary saved to: {}", path.display());
    }
    Ok(())
}

fn run_heatmap_cmd(
    data: &DataArgs,
    config: &Path,
    x: &str,
    y: &str,
    output: Option<&Path>,
) -> Result<()> {
    if x == y {
        bail!("--x and --y must name different parameters");
    }
    let candles = load_candles(data)?;
    let run = load_run_file(config)?;
    let section = run.optimizer()?;
    let x_range = section
        .range(x)
        .with_context(|| format!("no range named {x} in [optimizer]"))?;
    let y_range = section
        .range(y)
        .with_context(|| format!("no range named {y} in [optimizer]"))?;

    let objective = BacktestObjective::new(&candles, run.strategy.clone(), section.config.metric)?;
    let optimizer = Optimizer::new(section.config.clone());
    let heatmap = run_heatmap(&optimizer, x_range, y_range, &objective, None, None)?;

    print!("{}", export_heatmap_csv(&heatmap)?);
    if let Some(path) = output {
        std::fs::write(path, export_heatmap_json(&heatmap)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Heatmap saved to: {}", path.display());
    }
    Ok(())
}

fn print_event(event: &OptimizerEvent) {
    match event {
        OptimizerEvent::Start { total, workers } => {
            println!("searching {total} combinations on {workers} workers");
        }
        OptimizerEvent::Progress {
            completed,
            total,
            params,
            score,
            is_new_best,
            ..
        } => {
            if *is_new_best {
                println!("[{completed}/{total}] new best {score:.4}  {params}");
            }
        }
        OptimizerEvent::Error {
            index,
            params,
            message,
        } => {
            eprintln!("combination {index} failed ({params}): {message}");
        }
        OptimizerEvent::Done { .. } => {}
    }
}

fn print_summary(summary: &OptimizationSummary) {
    println!(
        "evaluated {}/{} ({} failed){}",
        summary.evaluated,
        summary.total,
        summary.failed,
        if summary.cancelled { ", cancelled" } else { "" }
    );
    match &summary.best {
        Some(best) => {
            println!("best score {:.4} at #{}", best.score, best.index);
            println!("  {}", best.params);
            let s = &best.statistics;
            println!(
                "  trades {}  win rate {:.1}%  return {:.2}%  max dd {:.2}%",
                s.trade_count, s.win_rate, s.total_return_pct, s.max_drawdown_pct
            );
        }
        None => println!("no successful evaluation"),
    }
}
