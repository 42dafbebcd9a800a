//! Reporting and export — JSON, CSV, and plain-text artifacts.
//!
//! - **JSON**: full `BacktestResult` round-trip with schema versioning, plus
//!   optimizer summaries and heatmaps
//! - **CSV**: trade ledger and equity curve for external tools
//! - **Text**: a short human-readable report for the terminal

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ladderlab_core::domain::TradeRecord;
use ladderlab_core::engine::EquityPoint;

use crate::heatmap::Heatmap;
use crate::optimizer::OptimizationSummary;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

pub fn export_summary_json(summary: &OptimizationSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize optimization summary")
}

pub fn export_heatmap_json(heatmap: &Heatmap) -> Result<String> {
    serde_json::to_string_pretty(heatmap).context("failed to serialize heatmap")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per trade. `tp_hits` is `;`-separated; score columns are empty
/// for unscored trades.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "direction",
        "entry_index",
        "entry_time",
        "entry_price",
        "exit_index",
        "exit_time",
        "exit_price",
        "avg_exit_price",
        "exit_reason",
        "tp_hits",
        "capital_at_risk",
        "leverage",
        "gross_pnl_pct",
        "commission_pct",
        "net_pnl_pct",
        "mfe_pct",
        "mae_pct",
        "bars_held",
        "is_reentry",
        "stop_mode",
        "score",
        "grade",
    ])?;

    for t in trades {
        let tp_hits = t
            .tp_hits
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(";");
        let (score, grade) = match &t.score {
            Some(s) => (format!("{:.1}", s.total), s.grade.to_string()),
            None => (String::new(), String::new()),
        };
        wtr.write_record([
            t.id.to_string(),
            t.direction.label().to_string(),
            t.entry_index.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_index.to_string(),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.avg_exit_price()),
            t.exit_reason.to_string(),
            tp_hits,
            format!("{:.2}", t.capital_at_risk),
            t.leverage.to_string(),
            format!("{:.4}", t.gross_pnl_pct),
            format!("{:.4}", t.commission_pct),
            format!("{:.4}", t.net_pnl_pct),
            format!("{:.4}", t.mfe_pct),
            format!("{:.4}", t.mae_pct),
            t.bars_held.to_string(),
            t.is_reentry.to_string(),
            t.stop_mode.clone(),
            score,
            grade,
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "equity"])?;
    for p in equity_curve {
        wtr.write_record([p.time.to_rfc3339(), format!("{:.2}", p.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Heatmap as a CSV matrix: header row of x values, one row per y value.
pub fn export_heatmap_csv(heatmap: &Heatmap) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec![format!("{}\\{}", heatmap.y_name, heatmap.x_name)];
    header.extend(heatmap.x_values.iter().map(|x| x.to_string()));
    wtr.write_record(&header)?;

    for (y, row) in heatmap.y_values.iter().zip(&heatmap.scores) {
        let mut record = vec![y.to_string()];
        record.extend(
            row.iter()
                .map(|cell| cell.map(|s| format!("{s:.4}")).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save `result.json`, `trades.csv` and `equity.csv` under
/// `output_dir/{hash prefix}/`. Returns the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix = result.config_hash.get(..12).unwrap_or(&result.config_hash);
    let run_dir = output_dir.join(prefix);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity_curve)?)?;

    Ok(run_dir)
}

pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Text report ────────────────────────────────────────────────────

pub fn generate_report(result: &BacktestResult) -> String {
    let s = &result.statistics;
    let mut out = String::new();
    let _ = writeln!(out, "Backtest {}", result.config_hash.get(..12).unwrap_or(""));
    let _ = writeln!(
        out,
        "  candles        {} (warm-up {})",
        result.candle_count, result.warmup_candles
    );
    let _ = writeln!(out, "  trades         {} ({} re-entries)", s.trade_count, s.reentries);
    let _ = writeln!(out, "  wins / losses  {} / {}", s.wins, s.losses);
    let _ = writeln!(out, "  win rate       {:.1}%", s.win_rate);
    let _ = writeln!(out, "  return         {:.2}%", s.total_return_pct);
    let _ = writeln!(out, "  sum trade pnl  {:.2}%", s.total_pnl_pct);
    let _ = writeln!(out, "  profit factor  {:.2}", s.profit_factor);
    let _ = writeln!(out, "  max drawdown   {:.2}%", s.max_drawdown_pct);
    let _ = writeln!(out, "  sharpe-like    {:.2}", s.sharpe);
    let _ = writeln!(out, "  filtered       {}", result.filtered_signals);

    if !s.exit_reasons.is_empty() {
        let reasons: Vec<String> = s
            .exit_reasons
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        let _ = writeln!(out, "  exits          {}", reasons.join(" "));
    }
    if !s.periods.is_empty() {
        let _ = writeln!(out, "  by month:");
        for p in &s.periods {
            let _ = writeln!(
                out,
                "    {}  {:>3} trades  {:>8.2}%  win {:>5.1}%",
                p.period, p.trades, p.pnl_pct, p.win_rate
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run_backtest;
    use crate::synthetic::{random_walk, SyntheticConfig};
    use ladderlab_core::config::StrategyConfig;

    fn sample_result() -> BacktestResult {
        let candles = random_walk(&SyntheticConfig {
            candles: 300,
            seed: 11,
            ..SyntheticConfig::default()
        });
        run_backtest(&candles, &StrategyConfig::default()).unwrap()
    }

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let back = import_json(&export_json(&result).unwrap()).unwrap();
        assert_eq!(back.trades.len(), result.trades.len());
        assert_eq!(back.config_hash, result.config_hash);
        assert_eq!(back.statistics.trade_count, result.statistics.trade_count);
        assert_eq!(back.equity_curve.len(), result.equity_curve.len());
        assert!((back.final_equity - result.final_equity).abs() < 1e-6);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = serde_json::to_string(&result).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn csv_trades_has_row_per_trade() {
        let result = sample_result();
        let csv = export_trades_csv(&result.trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), result.trades.len() + 1);
        assert!(lines[0].starts_with("id,direction,entry_index"));
        assert!(lines[0].ends_with("score,grade"));
    }

    #[test]
    fn csv_empty_trades() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn csv_equity_has_row_per_candle() {
        let result = sample_result();
        let csv = export_equity_csv(&result.equity_curve).unwrap();
        assert_eq!(csv.lines().count(), result.equity_curve.len() + 1);
    }

    #[test]
    fn heatmap_csv_layout() {
        let map = Heatmap {
            x_name: "channel_period".into(),
            y_name: "stop_loss_pct".into(),
            x_values: vec![10.0, 20.0],
            y_values: vec![1.0],
            scores: vec![vec![Some(1.5), None]],
            best: None,
        };
        let csv = export_heatmap_csv(&map).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "stop_loss_pct\\channel_period,10,20");
        assert_eq!(lines[1], "1,1.5000,");
    }

    #[test]
    fn artifacts_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();
        let run_dir = save_artifacts(&result, dir.path()).unwrap();
        assert!(run_dir.join("trades.csv").exists());
        assert!(run_dir.join("equity.csv").exists());
        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.config_hash, result.config_hash);
        assert!((loaded.final_equity - result.final_equity).abs() < 1e-6);
    }

    #[test]
    fn report_mentions_key_figures() {
        let report = generate_report(&sample_result());
        assert!(report.contains("win rate"));
        assert!(report.contains("max drawdown"));
    }
}
