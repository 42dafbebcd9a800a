//! Candle loading for the runner.
//!
//! Reads a CSV with a header row `timestamp,open,high,low,close,volume` and
//! returns a validated series: strictly time-ascending, unique timestamps,
//! every candle passing the OHLC sanity check. Anything else is rejected
//! before it reaches the core.
//!
//! Timestamps may be RFC 3339 strings or integer epoch values (seconds, or
//! milliseconds when the value is too large to be seconds).

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use ladderlab_core::domain::Candle;

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: invalid timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: timestamp {timestamp} is not after the previous candle")]
    Unordered { row: usize, timestamp: DateTime<Utc> },

    #[error("row {row}: OHLC values fail sanity check (low <= open/close <= high, prices > 0)")]
    Insane { row: usize },

    #[error("no candles in input")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load and validate candles from a CSV file.
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_candles(file)
}

/// Load and validate candles from any CSV reader.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles: Vec<Candle> = Vec::new();

    for (i, row) in rdr.deserialize::<CandleRow>().enumerate() {
        let row = row?;
        // 1-based data row, header excluded.
        let row_no = i + 1;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: row_no,
            value: row.timestamp.clone(),
        })?;
        let candle = Candle::new(timestamp, row.open, row.high, row.low, row.close, row.volume);

        if !candle.is_sane() {
            return Err(LoadError::Insane { row: row_no });
        }
        if let Some(prev) = candles.last() {
            if candle.timestamp <= prev.timestamp {
                return Err(LoadError::Unordered {
                    row: row_no,
                    timestamp: candle.timestamp,
                });
            }
        }
        candles.push(candle);
    }

    if candles.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(candles)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
        };
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Write candles in the same CSV layout [`read_candles`] accepts.
pub fn write_candles_csv(candles: &[Candle], path: &Path) -> Result<(), LoadError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        wtr.write_record([
            c.timestamp.to_rfc3339(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    wtr.flush().map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}
