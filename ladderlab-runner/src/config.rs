//! TOML run files.
//!
//! ```toml
//! [strategy.indicators]
//! channel_period = 20
//! channel_multiplier = 1.0
//!
//! [strategy.simulator]
//! stop_loss_pct = 2.0
//! stop_mode = { type = "after_tp", k = 1 }
//! ladder = [{ target_pct = 1.0, close_pct = 50.0 }, { target_pct = 2.0, close_pct = 50.0 }]
//!
//! [[strategy.filters]]
//! kind = "trend_strength"
//! adx_period = 14
//! min_adx = 20.0
//!
//! [optimizer]
//! workers = 0
//! metric = "composite"
//! mode = "full"
//!
//! [[optimizer.ranges]]
//! name = "channel_period"
//! min = 10
//! max = 40
//! step = 5
//! kind = "int"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ladderlab_core::config::{ConfigError, StrategyConfig};

use crate::optimizer::{OptimizeError, OptimizerConfig};
use crate::space::{ParamRange, ParamSpace};

#[derive(Debug, Error)]
pub enum RunFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize run file: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
    #[error("run file has no [optimizer] section")]
    MissingOptimizer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSection {
    #[serde(flatten)]
    pub config: OptimizerConfig,
    #[serde(default)]
    pub ranges: Vec<ParamRange>,
}

impl OptimizerSection {
    /// Validated space for the configured search mode.
    pub fn space(&self) -> Result<ParamSpace, OptimizeError> {
        ParamSpace::new(&self.ranges, self.config.mode)
    }

    pub fn range(&self, name: &str) -> Option<&ParamRange> {
        self.ranges.iter().find(|r| r.name == name)
    }
}

/// Strategy plus optional search settings, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<OptimizerSection>,
}

impl RunFile {
    /// Parse and validate the strategy.
    pub fn parse(text: &str) -> Result<Self, RunFileError> {
        let file: RunFile = toml::from_str(text)?;
        file.strategy.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, RunFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn to_toml(&self) -> Result<String, RunFileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn optimizer(&self) -> Result<&OptimizerSection, RunFileError> {
        self.optimizer.as_ref().ok_or(RunFileError::MissingOptimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::ObjectiveMetric;
    use crate::space::{ParamKind, SearchMode};
    use ladderlab_core::config::FilterConfig;
    use ladderlab_core::domain::StopLossMode;

    const SAMPLE: &str = r#"
[strategy.indicators]
channel_period = 30
channel_multiplier = 1.5
atr_period = 10

[strategy.simulator]
stop_loss_pct = 3.0
stop_mode = { type = "cascade" }
allow_reentry_after_sl = true
ladder = [
    { target_pct = 1.0, close_pct = 30.0 },
    { target_pct = 2.5, close_pct = 30.0 },
    { target_pct = 4.0, close_pct = 40.0 },
]

[[strategy.filters]]
kind = "trend_strength"
adx_period = 14
min_adx = 25.0

[optimizer]
workers = 2
metric = "risk_adjusted"
mode = "indicator"

[[optimizer.ranges]]
name = "channel_period"
min = 10
max = 40
step = 10
kind = "int"

[[optimizer.ranges]]
name = "stop_loss_pct"
min = 1.0
max = 3.0
step = 0.5
"#;

    #[test]
    fn parses_full_file() {
        let file = RunFile::parse(SAMPLE).unwrap();
        assert_eq!(file.strategy.indicators.channel_period, 30);
        assert_eq!(file.strategy.simulator.stop_mode, StopLossMode::Cascade);
        assert_eq!(file.strategy.simulator.ladder.len(), 3);
        assert!(file.strategy.simulator.allow_reentry_after_sl);
        assert_eq!(file.strategy.filters.len(), 1);
        assert!(file.strategy.filters[0].enabled);
        assert!(matches!(
            file.strategy.filters[0].filter,
            FilterConfig::TrendStrength { adx_period: 14, .. }
        ));

        let opt = file.optimizer().unwrap();
        assert_eq!(opt.config.workers, 2);
        assert_eq!(opt.config.metric, ObjectiveMetric::RiskAdjusted);
        assert_eq!(opt.ranges.len(), 2);
        assert_eq!(opt.ranges[0].kind, ParamKind::Int);
        assert_eq!(opt.ranges[1].kind, ParamKind::Float);

        // Indicator mode drops the stop-loss range.
        let space = opt.space().unwrap();
        assert_eq!(space.total(), 4);
    }

    #[test]
    fn empty_file_is_default_strategy() {
        let file = RunFile::parse("").unwrap();
        assert_eq!(file.strategy, StrategyConfig::default());
        assert!(matches!(file.optimizer(), Err(RunFileError::MissingOptimizer)));
    }

    #[test]
    fn invalid_strategy_is_rejected() {
        let text = "[strategy.simulator]\nleverage = 200.0\n";
        assert!(matches!(RunFile::parse(text), Err(RunFileError::Config(_))));

        let unordered = r#"
[strategy.simulator]
ladder = [{ target_pct = 2.0, close_pct = 50.0 }, { target_pct = 1.0, close_pct = 50.0 }]
"#;
        assert!(RunFile::parse(unordered).is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let file = RunFile::parse(SAMPLE).unwrap();
        let text = file.to_toml().unwrap();
        assert_eq!(RunFile::parse(&text).unwrap(), file);
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let file = RunFile::load(&path).unwrap();
        assert_eq!(file.optimizer().unwrap().config.mode, SearchMode::Indicator);

        let missing = RunFile::load(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(RunFileError::Io { .. })));
    }
}
