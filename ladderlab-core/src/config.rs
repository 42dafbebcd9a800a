//! Typed strategy configuration.
//!
//! One validated struct per component, built once and passed by reference.
//! Flat key/value settings (from UIs, run files or optimizer parameter
//! vectors) are mapped onto these types by [`StrategyConfig::apply_setting`].
//!
//! Bounds:
//! - lookback windows: [1, 500]
//! - percentages: [0, 100]
//! - leverage: [1, 125], and leverage × stop_loss_pct < 100
//! - take-profit ladder: 1–10 levels, strictly increasing targets, close sum ≤ 100

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{
    LadderError, StopLossMode, TakeProfitLadder, TakeProfitLevel, MAX_LOSS_PCT,
};
use crate::indicators::{Adx, Ema, Indicator, Rsi, VolumeSma};

pub const WINDOW_BOUNDS: (f64, f64) = (1.0, 500.0);
pub const PCT_BOUNDS: (f64, f64) = (0.0, 100.0);
pub const LEVERAGE_BOUNDS: (f64, f64) = (1.0, 125.0);
pub const MULTIPLIER_BOUNDS: (f64, f64) = (0.01, 20.0);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("invalid stop-loss mode: {0}")]
    InvalidStopMode(String),
    #[error("invalid take-profit ladder: {0}")]
    Ladder(#[from] LadderError),
}

pub(crate) fn check_bounds(name: &str, value: f64, (min, max): (f64, f64)) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfBounds {
            name: name.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub(crate) fn check_window(name: &str, value: usize) -> Result<(), ConfigError> {
    check_bounds(name, value as f64, WINDOW_BOUNDS)
}

/// Integer-valued setting. Rejects fractional values rather than truncating.
fn as_window(name: &str, value: f64) -> Result<usize, ConfigError> {
    check_bounds(name, value, WINDOW_BOUNDS)?;
    if value.fract() != 0.0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("{value} is not an integer"),
        });
    }
    Ok(value as usize)
}

fn as_flag(name: &str, value: f64) -> Result<bool, ConfigError> {
    if value == 0.0 {
        Ok(false)
    } else if value == 1.0 {
        Ok(true)
    } else {
        Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected 0 or 1, got {value}"),
        })
    }
}

// ── Indicators ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub channel_period: usize,
    pub channel_multiplier: f64,
    pub atr_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            channel_period: 20,
            channel_multiplier: 1.0,
            atr_period: 14,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_window("channel_period", self.channel_period)?;
        check_bounds("channel_multiplier", self.channel_multiplier, MULTIPLIER_BOUNDS)?;
        check_window("atr_period", self.atr_period)?;
        Ok(())
    }

    /// Index of the first candle where every core series is defined.
    pub fn warmup(&self) -> usize {
        self.channel_period.max(self.atr_period).saturating_sub(1)
    }
}

// ── Filters ──

/// One filter unit and its parameters. The kind set is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Close must sit on the trade's side of an EMA.
    TrendConfirmation { ema_period: usize },
    /// RSI must not be in the extreme zone opposing the trade.
    MomentumBounds {
        rsi_period: usize,
        overbought: f64,
        oversold: f64,
    },
    /// ADX must be at least `min_adx`.
    TrendStrength { adx_period: usize, min_adx: f64 },
    /// Volume must exceed its own moving average.
    VolumeConfirmation { ma_period: usize },
}

impl FilterConfig {
    pub fn trend_confirmation() -> Self {
        Self::TrendConfirmation { ema_period: 50 }
    }

    pub fn momentum_bounds() -> Self {
        Self::MomentumBounds {
            rsi_period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }

    pub fn trend_strength() -> Self {
        Self::TrendStrength {
            adx_period: 14,
            min_adx: 20.0,
        }
    }

    pub fn volume_confirmation() -> Self {
        Self::VolumeConfirmation { ma_period: 20 }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TrendConfirmation { .. } => "trend_confirmation",
            Self::MomentumBounds { .. } => "momentum_bounds",
            Self::TrendStrength { .. } => "trend_strength",
            Self::VolumeConfirmation { .. } => "volume_confirmation",
        }
    }

    /// Index of the first candle where this unit's indicator is defined.
    pub fn warmup(&self) -> usize {
        match *self {
            Self::TrendConfirmation { ema_period } => Ema::new(ema_period).lookback(),
            Self::MomentumBounds { rsi_period, .. } => Rsi::new(rsi_period).lookback(),
            Self::TrendStrength { adx_period, .. } => Adx::new(adx_period).lookback(),
            Self::VolumeConfirmation { ma_period } => VolumeSma::new(ma_period).lookback(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::TrendConfirmation { ema_period } => check_window("ema_period", ema_period),
            Self::MomentumBounds {
                rsi_period,
                overbought,
                oversold,
            } => {
                check_window("rsi_period", rsi_period)?;
                check_bounds("rsi_overbought", overbought, PCT_BOUNDS)?;
                check_bounds("rsi_oversold", oversold, PCT_BOUNDS)?;
                if oversold >= overbought {
                    return Err(ConfigError::InvalidValue {
                        name: "rsi_oversold".into(),
                        reason: format!("{oversold} must be below rsi_overbought {overbought}"),
                    });
                }
                Ok(())
            }
            Self::TrendStrength {
                adx_period,
                min_adx,
            } => {
                check_window("adx_period", adx_period)?;
                check_bounds("adx_min", min_adx, PCT_BOUNDS)
            }
            Self::VolumeConfirmation { ma_period } => check_window("volume_ma_period", ma_period),
        }
    }
}

/// A filter unit plus its enable switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSlot {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub filter: FilterConfig,
}

fn enabled_by_default() -> bool {
    true
}

impl FilterSlot {
    pub fn new(filter: FilterConfig) -> Self {
        Self {
            enabled: true,
            filter,
        }
    }
}

// ── Simulator ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub ladder: TakeProfitLadder,
    /// Initial stop distance, percent of entry price.
    pub stop_loss_pct: f64,
    pub stop_mode: StopLossMode,
    pub allow_reentry_after_sl: bool,
    pub allow_reentry_after_tp: bool,
    pub leverage: f64,
    pub commission_enabled: bool,
    /// Percent of notional charged at entry and at every close.
    pub commission_pct: f64,
    pub initial_capital: f64,
    /// Percent of current equity committed as capital-at-risk per position.
    pub position_size_pct: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ladder: default_ladder(),
            stop_loss_pct: 2.0,
            stop_mode: StopLossMode::Fixed,
            allow_reentry_after_sl: false,
            allow_reentry_after_tp: false,
            leverage: 1.0,
            commission_enabled: false,
            commission_pct: 0.05,
            initial_capital: 10_000.0,
            position_size_pct: 100.0,
        }
    }
}

fn default_ladder() -> TakeProfitLadder {
    TakeProfitLadder::new(vec![
        TakeProfitLevel::new(1.0, 50.0),
        TakeProfitLevel::new(2.0, 50.0),
    ])
    .unwrap_or_else(|_| unreachable!("default ladder is valid"))
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Deserialized ladders are already validated; this re-check guards
        // ladders built field-by-field.
        TakeProfitLadder::new(self.ladder.levels().to_vec())?;
        check_bounds("stop_loss_pct", self.stop_loss_pct, PCT_BOUNDS)?;
        check_bounds("leverage", self.leverage, LEVERAGE_BOUNDS)?;
        if self.leverage * self.stop_loss_pct >= MAX_LOSS_PCT {
            return Err(ConfigError::InvalidValue {
                name: "stop_loss_pct".into(),
                reason: format!(
                    "{}% at {}x leverage loses the whole position before the stop",
                    self.stop_loss_pct, self.leverage
                ),
            });
        }
        check_bounds("commission_pct", self.commission_pct, PCT_BOUNDS)?;
        check_bounds("position_size_pct", self.position_size_pct, PCT_BOUNDS)?;
        if self.position_size_pct == 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "position_size_pct".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if !(self.initial_capital > 0.0) || !self.initial_capital.is_finite() {
            return Err(ConfigError::InvalidValue {
                name: "initial_capital".into(),
                reason: format!("{} must be a positive amount", self.initial_capital),
            });
        }
        if let StopLossMode::AfterTp { k } = self.stop_mode {
            if !(1..=3).contains(&k) {
                return Err(ConfigError::InvalidStopMode(format!(
                    "after_tp requires k in 1..=3, got {k}"
                )));
            }
            if k > self.ladder.len() {
                return Err(ConfigError::InvalidStopMode(format!(
                    "after_tp{k} with only {} take-profit levels",
                    self.ladder.len()
                )));
            }
        }
        Ok(())
    }

    /// Commission actually charged per event, 0 when accounting is off.
    pub fn effective_commission_pct(&self) -> f64 {
        if self.commission_enabled {
            self.commission_pct
        } else {
            0.0
        }
    }
}

// ── Strategy ──

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub indicators: IndicatorConfig,
    /// Evaluated in this order; disabled slots are skipped.
    pub filters: Vec<FilterSlot>,
    pub simulator: SimulatorConfig,
}

/// Parse `tp{n}_target` / `tp{n}_close` into (1-based level, is_target).
fn parse_tp_key(name: &str) -> Option<(usize, bool)> {
    let rest = name.strip_prefix("tp")?;
    let (num, field) = rest.split_once('_')?;
    let level: usize = num.parse().ok()?;
    match field {
        "target" => Some((level, true)),
        "close" => Some((level, false)),
        _ => None,
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.validate()?;
        for slot in &self.filters {
            slot.filter.validate()?;
        }
        self.simulator.validate()
    }

    /// Deterministic content hash (BLAKE3 over the canonical JSON).
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("StrategyConfig must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// First candle index where the channel, ATR and every enabled filter
    /// have a defined value.
    pub fn warmup(&self) -> usize {
        self.active_filters()
            .map(FilterConfig::warmup)
            .fold(self.indicators.warmup(), usize::max)
    }

    /// Enabled filter units in evaluation order.
    pub fn active_filters(&self) -> impl Iterator<Item = &FilterConfig> {
        self.filters.iter().filter(|s| s.enabled).map(|s| &s.filter)
    }

    /// Apply one flat setting. Does not re-validate the whole config.
    ///
    /// Recognised names:
    /// - indicators: `channel_period`, `channel_multiplier`, `atr_period`
    /// - ladder: `tp{n}_target`, `tp{n}_close` (n = existing level)
    /// - stop/risk: `stop_loss_pct`, `sl_mode` (0 fixed, 1–3 after TPk, 4 cascade),
    ///   `leverage`, `commission_pct`, `commission_enabled`, `position_size_pct`,
    ///   `allow_reentry_after_sl`, `allow_reentry_after_tp`
    /// - filters: `trend_filter`, `rsi_filter`, `adx_filter`, `volume_filter` (0/1),
    ///   `ema_period`, `rsi_period`, `rsi_overbought`, `rsi_oversold`,
    ///   `adx_period`, `adx_min`, `volume_ma_period`
    pub fn apply_setting(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        if let Some((level, is_target)) = parse_tp_key(name) {
            let mut levels = self.simulator.ladder.levels().to_vec();
            set_level_field(&mut levels, name, level, is_target, value)?;
            self.simulator.ladder = TakeProfitLadder::new(levels)?;
            return Ok(());
        }
        self.apply_non_ladder(name, value)
    }

    /// Build a config from `base` plus a flat settings bag, then validate.
    ///
    /// Ladder keys are applied together, so intermediate states such as
    /// raising `tp1_target` above the old `tp2_target` are not rejected.
    pub fn from_settings(
        base: &StrategyConfig,
        settings: &BTreeMap<String, f64>,
    ) -> Result<Self, ConfigError> {
        Self::from_pairs(base, settings.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Same as [`from_settings`](Self::from_settings), preserving pair order.
    pub fn from_pairs<'a>(
        base: &StrategyConfig,
        pairs: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, ConfigError> {
        let mut config = base.clone();
        let mut levels = config.simulator.ladder.levels().to_vec();
        let mut ladder_touched = false;

        for (name, value) in pairs {
            if let Some((level, is_target)) = parse_tp_key(name) {
                set_level_field(&mut levels, name, level, is_target, value)?;
                ladder_touched = true;
            } else {
                config.apply_non_ladder(name, value)?;
            }
        }

        if ladder_touched {
            config.simulator.ladder = TakeProfitLadder::new(levels)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_non_ladder(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        match name {
            "channel_period" => self.indicators.channel_period = as_window(name, value)?,
            "channel_multiplier" => {
                check_bounds(name, value, MULTIPLIER_BOUNDS)?;
                self.indicators.channel_multiplier = value;
            }
            "atr_period" => self.indicators.atr_period = as_window(name, value)?,

            "stop_loss_pct" => {
                check_bounds(name, value, PCT_BOUNDS)?;
                self.simulator.stop_loss_pct = value;
            }
            "sl_mode" => {
                let mode = (value.fract() == 0.0)
                    .then(|| StopLossMode::from_code(value as i64))
                    .flatten()
                    .ok_or_else(|| ConfigError::InvalidStopMode(format!("code {value}")))?;
                self.simulator.stop_mode = mode;
            }
            "leverage" => {
                check_bounds(name, value, LEVERAGE_BOUNDS)?;
                self.simulator.leverage = value;
            }
            "commission_pct" => {
                check_bounds(name, value, PCT_BOUNDS)?;
                self.simulator.commission_pct = value;
            }
            "commission_enabled" => self.simulator.commission_enabled = as_flag(name, value)?,
            "position_size_pct" => {
                check_bounds(name, value, PCT_BOUNDS)?;
                self.simulator.position_size_pct = value;
            }
            "allow_reentry_after_sl" => self.simulator.allow_reentry_after_sl = as_flag(name, value)?,
            "allow_reentry_after_tp" => self.simulator.allow_reentry_after_tp = as_flag(name, value)?,

            "trend_filter" => self.toggle_filter(FilterConfig::trend_confirmation(), name, value)?,
            "rsi_filter" => self.toggle_filter(FilterConfig::momentum_bounds(), name, value)?,
            "adx_filter" => self.toggle_filter(FilterConfig::trend_strength(), name, value)?,
            "volume_filter" => {
                self.toggle_filter(FilterConfig::volume_confirmation(), name, value)?
            }

            "ema_period" => {
                let period = as_window(name, value)?;
                if let FilterConfig::TrendConfirmation { ema_period } =
                    self.filter_mut(FilterConfig::trend_confirmation())
                {
                    *ema_period = period;
                }
            }
            "rsi_period" | "rsi_overbought" | "rsi_oversold" => {
                let window = if name == "rsi_period" {
                    Some(as_window(name, value)?)
                } else {
                    check_bounds(name, value, PCT_BOUNDS)?;
                    None
                };
                if let FilterConfig::MomentumBounds {
                    rsi_period,
                    overbought,
                    oversold,
                } = self.filter_mut(FilterConfig::momentum_bounds())
                {
                    match (name, window) {
                        (_, Some(period)) => *rsi_period = period,
                        ("rsi_overbought", None) => *overbought = value,
                        _ => *oversold = value,
                    }
                }
            }
            "adx_period" | "adx_min" => {
                let window = if name == "adx_period" {
                    Some(as_window(name, value)?)
                } else {
                    check_bounds(name, value, PCT_BOUNDS)?;
                    None
                };
                if let FilterConfig::TrendStrength {
                    adx_period,
                    min_adx,
                } = self.filter_mut(FilterConfig::trend_strength())
                {
                    match window {
                        Some(period) => *adx_period = period,
                        None => *min_adx = value,
                    }
                }
            }
            "volume_ma_period" => {
                let period = as_window(name, value)?;
                if let FilterConfig::VolumeConfirmation { ma_period } =
                    self.filter_mut(FilterConfig::volume_confirmation())
                {
                    *ma_period = period;
                }
            }
            _ => return Err(ConfigError::UnknownParameter(name.to_string())),
        }
        Ok(())
    }

    /// Slot of the same kind as `default`, appended (enabled) if missing.
    fn slot_mut(&mut self, default: FilterConfig) -> &mut FilterSlot {
        let kind = default.kind();
        let pos = match self.filters.iter().position(|s| s.filter.kind() == kind) {
            Some(pos) => pos,
            None => {
                self.filters.push(FilterSlot::new(default));
                self.filters.len() - 1
            }
        };
        &mut self.filters[pos]
    }

    fn filter_mut(&mut self, default: FilterConfig) -> &mut FilterConfig {
        &mut self.slot_mut(default).filter
    }

    fn toggle_filter(
        &mut self,
        default: FilterConfig,
        name: &str,
        value: f64,
    ) -> Result<(), ConfigError> {
        let enabled = as_flag(name, value)?;
        if !enabled && !self.filters.iter().any(|s| s.filter.kind() == default.kind()) {
            return Ok(());
        }
        self.slot_mut(default).enabled = enabled;
        Ok(())
    }
}

fn set_level_field(
    levels: &mut [TakeProfitLevel],
    name: &str,
    level: usize,
    is_target: bool,
    value: f64,
) -> Result<(), ConfigError> {
    check_bounds(name, value, PCT_BOUNDS)?;
    let count = levels.len();
    let slot = level
        .checked_sub(1)
        .and_then(|i| levels.get_mut(i))
        .ok_or_else(|| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("ladder has {count} levels"),
        })?;
    if is_target {
        slot.target_pct = value;
    } else {
        slot.close_pct = value;
    }
    Ok(())
}
