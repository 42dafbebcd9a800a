//! Volume confirmation — current volume must exceed its moving average.

use super::{FilterDecision, FilterUnit};
use crate::domain::{Candle, Direction};
use crate::indicators::{defined, Indicator, VolumeSma};

#[derive(Debug, Clone)]
pub struct VolumeFilter {
    ma: VolumeSma,
    volumes: Vec<f64>,
    averages: Vec<f64>,
}

impl VolumeFilter {
    pub fn new(ma_period: usize) -> Self {
        Self {
            ma: VolumeSma::new(ma_period),
            volumes: Vec::new(),
            averages: Vec::new(),
        }
    }
}

impl FilterUnit for VolumeFilter {
    fn name(&self) -> &str {
        "volume_confirmation"
    }

    fn compute(&mut self, candles: &[Candle]) {
        self.volumes = candles.iter().map(|c| c.volume).collect();
        self.averages = self.ma.compute(candles);
    }

    fn evaluate(&self, index: usize, _direction: Direction) -> FilterDecision {
        let (Some(volume), Some(average)) =
            (defined(&self.volumes, index), defined(&self.averages, index))
        else {
            return FilterDecision::warmup();
        };

        if volume > average {
            FilterDecision::allow(format!("volume {volume:.0} above average {average:.0}"))
        } else {
            FilterDecision::block(format!("volume {volume:.0} not above average {average:.0}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    fn with_volumes(volumes: &[f64]) -> Vec<Candle> {
        let closes = vec![100.0; volumes.len()];
        let mut candles = make_candles(&closes);
        for (c, &v) in candles.iter_mut().zip(volumes) {
            c.volume = v;
        }
        candles
    }

    #[test]
    fn spike_passes() {
        let mut filter = VolumeFilter::new(3);
        filter.compute(&with_volumes(&[100.0, 100.0, 400.0]));
        assert!(filter.evaluate(2, Direction::Long).allowed);
    }

    #[test]
    fn flat_volume_blocks() {
        // Equal to the average is not "above" it.
        let mut filter = VolumeFilter::new(3);
        filter.compute(&with_volumes(&[100.0, 100.0, 100.0]));
        assert!(!filter.evaluate(2, Direction::Short).allowed);
    }

    #[test]
    fn warmup_blocks() {
        let mut filter = VolumeFilter::new(3);
        filter.compute(&with_volumes(&[100.0, 500.0]));
        assert!(!filter.evaluate(1, Direction::Long).allowed);
    }
}
