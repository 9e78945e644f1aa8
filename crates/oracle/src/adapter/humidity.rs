use oracle_core::reading::{ReadingValue, Unit};
use oracle_core::OracleError;

use super::{AdapterStats, RawSample};
use crate::config::SensorConfig;

const MIN_HUMIDITY: f64 = 0.0;
const MAX_HUMIDITY: f64 = 100.0;

pub struct HumidityAdapter {
    pub polling_interval_secs: u64,
    pub stats: AdapterStats,
}

impl HumidityAdapter {
    pub fn new(_sensor_id: &str, config: &SensorConfig) -> Self {
        Self { polling_interval_secs: config.polling_interval_secs, stats: AdapterStats::default() }
    }

    pub fn validate(&self, sample: &RawSample) -> bool {
        (MIN_HUMIDITY..=MAX_HUMIDITY).contains(&sample.raw_value)
    }

    pub fn transform(&self, sample: &RawSample) -> Result<(ReadingValue, Unit, f64), OracleError> {
        let calibrated = (sample.raw_value + sample.calibration_offset).clamp(MIN_HUMIDITY, MAX_HUMIDITY);
        let value = (calibrated * 10.0).round() / 10.0;
        Ok((ReadingValue::Scalar(value), Unit::Percent, 0.95))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(raw_value: f64, calibration_offset: f64) -> RawSample {
        RawSample {
            raw_value,
            latitude: None,
            longitude: None,
            altitude: None,
            satellites: 0,
            hdop: 0.0,
            fix_quality: super::super::FixQuality::Gps,
            signal_quality: super::super::SignalQuality::Good,
            battery_level: 100.0,
            calibration_offset,
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let a = HumidityAdapter::new("h0", &SensorConfig::default());
        assert!(!a.validate(&sample(150.0, 0.0)));
    }

    #[test]
    fn test_transform_applies_calibration_and_clamps() {
        let a = HumidityAdapter::new("h0", &SensorConfig::default());
        let (value, unit, score) = a.transform(&sample(99.0, 5.0)).unwrap();
        assert_eq!(unit, Unit::Percent);
        assert_eq!(value.as_scalar(), Some(100.0));
        assert!((score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_transform_clamps_negative() {
        let a = HumidityAdapter::new("h0", &SensorConfig::default());
        let (value, _, _) = a.transform(&sample(2.0, -5.0)).unwrap();
        assert_eq!(value.as_scalar(), Some(0.0));
    }
}
