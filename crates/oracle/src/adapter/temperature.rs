use oracle_core::reading::{ReadingValue, Unit};
use oracle_core::OracleError;

use super::{AdapterStats, RawSample, SignalQuality};
use crate::config::{SensorConfig, TemperatureUnit};

pub struct TemperatureAdapter {
    pub polling_interval_secs: u64,
    min_temp_celsius: f64,
    max_temp_celsius: f64,
    unit: TemperatureUnit,
    pub stats: AdapterStats,
}

impl TemperatureAdapter {
    pub fn new(_sensor_id: &str, config: &SensorConfig) -> Self {
        Self {
            polling_interval_secs: config.polling_interval_secs,
            min_temp_celsius: config.min_temp_celsius,
            max_temp_celsius: config.max_temp_celsius,
            unit: config.unit,
            stats: AdapterStats::default(),
        }
    }

    /// Converts a raw reading to celsius per the configured input unit.
    fn to_celsius(&self, raw_value: f64) -> f64 {
        match self.unit {
            TemperatureUnit::Celsius => raw_value,
            TemperatureUnit::Fahrenheit => (raw_value - 32.0) * 5.0 / 9.0,
            TemperatureUnit::Kelvin => raw_value - 273.15,
        }
    }

    pub fn validate(&self, sample: &RawSample) -> bool {
        let celsius = self.to_celsius(sample.raw_value);
        if !(self.min_temp_celsius..=self.max_temp_celsius).contains(&celsius) {
            return false;
        }
        if sample.signal_quality == SignalQuality::Poor {
            return false;
        }
        if sample.battery_level < 10.0 {
            return false;
        }
        true
    }

    pub fn transform(&self, sample: &RawSample) -> Result<(ReadingValue, Unit, f64), OracleError> {
        let value = (self.to_celsius(sample.raw_value) * 100.0).round() / 100.0;

        let mut score = 1.0;
        score *= match sample.signal_quality {
            SignalQuality::Good => 1.0,
            SignalQuality::Fair => 0.8,
            SignalQuality::Poor => 0.5,
        };
        if sample.battery_level < 20.0 {
            score *= 0.7;
        } else if sample.battery_level < 50.0 {
            score *= 0.9;
        }

        Ok((ReadingValue::Scalar(value), Unit::Celsius, (score * 100.0).round() / 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SensorConfig {
        SensorConfig::default()
    }

    fn good_sample(raw_value: f64) -> RawSample {
        RawSample {
            raw_value,
            latitude: None,
            longitude: None,
            altitude: None,
            satellites: 0,
            hdop: 0.0,
            fix_quality: super::super::FixQuality::Gps,
            signal_quality: SignalQuality::Good,
            battery_level: 90.0,
            calibration_offset: 0.0,
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let a = TemperatureAdapter::new("t0", &cfg());
        assert!(!a.validate(&good_sample(500.0)));
    }

    #[test]
    fn test_validate_rejects_poor_quality() {
        let a = TemperatureAdapter::new("t0", &cfg());
        let mut s = good_sample(20.0);
        s.signal_quality = SignalQuality::Poor;
        assert!(!a.validate(&s));
    }

    #[test]
    fn test_validate_rejects_low_battery() {
        let a = TemperatureAdapter::new("t0", &cfg());
        let mut s = good_sample(20.0);
        s.battery_level = 5.0;
        assert!(!a.validate(&s));
    }

    #[test]
    fn test_transform_quality_score_penalizes_low_battery() {
        let a = TemperatureAdapter::new("t0", &cfg());
        let mut s = good_sample(20.0);
        s.battery_level = 15.0;
        let (_, _, score) = a.transform(&s).unwrap();
        assert!((score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_transform_fair_quality_penalty() {
        let a = TemperatureAdapter::new("t0", &cfg());
        let mut s = good_sample(20.0);
        s.signal_quality = SignalQuality::Fair;
        let (_, _, score) = a.transform(&s).unwrap();
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_transform_converts_fahrenheit_to_celsius() {
        let a = TemperatureAdapter::new("t0", &SensorConfig { unit: TemperatureUnit::Fahrenheit, ..cfg() });
        let (value, unit, _) = a.transform(&good_sample(68.0)).unwrap();
        assert_eq!(unit, Unit::Celsius);
        assert!((value.as_scalar().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_converts_kelvin_to_celsius() {
        let a = TemperatureAdapter::new("t0", &SensorConfig { unit: TemperatureUnit::Kelvin, ..cfg() });
        let (value, _, _) = a.transform(&good_sample(293.15)).unwrap();
        assert!((value.as_scalar().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_applies_unit_conversion_before_range_check() {
        let a = TemperatureAdapter::new("t0", &SensorConfig { unit: TemperatureUnit::Fahrenheit, ..cfg() });
        // 500 celsius is out of range, but 500 fahrenheit (~260C) still is too.
        // 68F (20C) should validate fine, 300F (~149C) should not.
        assert!(a.validate(&good_sample(68.0)));
        assert!(!a.validate(&good_sample(300.0)));
    }
}
