use oracle_core::reading::{ReadingValue, Unit};
use oracle_core::OracleError;

use super::{AdapterStats, FixQuality, RawSample};
use crate::config::SensorConfig;

const MAX_HDOP: f64 = 5.0;
const MIN_SATELLITES: u32 = 4;

pub struct GpsAdapter {
    pub polling_interval_secs: u64,
    pub stats: AdapterStats,
}

impl GpsAdapter {
    pub fn new(_sensor_id: &str, config: &SensorConfig) -> Self {
        Self { polling_interval_secs: config.polling_interval_secs, stats: AdapterStats::default() }
    }

    pub fn validate(&self, sample: &RawSample) -> bool {
        if sample.fix_quality != FixQuality::Gps {
            return false;
        }
        if sample.satellites < MIN_SATELLITES {
            return false;
        }
        let (Some(lat), Some(lon)) = (sample.latitude, sample.longitude) else {
            return false;
        };
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return false;
        }
        if sample.hdop > MAX_HDOP {
            return false;
        }
        true
    }

    pub fn transform(&self, sample: &RawSample) -> Result<(ReadingValue, Unit, f64), OracleError> {
        let lat = sample.latitude.ok_or_else(|| OracleError::invalid_reading("gps sample missing latitude"))?;
        let lon = sample.longitude.ok_or_else(|| OracleError::invalid_reading("gps sample missing longitude"))?;
        let accuracy = sample.hdop * 5.0;

        let mut score = 1.0;
        if sample.hdop > 2.0 {
            score *= 0.7;
        } else if sample.hdop > 1.5 {
            score *= 0.9;
        }
        if sample.satellites >= 8 {
            score *= 1.1;
        } else if sample.satellites < 6 {
            score *= 0.8;
        }
        let score = score.min(1.0);

        Ok((
            ReadingValue::Gps {
                lat,
                lon,
                alt: sample.altitude.unwrap_or(0.0),
                accuracy: (accuracy * 10.0).round() / 10.0,
            },
            Unit::Coordinates,
            (score * 100.0).round() / 100.0,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(satellites: u32, hdop: f64) -> RawSample {
        RawSample {
            raw_value: 0.0,
            latitude: Some(48.8566),
            longitude: Some(2.3522),
            altitude: Some(100.0),
            satellites,
            hdop,
            fix_quality: FixQuality::Gps,
            signal_quality: super::super::SignalQuality::Good,
            battery_level: 100.0,
            calibration_offset: 0.0,
        }
    }

    #[test]
    fn test_validate_rejects_no_fix() {
        let a = GpsAdapter::new("g0", &SensorConfig::default());
        let mut s = fix(8, 1.0);
        s.fix_quality = FixQuality::NoFix;
        assert!(!a.validate(&s));
    }

    #[test]
    fn test_validate_rejects_too_few_satellites() {
        let a = GpsAdapter::new("g0", &SensorConfig::default());
        assert!(!a.validate(&fix(2, 1.0)));
    }

    #[test]
    fn test_validate_rejects_high_hdop() {
        let a = GpsAdapter::new("g0", &SensorConfig::default());
        assert!(!a.validate(&fix(8, 6.0)));
    }

    #[test]
    fn test_transform_quality_bonus_for_many_satellites() {
        let a = GpsAdapter::new("g0", &SensorConfig::default());
        let (_, _, score) = a.transform(&fix(10, 1.0)).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_quality_penalty_for_high_hdop() {
        let a = GpsAdapter::new("g0", &SensorConfig::default());
        let (_, _, score) = a.transform(&fix(7, 2.5)).unwrap();
        assert!((score - 0.7).abs() < 1e-9);
    }
}
