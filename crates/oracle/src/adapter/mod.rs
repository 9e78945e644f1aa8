mod gps;
mod humidity;
mod source;
mod temperature;

use std::time::{SystemTime, UNIX_EPOCH};

use oracle_core::reading::{Reading, ReadingValue, SensorType, Unit};
use oracle_core::OracleError;

pub use gps::GpsAdapter;
pub use humidity::HumidityAdapter;
pub use source::{SampleSource, SimulatedSampleSource};
pub use temperature::TemperatureAdapter;

use crate::config::SensorConfig;

/// Raw payload handed from the transport-specific fetch step to `validate`/
/// `transform`. Stands in for whatever a real deployment reads off MQTT or
/// an HTTP polling endpoint.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub raw_value: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub satellites: u32,
    pub hdop: f64,
    pub fix_quality: FixQuality,
    pub signal_quality: SignalQuality,
    pub battery_level: f64,
    pub calibration_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    Gps,
    NoFix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalQuality {
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AdapterStats {
    pub total_readings: u64,
    pub successful_readings: u64,
    pub failed_readings: u64,
    pub last_reading_ts: Option<u64>,
}

impl AdapterStats {
    fn record_success(&mut self, ts: u64) {
        self.total_readings += 1;
        self.successful_readings += 1;
        self.last_reading_ts = Some(ts);
    }

    fn record_failure(&mut self) {
        self.total_readings += 1;
        self.failed_readings += 1;
    }
}

/// Tagged-enum sensor adapter: one variant per supported sensor type,
/// dispatched with `match` rather than through a trait object.
pub enum Adapter {
    Temperature(TemperatureAdapter),
    Humidity(HumidityAdapter),
    Gps(GpsAdapter),
}

impl Adapter {
    pub fn from_config(sensor_id: &str, config: &SensorConfig) -> Self {
        use crate::config::AdapterKind;
        match config.adapter {
            AdapterKind::Temperature => {
                Adapter::Temperature(TemperatureAdapter::new(sensor_id, config))
            }
            AdapterKind::Humidity => Adapter::Humidity(HumidityAdapter::new(sensor_id, config)),
            AdapterKind::Gps => Adapter::Gps(GpsAdapter::new(sensor_id, config)),
        }
    }

    pub fn sensor_type(&self) -> SensorType {
        match self {
            Adapter::Temperature(_) => SensorType::Temperature,
            Adapter::Humidity(_) => SensorType::Humidity,
            Adapter::Gps(_) => SensorType::Gps,
        }
    }

    pub fn polling_interval_secs(&self) -> u64 {
        match self {
            Adapter::Temperature(a) => a.polling_interval_secs,
            Adapter::Humidity(a) => a.polling_interval_secs,
            Adapter::Gps(a) => a.polling_interval_secs,
        }
    }

    pub fn validate(&self, sample: &RawSample) -> bool {
        match self {
            Adapter::Temperature(a) => a.validate(sample),
            Adapter::Humidity(a) => a.validate(sample),
            Adapter::Gps(a) => a.validate(sample),
        }
    }

    pub fn transform(&self, sample: &RawSample) -> Result<(ReadingValue, Unit, f64), OracleError> {
        match self {
            Adapter::Temperature(a) => a.transform(sample),
            Adapter::Humidity(a) => a.transform(sample),
            Adapter::Gps(a) => a.transform(sample),
        }
    }

    pub fn stats(&self) -> AdapterStats {
        match self {
            Adapter::Temperature(a) => a.stats,
            Adapter::Humidity(a) => a.stats,
            Adapter::Gps(a) => a.stats,
        }
    }

    fn record_success(&mut self, ts: u64) {
        match self {
            Adapter::Temperature(a) => a.stats.record_success(ts),
            Adapter::Humidity(a) => a.stats.record_success(ts),
            Adapter::Gps(a) => a.stats.record_success(ts),
        }
    }

    fn record_failure(&mut self) {
        match self {
            Adapter::Temperature(a) => a.stats.record_failure(),
            Adapter::Humidity(a) => a.stats.record_failure(),
            Adapter::Gps(a) => a.stats.record_failure(),
        }
    }

    /// Validates and transforms a raw sample into a signed-ready `Reading`,
    /// tracking adapter stats either way.
    pub fn build_reading(
        &mut self,
        sensor_id: &str,
        node_id: &str,
        sample: &RawSample,
    ) -> Result<Reading, OracleError> {
        if !self.validate(sample) {
            self.record_failure();
            return Err(OracleError::invalid_reading(format!(
                "sensor {sensor_id} sample failed adapter validation"
            )));
        }

        let (value, unit, quality_score) = match self.transform(sample) {
            Ok(t) => t,
            Err(e) => {
                self.record_failure();
                return Err(e);
            }
        };

        let ts = now_secs();
        self.record_success(ts);

        Ok(Reading {
            sensor_id: sensor_id.to_string(),
            sensor_type: self.sensor_type(),
            value,
            unit,
            timestamp: ts,
            node_id: node_id.to_string(),
            signature: Vec::new(),
            quality_score,
        })
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;

    fn sample(raw_value: f64) -> RawSample {
        RawSample {
            raw_value,
            latitude: None,
            longitude: None,
            altitude: None,
            satellites: 8,
            hdop: 1.0,
            fix_quality: FixQuality::Gps,
            signal_quality: SignalQuality::Good,
            battery_level: 90.0,
            calibration_offset: 0.0,
        }
    }

    #[test]
    fn test_adapter_from_config_dispatches_by_kind() {
        let cfg = SensorConfig::default();
        let adapter = Adapter::from_config("roof-temp", &cfg);
        assert_eq!(adapter.sensor_type(), SensorType::Temperature);
    }

    #[test]
    fn test_build_reading_success_updates_stats() {
        let cfg = SensorConfig::default();
        let mut adapter = Adapter::from_config("roof-temp", &cfg);
        let reading = adapter.build_reading("roof-temp", "node-a", &sample(23.0)).unwrap();
        assert_eq!(reading.sensor_type, SensorType::Temperature);
        assert_eq!(adapter.stats().successful_readings, 1);
    }

    #[test]
    fn test_build_reading_failure_updates_stats() {
        let cfg = SensorConfig::default();
        let mut adapter = Adapter::from_config("roof-temp", &cfg);
        let mut bad = sample(23.0);
        bad.signal_quality = SignalQuality::Poor;
        let result = adapter.build_reading("roof-temp", "node-a", &bad);
        assert!(result.is_err());
        assert_eq!(adapter.stats().failed_readings, 1);
    }
}
