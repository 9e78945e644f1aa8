use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Temperature,
    Humidity,
    Gps,
}

/// The unit a temperature sensor reports its raw value in. The
/// Temperature adapter converts to celsius in `transform` before the
/// value ever reaches a Reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl Default for TemperatureUnit {
    fn default() -> Self {
        Self::Celsius
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub adapter: AdapterKind,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_min_temp")]
    pub min_temp_celsius: f64,
    #[serde(default = "default_max_temp")]
    pub max_temp_celsius: f64,
    /// Input unit of the raw temperature reading; `min_temp_celsius`/
    /// `max_temp_celsius` always bound the value in celsius regardless
    /// of this setting.
    #[serde(default)]
    pub unit: TemperatureUnit,
    #[serde(default)]
    pub calibration_offset: f64,
}

fn default_polling_interval() -> u64 {
    30
}

fn default_min_temp() -> f64 {
    -50.0
}

fn default_max_temp() -> f64 {
    100.0
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterKind::Temperature,
            polling_interval_secs: default_polling_interval(),
            topic: None,
            min_temp_celsius: default_min_temp(),
            max_temp_celsius: default_max_temp(),
            unit: TemperatureUnit::default(),
            calibration_offset: 0.0,
        }
    }
}

pub type SensorsConfig = HashMap<String, SensorConfig>;

pub fn validate_sensors(sensors: &SensorsConfig) -> Result<(), ConfigError> {
    for (name, cfg) in sensors {
        if cfg.polling_interval_secs == 0 {
            return Err(ConfigError::Validation(format!(
                "sensors.{name}.polling_interval_secs must be >= 1"
            )));
        }
        if cfg.min_temp_celsius >= cfg.max_temp_celsius {
            return Err(ConfigError::Validation(format!(
                "sensors.{name}: min_temp_celsius must be < max_temp_celsius"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sensor_valid() {
        let mut sensors = SensorsConfig::new();
        sensors.insert("roof-temp".into(), SensorConfig::default());
        assert!(validate_sensors(&sensors).is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut sensors = SensorsConfig::new();
        sensors.insert(
            "roof-temp".into(),
            SensorConfig { polling_interval_secs: 0, ..Default::default() },
        );
        assert!(validate_sensors(&sensors).is_err());
    }
}
