use rand::Rng;

use super::{FixQuality, RawSample, SignalQuality};
use crate::config::{AdapterKind, SensorConfig};

/// The boundary between an adapter and whatever actually talks to a
/// sensor. Concrete transports (MQTT, serial, HTTP polling) are out of
/// scope here — this trait is the contract a real deployment implements.
pub trait SampleSource: Send + Sync {
    fn sample(&self) -> RawSample;
}

/// Stand-in source used until a real transport is wired in: generates
/// plausible readings with the same base-value/variation/noise/error-rate
/// shape the reference simulation uses, so adapters and the scheduler can
/// be exercised end to end without live hardware.
pub struct SimulatedSampleSource {
    kind: AdapterKind,
    base_lat: f64,
    base_lon: f64,
}

impl SimulatedSampleSource {
    pub fn new(kind: AdapterKind, _config: &SensorConfig) -> Self {
        Self { kind, base_lat: 48.8566, base_lon: 2.3522 }
    }
}

impl SampleSource for SimulatedSampleSource {
    fn sample(&self) -> RawSample {
        let mut rng = rand::thread_rng();

        match self.kind {
            AdapterKind::Temperature => {
                let base = 23.0;
                let variation = rng.gen_range(-3.0..3.0);
                let noise = rng.gen_range(-0.5..0.5);
                let mut value = base + variation + noise;
                if rng.gen_bool(0.05) {
                    value = rng.gen_range(-100.0..200.0);
                }
                let quality = match rng.gen_range(0..3) {
                    0 => SignalQuality::Good,
                    1 => SignalQuality::Fair,
                    _ => SignalQuality::Poor,
                };
                RawSample {
                    raw_value: value,
                    latitude: None,
                    longitude: None,
                    altitude: None,
                    satellites: 0,
                    hdop: 0.0,
                    fix_quality: FixQuality::Gps,
                    signal_quality: quality,
                    battery_level: rng.gen_range(20.0..100.0),
                    calibration_offset: 0.0,
                }
            }
            AdapterKind::Humidity => {
                let base = 65.0;
                let variation = rng.gen_range(-15.0..15.0);
                let noise = rng.gen_range(-2.0..2.0);
                let mut value = (base + variation + noise).clamp(0.0, 100.0);
                if rng.gen_bool(0.03) {
                    value = rng.gen_range(-10.0..120.0);
                }
                RawSample {
                    raw_value: value,
                    latitude: None,
                    longitude: None,
                    altitude: None,
                    satellites: 0,
                    hdop: 0.0,
                    fix_quality: FixQuality::Gps,
                    signal_quality: SignalQuality::Good,
                    battery_level: 100.0,
                    calibration_offset: rng.gen_range(-1.0..1.0),
                }
            }
            AdapterKind::Gps => {
                let lat_drift = rng.gen_range(-0.001..0.001);
                let lon_drift = rng.gen_range(-0.001..0.001);
                let hdop = rng.gen_range(0.8..3.0);
                let mut satellites = rng.gen_range(4..=12);
                let mut fix_quality = FixQuality::Gps;
                if rng.gen_bool(0.1) {
                    fix_quality = FixQuality::NoFix;
                    satellites = rng.gen_range(0..=3);
                }
                RawSample {
                    raw_value: 0.0,
                    latitude: Some(self.base_lat + lat_drift),
                    longitude: Some(self.base_lon + lon_drift),
                    altitude: Some(rng.gen_range(50.0..200.0)),
                    satellites,
                    hdop,
                    fix_quality,
                    signal_quality: SignalQuality::Good,
                    battery_level: 100.0,
                    calibration_offset: 0.0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_temperature_mostly_in_band() {
        let source = SimulatedSampleSource::new(AdapterKind::Temperature, &SensorConfig::default());
        let in_band = (0..200).filter(|_| (18.0..28.0).contains(&source.sample().raw_value)).count();
        assert!(in_band > 100);
    }

    #[test]
    fn test_simulated_gps_has_coordinates() {
        let source = SimulatedSampleSource::new(AdapterKind::Gps, &SensorConfig::default());
        let s = source.sample();
        assert!(s.latitude.is_some());
        assert!(s.longitude.is_some());
    }
}
