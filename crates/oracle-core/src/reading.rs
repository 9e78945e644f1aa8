//! The data that flows through the aggregation pipeline.

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Temperature,
    Humidity,
    Gps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Celsius,
    Percent,
    Coordinates,
}

/// A reading's value: a plain scalar for most sensor types, or a
/// structured fix for GPS (whose coordinates are aggregated
/// independently per axis, per the IQR filter's rules).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingValue {
    Scalar(f64),
    Gps {
        lat: f64,
        lon: f64,
        alt: f64,
        accuracy: f64,
    },
}

impl ReadingValue {
    /// The scalar this value contributes to a single-axis aggregation.
    /// For GPS, callers operate per-axis instead of calling this.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Gps { .. } => None,
        }
    }
}

/// One contribution to a consensus window.
///
/// Immutable after construction: pipeline stages consume a `Reading` by
/// value and hand the next stage ownership, they never mutate one in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub value: ReadingValue,
    pub unit: Unit,
    /// Seconds, monotonic within the origin node.
    pub timestamp: u64,
    pub node_id: String,
    /// Opaque proof-of-origin bytes. The concrete scheme (ECDSA over the
    /// canonical signing bytes) lives in the `oracle` crate's crypto
    /// module; this type only carries and (de)serializes the bytes.
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub quality_score: f64,
}

impl Reading {
    /// Bytes a signer/verifier signs over: every field except the
    /// signature itself, in a fixed order so both sides agree.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let tuple = (
            &self.sensor_id,
            self.sensor_type,
            &self.value,
            self.unit,
            self.timestamp,
            &self.node_id,
        );
        serde_json::to_vec(&tuple).unwrap_or_default()
    }

    /// Whether `timestamp` falls within the window's skew-tolerant
    /// bounds: `[window_start - skew, window_end + skew]`.
    pub fn within_window(&self, window_start: u64, window_end: u64, skew: u64) -> bool {
        let lo = window_start.saturating_sub(skew);
        let hi = window_end.saturating_add(skew);
        self.timestamp >= lo && self.timestamp <= hi
    }

    pub fn validate_shape(&self) -> ValidationResult {
        if self.sensor_id.is_empty() {
            return Err(ValidationError::required("sensor_id"));
        }
        if self.node_id.is_empty() {
            return Err(ValidationError::required("node_id"));
        }
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(ValidationError::out_of_range(
                "quality_score",
                0.0,
                1.0,
                self.quality_score,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Median,
    WeightedMedian,
}

/// Produced per window. Constructed only by the Aggregator, and only
/// when `nodes_participated >= min_nodes` and the consensus ratio meets
/// the configured threshold — there is no public constructor that can
/// build one outside that invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub sensor_id: String,
    /// Scalar for most sensor types; per-axis aggregate for gps.
    pub value: ReadingValue,
    /// Max of the contributing readings' timestamps.
    pub timestamp: u64,
    pub confidence: f64,
    pub nodes_participated: usize,
    pub outliers_removed: usize,
    pub method: AggregationMethod,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reading() -> Reading {
        Reading {
            sensor_id: "temp-0".into(),
            sensor_type: SensorType::Temperature,
            value: ReadingValue::Scalar(23.1),
            unit: Unit::Celsius,
            timestamp: 1_000,
            node_id: "node-a".into(),
            signature: vec![1, 2, 3, 4],
            quality_score: 0.9,
        }
    }

    #[test]
    fn test_within_window() {
        let r = sample_reading();
        assert!(r.within_window(990, 1_010, 5));
        assert!(r.within_window(995, 999, 5));
        assert!(!r.within_window(1_100, 1_200, 5));
    }

    #[test]
    fn test_serde_roundtrip() {
        let r = sample_reading();
        let bytes = serde_json::to_vec(&r).unwrap();
        let parsed: Reading = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.sensor_id, r.sensor_id);
        assert_eq!(parsed.signature, r.signature);
        assert_eq!(parsed.value, r.value);
    }

    #[test]
    fn test_validate_shape_rejects_empty_sensor_id() {
        let mut r = sample_reading();
        r.sensor_id.clear();
        assert!(r.validate_shape().is_err());
    }

    #[test]
    fn test_signing_bytes_excludes_signature() {
        let mut r = sample_reading();
        let bytes_a = r.signing_bytes();
        r.signature = vec![9, 9, 9];
        let bytes_b = r.signing_bytes();
        assert_eq!(bytes_a, bytes_b);
    }
}
